//! Deterministic Linker (C4, `spec.md` §4.3).
//!
//! Runs before any LLM call and emits high-confidence candidate proposals
//! from two rules: a producer map over root-collection endpoints, and an
//! auth-chain rule linking `Authorization` variables to token-issuing
//! responses. Grounded in the teacher's dependency-scan shape in
//! `examples/kioku-aperture/src/batch/graph.rs::extract_variable_references`
//! — scanning declared inputs for references to another operation's
//! outputs — generalized from a batch file's explicit `depends_on`/capture
//! names to inference from path shape and response schema.
//!
//! These proposals are *raw*: they still pass through the universal
//! post-processing pipeline in [`crate::dependencies::llm`] (scope filter,
//! path-`*Id` override, self-reference refusal, confidence clamps) before
//! being persisted — `spec.md` §4.4 applies that pipeline "to every
//! candidate, LLM or deterministic."

use crate::constants;
use crate::model::{Api, HttpMethod, Id, Variable, VariableLocation};
use std::collections::HashMap;

/// A not-yet-filtered dependency proposal: one target variable bound to one
/// source response selector.
#[derive(Debug, Clone)]
pub struct RawCandidate {
    pub source_api_ref: Id,
    pub target_api_ref: Id,
    pub target_variable: String,
    pub source_selector: String,
    pub confidence: f64,
    pub reason: String,
    pub deterministic: bool,
}

/// Maps an inferred id name (e.g. `"orderId"`) to the producer `Api` that
/// creates that resource.
#[derive(Debug, Default)]
pub struct ProducerMap {
    by_inferred_id: HashMap<String, Id>,
}

impl ProducerMap {
    #[must_use]
    pub fn get(&self, inferred_id: &str) -> Option<Id> {
        self.by_inferred_id.get(inferred_id).copied()
    }
}

/// Strips a trailing `s` — the spec's own definition of "trivial singularization".
fn singularize(resource: &str) -> &str {
    resource.strip_suffix('s').unwrap_or(resource)
}

fn path_segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect()
}

/// Builds the `*Id` producer map: a root-collection endpoint (`POST`/`GET`
/// on a single-segment path like `/orders`) produces `<singular>Id`.
/// `POST /register` additionally produces `userId`.
#[must_use]
pub fn build_producer_map(apis: &[Api]) -> ProducerMap {
    let mut by_inferred_id = HashMap::new();
    for api in apis {
        let segments = path_segments(&api.path);
        if segments.len() != 1 || !matches!(api.method, HttpMethod::Post | HttpMethod::Get) {
            continue;
        }
        let resource = segments[0];
        let inferred_id = format!("{}Id", singularize(resource));
        by_inferred_id.entry(inferred_id).or_insert(api.id);
        if api.method == HttpMethod::Post && resource == "register" {
            by_inferred_id.entry("userId".to_string()).or_insert(api.id);
        }
    }
    ProducerMap { by_inferred_id }
}

/// For a consumer path containing a literal `{id}` segment preceded by a
/// resource segment `R`, the id parameter is looked up in the producer map
/// as `singular(R)+"Id"` rather than literally `"id"` — spec.md §4.3's
/// "context-sensitive id rewrite".
fn rewritten_id_key(consumer_path: &str) -> Option<String> {
    let segments = path_segments(consumer_path);
    let idx = segments.iter().position(|s| *s == "{id}")?;
    let resource = segments.get(idx.checked_sub(1)?)?;
    Some(format!("{}Id", singularize(resource)))
}

/// Producer-map candidates: every consumer path parameter named `id` is
/// resolved via the context-sensitive rewrite and, on a producer-map hit,
/// proposed with `mapping = { <param name>: "id" }` — the producer's own
/// id-bearing response field is assumed to be named `id` (scenario 2).
#[must_use]
pub fn producer_map_candidates(
    apis: &[Api],
    variables_by_api: &HashMap<Id, Vec<Variable>>,
) -> Vec<RawCandidate> {
    let producer_map = build_producer_map(apis);
    let mut out = Vec::new();

    for api in apis {
        let Some(vars) = variables_by_api.get(&api.id) else {
            continue;
        };
        for var in vars {
            if var.location != VariableLocation::Path || var.name != "id" {
                continue;
            }
            let Some(key) = rewritten_id_key(&api.path) else {
                continue;
            };
            let Some(producer_id) = producer_map.get(&key) else {
                continue;
            };
            if producer_id == api.id {
                continue; // spec.md §4.5/§8: source != target always.
            }
            out.push(RawCandidate {
                source_api_ref: producer_id,
                target_api_ref: api.id,
                target_variable: var.name.clone(),
                source_selector: "id".to_string(),
                confidence: 1.0,
                reason: "Deterministic: *Id producer map".to_string(),
                deterministic: true,
            });
        }
    }
    out
}

/// Auth-chain candidates: every consumer `Authorization` header variable is
/// linked to every producer whose response schema exposes one of the
/// token-field names, in preference order, one match per (producer,
/// consumer) pair.
#[must_use]
pub fn auth_chain_candidates(
    apis: &[Api],
    variables_by_api: &HashMap<Id, Vec<Variable>>,
    response_schemas_by_api: &HashMap<Id, Vec<serde_json::Value>>,
) -> Vec<RawCandidate> {
    let mut out = Vec::new();

    let producers: Vec<(Id, &str)> = apis
        .iter()
        .filter_map(|api| {
            let schemas = response_schemas_by_api.get(&api.id)?;
            let token_field = constants::TOKEN_FIELD_CANDIDATES
                .iter()
                .find(|field| schemas.iter().any(|s| schema_has_property(s, field)))?;
            Some((api.id, *token_field))
        })
        .collect();

    for api in apis {
        let Some(vars) = variables_by_api.get(&api.id) else {
            continue;
        };
        let wants_auth = vars
            .iter()
            .any(|v| v.location == VariableLocation::Header && v.name == "Authorization");
        if !wants_auth {
            continue;
        }
        for (producer_id, token_field) in &producers {
            if *producer_id == api.id {
                continue;
            }
            out.push(RawCandidate {
                source_api_ref: *producer_id,
                target_api_ref: api.id,
                target_variable: "Authorization".to_string(),
                source_selector: (*token_field).to_string(),
                confidence: 1.0,
                reason: "Deterministic Auth: Bearer Token".to_string(),
                deterministic: true,
            });
        }
    }
    out
}

fn schema_has_property(schema: &serde_json::Value, name: &str) -> bool {
    schema
        .get("properties")
        .and_then(serde_json::Value::as_object)
        .is_some_and(|props| props.contains_key(name))
}
