//! LLM Analyzer (C5, `spec.md` §4.4).
//!
//! Builds per-batch prompt context for every "unresolved" consumer
//! endpoint, calls an injected [`ChatClient`], and subjects every resulting
//! candidate — the LLM's and the deterministic linker's alike — to the
//! fixed post-processing pipeline `spec.md` §4.4 specifies. The external
//! collaborator is modeled the way the teacher models `fs::FileSystem`:
//! a narrow async trait, so tests substitute a canned client instead of
//! reaching a real model.

use crate::constants;
use crate::dependencies::deterministic::RawCandidate;
use crate::error::Error;
use crate::model::{Api, CandidateOrigin, DependencyCandidate, HttpMethod, Id, Mapping, Variable, VariableLocation};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// `{model, messages:[{role, content}], format, stream, options:{temperature}}`
/// — `spec.md` §6's external LLM chat contract.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub format: String,
    pub stream: bool,
    pub options: ChatOptions,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatOptions {
    pub temperature: f64,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChatResponse {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChatResponseMessage {
    pub content: String,
}

/// A single external chat call. Request timeout (§6: "≥ 10 minutes") is the
/// caller's responsibility — the trait itself doesn't wrap one, matching
/// the teacher's pattern of pushing transport concerns to the concrete
/// `reqwest`-backed implementation rather than the trait boundary.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, Error>;
}

/// `reqwest`-backed [`ChatClient`] against an Ollama-compatible chat
/// endpoint — the concrete collaborator behind the CLI's `analyze` command.
pub struct OllamaChatClient {
    client: reqwest::Client,
    url: String,
}

impl OllamaChatClient {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(600))
                .build()
                .unwrap_or_default(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ChatClient for OllamaChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, Error> {
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm_batch_failed(e.to_string()))?;
        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| Error::llm_batch_failed(e.to_string()))
    }
}

/// One raw proposal as parsed from the model's `{candidates:[...]}` body.
#[derive(Debug, Clone, serde::Deserialize)]
struct LlmCandidateWire {
    #[serde(rename = "sourceApiRef")]
    source_api_ref: Id,
    #[serde(rename = "targetApiRef")]
    target_api_ref: Id,
    #[serde(rename = "targetVariable")]
    target_variable: String,
    #[serde(rename = "sourcePath")]
    source_path: String,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, serde::Deserialize)]
struct LlmCandidatesBody {
    candidates: Vec<LlmCandidateWire>,
}

const CONSUMER_BATCH_SIZE: usize = 3;

pub struct AnalysisInput<'a> {
    pub apis: &'a [Api],
    pub variables_by_api: &'a HashMap<Id, Vec<Variable>>,
    pub response_schemas_by_api: &'a HashMap<Id, Vec<serde_json::Value>>,
}

/// Runs C4 then C5 over `input` and returns the final, filtered candidate
/// set ready to replace the project's `DependencyCandidate` rows wholesale.
///
/// A single failed LLM batch is logged and skipped (`LlmBatchFailed`); the
/// deterministic candidates and any other batch's results still persist —
/// `spec.md` §4.4/§7: analyzer errors are absorbed per-batch, not fatal to
/// the whole analysis.
pub async fn analyze(
    input: &AnalysisInput<'_>,
    project_ref: Id,
    client: &dyn ChatClient,
    model: &str,
) -> Vec<DependencyCandidate> {
    let deterministic_raw = {
        let mut v = crate::dependencies::deterministic::producer_map_candidates(
            input.apis,
            input.variables_by_api,
        );
        v.extend(crate::dependencies::deterministic::auth_chain_candidates(
            input.apis,
            input.variables_by_api,
            input.response_schemas_by_api,
        ));
        v
    };

    let deterministic_pairs: HashSet<(Id, String)> = deterministic_raw
        .iter()
        .map(|c| (c.source_api_ref, c.target_variable.clone()))
        .collect();

    let consumers = consumer_batches(input);
    let producers_prompt = producers_context(input);

    let mut llm_raw = Vec::new();
    for batch in consumers {
        let prompt = build_prompt(&producers_prompt, &batch, input);
        match call_batch(client, model, &prompt).await {
            Ok(candidates) => llm_raw.extend(candidates),
            Err(e) => warn!(error = %e, "LLM batch failed; other batches proceed"),
        }
    }

    let mut all_raw = deterministic_raw;
    all_raw.extend(llm_raw);

    all_raw
        .into_iter()
        .filter_map(|c| post_process(c, input, &deterministic_pairs))
        .map(|c| finalize(c, project_ref))
        .collect()
}

/// Consumers: every Api with at least one `user_input` variable once
/// `Authorization` headers are stripped (those are handled deterministically).
fn consumer_batches<'a>(input: &AnalysisInput<'a>) -> Vec<Vec<&'a Api>> {
    let consumers: Vec<&Api> = input
        .apis
        .iter()
        .filter(|api| {
            input.variables_by_api.get(&api.id).is_some_and(|vars| {
                vars.iter().any(|v| {
                    v.var_type == crate::model::VariableType::UserInput
                        && !(v.location == VariableLocation::Header && v.name == "Authorization")
                })
            })
        })
        .collect();
    consumers.chunks(CONSUMER_BATCH_SIZE).map(<[&Api]>::to_vec).collect()
}

fn producers_context(input: &AnalysisInput<'_>) -> serde_json::Value {
    let producers: Vec<_> = input
        .apis
        .iter()
        .map(|api| {
            serde_json::json!({
                "id": api.id,
                "method": api.method.as_str(),
                "path": api.path,
                "responses": input.response_schemas_by_api.get(&api.id).cloned().unwrap_or_default(),
            })
        })
        .collect();
    serde_json::Value::Array(producers)
}

fn build_prompt(producers: &serde_json::Value, batch: &[&Api], input: &AnalysisInput<'_>) -> String {
    let consumers: Vec<_> = batch
        .iter()
        .map(|api| {
            let inputs: Vec<String> = input
                .variables_by_api
                .get(&api.id)
                .map(|vars| {
                    vars.iter()
                        .filter(|v| {
                            v.var_type == crate::model::VariableType::UserInput
                                && !(v.location == VariableLocation::Header && v.name == "Authorization")
                        })
                        .map(|v| format!("{} ({})", v.name, v.data_type))
                        .collect()
                })
                .unwrap_or_default();
            serde_json::json!({ "id": api.id, "method": api.method.as_str(), "path": api.path, "inputs": inputs })
        })
        .collect();

    serde_json::json!({
        "producers": producers,
        "consumers": consumers,
        "instruction": "Propose producer-to-consumer dependencies as strict JSON: {\"candidates\":[{\"sourceApiRef\":..,\"targetApiRef\":..,\"targetVariable\":..,\"sourcePath\":..,\"confidence\":..}]}",
    })
    .to_string()
}

async fn call_batch(
    client: &dyn ChatClient,
    model: &str,
    prompt: &str,
) -> Result<Vec<RawCandidate>, Error> {
    let request = ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }],
        format: "json".to_string(),
        stream: false,
        options: ChatOptions { temperature: 0.0 },
    };
    let response = client.chat(request).await?;
    let stripped = strip_code_fences(&response.message.content);
    let parsed: LlmCandidatesBody = serde_json::from_str(&stripped)
        .map_err(|e| Error::llm_batch_failed(format!("malformed candidate JSON: {e}")))?;

    Ok(parsed
        .candidates
        .into_iter()
        .map(|c| RawCandidate {
            source_api_ref: c.source_api_ref,
            target_api_ref: c.target_api_ref,
            target_variable: c.target_variable,
            source_selector: c.source_path,
            confidence: c.confidence.unwrap_or(0.5),
            reason: "LLM-inferred dependency".to_string(),
            deterministic: false,
        })
        .collect())
}

/// Strips a leading/trailing Markdown code fence (```` ``` ```` or ` ```json `)
/// if present — `spec.md` §6: "tolerate `content` wrapped in Markdown code
/// fences."
fn strip_code_fences(content: &str) -> String {
    let trimmed = content.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let after_open = after_open.strip_prefix("json").unwrap_or(after_open);
    let after_open = after_open.strip_prefix('\n').unwrap_or(after_open);
    after_open.strip_suffix("```").unwrap_or(after_open).trim().to_string()
}

fn post_process(
    mut candidate: RawCandidate,
    input: &AnalysisInput<'_>,
    deterministic_pairs: &HashSet<(Id, String)>,
) -> Option<(RawCandidate, CandidateOrigin)> {
    // Self-reference refusal.
    if candidate.source_api_ref == candidate.target_api_ref {
        return None;
    }

    let target_vars = input.variables_by_api.get(&candidate.target_api_ref)?;
    let target_var = target_vars.iter().find(|v| v.name == candidate.target_variable)?;

    // Scope filter: the target variable must be a declared explicit input
    // of the target endpoint (path/query/body, or the deterministically
    // handled Authorization header) — anything else is a hallucination.
    let in_scope = matches!(
        target_var.location,
        VariableLocation::Path | VariableLocation::Query | VariableLocation::Body
    ) || (target_var.location == VariableLocation::Header && target_var.name == "Authorization");
    if !in_scope {
        return None;
    }

    let target_has_id = candidate.target_variable.ends_with("Id");

    // Path-*Id override.
    if target_var.location == VariableLocation::Path && target_has_id {
        candidate.reason = "[System Logic] Path Parameter ID override".to_string();
        candidate.confidence = candidate.confidence.min(0.6);
    }

    // Confidence clamps, lowest wins, applied in spec order.
    let uses_id = candidate.target_variable == "id";
    if uses_id || target_has_id {
        candidate.confidence = candidate.confidence.min(0.6);
    }
    if let Some(source) = input.apis.iter().find(|a| a.id == candidate.source_api_ref) {
        if constants::LIFECYCLE_PATH_TOKENS.iter().any(|t| source.path.to_lowercase().contains(t)) {
            candidate.confidence = candidate.confidence.min(0.5);
        }
        let segments: Vec<&str> = source.path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
        let is_post_on_collection = source.method == HttpMethod::Post && segments.len() == 1;
        if !is_post_on_collection {
            candidate.confidence = candidate.confidence.min(0.6);
        }
        let returns_array = input
            .response_schemas_by_api
            .get(&source.id)
            .is_some_and(|schemas| schemas.iter().any(|s| s.get("type").and_then(serde_json::Value::as_str) == Some("array")));
        if source.method == HttpMethod::Get && returns_array {
            candidate.confidence = candidate.confidence.min(0.7);
        }
    }
    // The deterministic rules' own confidence (the auth-chain rule's 1.0)
    // is the ceiling the spec mandates for them; the soft cap below exists
    // to keep LLM guesses from masquerading as high-confidence matches.
    if !candidate.deterministic {
        candidate.confidence = candidate.confidence.min(0.8);
    }
    candidate.confidence = (candidate.confidence * 100.0).round() / 100.0;

    let origin = if deterministic_pairs.contains(&(candidate.source_api_ref, candidate.target_variable.clone()))
        || candidate.deterministic
    {
        CandidateOrigin::Deterministic
    } else {
        CandidateOrigin::Inferred
    };

    Some((candidate, origin))
}

fn finalize(pair: (RawCandidate, CandidateOrigin), project_ref: Id) -> DependencyCandidate {
    let (candidate, origin) = pair;
    let mut mapping = Mapping::new();
    mapping.insert(candidate.target_variable, candidate.source_selector);
    DependencyCandidate {
        id: Id::new_v4(),
        project_ref,
        source_api_ref: candidate.source_api_ref,
        target_api_ref: candidate.target_api_ref,
        mapping,
        confidence: candidate.confidence,
        reason: candidate.reason,
        origin,
    }
}
