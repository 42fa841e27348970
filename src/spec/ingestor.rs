//! Spec Ingestor (C2, `spec.md` §4.1).
//!
//! Orchestrates parsing, structural validation, `$ref` resolution, stable
//! hashing, and the single atomic catalog write. Grounded in the teacher's
//! `SpecTransformer::transform` path/operation walk
//! (`examples/kioku-aperture/src/spec/transformer.rs`), re-pointed from a
//! CLI command cache at the `Api`/`ApiRequest`/`ApiResponse`/`Variable`
//! catalog this system persists instead.

use super::dereference::Dereferencer;
use super::hash;
use super::parser::parse_openapi;
use super::validator::SpecValidator;
use crate::constants;
use crate::error::Error;
use crate::model::{ApiRequest, ApiResponse, HttpMethod, Id, VariableLocation};
use crate::store::{IngestedOperation, Store};
use crate::variables::extractor::{self, OperationContext};
use indexmap::IndexMap;
use openapiv3::{OpenAPI, Operation, PathItem, ReferenceOr, SecurityRequirement, SecurityScheme};
use serde_json::Value;
use tracing::{info, instrument, warn};

/// Everything C2 writes once a document has been ingested.
pub struct IngestOutcome {
    pub spec_id: Id,
    pub apis: Vec<crate::model::Api>,
    /// True when a spec with the same content hash already existed for the
    /// project — ingestion still ran (§9: "the source chose... an idempotent
    /// update, not a short-circuit"), but no new `ApiSpec` row was inserted.
    pub was_idempotent_update: bool,
}

/// Parses, validates, dereferences, and persists `content` as one atomic
/// catalog write for `project_ref`.
///
/// # Errors
///
/// `InvalidSpec`/`UnsupportedVersion`/`UnserializableSchema` on any
/// structural problem; `Store`-kind errors from the persistence layer. On
/// any error, nothing is written (`spec.md` §4.1: "all-or-nothing").
#[instrument(skip(content, store))]
pub async fn ingest(
    content: &str,
    project_ref: Id,
    src_ref: &str,
    store: &dyn Store,
) -> Result<IngestOutcome, Error> {
    let spec = parse_openapi(content)?;

    let validation = SpecValidator::new().validate(&spec);
    validation.into_result()?;

    let components = spec.components.clone().unwrap_or_default();
    let deref = Dereferencer::new(&components);

    let resolved_document = build_resolved_document(&spec, &deref)?;
    let spec_hash = hash::content_hash(&resolved_document);

    let existing = store.find_spec_by_hash(project_ref, &spec_hash).await?;
    let was_idempotent_update = existing.is_some();
    if was_idempotent_update {
        warn!(spec_hash = %spec_hash, "re-ingesting a spec with an unchanged content hash");
    }
    let spec_id = existing.as_ref().map_or_else(Id::new_v4, |s| s.id);

    let mut operations = Vec::new();
    for (path, item_ref) in &spec.paths.paths {
        let ReferenceOr::Item(item) = item_ref else {
            return Err(Error::invalid_spec(format!(
                "path item '{path}' is an unresolved $ref"
            )));
        };
        for (method, operation) in operations_of(item) {
            operations.push(build_operation(
                method,
                path,
                operation,
                item,
                &spec,
                &deref,
            )?);
        }
    }

    let api_spec = crate::model::ApiSpec {
        id: spec_id,
        project_ref,
        version: spec.openapi.clone(),
        spec_hash,
        src_ref: src_ref.to_string(),
    };

    let apis = store.ingest_spec(api_spec, operations).await?;
    info!(api_count = apis.len(), "ingest complete");

    Ok(IngestOutcome {
        spec_id,
        apis,
        was_idempotent_update,
    })
}

/// Yields `(method, operation)` pairs for a path item, in the spec.md-
/// mandated method order, skipping sibling keys (`parameters`, `servers`,
/// `summary`, `description`) that are not operations.
pub fn operations_of(item: &PathItem) -> Vec<(HttpMethod, &Operation)> {
    let mut ops = Vec::new();
    macro_rules! push {
        ($field:ident, $method:expr) => {
            if let Some(op) = &item.$field {
                ops.push(($method, op));
            }
        };
    }
    push!(get, HttpMethod::Get);
    push!(put, HttpMethod::Put);
    push!(post, HttpMethod::Post);
    push!(delete, HttpMethod::Delete);
    push!(options, HttpMethod::Options);
    push!(head, HttpMethod::Head);
    push!(patch, HttpMethod::Patch);
    push!(trace, HttpMethod::Trace);
    ops
}

fn build_operation(
    method: HttpMethod,
    path: &str,
    operation: &Operation,
    path_item: &PathItem,
    spec: &OpenAPI,
    deref: &Dereferencer,
) -> Result<IngestedOperation, Error> {
    let mut params = Vec::new();
    for param_ref in &operation.parameters {
        let param = deref.resolve_parameter(param_ref)?;
        let schema_value = parameter_schema_value(&param, deref)?;
        let data = param.parameter_data_ref();
        let location = match &param {
            openapiv3::Parameter::Path { .. } => VariableLocation::Path,
            openapiv3::Parameter::Query { .. } => VariableLocation::Query,
            openapiv3::Parameter::Header { .. } => VariableLocation::Header,
            openapiv3::Parameter::Cookie { .. } => continue, // not in scope (no Variable location for cookies)
        };
        params.push(extractor::ResolvedParam {
            name: data.name.clone(),
            location,
            schema: schema_value,
            // spec.md §4.2: all path parameters are forced required.
            required: data.required || location == VariableLocation::Path,
            synthetic: false,
        });
    }

    let body_schema = operation
        .request_body
        .as_ref()
        .map(|body_ref| extract_body_schema(body_ref, deref))
        .transpose()?;

    let mut responses = Vec::new();
    for (status, response_ref) in &operation.responses.responses {
        let Ok(status_code) = status.to_string().parse::<u16>() else {
            continue; // "default" and range keys are skipped per spec.md §4.1.
        };
        let response = deref.resolve_response(response_ref)?;
        let schema = response_body_schema(&response, deref)?;
        serde_json::to_value(&schema)
            .map_err(|e| Error::unserializable_schema(e.to_string()))?;
        responses.push(ApiResponse {
            api_ref: Id::nil(),
            status_code,
            schema,
        });
    }

    let effective_security = operation
        .security
        .as_ref()
        .or(path_item.security.as_ref())
        .or(spec.security.as_ref());

    let auth_scheme = effective_security.and_then(|reqs| {
        bearer_or_oauth2_scheme_name(reqs, deref)
    });

    let already_has_authorization = params
        .iter()
        .any(|p| p.location == VariableLocation::Header && p.name.eq_ignore_ascii_case("Authorization"));
    if auth_scheme.is_some() && !already_has_authorization {
        params.push(extractor::ResolvedParam {
            name: "Authorization".to_string(),
            location: VariableLocation::Header,
            schema: serde_json::json!({"type": "string"}),
            required: true,
            synthetic: true,
        });
    }

    let mut path_params_map = IndexMap::new();
    let mut query_params_map = IndexMap::new();
    let mut headers_map = IndexMap::new();
    for p in &params {
        let map = match p.location {
            VariableLocation::Path => &mut path_params_map,
            VariableLocation::Query => &mut query_params_map,
            VariableLocation::Header => &mut headers_map,
            VariableLocation::Body => continue,
        };
        map.insert(p.name.clone(), p.schema.clone());
    }

    let request = ApiRequest {
        api_ref: Id::nil(),
        body_schema,
        query_params_map: (!query_params_map.is_empty()).then_some(query_params_map),
        path_params_map: (!path_params_map.is_empty()).then_some(path_params_map),
        headers_map: (!headers_map.is_empty()).then_some(headers_map),
    };

    let ctx = OperationContext {
        params: &params,
        body_schema: request.body_schema.as_ref(),
    };
    let variables = extractor::extract(&ctx);

    Ok(IngestedOperation {
        method,
        path: path.to_string(),
        op_id: operation.operation_id.clone(),
        summary: operation.summary.clone(),
        auth_scheme,
        request,
        responses,
        variables,
    })
}

/// Picks the operation's sole request-body schema per the §4.1 content-type
/// preference order: first `*json*`, else first `*multipart*`, else first
/// `*urlencoded*`, else whatever content type is present first.
fn extract_body_schema(
    body_ref: &ReferenceOr<openapiv3::RequestBody>,
    deref: &Dereferencer,
) -> Result<Value, Error> {
    let body = deref.resolve_request_body(body_ref)?;
    let content_type = body
        .content
        .keys()
        .find(|ct| ct.contains(constants::CONTENT_TYPE_IDENTIFIER_JSON))
        .or_else(|| {
            body.content
                .keys()
                .find(|ct| ct.contains(constants::CONTENT_TYPE_IDENTIFIER_MULTIPART))
        })
        .or_else(|| {
            body.content
                .keys()
                .find(|ct| ct.contains(constants::CONTENT_TYPE_IDENTIFIER_URLENCODED))
        })
        .or_else(|| body.content.keys().next());

    let Some(content_type) = content_type else {
        return Ok(Value::Null);
    };
    let media_type = &body.content[content_type];
    let Some(schema_ref) = &media_type.schema else {
        return Ok(Value::Null);
    };
    let schema = deref.resolve_schema(schema_ref)?;
    serde_json::to_value(&schema).map_err(|e| Error::unserializable_schema(e.to_string()))
}

fn response_body_schema(response: &openapiv3::Response, deref: &Dereferencer) -> Result<Value, Error> {
    let Some((_, media_type)) = response
        .content
        .iter()
        .find(|(ct, _)| ct.contains(constants::CONTENT_TYPE_IDENTIFIER_JSON))
        .or_else(|| response.content.iter().next())
    else {
        return Ok(Value::Null);
    };
    let Some(schema_ref) = &media_type.schema else {
        return Ok(Value::Null);
    };
    let schema = deref.resolve_schema(schema_ref)?;
    serde_json::to_value(&schema).map_err(|e| Error::unserializable_schema(e.to_string()))
}

fn parameter_schema_value(param: &openapiv3::Parameter, deref: &Dereferencer) -> Result<Value, Error> {
    let data = param.parameter_data_ref();
    let schema_ref = match &data.format {
        openapiv3::ParameterSchemaOrContent::Schema(s) => Some(s),
        openapiv3::ParameterSchemaOrContent::Content(content) => {
            content.values().next().and_then(|mt| mt.schema.as_ref())
        }
    };
    let Some(schema_ref) = schema_ref else {
        return Ok(Value::Null);
    };
    let schema = deref.resolve_schema(schema_ref)?;
    serde_json::to_value(&schema).map_err(|e| Error::unserializable_schema(e.to_string()))
}

/// Finds the first referenced scheme (in the requirement's declared order)
/// whose resolved definition is `http`+`bearer` or `oauth2` — the schemes
/// `spec.md` §4.1 says require a synthesized `Authorization` variable.
fn bearer_or_oauth2_scheme_name(
    requirements: &[SecurityRequirement],
    deref: &Dereferencer,
) -> Option<String> {
    for requirement in requirements {
        for scheme_name in requirement.keys() {
            match deref.resolve_security_scheme(scheme_name) {
                Some(SecurityScheme::HTTP { scheme, .. }) if scheme.eq_ignore_ascii_case(constants::SECURITY_SCHEME_BEARER) => {
                    return Some(scheme_name.clone());
                }
                Some(SecurityScheme::OAuth2 { .. }) => return Some(scheme_name.clone()),
                _ => {}
            }
        }
    }
    None
}

fn build_resolved_document(spec: &OpenAPI, deref: &Dereferencer) -> Result<Value, Error> {
    let mut paths = serde_json::Map::new();
    for (path, item_ref) in &spec.paths.paths {
        let ReferenceOr::Item(item) = item_ref else {
            continue;
        };
        let mut ops = serde_json::Map::new();
        for (method, operation) in operations_of(item) {
            let mut params = Vec::new();
            for param_ref in &operation.parameters {
                let param = deref.resolve_parameter(param_ref)?;
                let schema = parameter_schema_value(&param, deref)?;
                params.push(serde_json::json!({
                    "name": param.parameter_data_ref().name,
                    "schema": schema,
                }));
            }
            let body = operation
                .request_body
                .as_ref()
                .map(|b| extract_body_schema(b, deref))
                .transpose()?
                .unwrap_or(Value::Null);
            let mut responses = serde_json::Map::new();
            for (status, response_ref) in &operation.responses.responses {
                let response = deref.resolve_response(response_ref)?;
                let schema = response_body_schema(&response, deref)?;
                responses.insert(status.to_string(), schema);
            }
            ops.insert(
                method.as_str().to_string(),
                serde_json::json!({
                    "operationId": operation.operation_id,
                    "parameters": params,
                    "requestBody": body,
                    "responses": responses,
                }),
            );
        }
        paths.insert(path.clone(), Value::Object(ops));
    }
    Ok(serde_json::json!({
        "openapi": spec.openapi,
        "info": { "title": spec.info.title, "version": spec.info.version },
        "paths": Value::Object(paths),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Project;
    use crate::store::InMemoryStore;

    const SPEC: &str = "openapi: 3.0.0\ninfo:\n  title: Test API\n  version: 1.0.0\npaths:\n  /widgets:\n    get:\n      operationId: listWidgets\n      responses:\n        '200':\n          description: ok\n";

    async fn project(store: &InMemoryStore) -> Id {
        store
            .create_project(Project { id: Id::new_v4(), name: "p".into(), owner_ref: None })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn first_ingest_creates_apis_and_is_not_idempotent() {
        let store = InMemoryStore::new();
        let project_ref = project(&store).await;

        let outcome = ingest(SPEC, project_ref, "fixture", &store).await.unwrap();

        assert!(!outcome.was_idempotent_update);
        assert_eq!(outcome.apis.len(), 1);
        assert_eq!(outcome.apis[0].op_id.as_deref(), Some("listWidgets"));
    }

    #[tokio::test]
    async fn reingesting_unchanged_content_is_idempotent_and_keeps_same_spec_id() {
        let store = InMemoryStore::new();
        let project_ref = project(&store).await;

        let first = ingest(SPEC, project_ref, "fixture", &store).await.unwrap();
        let second = ingest(SPEC, project_ref, "fixture", &store).await.unwrap();

        assert!(second.was_idempotent_update);
        assert_eq!(second.spec_id, first.spec_id);
        assert_eq!(second.apis.len(), first.apis.len());
    }

    #[tokio::test]
    async fn changed_content_creates_a_new_spec_row() {
        let store = InMemoryStore::new();
        let project_ref = project(&store).await;

        let first = ingest(SPEC, project_ref, "fixture", &store).await.unwrap();
        let changed = SPEC.replace("listWidgets", "listWidgetsV2");
        let second = ingest(&changed, project_ref, "fixture", &store).await.unwrap();

        assert!(!second.was_idempotent_update);
        assert_ne!(second.spec_id, first.spec_id);
    }

    #[tokio::test]
    async fn rejects_documents_missing_a_required_openapi_version_field() {
        let store = InMemoryStore::new();
        let project_ref = project(&store).await;

        let swagger_2 = "swagger: '2.0'\ninfo:\n  title: Old API\n  version: 1.0.0\npaths: {}";
        let result = ingest(swagger_2, project_ref, "fixture", &store).await;

        assert!(result.is_err());
    }
}
