//! Run Executor (C8, `spec.md` §4.7).
//!
//! Layer-parallel, barrier-synchronized execution over the planner's
//! levels: `tokio::spawn` one task per endpoint in a layer (generalizing
//! the teacher's `batch::execute_concurrent_batch` task-per-operation
//! pattern from a flat operation list to planner layers), `join` the
//! layer before starting the next one. Diverges from the teacher on
//! purpose: individual endpoint failures never halt the run (spec.md's
//! explicit failure policy), only a planner cycle or context-creation
//! failure does.

pub mod dotpath;

use crate::environment::EnvironmentResolver;
use crate::error::Error;
use crate::httpclient::TargetHttpClient;
use crate::logging::{self, SecretContext};
use crate::model::{
    Api, ApiDependency, ExecutionArtifact, ExecutionStatus, Id, RunStatus, TestExecution, TestRun,
    TriggerSource, Variable, VariableLocation,
};
use crate::store::Store;
use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{instrument, Instrument};

/// Published once per Api once its execution settles — the "shared per-run
/// context keyed by apiRef" spec.md §4.7 step 8/§5 describes.
#[derive(Debug, Clone)]
struct ContextEntry {
    status: u16,
    response: Value,
}

type RunContext = Arc<RwLock<HashMap<Id, ContextEntry>>>;

/// Runs every confirmed-dependency-ordered Api of `project_ref` against
/// `environment`, returns the created run's id regardless of terminal
/// status (`COMPLETED` vs `ERROR` is recorded on the `TestRun` row itself).
#[instrument(skip(store, http, environment))]
pub async fn run(
    store: Arc<dyn Store>,
    http: Arc<dyn TargetHttpClient>,
    project_ref: Id,
    environment: EnvironmentResolver,
) -> Result<Id, Error> {
    let test_run = store
        .create_run(TestRun {
            id: Id::new_v4(),
            project_ref: Some(project_ref),
            environment: environment.base_url().to_string(),
            trigger_source: TriggerSource::System,
            started_at: Utc::now(),
            completed_at: None,
            status: None,
        })
        .await?;

    let apis = store.list_apis(project_ref).await?;
    let dependencies = store.list_dependencies(project_ref).await?;

    let plan = match crate::planner::plan(&apis, &dependencies) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::warn!(error = %e, run_id = %test_run.id, "planner failed, run aborted");
            store.finish_run(test_run.id, RunStatus::Error).await?;
            return Ok(test_run.id);
        }
    };

    let apis_by_id: HashMap<Id, Api> = apis.into_iter().map(|a| (a.id, a)).collect();
    let mut deps_by_target: HashMap<Id, Vec<ApiDependency>> = HashMap::new();
    for dep in dependencies {
        deps_by_target.entry(dep.target_api_ref).or_default().push(dep);
    }

    let context: RunContext = Arc::new(RwLock::new(HashMap::new()));

    for (layer_index, layer) in plan.execution_levels.iter().enumerate() {
        let layer_span = tracing::info_span!("layer", run_id = %test_run.id, layer_index, endpoints = layer.len());
        async {
            let mut handles = Vec::with_capacity(layer.len());
            for api_id in layer {
                let Some(api) = apis_by_id.get(api_id).cloned() else {
                    continue;
                };
                let deps = deps_by_target.get(api_id).cloned().unwrap_or_default();
                let store = Arc::clone(&store);
                let http = Arc::clone(&http);
                let environment = environment.clone();
                let context = Arc::clone(&context);
                let run_id = test_run.id;

                handles.push(tokio::spawn(
                    async move {
                        execute_endpoint(store, http, environment, run_id, api, deps, context).await;
                    }
                    .in_current_span(),
                ));
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "endpoint task panicked");
                }
            }
        }
        .instrument(layer_span)
        .await;
    }

    store.finish_run(test_run.id, RunStatus::Completed).await?;
    Ok(test_run.id)
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip(store, http, environment, deps, context), fields(api_id = %api.id, method = %api.method.as_str(), path = %api.path))]
async fn execute_endpoint(
    store: Arc<dyn Store>,
    http: Arc<dyn TargetHttpClient>,
    environment: EnvironmentResolver,
    run_id: Id,
    api: Api,
    deps: Vec<ApiDependency>,
    context: RunContext,
) {
    let execution = match store
        .create_execution(TestExecution {
            id: Id::new_v4(),
            run_ref: run_id,
            api_ref: Some(api.id),
            status: ExecutionStatus::Running,
            retry_count: 0,
            error_message: None,
        })
        .await
    {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, api_id = %api.id, "failed to record execution row");
            return;
        }
    };

    // Step 2/3: resolve every confirmed dependency's mapping against the
    // shared context; any missing/failed source fails the whole endpoint.
    let mut resolved: HashMap<String, Value> = HashMap::new();
    {
        let ctx = context.read().await;
        for dep in &deps {
            let Some(entry) = ctx.get(&dep.source_api_ref) else {
                fail_execution(
                    &store,
                    execution.id,
                    format!("Dependency failed: Source {} not ready or failed.", dep.source_api_ref),
                )
                .await;
                return;
            };
            if entry.status >= 300 {
                fail_execution(
                    &store,
                    execution.id,
                    format!("Dependency failed: Source {} not ready or failed.", dep.source_api_ref),
                )
                .await;
                return;
            }
            for (target_var, source_path) in &dep.mapping {
                let value = dotpath::resolve(&entry.response, source_path).clone();
                resolved.insert(target_var.clone(), value);
            }
        }
    }

    let variables = store.list_variables(api.id).await.unwrap_or_default();
    let path = build_path(&api.path, &variables, &resolved);
    let url = environment.resolve(&path);
    let (headers, query, body) = hydrate(&variables, &resolved);

    // Secrets resolved via the auth-chain rule or an Authorization variable
    // are the only values this run treats as secret-shaped (logging.rs).
    let secret_ctx = SecretContext::from_resolved_values(
        resolved.values().filter_map(|v| v.as_str().map(str::to_string)),
    );
    logging::log_request(api.method.as_str(), &url, Some(&headers), body.as_ref(), Some(&secret_ctx));

    let started = std::time::Instant::now();
    let outcome = http.call(api.method, &url, &headers, &query, body.as_ref()).await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let max_body_len = logging::get_max_body_len();

    match outcome {
        Ok(response) => {
            logging::log_response(
                response.status,
                u128::from(elapsed_ms),
                None,
                Some(&response.body),
                max_body_len,
                Some(&secret_ctx),
            );
            let artifact = ExecutionArtifact {
                id: Id::new_v4(),
                exec_ref: execution.id,
                request_data: Some(serde_json::json!({"url": url, "method": api.method.as_str()})),
                response_data: Some(response.body.clone()),
                response_time_ms: elapsed_ms,
                created_at: Utc::now(),
            };
            let _ = store.add_artifact(artifact).await;

            let passed = (200..400).contains(&response.status);
            let status = if passed { ExecutionStatus::Passed } else { ExecutionStatus::Failed };
            let message = if passed {
                None
            } else {
                Some(format!("HTTP status {}", response.status))
            };
            let _ = store.update_execution_status(execution.id, status, message).await;

            context.write().await.insert(
                api.id,
                ContextEntry {
                    status: response.status,
                    response: response.body,
                },
            );
        }
        Err(e) => {
            fail_execution(&store, execution.id, format!("Transport error: {e}")).await;
            context.write().await.insert(
                api.id,
                ContextEntry {
                    status: 599,
                    response: Value::Null,
                },
            );
        }
    }
}

async fn fail_execution(store: &Arc<dyn Store>, exec_id: Id, message: String) {
    let _ = store
        .update_execution_status(exec_id, ExecutionStatus::Failed, Some(message))
        .await;
}

/// Replaces every `{key}` path-template segment with its resolved value.
fn build_path(template: &str, variables: &[Variable], resolved: &HashMap<String, Value>) -> String {
    let mut path = template.to_string();
    for var in variables {
        if var.location != VariableLocation::Path {
            continue;
        }
        if let Some(value) = resolved.get(&var.name) {
            let rendered = value.as_str().map_or_else(|| value.to_string(), str::to_string);
            path = path.replace(&format!("{{{}}}", var.name), &rendered);
        }
    }
    path
}

/// Query/header/body hydration from resolved variables — declared by
/// spec.md §4.7 step 4 as "implemented opportunistically": only variables
/// with a resolved value are attached, nothing is required beyond that.
fn hydrate(
    variables: &[Variable],
    resolved: &HashMap<String, Value>,
) -> (IndexMap<String, Value>, IndexMap<String, Value>, Option<Value>) {
    let mut headers = IndexMap::new();
    let mut query = IndexMap::new();
    let mut body_fields: IndexMap<String, Value> = IndexMap::new();

    for var in variables {
        let Some(value) = resolved.get(&var.name) else {
            continue;
        };
        match var.location {
            VariableLocation::Header => {
                headers.insert(var.name.clone(), value.clone());
            }
            VariableLocation::Query => {
                query.insert(var.name.clone(), value.clone());
            }
            VariableLocation::Body => {
                body_fields.insert(var.name.clone(), value.clone());
            }
            VariableLocation::Path => {}
        }
    }

    let body = if body_fields.is_empty() {
        None
    } else {
        Some(Value::Object(body_fields.into_iter().collect()))
    };

    (headers, query, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_template_substitution() {
        let variables = vec![Variable {
            api_ref: Id::nil(),
            name: "id".to_string(),
            location: VariableLocation::Path,
            var_type: crate::model::VariableType::Dependent,
            data_type: "string".to_string(),
            required: true,
            ai_confidence: None,
        }];
        let mut resolved = HashMap::new();
        resolved.insert("id".to_string(), json!("abc-123"));
        assert_eq!(build_path("/orders/{id}", &variables, &resolved), "/orders/abc-123");
    }

    #[test]
    fn missing_resolution_leaves_template_untouched() {
        let variables = vec![Variable {
            api_ref: Id::nil(),
            name: "id".to_string(),
            location: VariableLocation::Path,
            var_type: crate::model::VariableType::Dependent,
            data_type: "string".to_string(),
            required: true,
            ai_confidence: None,
        }];
        let resolved = HashMap::new();
        assert_eq!(build_path("/orders/{id}", &variables, &resolved), "/orders/{id}");
    }

    #[test]
    fn hydrate_splits_by_location() {
        let variables = vec![
            Variable {
                api_ref: Id::nil(),
                name: "Authorization".to_string(),
                location: VariableLocation::Header,
                var_type: crate::model::VariableType::Dependent,
                data_type: "string".to_string(),
                required: true,
                ai_confidence: None,
            },
            Variable {
                api_ref: Id::nil(),
                name: "limit".to_string(),
                location: VariableLocation::Query,
                var_type: crate::model::VariableType::UserInput,
                data_type: "integer".to_string(),
                required: false,
                ai_confidence: None,
            },
        ];
        let mut resolved = HashMap::new();
        resolved.insert("Authorization".to_string(), json!("Bearer abc"));
        resolved.insert("limit".to_string(), json!(10));
        let (headers, query, body) = hydrate(&variables, &resolved);
        assert_eq!(headers.get("Authorization"), Some(&json!("Bearer abc")));
        assert_eq!(query.get("limit"), Some(&json!(10)));
        assert!(body.is_none());
    }
}
