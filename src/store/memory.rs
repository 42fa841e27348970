//! In-memory `Store` implementation.
//!
//! Generalizes the teacher's `fs::FileSystem` trait-abstraction pattern from
//! files to rows: one `RwLock<Catalog>` guards everything, and every
//! multi-row write goes through `with_transaction`, which clones the
//! catalog, lets a closure mutate the clone, and only swaps it back in on
//! `Ok`. A panic or early `Err` inside the closure leaves the original
//! catalog untouched — the "all-or-nothing" semantics spec.md's ingest and
//! registry contracts require, without a real database underneath.

use super::{IngestedOperation, Store};
use crate::error::Error;
use crate::model::*;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct Catalog {
    projects: HashMap<Id, Project>,
    specs: HashMap<Id, ApiSpec>,
    apis: HashMap<Id, Api>,
    requests: HashMap<Id, ApiRequest>,
    responses: HashMap<Id, Vec<ApiResponse>>,
    variables: HashMap<Id, Vec<Variable>>,
    candidates: HashMap<Id, DependencyCandidate>,
    dependencies: HashMap<Id, ApiDependency>,
    runs: HashMap<Id, TestRun>,
    executions: HashMap<Id, TestExecution>,
    artifacts: HashMap<Id, ExecutionArtifact>,
}

pub struct InMemoryStore {
    catalog: RwLock<Catalog>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(Catalog::default()),
        }
    }

    /// Clone-mutate-commit: `f` sees a private copy of the catalog and
    /// returns either the value to hand back to the caller (committing the
    /// mutated clone) or an error (discarding it, original untouched).
    async fn with_transaction<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Catalog) -> Result<T, Error>,
    {
        let mut working = self.catalog.read().await.clone();
        let result = f(&mut working)?;
        *self.catalog.write().await = working;
        Ok(result)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_project(&self, project: Project) -> Result<Project, Error> {
        self.with_transaction(|cat| {
            if cat.projects.values().any(|p| p.name == project.name) {
                return Err(Error::unique_violation(format!(
                    "project name already exists: {}",
                    project.name
                )));
            }
            cat.projects.insert(project.id, project.clone());
            Ok(project)
        })
        .await
    }

    async fn get_project(&self, id: Id) -> Result<Project, Error> {
        self.catalog
            .read()
            .await
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("Project", id))
    }

    async fn delete_project(&self, id: Id) -> Result<(), Error> {
        self.with_transaction(|cat| {
            if cat.projects.remove(&id).is_none() {
                return Err(Error::not_found("Project", id));
            }
            cat.specs.retain(|_, s| s.project_ref != id);
            let dead_apis: Vec<Id> = cat
                .apis
                .values()
                .filter(|a| a.project_ref == id)
                .map(|a| a.id)
                .collect();
            cat.apis.retain(|_, a| a.project_ref != id);
            for api_id in &dead_apis {
                cat.requests.remove(api_id);
                cat.responses.remove(api_id);
                cat.variables.remove(api_id);
            }
            cat.candidates.retain(|_, c| c.project_ref != id);
            cat.dependencies.retain(|_, d| d.project_ref != id);
            for run in cat.runs.values_mut() {
                if run.project_ref == Some(id) {
                    run.project_ref = None;
                }
            }
            Ok(())
        })
        .await
    }

    async fn ingest_spec(
        &self,
        spec: ApiSpec,
        operations: Vec<IngestedOperation>,
    ) -> Result<Vec<Api>, Error> {
        self.with_transaction(|cat| {
            if !cat.projects.contains_key(&spec.project_ref) {
                return Err(Error::not_found("Project", spec.project_ref));
            }
            cat.specs.insert(spec.id, spec.clone());

            let mut created = Vec::with_capacity(operations.len());
            for op in operations {
                let existing = cat.apis.values().find(|a| {
                    a.project_ref == spec.project_ref && a.method == op.method && a.path == op.path
                });
                let api_id = existing.map_or_else(Id::new_v4, |a| a.id);

                let api = Api {
                    id: api_id,
                    project_ref: spec.project_ref,
                    method: op.method,
                    path: op.path.clone(),
                    op_id: op.op_id,
                    summary: op.summary,
                    auth_scheme: op.auth_scheme,
                };
                cat.apis.insert(api_id, api.clone());

                let mut request = op.request;
                request.api_ref = api_id;
                cat.requests.insert(api_id, request);

                let responses = op
                    .responses
                    .into_iter()
                    .map(|mut r| {
                        r.api_ref = api_id;
                        r
                    })
                    .collect();
                cat.responses.insert(api_id, responses);

                let previous_types: HashMap<(String, VariableLocation), VariableType> = cat
                    .variables
                    .get(&api_id)
                    .map(|vars| {
                        vars.iter()
                            .map(|v| ((v.name.clone(), v.location), v.var_type))
                            .collect()
                    })
                    .unwrap_or_default();

                let variables = op
                    .variables
                    .into_iter()
                    .map(|mut v| {
                        v.api_ref = api_id;
                        if let Some(prior) = previous_types.get(&(v.name.clone(), v.location)) {
                            if matches!(prior, VariableType::Dependent | VariableType::DependentCandidate) {
                                v.var_type = *prior;
                            }
                        }
                        v
                    })
                    .collect();
                cat.variables.insert(api_id, variables);

                created.push(api);
            }
            Ok(created)
        })
        .await
    }

    async fn find_spec_by_hash(&self, project_ref: Id, spec_hash: &str) -> Result<Option<ApiSpec>, Error> {
        Ok(self
            .catalog
            .read()
            .await
            .specs
            .values()
            .find(|s| s.project_ref == project_ref && s.spec_hash == spec_hash)
            .cloned())
    }

    async fn list_apis(&self, project_ref: Id) -> Result<Vec<Api>, Error> {
        Ok(self
            .catalog
            .read()
            .await
            .apis
            .values()
            .filter(|a| a.project_ref == project_ref)
            .cloned()
            .collect())
    }

    async fn get_api(&self, id: Id) -> Result<Api, Error> {
        self.catalog
            .read()
            .await
            .apis
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("Api", id))
    }

    async fn get_request(&self, api_ref: Id) -> Result<Option<ApiRequest>, Error> {
        Ok(self.catalog.read().await.requests.get(&api_ref).cloned())
    }

    async fn list_responses(&self, api_ref: Id) -> Result<Vec<ApiResponse>, Error> {
        Ok(self
            .catalog
            .read()
            .await
            .responses
            .get(&api_ref)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_variables(&self, api_ref: Id) -> Result<Vec<Variable>, Error> {
        Ok(self
            .catalog
            .read()
            .await
            .variables
            .get(&api_ref)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_variables_for_project(&self, project_ref: Id) -> Result<Vec<Variable>, Error> {
        let cat = self.catalog.read().await;
        let api_ids: Vec<Id> = cat
            .apis
            .values()
            .filter(|a| a.project_ref == project_ref)
            .map(|a| a.id)
            .collect();
        Ok(api_ids
            .into_iter()
            .flat_map(|id| cat.variables.get(&id).cloned().unwrap_or_default())
            .collect())
    }

    async fn set_variable_type(
        &self,
        api_ref: Id,
        name: &str,
        location: VariableLocation,
        var_type: VariableType,
    ) -> Result<(), Error> {
        self.with_transaction(|cat| {
            let vars = cat
                .variables
                .get_mut(&api_ref)
                .ok_or_else(|| Error::not_found("Api", api_ref))?;
            let var = vars
                .iter_mut()
                .find(|v| v.name == name && v.location == location)
                .ok_or_else(|| Error::not_found("Variable", name))?;
            var.var_type = var_type;
            Ok(())
        })
        .await
    }

    async fn replace_candidates(
        &self,
        project_ref: Id,
        candidates: Vec<DependencyCandidate>,
    ) -> Result<(), Error> {
        self.with_transaction(|cat| {
            cat.candidates.retain(|_, c| c.project_ref != project_ref);
            for c in candidates {
                cat.candidates.insert(c.id, c);
            }
            Ok(())
        })
        .await
    }

    async fn list_candidates(&self, project_ref: Id) -> Result<Vec<DependencyCandidate>, Error> {
        Ok(self
            .catalog
            .read()
            .await
            .candidates
            .values()
            .filter(|c| c.project_ref == project_ref)
            .cloned()
            .collect())
    }

    async fn upsert_dependency(&self, dependency: ApiDependency) -> Result<ApiDependency, Error> {
        self.with_transaction(|cat| {
            if dependency.source_api_ref == dependency.target_api_ref {
                return Err(Error::self_dependency(dependency.target_api_ref.to_string()));
            }
            let existing_id = cat
                .dependencies
                .values()
                .find(|d| {
                    d.source_api_ref == dependency.source_api_ref
                        && d.target_api_ref == dependency.target_api_ref
                })
                .map(|d| d.id);
            let id = existing_id.unwrap_or(dependency.id);
            let dependency = ApiDependency { id, ..dependency };
            cat.dependencies.insert(id, dependency.clone());

            if let Some(vars) = cat.variables.get_mut(&dependency.target_api_ref) {
                for target_name in dependency.mapping.keys() {
                    if let Some(v) = vars.iter_mut().find(|v| &v.name == target_name) {
                        v.var_type = VariableType::Dependent;
                    }
                }
            }
            Ok(dependency)
        })
        .await
    }

    async fn delete_dependency(&self, id: Id) -> Result<(), Error> {
        self.with_transaction(|cat| {
            cat.dependencies
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| Error::not_found("ApiDependency", id))
        })
        .await
    }

    async fn list_dependencies(&self, project_ref: Id) -> Result<Vec<ApiDependency>, Error> {
        Ok(self
            .catalog
            .read()
            .await
            .dependencies
            .values()
            .filter(|d| d.project_ref == project_ref)
            .cloned()
            .collect())
    }

    async fn create_run(&self, run: TestRun) -> Result<TestRun, Error> {
        self.with_transaction(|cat| {
            cat.runs.insert(run.id, run.clone());
            Ok(run)
        })
        .await
    }

    async fn finish_run(&self, id: Id, status: RunStatus) -> Result<(), Error> {
        self.with_transaction(|cat| {
            let run = cat.runs.get_mut(&id).ok_or_else(|| Error::not_found("TestRun", id))?;
            run.status = Some(status);
            run.completed_at = Some(chrono::Utc::now());
            Ok(())
        })
        .await
    }

    async fn get_run(&self, id: Id) -> Result<TestRun, Error> {
        self.catalog
            .read()
            .await
            .runs
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("TestRun", id))
    }

    async fn create_execution(&self, execution: TestExecution) -> Result<TestExecution, Error> {
        self.with_transaction(|cat| {
            cat.executions.insert(execution.id, execution.clone());
            Ok(execution)
        })
        .await
    }

    async fn update_execution_status(
        &self,
        id: Id,
        status: ExecutionStatus,
        error_message: Option<String>,
    ) -> Result<(), Error> {
        self.with_transaction(|cat| {
            let exec = cat
                .executions
                .get_mut(&id)
                .ok_or_else(|| Error::not_found("TestExecution", id))?;
            exec.status = status;
            if error_message.is_some() {
                exec.error_message = error_message;
            }
            Ok(())
        })
        .await
    }

    async fn add_artifact(&self, artifact: ExecutionArtifact) -> Result<ExecutionArtifact, Error> {
        self.with_transaction(|cat| {
            cat.artifacts.insert(artifact.id, artifact.clone());
            Ok(artifact)
        })
        .await
    }

    async fn list_executions(&self, run_ref: Id) -> Result<Vec<TestExecution>, Error> {
        Ok(self
            .catalog
            .read()
            .await
            .executions
            .values()
            .filter(|e| e.run_ref == run_ref)
            .cloned()
            .collect())
    }

    async fn list_artifacts(&self, exec_ref: Id) -> Result<Vec<ExecutionArtifact>, Error> {
        let mut artifacts: Vec<ExecutionArtifact> = self
            .catalog
            .read()
            .await
            .artifacts
            .values()
            .filter(|a| a.exec_ref == exec_ref)
            .cloned()
            .collect();
        artifacts.sort_by_key(|a| a.created_at);
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApiRequest, HttpMethod};

    fn project(name: &str) -> Project {
        Project {
            id: Id::new_v4(),
            name: name.to_string(),
            owner_ref: None,
        }
    }

    fn op(method: HttpMethod, path: &str) -> IngestedOperation {
        IngestedOperation {
            method,
            path: path.to_string(),
            op_id: None,
            summary: None,
            auth_scheme: None,
            request: ApiRequest::default(),
            responses: vec![],
            variables: vec![],
        }
    }

    #[tokio::test]
    async fn duplicate_project_name_rejected() {
        let store = InMemoryStore::new();
        store.create_project(project("demo")).await.unwrap();
        let err = store.create_project(project("demo")).await.unwrap_err();
        assert!(matches!(err, Error::Internal { kind, .. } if kind == crate::error::ErrorKind::Store));
    }

    #[tokio::test]
    async fn delete_project_cascades_apis() {
        let store = InMemoryStore::new();
        let p = store.create_project(project("demo")).await.unwrap();
        let spec = ApiSpec {
            id: Id::new_v4(),
            project_ref: p.id,
            version: "3.0.0".into(),
            spec_hash: "abc".into(),
            src_ref: "spec.yaml".into(),
        };
        store
            .ingest_spec(spec, vec![op(HttpMethod::Get, "/widgets")])
            .await
            .unwrap();
        assert_eq!(store.list_apis(p.id).await.unwrap().len(), 1);

        store.delete_project(p.id).await.unwrap();
        assert_eq!(store.list_apis(p.id).await.unwrap().len(), 0);
        assert!(store.get_project(p.id).await.is_err());
    }

    #[tokio::test]
    async fn failed_transaction_leaves_catalog_untouched() {
        let store = InMemoryStore::new();
        let p = store.create_project(project("demo")).await.unwrap();
        let dep = ApiDependency {
            id: Id::new_v4(),
            project_ref: p.id,
            source_api_ref: p.id,
            target_api_ref: p.id,
            mapping: Mapping::new(),
            is_required: true,
        };
        let err = store.upsert_dependency(dep).await.unwrap_err();
        assert!(matches!(err, Error::Internal { kind, .. } if kind == crate::error::ErrorKind::SelfDependency));
        assert_eq!(store.list_dependencies(p.id).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn reingest_preserves_dependent_variable_tagging() {
        let store = InMemoryStore::new();
        let p = store.create_project(project("demo")).await.unwrap();
        let spec1 = ApiSpec {
            id: Id::new_v4(),
            project_ref: p.id,
            version: "3.0.0".into(),
            spec_hash: "v1".into(),
            src_ref: "spec.yaml".into(),
        };
        let mut first_op = op(HttpMethod::Get, "/widgets/{id}");
        first_op.variables.push(Variable {
            api_ref: Id::new_v4(),
            name: "id".into(),
            location: VariableLocation::Path,
            var_type: VariableType::UserInput,
            data_type: "string".into(),
            required: true,
            ai_confidence: None,
        });
        let created = store.ingest_spec(spec1, vec![first_op]).await.unwrap();
        let api_id = created[0].id;
        store
            .set_variable_type(api_id, "id", VariableLocation::Path, VariableType::Dependent)
            .await
            .unwrap();

        let spec2 = ApiSpec {
            id: Id::new_v4(),
            project_ref: p.id,
            version: "3.0.0".into(),
            spec_hash: "v2".into(),
            src_ref: "spec.yaml".into(),
        };
        let mut second_op = op(HttpMethod::Get, "/widgets/{id}");
        second_op.variables.push(Variable {
            api_ref: Id::new_v4(),
            name: "id".into(),
            location: VariableLocation::Path,
            var_type: VariableType::UserInput,
            data_type: "string".into(),
            required: true,
            ai_confidence: None,
        });
        store.ingest_spec(spec2, vec![second_op]).await.unwrap();

        let vars = store.list_variables(api_id).await.unwrap();
        assert_eq!(vars[0].var_type, VariableType::Dependent);
    }
}
