//! Persistence Store (C1): transactional CRUD over the catalog entities in
//! [`crate::model`], with unique-key enforcement and cascade deletes.
//!
//! `spec.md` §1 treats the store as an external collaborator the core only
//! consumes through a trait; this module defines that trait (`Store`) and
//! ships the one implementation the core itself needs for tests and for the
//! CLI adapter: an in-memory, mutex-guarded catalog with copy-on-write
//! transactions. A real deployment backs `Store` with an actual database —
//! the trait boundary is what `spec.md` calls out as in-scope, a concrete
//! SQL adapter is not.

mod memory;

pub use memory::InMemoryStore;

use crate::error::Error;
use crate::model::*;
use async_trait::async_trait;

/// The persistence contract the rest of the core depends on.
///
/// Every mutating method that touches more than one entity (ingest's
/// multi-row rewrite, a project cascade delete) must be atomic: either every
/// row lands, or none do. Implementations should build that guarantee with a
/// transaction-scoped function rather than ad hoc rollback code at each call
/// site — see `InMemoryStore::with_transaction`.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Project ──────────────────────────────────────────────────
    async fn create_project(&self, project: Project) -> Result<Project, Error>;
    async fn get_project(&self, id: Id) -> Result<Project, Error>;
    /// Cascades to every `ApiSpec`/`Api`/`Variable`/`DependencyCandidate`/
    /// `ApiDependency` whose `projectRef` points here. `TestRun` rows detach
    /// (their `projectRef` is set to `None`) rather than being deleted.
    async fn delete_project(&self, id: Id) -> Result<(), Error>;

    // ── ApiSpec / Api / children (C2 writes through here) ───────────
    /// Upserts the `ApiSpec` row and rewrites the named operations'
    /// `Api`/`ApiRequest`/`ApiResponse`/`Variable` rows atomically. See
    /// `spec::ingestor` for the transaction this wraps.
    async fn ingest_spec(
        &self,
        spec: ApiSpec,
        operations: Vec<IngestedOperation>,
    ) -> Result<Vec<Api>, Error>;

    async fn find_spec_by_hash(&self, project_ref: Id, spec_hash: &str) -> Result<Option<ApiSpec>, Error>;
    async fn list_apis(&self, project_ref: Id) -> Result<Vec<Api>, Error>;
    async fn get_api(&self, id: Id) -> Result<Api, Error>;
    async fn get_request(&self, api_ref: Id) -> Result<Option<ApiRequest>, Error>;
    async fn list_responses(&self, api_ref: Id) -> Result<Vec<ApiResponse>, Error>;
    async fn list_variables(&self, api_ref: Id) -> Result<Vec<Variable>, Error>;
    async fn list_variables_for_project(&self, project_ref: Id) -> Result<Vec<Variable>, Error>;

    /// Re-tags a target variable's `varType`. The sole path (besides C5's
    /// wholesale candidate replace) by which a `Variable` row changes state.
    async fn set_variable_type(
        &self,
        api_ref: Id,
        name: &str,
        location: VariableLocation,
        var_type: VariableType,
    ) -> Result<(), Error>;

    // ── Candidates (C5) ──────────────────────────────────────────────
    /// Deletes every existing candidate for the project and inserts `candidates`
    /// in one step — C5's "replaced wholesale" contract.
    async fn replace_candidates(
        &self,
        project_ref: Id,
        candidates: Vec<DependencyCandidate>,
    ) -> Result<(), Error>;
    async fn list_candidates(&self, project_ref: Id) -> Result<Vec<DependencyCandidate>, Error>;

    // ── Dependencies (C6) ────────────────────────────────────────────
    /// Upserts on `(source, target)`; also re-tags the target variables named
    /// in `dependency.mapping`'s keys as `dependent`.
    async fn upsert_dependency(&self, dependency: ApiDependency) -> Result<ApiDependency, Error>;
    async fn delete_dependency(&self, id: Id) -> Result<(), Error>;
    async fn list_dependencies(&self, project_ref: Id) -> Result<Vec<ApiDependency>, Error>;

    // ── Runs (C8/C9) ─────────────────────────────────────────────────
    async fn create_run(&self, run: TestRun) -> Result<TestRun, Error>;
    async fn finish_run(&self, id: Id, status: RunStatus) -> Result<(), Error>;
    async fn get_run(&self, id: Id) -> Result<TestRun, Error>;
    async fn create_execution(&self, execution: TestExecution) -> Result<TestExecution, Error>;
    async fn update_execution_status(
        &self,
        id: Id,
        status: ExecutionStatus,
        error_message: Option<String>,
    ) -> Result<(), Error>;
    async fn add_artifact(&self, artifact: ExecutionArtifact) -> Result<ExecutionArtifact, Error>;
    async fn list_executions(&self, run_ref: Id) -> Result<Vec<TestExecution>, Error>;
    async fn list_artifacts(&self, exec_ref: Id) -> Result<Vec<ExecutionArtifact>, Error>;
}

/// One parsed operation as handed from `spec::ingestor` to the store for the
/// atomic per-Api rewrite `spec.md` §4.1 requires.
#[derive(Debug, Clone)]
pub struct IngestedOperation {
    pub method: HttpMethod,
    pub path: String,
    pub op_id: Option<String>,
    pub summary: Option<String>,
    pub auth_scheme: Option<String>,
    pub request: ApiRequest,
    pub responses: Vec<ApiResponse>,
    pub variables: Vec<Variable>,
}
