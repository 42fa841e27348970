//! Catalog and run entities persisted by the [`crate::store`] component.
//!
//! Mirrors `spec.md` §3 (Data Model) directly: one struct per entity, with
//! the invariants noted in doc comments rather than enforced by the type
//! system where the enforcement belongs to the store (uniqueness, cascade).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: Id,
    pub name: String,
    pub owner_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiSpec {
    pub id: Id,
    pub project_ref: Id,
    pub version: String,
    /// SHA-256 hex digest over the canonicalized, fully-dereferenced document.
    pub spec_hash: String,
    pub src_ref: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            "TRACE" => Some(Self::Trace),
            _ => None,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single (method, path) endpoint in a project's catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub id: Id,
    pub project_ref: Id,
    pub method: HttpMethod,
    pub path: String,
    pub op_id: Option<String>,
    pub summary: Option<String>,
    /// Name of the security scheme this operation's effective security resolved to,
    /// if it required a bearer/oauth2 scheme (see `dependencies::deterministic`).
    pub auth_scheme: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ApiRequest {
    pub api_ref: Id,
    pub body_schema: Option<serde_json::Value>,
    pub query_params_map: Option<IndexMap<String, serde_json::Value>>,
    pub path_params_map: Option<IndexMap<String, serde_json::Value>>,
    pub headers_map: Option<IndexMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiResponse {
    pub api_ref: Id,
    pub status_code: u16,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VariableLocation {
    Path,
    Query,
    Header,
    Body,
}

impl VariableLocation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Body => "body",
        }
    }
}

impl std::fmt::Display for VariableLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VariableType {
    UserInput,
    Dependent,
    DependentCandidate,
    Constant,
    Synthetic,
}

impl VariableType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserInput => "user_input",
            Self::Dependent => "dependent",
            Self::DependentCandidate => "dependent_candidate",
            Self::Constant => "constant",
            Self::Synthetic => "synthetic",
        }
    }
}

/// A typed input (or input-like) element of an endpoint.
///
/// `(apiRef, name, location)` is unique; enforced by `Store::upsert_variable`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Variable {
    pub api_ref: Id,
    pub name: String,
    pub location: VariableLocation,
    pub var_type: VariableType,
    pub data_type: String,
    pub required: bool,
    pub ai_confidence: Option<OrderedConfidence>,
}

/// `f64` wrapper with a total order, so confidence can sit in an `Eq` struct.
/// Confidence values are always finite and clamped to `[0, 1]` by the callers
/// that produce them (see `dependencies::llm`), so `PartialOrd`'s None case
/// never arises in practice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderedConfidence(pub f64);

impl PartialEq for OrderedConfidence {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}
impl Eq for OrderedConfidence {}

impl From<f64> for OrderedConfidence {
    fn from(v: f64) -> Self {
        Self(v)
    }
}

/// An ordered map from target variable name to a dot-path selector into the
/// source's JSON response body (e.g. `{"user_id": "data.id"}`).
pub type Mapping = IndexMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencyCandidate {
    pub id: Id,
    pub project_ref: Id,
    pub source_api_ref: Id,
    pub target_api_ref: Id,
    pub mapping: Mapping,
    pub confidence: f64,
    pub reason: String,
    pub origin: CandidateOrigin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CandidateOrigin {
    Deterministic,
    Inferred,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiDependency {
    pub id: Id,
    pub project_ref: Id,
    pub source_api_ref: Id,
    pub target_api_ref: Id,
    pub mapping: Mapping,
    pub is_required: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TriggerSource {
    System,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestRun {
    pub id: Id,
    /// Nullable so run history survives project deletion.
    pub project_ref: Option<Id>,
    pub environment: String,
    pub trigger_source: TriggerSource,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: Option<RunStatus>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    Running,
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestExecution {
    pub id: Id,
    pub run_ref: Id,
    pub api_ref: Option<Id>,
    pub status: ExecutionStatus,
    pub retry_count: u32,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionArtifact {
    pub id: Id,
    pub exec_ref: Id,
    pub request_data: Option<serde_json::Value>,
    pub response_data: Option<serde_json::Value>,
    pub response_time_ms: u64,
    pub created_at: DateTime<Utc>,
}
