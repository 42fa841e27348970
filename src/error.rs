//! Consolidated error handling for the orchestration engine.
//!
//! Every internal failure funnels through a single `Internal { kind, message,
//! context }` variant tagged with one of the `ErrorKind`s `spec.md` §7 names;
//! a handful of unavoidable external error types keep their own `#[from]`
//! variants. Nothing in the core panics or uses exceptions for control flow —
//! ingest/registry failures propagate to the caller, analyzer/executor
//! failures are absorbed and recorded on the owning row (see `executor` and
//! `dependencies::llm`).

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind}: {message}")]
    Internal {
        kind: ErrorKind,
        message: Cow<'static, str>,
        context: Option<ErrorContext>,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Error categories, matching `spec.md` §7 one-for-one plus two catch-alls
/// (`Store`, `Validation`) for failures the nine named kinds don't cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// §4.1 — spec fails schema/structural validation.
    InvalidSpec,
    /// §4.1 — `openapi` field doesn't start with "3.".
    UnsupportedVersion,
    /// §4.1 — a response/body schema can't round-trip through JSON.
    UnserializableSchema,
    /// §4.6 — the confirmed-dependency graph has a cycle.
    CycleDetected,
    /// §4.5 — a candidate/dependency has `source == target`.
    SelfDependency,
    /// §4.7 — an endpoint's dependency source isn't ready/failed.
    DependencyUnresolved,
    /// §4.4 — one LLM batch failed; other batches proceed.
    LlmBatchFailed,
    /// A target HTTP call could not be completed (DNS, connect, timeout).
    Transport,
    /// Persistence-layer failure (unique-key violation, missing row, etc).
    Store,
    /// Input shape errors that aren't one of the above.
    Validation,
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub details: Option<serde_json::Value>,
    pub suggestion: Option<Cow<'static, str>>,
}

impl ErrorContext {
    #[must_use]
    pub const fn with_details(details: serde_json::Value) -> Self {
        Self {
            details: Some(details),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_detail(key: &str, value: impl Serialize) -> Self {
        Self {
            details: Some(json!({ key: value })),
            suggestion: None,
        }
    }
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidSpec => "InvalidSpec",
            Self::UnsupportedVersion => "UnsupportedVersion",
            Self::UnserializableSchema => "UnserializableSchema",
            Self::CycleDetected => "CycleDetected",
            Self::SelfDependency => "SelfDependency",
            Self::DependencyUnresolved => "DependencyUnresolved",
            Self::LlmBatchFailed => "LlmBatchFailed",
            Self::Transport => "Transport",
            Self::Store => "Store",
            Self::Validation => "Validation",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonError {
    pub error_type: Cow<'static, str>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Error {
    fn internal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Internal {
            kind,
            message: Cow::Owned(message.into()),
            context: None,
        }
    }

    fn internal_with_context(
        kind: ErrorKind,
        message: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        Self::Internal {
            kind,
            message: Cow::Owned(message.into()),
            context: Some(context),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> JsonError {
        let (error_type, message, details): (&str, String, Option<serde_json::Value>) =
            match self {
                Self::Io(e) => ("Io", e.to_string(), None),
                Self::Network(e) => ("Network", e.to_string(), None),
                Self::Yaml(e) => ("Yaml", e.to_string(), None),
                Self::Json(e) => ("Json", e.to_string(), None),
                Self::Internal {
                    kind,
                    message,
                    context,
                } => {
                    let details = context.as_ref().and_then(|c| c.details.clone());
                    (kind.as_str(), message.to_string(), details)
                }
                Self::Anyhow(e) => ("Unknown", e.to_string(), None),
            };
        JsonError {
            error_type: Cow::Borrowed(error_type),
            message,
            details,
        }
    }

    // ── Spec Ingestor (C2) ──────────────────────────────────────────

    pub fn invalid_spec(reason: impl Into<String>) -> Self {
        Self::internal(ErrorKind::InvalidSpec, reason.into())
    }

    pub fn unsupported_version(found: impl Into<String>) -> Self {
        let found = found.into();
        Self::internal_with_context(
            ErrorKind::UnsupportedVersion,
            format!("Unsupported OpenAPI version: {found}"),
            ErrorContext::with_detail("found", &found),
        )
    }

    pub fn unserializable_schema(reason: impl Into<String>) -> Self {
        Self::internal(ErrorKind::UnserializableSchema, reason.into())
    }

    // ── Execution Planner (C7) ──────────────────────────────────────

    pub fn cycle_detected(remaining_ids: &[String]) -> Self {
        Self::internal_with_context(
            ErrorKind::CycleDetected,
            format!(
                "Dependency cycle detected among api(s): {}",
                remaining_ids.join(", ")
            ),
            ErrorContext::with_detail("apis", remaining_ids),
        )
    }

    // ── Dependency Registry (C6) ─────────────────────────────────────

    pub fn self_dependency(api_id: impl Into<String>) -> Self {
        let api_id = api_id.into();
        Self::internal_with_context(
            ErrorKind::SelfDependency,
            format!("Api '{api_id}' cannot depend on itself"),
            ErrorContext::with_detail("api", &api_id),
        )
    }

    // ── Run Executor (C8) ────────────────────────────────────────────

    pub fn dependency_unresolved(source_api_id: impl Into<String>) -> Self {
        let source_api_id = source_api_id.into();
        Self::internal(
            ErrorKind::DependencyUnresolved,
            format!("Dependency failed: Source {source_api_id} not ready or failed."),
        )
    }

    pub fn transport_error(reason: impl Into<String>) -> Self {
        Self::internal(ErrorKind::Transport, reason.into())
    }

    // ── LLM Analyzer (C5) ─────────────────────────────────────────────

    pub fn llm_batch_failed(reason: impl Into<String>) -> Self {
        Self::internal(ErrorKind::LlmBatchFailed, reason.into())
    }

    // ── Persistence Store (C1) ───────────────────────────────────────

    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::internal(ErrorKind::Store, format!("{} not found: {id}", entity.into()))
    }

    pub fn unique_violation(reason: impl Into<String>) -> Self {
        Self::internal(ErrorKind::Store, reason.into())
    }

    // ── Generic validation ────────────────────────────────────────────

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::internal(ErrorKind::Validation, message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_json_preserves_kind_and_message() {
        let err = Error::cycle_detected(&["api-a".to_string(), "api-b".to_string()]);
        let json = err.to_json();
        assert_eq!(json.error_type, "CycleDetected");
        assert!(json.message.contains("api-a"));
        assert!(json.details.is_some());
    }

    #[test]
    fn dependency_unresolved_message_matches_spec_wording() {
        let err = Error::dependency_unresolved("api-123");
        assert_eq!(
            err.to_string(),
            "DependencyUnresolved: Dependency failed: Source api-123 not ready or failed."
        );
    }
}
