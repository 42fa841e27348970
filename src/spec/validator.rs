//! Structural validation of a parsed `OpenAPI` document (C2, `spec.md` §4.1).
//!
//! Deliberately narrow: this is not a general-purpose OpenAPI linter, it
//! checks the handful of preconditions the rest of the ingestor depends on
//! — a supported major version, a non-empty `paths` map, and well-formed
//! operation-level parameter/response shapes — and reports everything it
//! finds via a single `ValidationResult` rather than failing on the first
//! problem, the way the teacher's `SpecValidator` accumulates warnings.

use crate::error::Error;
use openapiv3::{OpenAPI, ReferenceOr};

/// Accumulated outcome of validating one document.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<Error>,
}

impl ValidationResult {
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// Collapses to a single `Result`, keeping only the first error —
    /// `spec.md` §4.1 only needs one reason to reject the whole document.
    ///
    /// # Errors
    ///
    /// Returns the first accumulated error, if any.
    pub fn into_result(self) -> Result<(), Error> {
        self.errors.into_iter().next().map_or_else(|| Ok(()), Err)
    }
}

pub struct SpecValidator;

impl SpecValidator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates `spec`, returning every structural problem found rather
    /// than stopping at the first one.
    #[must_use]
    pub fn validate(&self, spec: &OpenAPI) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !spec.openapi.starts_with("3.") {
            result.add_error(Error::unsupported_version(spec.openapi.clone()));
            return result;
        }

        if spec.info.title.trim().is_empty() {
            result.add_error(Error::invalid_spec("info.title must not be empty"));
        }

        if spec.paths.paths.is_empty() {
            // Not fatal: a spec with zero operations ingests to zero Apis.
            return result;
        }

        for (path, item_ref) in &spec.paths.paths {
            let ReferenceOr::Item(item) = item_ref else {
                result.add_error(Error::invalid_spec(format!(
                    "path item '{path}' is an unresolved $ref"
                )));
                continue;
            };
            for (method, operation) in super::ingestor::operations_of(item) {
                for param_ref in &operation.parameters {
                    if matches!(param_ref, ReferenceOr::Reference { .. }) {
                        result.add_error(Error::invalid_spec(format!(
                            "{method} {path}: parameter $ref was not resolved before validation"
                        )));
                    }
                }
            }
        }

        result
    }
}

impl Default for SpecValidator {
    fn default() -> Self {
        Self::new()
    }
}
