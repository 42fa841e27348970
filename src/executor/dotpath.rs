//! Dot-path selector evaluation (`spec.md` §9's "known gap" fix).
//!
//! The component contract describes a top-level key lookup, but §9
//! explicitly calls that a gap that "must be implemented for real
//! workloads" with this exact evaluator contract: split on `.`, step
//! through object keys, return `null` on any missing step. Distinct from
//! the teacher's JQ-based capture/interpolation (`batch/interpolation.rs`)
//! — this walks a plain JSON tree, no filter expressions.

use serde_json::Value;

/// Resolves `selector` (e.g. `"data.id"`) against `body`. A missing
/// intermediate key, a non-object encountered mid-path, or array indexing
/// (unsupported) all resolve to `Value::Null` rather than erroring — the
/// caller treats a null resolution as a plain missing input.
#[must_use]
pub fn resolve<'a>(body: &'a Value, selector: &str) -> &'a Value {
    let mut current = body;
    for segment in selector.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return &Value::Null,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn top_level_key_resolves() {
        let body = json!({"id": "abc"});
        assert_eq!(resolve(&body, "id"), &json!("abc"));
    }

    #[test]
    fn nested_path_resolves() {
        let body = json!({"data": {"id": "abc"}});
        assert_eq!(resolve(&body, "data.id"), &json!("abc"));
    }

    #[test]
    fn missing_step_resolves_to_null() {
        let body = json!({"data": {}});
        assert_eq!(resolve(&body, "data.id"), &Value::Null);
    }

    #[test]
    fn missing_root_resolves_to_null() {
        let body = json!({});
        assert_eq!(resolve(&body, "data.id"), &Value::Null);
    }
}
