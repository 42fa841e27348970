//! Variable Extractor (C3, `spec.md` §4.2).
//!
//! Flattens an operation's parameters and request body schema into the
//! catalog's `Variable` rows, including the synthetic `Authorization`
//! variable C2 flags as required. The body-schema descent follows the
//! tagged-sum walk `spec.md` §9 prescribes (object/array/primitive/
//! composite/unknown) directly over the already-dereferenced
//! `serde_json::Value` tree, with a depth bound standing in for the
//! visited-set `Dereferencer` already applied upstream — by the time a
//! schema reaches here its `$ref` cycles have already been cut.

use crate::model::{Id, Variable, VariableLocation, VariableType};
use serde_json::Value;

/// Bounds recursion into deeply (or still-cyclically) nested schemas.
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub struct ResolvedParam {
    pub name: String,
    pub location: VariableLocation,
    pub schema: Value,
    pub required: bool,
    pub synthetic: bool,
}

pub struct OperationContext<'a> {
    pub params: &'a [ResolvedParam],
    pub body_schema: Option<&'a Value>,
}

/// Emits one `Variable` per parameter plus one per reachable body-schema
/// leaf/intermediate-object. `apiRef` is left nil — the store fills it in
/// when the owning `Api` row's id is known (see `IngestedOperation`).
#[must_use]
pub fn extract(ctx: &OperationContext) -> Vec<Variable> {
    let mut vars = Vec::new();

    for p in ctx.params {
        vars.push(Variable {
            api_ref: Id::nil(),
            name: p.name.clone(),
            location: p.location,
            var_type: if p.synthetic {
                VariableType::Synthetic
            } else {
                VariableType::UserInput
            },
            data_type: data_type_of(&p.schema),
            required: p.required,
            ai_confidence: None,
        });
    }

    if let Some(body) = ctx.body_schema {
        let required = required_fields(body);
        walk_body(body, "", &required, 0, &mut vars);
    }

    vars
}

fn walk_body(
    schema: &Value,
    prefix: &str,
    parent_required: &[String],
    depth: usize,
    out: &mut Vec<Variable>,
) {
    if depth > MAX_DEPTH || schema.is_null() {
        return;
    }

    if let Some(variants) = schema
        .get("allOf")
        .or_else(|| schema.get("oneOf"))
        .or_else(|| schema.get("anyOf"))
        .and_then(Value::as_array)
    {
        for variant in variants {
            walk_body(variant, prefix, parent_required, depth + 1, out);
        }
        // A composite node can still carry its own properties (allOf siblings); fall through.
    }

    if let Some(items) = schema.get("items") {
        walk_body(items, prefix, parent_required, depth + 1, out);
        return;
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        // A pure composite has already had its variants walked above; the
        // caller already emitted this node as an intermediate, so don't
        // also treat it as a leaf here.
        let is_composite = schema.get("allOf").is_some()
            || schema.get("oneOf").is_some()
            || schema.get("anyOf").is_some();
        if !prefix.is_empty() && !is_composite && schema.get("items").is_none() {
            emit_leaf(schema, prefix, parent_required, out);
        }
        return;
    };

    let required_here = required_fields(schema);

    for (name, field_schema) in properties {
        if field_schema
            .get("readOnly")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            continue; // excluded from input variables, spec.md §4.2
        }

        let qualified = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };

        let is_leaf = !has_nested_structure(field_schema);
        if is_leaf {
            out.push(Variable {
                api_ref: Id::nil(),
                name: qualified,
                location: VariableLocation::Body,
                var_type: VariableType::UserInput,
                data_type: data_type_of(field_schema),
                required: required_here.iter().any(|r| r == name),
                ai_confidence: None,
            });
        } else {
            // Intermediate object: emitted too (spec.md §4.2 "emitting both
            // intermediate objects and leaves"), then descended into.
            out.push(Variable {
                api_ref: Id::nil(),
                name: qualified.clone(),
                location: VariableLocation::Body,
                var_type: VariableType::UserInput,
                data_type: data_type_of(field_schema),
                required: required_here.iter().any(|r| r == name),
                ai_confidence: None,
            });
            let nested_required = required_fields(field_schema);
            walk_body(field_schema, &qualified, &nested_required, depth + 1, out);
        }
    }

    let _ = parent_required; // parent_required governs the emit_leaf() early-return path above.
}

/// True when a field's schema still has somewhere to descend: its own
/// `properties`/`items`, or a composite (`allOf`/`oneOf`/`anyOf`) — the
/// latter is expanded by `walk_body`'s own entry-point check rather than
/// here, so a composite field must never be misclassified as a leaf.
fn has_nested_structure(schema: &Value) -> bool {
    schema.get("properties").is_some()
        || schema.get("items").is_some()
        || schema.get("allOf").and_then(Value::as_array).is_some()
        || schema.get("oneOf").and_then(Value::as_array).is_some()
        || schema.get("anyOf").and_then(Value::as_array).is_some()
}

fn emit_leaf(schema: &Value, prefix: &str, parent_required: &[String], out: &mut Vec<Variable>) {
    let leaf_name = prefix.rsplit('.').next().unwrap_or(prefix);
    out.push(Variable {
        api_ref: Id::nil(),
        name: prefix.to_string(),
        location: VariableLocation::Body,
        var_type: VariableType::UserInput,
        data_type: data_type_of(schema),
        required: parent_required.iter().any(|r| r == leaf_name),
        ai_confidence: None,
    });
}

fn required_fields(schema: &Value) -> Vec<String> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// `type` when present, `type(format)` when format is present, `unknown`
/// otherwise — spec.md §4.2 verbatim.
fn data_type_of(schema: &Value) -> String {
    let ty = schema.get("type").and_then(Value::as_str);
    let format = schema.get("format").and_then(Value::as_str);
    match (ty, format) {
        (Some(t), Some(f)) => format!("{t}({f})"),
        (Some(t), None) => t.to_string(),
        (None, _) => "unknown".to_string(),
    }
}
