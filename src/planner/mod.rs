//! Execution Planner (C7, `spec.md` §4.6).
//!
//! Kahn's algorithm over the confirmed `ApiDependency` edges of a project,
//! generalized from the teacher's linear `batch/graph.rs::topological_sort`
//! to also emit layered execution levels, the way
//! `examples/other_examples/level_by_level.rs::compute_topological_levels`
//! does it. Pure: reads the confirmed catalog, returns an order. C8 is the
//! only caller that turns the result into HTTP traffic — `plan` alone is
//! the "dry-run" path (SPEC_FULL.md §F.4).

use crate::error::Error;
use crate::model::{Api, ApiDependency, Id};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub sorted_order: Vec<Id>,
    pub execution_levels: Vec<Vec<Id>>,
}

/// Builds the plan for `apis` (every node, including isolated ones) against
/// `dependencies` (the confirmed edges only — candidates never reach here).
///
/// # Errors
/// Returns `Error::cycle_detected` naming the ids still unresolved when no
/// further layer can be peeled off.
pub fn plan(apis: &[Api], dependencies: &[ApiDependency]) -> Result<ExecutionPlan, Error> {
    let mut in_degree: HashMap<Id, usize> = apis.iter().map(|a| (a.id, 0)).collect();
    let mut adjacency: HashMap<Id, Vec<Id>> = apis.iter().map(|a| (a.id, Vec::new())).collect();

    for dep in dependencies {
        adjacency.entry(dep.source_api_ref).or_default().push(dep.target_api_ref);
        *in_degree.entry(dep.target_api_ref).or_insert(0) += 1;
    }

    let mut remaining: HashSet<Id> = apis.iter().map(|a| a.id).collect();
    let mut sorted_order = Vec::with_capacity(apis.len());
    let mut execution_levels = Vec::new();

    loop {
        let layer: Vec<Id> = remaining
            .iter()
            .copied()
            .filter(|id| in_degree.get(id).copied().unwrap_or(0) == 0)
            .collect();
        if layer.is_empty() {
            break;
        }

        let mut ordered_layer = layer.clone();
        ordered_layer.sort();

        for id in &ordered_layer {
            remaining.remove(id);
            if let Some(targets) = adjacency.get(id) {
                for target in targets {
                    if let Some(deg) = in_degree.get_mut(target) {
                        *deg = deg.saturating_sub(1);
                    }
                }
            }
        }

        sorted_order.extend(ordered_layer.iter().copied());
        execution_levels.push(ordered_layer);
    }

    if sorted_order.len() != apis.len() {
        let stuck: Vec<String> = remaining.iter().map(Id::to_string).collect();
        return Err(Error::cycle_detected(&stuck));
    }

    Ok(ExecutionPlan {
        sorted_order,
        execution_levels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HttpMethod;
    use uuid::Uuid;

    fn api(path: &str) -> Api {
        Api {
            id: Uuid::new_v4(),
            project_ref: Uuid::new_v4(),
            method: HttpMethod::Get,
            path: path.to_string(),
            op_id: None,
            summary: None,
            auth_scheme: None,
        }
    }

    fn dep(source: Id, target: Id) -> ApiDependency {
        ApiDependency {
            id: Uuid::new_v4(),
            project_ref: Uuid::new_v4(),
            source_api_ref: source,
            target_api_ref: target,
            mapping: crate::model::Mapping::new(),
            is_required: true,
        }
    }

    #[test]
    fn isolated_nodes_form_layer_zero() {
        let a = api("/a");
        let b = api("/b");
        let plan = plan(&[a.clone(), b.clone()], &[]).unwrap();
        assert_eq!(plan.execution_levels.len(), 1);
        assert_eq!(plan.sorted_order.len(), 2);
    }

    #[test]
    fn linear_chain_produces_one_node_per_layer() {
        let login = api("/login");
        let me = api("/me");
        let orders = api("/orders");
        let plan = plan(
            &[login.clone(), me.clone(), orders.clone()],
            &[dep(login.id, me.id), dep(me.id, orders.id)],
        )
        .unwrap();
        assert_eq!(plan.execution_levels.len(), 3);
        assert_eq!(plan.execution_levels[0], vec![login.id]);
        assert_eq!(plan.execution_levels[1], vec![me.id]);
        assert_eq!(plan.execution_levels[2], vec![orders.id]);

        let pos = |id: Id| plan.sorted_order.iter().position(|x| *x == id).unwrap();
        assert!(pos(login.id) < pos(me.id));
        assert!(pos(me.id) < pos(orders.id));
    }

    #[test]
    fn diamond_shape_keeps_siblings_in_same_layer() {
        let root = api("/root");
        let left = api("/left");
        let right = api("/right");
        let sink = api("/sink");
        let plan = plan(
            &[root.clone(), left.clone(), right.clone(), sink.clone()],
            &[
                dep(root.id, left.id),
                dep(root.id, right.id),
                dep(left.id, sink.id),
                dep(right.id, sink.id),
            ],
        )
        .unwrap();
        assert_eq!(plan.execution_levels.len(), 3);
        assert_eq!(plan.execution_levels[0], vec![root.id]);
        let mut middle = plan.execution_levels[1].clone();
        middle.sort();
        let mut expected = vec![left.id, right.id];
        expected.sort();
        assert_eq!(middle, expected);
        assert_eq!(plan.execution_levels[2], vec![sink.id]);
    }

    #[test]
    fn cycle_is_rejected() {
        let a = api("/a");
        let b = api("/b");
        let result = plan(&[a.clone(), b.clone()], &[dep(a.id, b.id), dep(b.id, a.id)]);
        assert!(matches!(result, Err(Error::Internal { kind, .. }) if kind == crate::error::ErrorKind::CycleDetected));
    }
}
