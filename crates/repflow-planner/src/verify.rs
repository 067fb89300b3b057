//! Debug-time plan checks.
//!
//! Used by tests and debug builds to catch ordering bugs early.

use std::collections::HashSet;

use repflow_core::id::NodeId;

use crate::graph::Graph;
use crate::plan::ExecutionPlan;

/// Every node appears after all of its operand nodes.
pub fn assert_topological(graph: &Graph, plan: &ExecutionPlan) {
    let mut seen = HashSet::<NodeId>::new();
    for id in &plan.order {
        let node = graph
            .node(*id)
            .unwrap_or_else(|| panic!("plan names {id} which is not in the graph"));
        for dep in node.dependencies() {
            assert!(seen.contains(&dep), "dependency {dep} not satisfied before {id}");
        }
        seen.insert(*id);
    }
}

/// The plan schedules each node of the graph exactly once.
pub fn assert_complete(graph: &Graph, plan: &ExecutionPlan) {
    assert_eq!(plan.order.len(), graph.len(), "plan length differs from graph size");
    let unique: HashSet<NodeId> = plan.order.iter().copied().collect();
    assert_eq!(unique.len(), plan.order.len(), "plan schedules a node twice");
}
