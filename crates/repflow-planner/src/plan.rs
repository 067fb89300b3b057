//! Plan compilation.
//!
//! Kahn's algorithm over operand edges. Among ready nodes the one with the
//! lowest insertion index goes first, so the same graph always compiles to
//! the same order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::Serialize;

use repflow_core::id::NodeId;

use crate::error::{GraphError, Result};
use crate::graph::Graph;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    pub order: Vec<NodeId>,
    /// Number of operand edges reading each node's output, indexed by node.
    pub consumers: Vec<usize>,
    /// Graph generation this plan was compiled from.
    pub generation: u64,
}

impl ExecutionPlan {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn position_of(&self, id: NodeId) -> Option<usize> {
        self.order.iter().position(|n| *n == id)
    }

    pub fn consumer_count(&self, id: NodeId) -> usize {
        self.consumers.get(id.index()).copied().unwrap_or(0)
    }

    /// True when the plan was compiled from this graph (or an unmodified
    /// clone of it) in its current state.
    pub fn is_current_for(&self, graph: &Graph) -> bool {
        self.generation == graph.generation() && self.order.len() == graph.len()
    }
}

pub fn compile(graph: &Graph) -> Result<ExecutionPlan> {
    let n = graph.len();
    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<NodeId>> = vec![Vec::new(); n];
    let mut consumers = vec![0usize; n];

    for node in graph.nodes() {
        for dep in node.dependencies() {
            if dep.index() >= n {
                return Err(GraphError::UnknownNode(dep));
            }
            indegree[node.id.index()] += 1;
            dependents[dep.index()].push(node.id);
            consumers[dep.index()] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<NodeId>> = graph
        .nodes()
        .iter()
        .filter(|node| indegree[node.id.index()] == 0)
        .map(|node| Reverse(node.id))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for &next in &dependents[id.index()] {
            indegree[next.index()] -= 1;
            if indegree[next.index()] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() != n {
        // Only reachable if a graph was assembled around the acyclicity checks.
        let stuck = (0..n)
            .filter(|i| indegree[*i] > 0)
            .map(NodeId::from_index)
            .collect();
        return Err(GraphError::CyclicGraph { nodes: stuck });
    }

    Ok(ExecutionPlan {
        order,
        consumers,
        generation: graph.generation(),
    })
}
