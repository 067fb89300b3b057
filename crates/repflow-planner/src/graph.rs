//! Operation graph.
//!
//! Nodes are stored in insertion order and never removed, so `NodeId(n)` is
//! the n-th node. Edges are implied by operands. The graph stays acyclic:
//! `add_node` can only reference existing nodes, and `rebind_operand` refuses
//! any reference from which the rebound node is reachable.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use repflow_core::id::NodeId;
use repflow_core::object::Value;
use repflow_core::types::Params;

use crate::error::{GraphError, Result};

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A value supplied from outside; evaluating it needs no dispatch.
    Source(Value),
    /// A named operation resolved at execution time.
    Operation(String),
}

#[derive(Debug, Clone)]
pub enum Operand {
    /// Output of another node.
    Node(NodeId),
    /// Outputs of several nodes, bound to a repeated requirement.
    Nodes(Vec<NodeId>),
    Literal(Value),
}

impl Operand {
    fn references(&self) -> &[NodeId] {
        match self {
            Operand::Node(id) => std::slice::from_ref(id),
            Operand::Nodes(ids) => ids,
            Operand::Literal(_) => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub operands: Vec<Operand>,
    pub params: Params,
    pub label: Option<String>,
}

impl Node {
    /// Operation name, or `"source"` for source nodes.
    pub fn op_name(&self) -> &str {
        match &self.kind {
            NodeKind::Source(_) => "source",
            NodeKind::Operation(name) => name,
        }
    }

    /// Referenced nodes, one entry per edge (duplicates kept).
    pub fn dependencies(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.operands
            .iter()
            .flat_map(|o| o.references().iter().copied())
    }
}

/// Serializable summary of a node, used by `explain` and plan hashing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDescription {
    pub id: NodeId,
    pub op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub inputs: Vec<String>,
    pub params: Params,
}

static GENERATIONS: AtomicU64 = AtomicU64::new(1);

/// Generations are drawn from one process-wide counter, so two graphs share
/// a generation only when one is an unmodified clone of the other.
fn next_generation() -> u64 {
    GENERATIONS.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    generation: u64,
}

impl Default for Graph {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            generation: next_generation(),
        }
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, value: Value) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node {
            id,
            kind: NodeKind::Source(value),
            operands: Vec::new(),
            params: Params::new(),
            label: None,
        });
        self.generation = next_generation();
        id
    }

    /// Append an operation node. Operands may only reference nodes already in
    /// the graph; on error the graph is left unchanged.
    pub fn add_node(
        &mut self,
        operation: impl Into<String>,
        operands: Vec<Operand>,
        params: Params,
    ) -> Result<NodeId> {
        let id = NodeId::from_index(self.nodes.len());
        for dep in operands.iter().flat_map(|o| o.references()) {
            if *dep == id {
                return Err(GraphError::CyclicGraph {
                    nodes: vec![id, id],
                });
            }
            if dep.index() > self.nodes.len() {
                return Err(GraphError::UnknownNode(*dep));
            }
        }
        self.nodes.push(Node {
            id,
            kind: NodeKind::Operation(operation.into()),
            operands,
            params,
            label: None,
        });
        self.generation = next_generation();
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Changes on every mutation and is never shared by independently built graphs.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) -> Result<()> {
        self.node_mut(id)?.label = Some(label.into());
        Ok(())
    }

    pub fn set_param(&mut self, id: NodeId, key: impl Into<String>, value: serde_json::Value) -> Result<()> {
        self.node_mut(id)?.params.insert(key.into(), value);
        self.generation = next_generation();
        Ok(())
    }

    /// Replace the operand at `position`. Rejected, leaving the graph
    /// unchanged, if the new operand would close a cycle.
    pub fn rebind_operand(&mut self, id: NodeId, position: usize, operand: Operand) -> Result<()> {
        let node = self.node(id).ok_or(GraphError::UnknownNode(id))?;
        if position >= node.operands.len() {
            return Err(GraphError::OperandPosition { node: id, position });
        }
        for dep in operand.references() {
            if self.node(*dep).is_none() {
                return Err(GraphError::UnknownNode(*dep));
            }
            if let Some(mut path) = self.path(*dep, id) {
                path.push(*dep);
                path.reverse();
                return Err(GraphError::CyclicGraph { nodes: path });
            }
        }
        self.nodes[id.index()].operands[position] = operand;
        self.generation = next_generation();
        Ok(())
    }

    pub fn describe(&self) -> Vec<NodeDescription> {
        self.nodes
            .iter()
            .map(|n| NodeDescription {
                id: n.id,
                op: n.op_name().to_string(),
                label: n.label.clone(),
                inputs: n
                    .operands
                    .iter()
                    .map(|o| match o {
                        Operand::Node(d) => d.to_string(),
                        Operand::Nodes(ds) => format!(
                            "[{}]",
                            ds.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
                        ),
                        Operand::Literal(v) => format!("literal {}", v.describe()),
                    })
                    .collect(),
                params: n.params.clone(),
            })
            .collect()
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .ok_or(GraphError::UnknownNode(id))
    }

    /// Dependency path from `from` down to `target`, listed target-first, if
    /// `target` is reachable from `from` through operands.
    fn path(&self, from: NodeId, target: NodeId) -> Option<Vec<NodeId>> {
        if from == target {
            return Some(vec![target]);
        }
        let mut stack = vec![from];
        let mut parent: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut seen = vec![false; self.nodes.len()];
        seen[from.index()] = true;
        while let Some(current) = stack.pop() {
            for dep in self.nodes[current.index()].dependencies() {
                if seen[dep.index()] {
                    continue;
                }
                seen[dep.index()] = true;
                parent[dep.index()] = Some(current);
                if dep == target {
                    let mut path = vec![target];
                    let mut cursor = current;
                    while cursor != from {
                        path.push(cursor);
                        cursor = parent[cursor.index()]?;
                    }
                    return Some(path);
                }
                stack.push(dep);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repflow_core::types::Scalar;

    fn source(g: &mut Graph) -> NodeId {
        g.add_source(Value::Scalar(Scalar::I64(1)))
    }

    #[test]
    fn add_node_rejects_unknown_and_self_references() {
        let mut g = Graph::new();
        let a = source(&mut g);
        let before = g.generation();
        assert!(matches!(
            g.add_node("f", vec![Operand::Node(NodeId::new(1))], Params::new()),
            Err(GraphError::CyclicGraph { .. })
        ));
        assert!(matches!(
            g.add_node("f", vec![Operand::Node(NodeId::new(7))], Params::new()),
            Err(GraphError::UnknownNode(_))
        ));
        assert_eq!(g.len(), 1);
        assert_eq!(g.generation(), before);
        g.add_node("f", vec![Operand::Node(a)], Params::new()).unwrap();
    }

    #[test]
    fn rebinding_into_a_cycle_is_refused() {
        let mut g = Graph::new();
        let a = source(&mut g);
        let b = g.add_node("f", vec![Operand::Node(a)], Params::new()).unwrap();
        let c = g.add_node("g", vec![Operand::Node(b)], Params::new()).unwrap();
        let d = g.add_node("h", vec![Operand::Nodes(vec![a, c])], Params::new()).unwrap();

        let before = g.generation();
        let err = g.rebind_operand(b, 0, Operand::Node(d)).unwrap_err();
        match err {
            GraphError::CyclicGraph { nodes } => {
                assert_eq!(nodes.first(), Some(&d));
                assert_eq!(nodes.last(), Some(&b));
            }
            other => panic!("unexpected: {other}"),
        }
        assert_eq!(g.generation(), before);
        assert!(matches!(g.nodes()[b.index()].operands[0], Operand::Node(x) if x == a));

        // a legal rebind bumps the generation
        g.rebind_operand(d, 0, Operand::Nodes(vec![b])).unwrap();
        assert!(g.generation() > before);
    }
}
