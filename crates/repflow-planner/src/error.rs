use thiserror::Error;

use repflow_core::error::Error as CoreError;
use repflow_core::id::NodeId;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph would contain a cycle through {}", fmt_nodes(.nodes))]
    CyclicGraph { nodes: Vec<NodeId> },

    #[error("operand refers to unknown node {0}")]
    UnknownNode(NodeId),

    #[error("{node} has no operand at position {position}")]
    OperandPosition { node: NodeId, position: usize },

    #[error("pipeline definition error: {0}")]
    Dsl(String),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

fn fmt_nodes(nodes: &[NodeId]) -> String {
    nodes
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
