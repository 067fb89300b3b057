use std::collections::BTreeMap;

use thiserror::Error;

use repflow_core::error::Error as CoreError;
use repflow_core::id::NodeId;
use repflow_core::object::Value;
use repflow_dispatch::DispatchError;
use repflow_planner::GraphError;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("{node} (plan position {position}) reads an object already consumed by {first_consumer}")]
    ObjectAlreadyConsumed {
        node: NodeId,
        position: usize,
        first_consumer: NodeId,
    },

    #[error("{node} (plan position {position}) reads an object that is no longer consumable")]
    ObjectExhausted { node: NodeId, position: usize },

    #[error("{node} (plan position {position}) '{operation}' failed: {source}")]
    NodeExecution {
        node: NodeId,
        position: usize,
        operation: String,
        #[source]
        source: DispatchError,
    },

    #[error("{node} output could not be retained for fan-out: {source}")]
    Retain {
        node: NodeId,
        #[source]
        source: CoreError,
    },

    #[error("probe {node} would consume a non-retained object")]
    ProbeConsumes { node: NodeId },

    #[error("plan compiled for graph generation {plan} but graph is at {graph}")]
    StalePlan { plan: u64, graph: u64 },

    #[error("pipeline requirements not satisfied: {reason}")]
    RequirementsNotSatisfied { reason: String },

    #[error("invalid pipeline: {0}")]
    Invalid(String),

    #[error("hashing error: {0}")]
    Hash(String),
}

impl ExecError {
    /// Probe assertion reason carried by a failed node, if any.
    pub fn probe_failure(&self) -> Option<&str> {
        match self {
            ExecError::NodeExecution { source, .. } => source.probe_failure(),
            _ => None,
        }
    }
}

/// Error of an execution together with the results produced before it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ExecutionFailure {
    #[source]
    pub error: ExecError,
    pub partial: BTreeMap<NodeId, Value>,
}

impl From<ExecError> for ExecutionFailure {
    fn from(error: ExecError) -> Self {
        Self {
            error,
            partial: BTreeMap::new(),
        }
    }
}
