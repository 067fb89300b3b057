//! Provenance digests.
//!
//! The plan hash covers the execution order and the description of every node
//! (operation, inputs, params), so two runs with the same hash executed the
//! same operations in the same order.

use repflow_core::hash::{hash_serde, Hash256};
use repflow_planner::{ExecutionPlan, Graph};

use crate::ExecError;

pub fn hash_plan(graph: &Graph, plan: &ExecutionPlan) -> Result<Hash256, ExecError> {
    let order = hash_serde(&plan.order).map_err(|e| ExecError::Hash(e.to_string()))?;
    let nodes = hash_serde(&graph.describe()).map_err(|e| ExecError::Hash(e.to_string()))?;
    Ok(order.chain(nodes))
}
