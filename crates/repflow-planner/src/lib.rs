#![forbid(unsafe_code)]
//! repflow-planner: operation graphs → deterministic execution plans.
//!
//! - `graph`: nodes (a source value or a named operation bound to operands
//!   and params), acyclic by construction, with a generation counter that
//!   invalidates compiled plans on mutation.
//! - `plan`: Kahn's algorithm, lowest insertion index first among ready nodes,
//!   plus per-node consumer counts for the executor.
//! - `verify`: cheap checks used by tests and debug builds.
//! - `dsl::yaml`: a small YAML pipeline description.
//!
//! The planner does not know about dispatch; operation names are opaque here.

pub mod dsl;
pub mod error;
pub mod graph;
pub mod plan;
pub mod verify;

pub use dsl::yaml::{parse_yaml_pipeline, PipelineConfig, PipelineDoc};
pub use error::GraphError;
pub use graph::{Graph, Node, NodeDescription, NodeKind, Operand};
pub use plan::{compile, ExecutionPlan};
