#![forbid(unsafe_code)]
//! repflow-exec: run compiled graphs through an operation context.
//!
//! The engine walks the plan in order, binds each node's operands to values
//! already produced, dispatches the node's operation and records the result.
//! Single-pass objects may be bound to one consuming edge only. Execution
//! stops at the first failing node and hands back whatever was produced
//! before it.
//!
//! `Pipeline` is the fluent front end: it grows a graph one operation at a
//! time, caches the compiled plan, and runs optional probe graphs before the
//! main one.

pub mod engine;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod replay;

pub use engine::{Execution, ExecutionEngine, ProbeVerdict};
pub use error::{ExecError, ExecutionFailure};
pub use pipeline::{check_operations, Pipeline, RunOutcome};
