#![forbid(unsafe_code)]
//! repflow-dispatch: pick the implementation of a named operation that fits
//! the representations of its operands, and run it.
//!
//! - `registry`: name → ordered list of `(signature, implementation)`.
//! - `dispatcher`: matching, scoring, invocation, and the retry protocol.
//! - `context`: `OperationContext`, which owns a registry, a retry policy and
//!   an observer, plus a lazily-built per-thread default context.
//! - `catalogue`: serializable listing of what is registered.

pub mod catalogue;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod observer;
pub mod operation;
pub mod policy;
pub mod registry;

pub use catalogue::{CatalogueEntry, CatalogueImplementation};
pub use context::{install_default_factory, reset_default_context, with_default_context, OperationContext};
pub use dispatcher::{signature_matches, Dispatcher};
pub use error::{DispatchError, OpError};
pub use observer::{CollectingObserver, ContextObserver, LoggingObserver, ObserverEvent};
pub use operation::{Implementation, Operation, Outcome, RetryRequest};
pub use policy::RetryPolicy;
pub use registry::Registry;

pub use repflow_core::types::Params;
