#![forbid(unsafe_code)]
//! repflow-core: the vocabulary shared by every repflow crate.
//!
//! - `tag` / `signature`: interned representation tags and operation signatures.
//! - `object`: the `DataObject` capability trait and the `Value` carried between nodes.
//! - `config`: `ContextConfig` (retry policy + consumption policy), env-aware.
//! - `hash` / `manifest`: stable hashing and the per-run manifest.
//!
//! Nothing in here performs dispatch or execution; see `repflow-dispatch` and
//! `repflow-exec` for that.

pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod manifest;
pub mod object;
pub mod prelude;
pub mod signature;
pub mod tag;
pub mod types;

/// Version string recorded in run manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
