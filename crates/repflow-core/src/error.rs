use thiserror::Error;

use crate::tag::Tag;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid signature: {0}")]
    Signature(String),

    /// A data object could not produce the requested representation.
    #[error("cannot convert object with tags [{from}] to '{to}'")]
    Conversion { from: String, to: Tag },

    /// A single-pass object could not be materialized into a retained one.
    #[error("cannot retain object: {0}")]
    Retain(String),

    // Core does no I/O; backends map their read errors here.
    #[error("I/O-like error: {0}")]
    IoLike(String),

    #[error("hashing error: {0}")]
    Hash(String),

    #[error("internal invariant failed: {0}")]
    Invariant(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}
