use thiserror::Error;

use repflow_core::error::Error as CoreError;
use repflow_core::signature::Signature;

/// Errors raised by an operation implementation.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("execution error: {0}")]
    Exec(String),

    /// Raised by assertion operations used in pipeline probes.
    #[error("assertion failed: {reason}")]
    ProbeAssertion { reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    /// An implementation that calls back into its context.
    #[error("nested call failed: {0}")]
    Dispatch(#[from] Box<DispatchError>),
}

impl From<DispatchError> for OpError {
    fn from(e: DispatchError) -> Self {
        OpError::Dispatch(Box::new(e))
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("operation '{name}' already has signature {signature} (registered from {existing_source})")]
    DuplicateSignature {
        name: String,
        signature: Signature,
        existing_source: String,
    },

    #[error("operation '{name}' takes {expected} operand(s); signature {signature} has {found}")]
    ArityMismatch {
        name: String,
        signature: Signature,
        expected: usize,
        found: usize,
    },

    #[error("operation '{name}' registered with an invalid signature: {source}")]
    InvalidSignature {
        name: String,
        #[source]
        source: CoreError,
    },

    #[error("operation '{name}' has no signature {signature}")]
    NotFound { name: String, signature: Signature },

    #[error("unknown operation '{0}'")]
    OperationNotFound(String),

    #[error("no implementation of '{name}' accepts ({arguments}); available: {}", .available.join(", "))]
    NoMatchingOperation {
        name: String,
        arguments: String,
        available: Vec<String>,
    },

    #[error("retry of '{name}' exhausted after {attempts} attempt(s): {reason}")]
    RetryExhausted {
        name: String,
        attempts: usize,
        reason: String,
        tried: Vec<String>,
    },

    #[error("retry of '{name}' could not convert operand {position}: {source}")]
    RepresentationConversion {
        name: String,
        position: usize,
        #[source]
        source: CoreError,
    },

    #[error("'{name}{signature}' failed: {source}")]
    Implementation {
        name: String,
        signature: Signature,
        #[source]
        source: OpError,
    },
}

impl DispatchError {
    /// The reason of a probe assertion failure, if this error (or a nested
    /// call inside it) is one.
    pub fn probe_failure(&self) -> Option<&str> {
        match self {
            DispatchError::Implementation { source, .. } => match source {
                OpError::ProbeAssertion { reason } => Some(reason),
                OpError::Dispatch(inner) => inner.probe_failure(),
                _ => None,
            },
            _ => None,
        }
    }
}
