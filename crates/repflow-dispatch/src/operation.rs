//! Operations and the implementation interface.
//!
//! An implementation receives its context, the operands (objects, object lists
//! or scalars, positionally matching the signature) and the keyword params. It
//! either finishes with a value or asks the dispatcher to retry the call with
//! operands in another representation.

use std::fmt;
use std::sync::Arc;

use repflow_core::object::{ObjectRef, Value};
use repflow_core::signature::Signature;
use repflow_core::tag::Tag;
use repflow_core::types::{Params, Scalar};

use crate::context::OperationContext;
use crate::error::OpError;

/// Result of one implementation call.
#[derive(Debug, Clone)]
pub enum Outcome {
    Done(Value),
    Retry(RetryRequest),
}

/// "I cannot handle these operands; try again with one of these tags."
#[derive(Debug, Clone)]
pub struct RetryRequest {
    pub tags: Vec<Tag>,
    pub reason: String,
}

impl Outcome {
    pub fn object(obj: ObjectRef) -> Self {
        Outcome::Done(Value::Object(obj))
    }

    pub fn scalar(s: Scalar) -> Self {
        Outcome::Done(Value::Scalar(s))
    }

    pub fn retry(tags: &[&str], reason: impl Into<String>) -> Self {
        Outcome::Retry(RetryRequest {
            tags: tags.iter().map(|t| Tag::new(t)).collect(),
            reason: reason.into(),
        })
    }
}

pub trait Implementation: Send + Sync + 'static {
    fn call(
        &self,
        ctx: &OperationContext,
        operands: &[Value],
        params: &Params,
    ) -> Result<Outcome, OpError>;
}

impl<F> Implementation for F
where
    F: Fn(&OperationContext, &[Value], &Params) -> Result<Outcome, OpError> + Send + Sync + 'static,
{
    fn call(
        &self,
        ctx: &OperationContext,
        operands: &[Value],
        params: &Params,
    ) -> Result<Outcome, OpError> {
        self(ctx, operands, params)
    }
}

/// One registered implementation of a named operation.
#[derive(Clone)]
pub struct Operation {
    pub name: String,
    pub signature: Signature,
    pub implementation: Arc<dyn Implementation>,
    pub experimental: bool,
    /// Where the implementation came from (module/backend), for conflict diagnostics.
    pub source: String,
}

impl Operation {
    /// Register a closure as the implementation.
    pub fn new<F>(name: impl Into<String>, signature: Signature, f: F) -> Self
    where
        F: Fn(&OperationContext, &[Value], &Params) -> Result<Outcome, OpError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_implementation(name, signature, Arc::new(f))
    }

    pub fn with_implementation(
        name: impl Into<String>,
        signature: Signature,
        implementation: Arc<dyn Implementation>,
    ) -> Self {
        Self {
            name: name.into(),
            signature,
            implementation,
            experimental: false,
            source: "unknown".to_string(),
        }
    }

    pub fn experimental(mut self) -> Self {
        self.experimental = true;
        self
    }

    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("signature", &self.signature.to_string())
            .field("experimental", &self.experimental)
            .field("source", &self.source)
            .finish()
    }
}

/// The object operand at `index`, for implementations with non-repeated requirements.
pub fn operand_object(operands: &[Value], index: usize) -> Result<&ObjectRef, OpError> {
    operands
        .get(index)
        .and_then(Value::as_object)
        .ok_or_else(|| OpError::Argument(format!("operand {index} is not an object")))
}

/// The object list operand at `index`, for repeated requirements.
pub fn operand_objects(operands: &[Value], index: usize) -> Result<&[ObjectRef], OpError> {
    operands
        .get(index)
        .and_then(Value::as_objects)
        .ok_or_else(|| OpError::Argument(format!("operand {index} is not an object list")))
}

pub fn param_str<'a>(params: &'a Params, key: &str) -> Result<&'a str, OpError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| OpError::Argument(format!("missing string parameter '{key}'")))
}

/// A list-of-strings parameter; a single string is accepted as a one-element list.
pub fn param_str_list(params: &Params, key: &str) -> Result<Vec<String>, OpError> {
    match params.get(key) {
        Some(serde_json::Value::String(s)) => Ok(vec![s.clone()]),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| OpError::Argument(format!("parameter '{key}' must list strings")))
            })
            .collect(),
        Some(_) => Err(OpError::Argument(format!("parameter '{key}' must list strings"))),
        None => Err(OpError::Argument(format!("missing parameter '{key}'"))),
    }
}
