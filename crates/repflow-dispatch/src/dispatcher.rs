//! Resolution and invocation.
//!
//! Matching: requirement `i` is satisfied by operand `i` when the operand is an
//! object exposing the tag (non-repeated) or a list whose members all expose it
//! (repeated). `*` matches any operand of the right shape; a non-repeated `*`
//! also accepts scalars and lists. The operand count must equal the arity.
//!
//! Scoring: the satisfying candidate with the most non-wildcard requirements
//! wins; ties go to the earliest registration.
//!
//! Retry: an implementation may answer `Outcome::Retry`. The policy is checked,
//! operands lacking every requested tag are converted, the failed candidate is
//! excluded and resolution runs again. Attempts never exceed the number of
//! registered signatures for the name.

use std::sync::Arc;

use repflow_core::object::{ObjectRef, Value};
use repflow_core::signature::Signature;
use repflow_core::tag::Tag;
use repflow_core::types::Params;

use crate::context::OperationContext;
use crate::error::DispatchError;
use crate::observer::ContextObserver;
use crate::operation::{Operation, Outcome, RetryRequest};
use crate::policy::RetryPolicy;
use crate::registry::Registry;

/// Does `signature` accept `operands`?
pub fn signature_matches(signature: &Signature, operands: &[Value]) -> bool {
    if signature.arity() != operands.len() {
        return false;
    }
    signature
        .requirements()
        .iter()
        .zip(operands)
        .all(|(req, operand)| match (req.repeated, operand) {
            (false, _) if req.is_wildcard() => true,
            (false, Value::Object(obj)) => obj.has_tag(req.tag),
            (true, Value::Objects(list)) => list.iter().all(|o| o.has_tag(req.tag)),
            _ => false,
        })
}

/// Borrowed view of a context's dispatch state.
pub struct Dispatcher<'a> {
    registry: &'a Registry,
    policy: &'a RetryPolicy,
    observer: &'a dyn ContextObserver,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        registry: &'a Registry,
        policy: &'a RetryPolicy,
        observer: &'a dyn ContextObserver,
    ) -> Self {
        Self {
            registry,
            policy,
            observer,
        }
    }

    /// Pick the implementation that would run first for these operands.
    pub fn resolve(&self, name: &str, operands: &[Value]) -> Result<Arc<Operation>, DispatchError> {
        let candidates = self.registry.lookup(name);
        if candidates.is_empty() {
            return Err(DispatchError::OperationNotFound(name.to_string()));
        }
        match select(candidates, operands, &[]) {
            Some(i) => Ok(Arc::clone(&candidates[i])),
            None => Err(no_match(name, candidates, operands)),
        }
    }

    pub fn dispatch(
        &self,
        ctx: &OperationContext,
        name: &str,
        operands: &[Value],
        params: &Params,
    ) -> Result<Value, DispatchError> {
        let candidates = self.registry.lookup(name);
        if candidates.is_empty() {
            return Err(DispatchError::OperationNotFound(name.to_string()));
        }
        tracing::debug!(op = name, operands = operands.len(), "dispatching");

        let limit = candidates.len();
        let mut operands: Vec<Value> = operands.to_vec();
        let mut excluded: Vec<usize> = Vec::new();
        let mut tried: Vec<String> = Vec::new();
        let mut last_reason = String::new();
        let mut warned = false;

        loop {
            let Some(idx) = select(candidates, &operands, &excluded) else {
                if excluded.is_empty() {
                    return Err(no_match(name, candidates, &operands));
                }
                return Err(DispatchError::RetryExhausted {
                    name: name.to_string(),
                    attempts: excluded.len(),
                    reason: format!("no remaining implementation matches after: {last_reason}"),
                    tried,
                });
            };
            let op = &candidates[idx];

            if op.experimental && !warned {
                tracing::warn!(op = name, signature = %op.signature, "operation is experimental");
                self.observer.experimental(name, &op.signature);
                warned = true;
            }

            self.observer.will_call(name, &op.signature);
            let outcome = op
                .implementation
                .call(ctx, &operands, params)
                .map_err(|source| DispatchError::Implementation {
                    name: name.to_string(),
                    signature: op.signature.clone(),
                    source,
                })?;

            match outcome {
                Outcome::Done(value) => {
                    self.observer.did_call(name, &op.signature, excluded.len());
                    return Ok(value);
                }
                Outcome::Retry(request) => {
                    self.observer.will_retry(name, &op.signature, &request.reason);
                    excluded.push(idx);
                    tried.push(op.signature.to_string());

                    if let Err(reason) = self.policy.check(name, &request) {
                        return Err(DispatchError::RetryExhausted {
                            name: name.to_string(),
                            attempts: excluded.len(),
                            reason,
                            tried,
                        });
                    }
                    if excluded.len() >= limit {
                        return Err(DispatchError::RetryExhausted {
                            name: name.to_string(),
                            attempts: excluded.len(),
                            reason: request.reason,
                            tried,
                        });
                    }

                    coerce(name, &mut operands, &request)?;
                    tracing::debug!(
                        op = name,
                        attempt = excluded.len(),
                        tags = ?request.tags,
                        reason = %request.reason,
                        "retrying with converted operands"
                    );
                    last_reason = request.reason;
                }
            }
        }
    }
}

fn select(candidates: &[Arc<Operation>], operands: &[Value], excluded: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, op) in candidates.iter().enumerate() {
        if excluded.contains(&i) || !signature_matches(&op.signature, operands) {
            continue;
        }
        let score = op.signature.specificity();
        // strict `>` keeps the earliest registration on ties
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

fn no_match(name: &str, candidates: &[Arc<Operation>], operands: &[Value]) -> DispatchError {
    DispatchError::NoMatchingOperation {
        name: name.to_string(),
        arguments: operands
            .iter()
            .map(Value::describe)
            .collect::<Vec<_>>()
            .join(", "),
        available: candidates.iter().map(|c| c.signature.to_string()).collect(),
    }
}

/// Convert every object operand that exposes none of the requested tags.
fn coerce(name: &str, operands: &mut [Value], request: &RetryRequest) -> Result<(), DispatchError> {
    let wanted: Vec<Tag> = request.tags.iter().copied().filter(|t| !t.is_any()).collect();
    if wanted.is_empty() {
        return Ok(());
    }
    for (position, operand) in operands.iter_mut().enumerate() {
        let converted = match operand {
            Value::Object(obj) => Value::Object(convert_one(name, position, obj, &wanted)?),
            Value::Objects(list) => Value::Objects(
                list.iter()
                    .map(|o| convert_one(name, position, o, &wanted))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Scalar(_) => continue,
        };
        *operand = converted;
    }
    Ok(())
}

fn convert_one(
    name: &str,
    position: usize,
    obj: &ObjectRef,
    wanted: &[Tag],
) -> Result<ObjectRef, DispatchError> {
    if wanted.iter().any(|t| obj.has_tag(*t)) {
        return Ok(Arc::clone(obj));
    }
    let mut last_err = None;
    for tag in wanted {
        match obj.convert_to(*tag) {
            Ok(converted) => return Ok(converted),
            Err(e) => last_err = Some(e),
        }
    }
    // `wanted` is non-empty, so at least one error was recorded
    let source = last_err.unwrap_or_else(|| repflow_core::error::Error::Invariant(
        "conversion attempted with no target tags".into(),
    ));
    Err(DispatchError::RepresentationConversion {
        name: name.to_string(),
        position,
        source,
    })
}
