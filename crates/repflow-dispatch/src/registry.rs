//! Operation registry: name → implementations in registration order.

use std::collections::BTreeMap;
use std::sync::Arc;

use repflow_core::signature::Signature;

use crate::error::DispatchError;
use crate::operation::Operation;

#[derive(Default, Clone)]
pub struct Registry {
    ops: BTreeMap<String, Vec<Arc<Operation>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an implementation. Fails if the name already carries an identical
    /// signature, or if the operand count disagrees with earlier registrations.
    pub fn register(&mut self, op: Operation) -> Result<(), DispatchError> {
        let entry = self.ops.entry(op.name.clone()).or_default();

        if let Some(first) = entry.first() {
            if first.signature.arity() != op.signature.arity() {
                return Err(DispatchError::ArityMismatch {
                    name: op.name,
                    expected: first.signature.arity(),
                    found: op.signature.arity(),
                    signature: op.signature,
                });
            }
        }

        if let Some(existing) = entry.iter().find(|e| e.signature == op.signature) {
            return Err(DispatchError::DuplicateSignature {
                existing_source: existing.source.clone(),
                name: op.name,
                signature: op.signature,
            });
        }

        entry.push(Arc::new(op));
        Ok(())
    }

    pub fn unregister(
        &mut self,
        name: &str,
        signature: &Signature,
    ) -> Result<Arc<Operation>, DispatchError> {
        let not_found = || DispatchError::NotFound {
            name: name.to_string(),
            signature: signature.clone(),
        };
        let entry = self.ops.get_mut(name).ok_or_else(not_found)?;
        let pos = entry
            .iter()
            .position(|e| &e.signature == signature)
            .ok_or_else(not_found)?;
        let removed = entry.remove(pos);
        if entry.is_empty() {
            self.ops.remove(name);
        }
        Ok(removed)
    }

    /// Implementations of `name` in registration order; empty if unknown.
    pub fn lookup(&self, name: &str) -> &[Arc<Operation>] {
        self.ops.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    pub fn signature_count(&self, name: &str) -> usize {
        self.lookup(name).len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ops.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Outcome;
    use repflow_core::types::Scalar;

    fn op(name: &str, sig: &[&str]) -> Operation {
        Operation::new(name, Signature::of(sig), |_, _, _| {
            Ok(Outcome::scalar(Scalar::Null))
        })
    }

    #[test]
    fn duplicate_signature_is_rejected_and_names_the_source() {
        let mut reg = Registry::new();
        reg.register(op("count", &["rows"]).from_source("rows_backend")).unwrap();
        let err = reg.register(op("count", &["rows"])).unwrap_err();
        match err {
            DispatchError::DuplicateSignature { existing_source, .. } => {
                assert_eq!(existing_source, "rows_backend")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(reg.signature_count("count"), 1);
    }

    #[test]
    fn arity_must_agree() {
        let mut reg = Registry::new();
        reg.register(op("join", &["rows", "rows"])).unwrap();
        assert!(matches!(
            reg.register(op("join", &["rows"])),
            Err(DispatchError::ArityMismatch { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn unregister_removes_and_reports_missing() {
        let mut reg = Registry::new();
        reg.register(op("count", &["rows"])).unwrap();
        reg.register(op("count", &["sql"])).unwrap();
        reg.unregister("count", &Signature::of(&["rows"])).unwrap();
        assert_eq!(reg.lookup("count").len(), 1);
        assert!(matches!(
            reg.unregister("count", &Signature::of(&["rows"])),
            Err(DispatchError::NotFound { .. })
        ));
        assert!(reg.lookup("nope").is_empty());
    }
}
