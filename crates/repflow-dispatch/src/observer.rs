//! Hooks around dispatch.
//!
//! The dispatcher reports every call, retry and completion to the context's
//! observer. `LoggingObserver` forwards to `tracing`; `CollectingObserver`
//! keeps an in-memory history, mostly for tests and the CLI.

use std::sync::Mutex;

use serde::Serialize;

use repflow_core::signature::Signature;

pub trait ContextObserver: Send + Sync {
    fn will_call(&self, _op: &str, _signature: &Signature) {}

    fn will_retry(&self, _op: &str, _signature: &Signature, _reason: &str) {}

    fn did_call(&self, _op: &str, _signature: &Signature, _retries: usize) {}

    /// An experimental implementation was selected.
    fn experimental(&self, _op: &str, _signature: &Signature) {}
}

#[derive(Debug, Default)]
pub struct LoggingObserver;

impl ContextObserver for LoggingObserver {
    fn will_call(&self, op: &str, signature: &Signature) {
        tracing::debug!(op, signature = %signature, "calling operation");
    }

    fn will_retry(&self, op: &str, signature: &Signature, reason: &str) {
        tracing::debug!(op, signature = %signature, reason, "operation requested retry");
    }

    fn did_call(&self, op: &str, signature: &Signature, retries: usize) {
        tracing::info!(op, signature = %signature, retries, "operation finished");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ObserverEvent {
    WillCall { op: String, signature: String },
    WillRetry { op: String, signature: String, reason: String },
    DidCall { op: String, signature: String, retries: usize },
    Experimental { op: String, signature: String },
}

#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObserverEvent> {
        self.lock().clone()
    }

    /// Completed calls as `(op, signature, retries)`.
    pub fn calls(&self) -> Vec<(String, String, usize)> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::DidCall { op, signature, retries } => {
                    Some((op.clone(), signature.clone(), *retries))
                }
                _ => None,
            })
            .collect()
    }

    pub fn experimental_count(&self, op: &str) -> usize {
        self.lock()
            .iter()
            .filter(|e| matches!(e, ObserverEvent::Experimental { op: o, .. } if o == op))
            .count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ObserverEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, event: ObserverEvent) {
        self.lock().push(event);
    }
}

impl ContextObserver for CollectingObserver {
    fn will_call(&self, op: &str, signature: &Signature) {
        self.push(ObserverEvent::WillCall {
            op: op.to_string(),
            signature: signature.to_string(),
        });
    }

    fn will_retry(&self, op: &str, signature: &Signature, reason: &str) {
        self.push(ObserverEvent::WillRetry {
            op: op.to_string(),
            signature: signature.to_string(),
            reason: reason.to_string(),
        });
    }

    fn did_call(&self, op: &str, signature: &Signature, retries: usize) {
        self.push(ObserverEvent::DidCall {
            op: op.to_string(),
            signature: signature.to_string(),
            retries,
        });
    }

    fn experimental(&self, op: &str, signature: &Signature) {
        self.push(ObserverEvent::Experimental {
            op: op.to_string(),
            signature: signature.to_string(),
        });
    }
}
