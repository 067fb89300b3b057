//! Operation context.
//!
//! A context owns the registry, the retry policy and the observer. Callers
//! normally build one explicitly and pass it by reference. For code that wants
//! an ambient context there is a per-thread default: it is created lazily on
//! first use by the factory installed with `install_default_factory`, or from
//! `ContextConfig::from_env()` when no factory was installed. Each thread gets
//! its own instance; nothing is shared across threads.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use repflow_core::config::ContextConfig;
use repflow_core::object::Value;
use repflow_core::signature::Signature;
use repflow_core::types::Params;

use crate::catalogue::{CatalogueEntry, CatalogueImplementation};
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, OpError};
use crate::observer::{ContextObserver, LoggingObserver};
use crate::operation::{Operation, Outcome};
use crate::policy::RetryPolicy;
use crate::registry::Registry;

pub struct OperationContext {
    registry: Registry,
    policy: RetryPolicy,
    observer: Arc<dyn ContextObserver>,
    config: ContextConfig,
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::with_config(ContextConfig::default())
    }
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            registry: Registry::new(),
            policy: RetryPolicy::from_config(&config),
            observer: Arc::new(LoggingObserver),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::with_config(ContextConfig::from_env())
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Replace the configuration; the retry policy is rebuilt from it.
    pub fn set_config(&mut self, config: ContextConfig) {
        self.policy = RetryPolicy::from_config(&config);
        self.config = config;
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    pub fn observer(&self) -> &Arc<dyn ContextObserver> {
        &self.observer
    }

    pub fn set_observer(&mut self, observer: Arc<dyn ContextObserver>) {
        self.observer = observer;
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn register(&mut self, op: Operation) -> Result<(), DispatchError> {
        tracing::trace!(op = %op.name, signature = %op.signature, source = %op.source, "registering");
        self.registry.register(op)
    }

    /// Register a closure under `name` for the signature written as e.g. `"rows, sql[]"`.
    pub fn add_operation<F>(&mut self, name: &str, signature: &str, f: F) -> Result<(), DispatchError>
    where
        F: Fn(&OperationContext, &[Value], &Params) -> Result<Outcome, OpError>
            + Send
            + Sync
            + 'static,
    {
        let signature =
            Signature::parse(signature).map_err(|source| DispatchError::InvalidSignature {
                name: name.to_string(),
                source,
            })?;
        self.register(Operation::new(name, signature, f))
    }

    pub fn unregister(&mut self, name: &str, signature: &Signature) -> Result<(), DispatchError> {
        self.registry.unregister(name, signature).map(|_| ())
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(&self.registry, &self.policy, self.observer.as_ref())
    }

    /// Resolve and run `name` against `operands`.
    pub fn call(&self, name: &str, operands: &[Value], params: &Params) -> Result<Value, DispatchError> {
        self.dispatcher().dispatch(self, name, operands, params)
    }

    /// The implementation that would be selected first, without running it.
    pub fn resolve(&self, name: &str, operands: &[Value]) -> Result<Arc<Operation>, DispatchError> {
        self.dispatcher().resolve(name, operands)
    }

    /// Registered operations sorted by name.
    pub fn catalogue(&self) -> Vec<CatalogueEntry> {
        self.registry
            .names()
            .map(|name| CatalogueEntry {
                name: name.to_string(),
                implementations: self
                    .registry
                    .lookup(name)
                    .iter()
                    .map(|op| CatalogueImplementation::from_operation(op))
                    .collect(),
            })
            .collect()
    }

    pub fn catalogue_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.catalogue())
    }
}

static DEFAULT_FACTORY: OnceCell<fn() -> OperationContext> = OnceCell::new();

thread_local! {
    static DEFAULT_CONTEXT: RefCell<Option<Rc<OperationContext>>> = const { RefCell::new(None) };
}

/// Install the process-wide factory used to build each thread's default
/// context. Returns false if a factory was already installed.
pub fn install_default_factory(factory: fn() -> OperationContext) -> bool {
    DEFAULT_FACTORY.set(factory).is_ok()
}

/// Run `f` with this thread's default context, creating it on first use.
pub fn with_default_context<R>(f: impl FnOnce(&OperationContext) -> R) -> R {
    let existing = DEFAULT_CONTEXT.with(|slot| slot.borrow().clone());
    let ctx = match existing {
        Some(ctx) => ctx,
        None => {
            // built outside the borrow so a factory may itself touch the default
            let built = Rc::new(match DEFAULT_FACTORY.get() {
                Some(factory) => factory(),
                None => OperationContext::from_env(),
            });
            tracing::debug!("created default operation context for this thread");
            DEFAULT_CONTEXT.with(|slot| {
                slot.borrow_mut().get_or_insert_with(|| Rc::clone(&built)).clone()
            })
        }
    };
    f(&ctx)
}

/// Drop this thread's default context; the next access rebuilds it.
pub fn reset_default_context() {
    DEFAULT_CONTEXT.with(|slot| {
        slot.borrow_mut().take();
    });
}
