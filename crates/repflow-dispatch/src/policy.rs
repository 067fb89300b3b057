//! Retry allow/deny policy.

use std::collections::BTreeSet;

use repflow_core::config::ContextConfig;
use repflow_core::tag::Tag;

use crate::operation::RetryRequest;

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    allow: BTreeSet<String>,
    deny: BTreeSet<String>,
    deny_tags: BTreeSet<Tag>,
}

impl RetryPolicy {
    pub fn from_config(cfg: &ContextConfig) -> Self {
        Self {
            allow: cfg.retry_allow.iter().cloned().collect(),
            deny: cfg.retry_deny.iter().cloned().collect(),
            deny_tags: cfg.retry_deny_tags.iter().map(|t| Tag::new(t)).collect(),
        }
    }

    pub fn allow(mut self, op: impl Into<String>) -> Self {
        self.allow.insert(op.into());
        self
    }

    pub fn deny(mut self, op: impl Into<String>) -> Self {
        self.deny.insert(op.into());
        self
    }

    pub fn deny_tag(mut self, tag: &str) -> Self {
        self.deny_tags.insert(Tag::new(tag));
        self
    }

    /// Deny list wins; a non-empty allow list admits only its members.
    pub fn can_retry(&self, op: &str) -> bool {
        if self.deny.contains(op) {
            return false;
        }
        self.allow.is_empty() || self.allow.contains(op)
    }

    /// `Err(why)` when the request may not proceed.
    pub fn check(&self, op: &str, request: &RetryRequest) -> Result<(), String> {
        if !self.can_retry(op) {
            return Err(format!("retry of '{op}' is not allowed by policy ({})", request.reason));
        }
        if let Some(tag) = request.tags.iter().find(|t| self.deny_tags.contains(*t)) {
            return Err(format!(
                "retry of '{op}' requested denied representation '{tag}' ({})",
                request.reason
            ));
        }
        Ok(())
    }
}
