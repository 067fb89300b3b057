//! Context configuration that downstream crates can serialize/deserialize.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How the engine treats a single-pass object that feeds more than one edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumptionPolicy {
    /// A second read of a non-retained object is an error.
    #[default]
    Strict,
    /// Fan-out outputs are materialized with `to_retained()` before the first read.
    Retain,
}

impl FromStr for ConsumptionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ConsumptionPolicy::Strict),
            "retain" => Ok(ConsumptionPolicy::Retain),
            other => Err(Error::Config(format!(
                "unknown consumption policy '{other}' (expected strict or retain)"
            ))),
        }
    }
}

impl fmt::Display for ConsumptionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumptionPolicy::Strict => f.write_str("strict"),
            ConsumptionPolicy::Retain => f.write_str("retain"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Operations allowed to retry. Empty means every operation may retry.
    pub retry_allow: Vec<String>,

    /// Operations never allowed to retry. Wins over `retry_allow`.
    pub retry_deny: Vec<String>,

    /// Representations a retry may never request.
    pub retry_deny_tags: Vec<String>,

    pub consumption: ConsumptionPolicy,
}

impl ContextConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `REPFLOW_RETRY_ALLOW`: comma-separated operation names
    /// - `REPFLOW_RETRY_DENY`: comma-separated operation names
    /// - `REPFLOW_RETRY_DENY_TAGS`: comma-separated representation tags
    /// - `REPFLOW_CONSUMPTION`: `strict` or `retain`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("REPFLOW_RETRY_ALLOW") {
            cfg.retry_allow = split_list(&s);
        }

        if let Ok(s) = std::env::var("REPFLOW_RETRY_DENY") {
            cfg.retry_deny = split_list(&s);
        }

        if let Ok(s) = std::env::var("REPFLOW_RETRY_DENY_TAGS") {
            cfg.retry_deny_tags = split_list(&s);
        }

        if let Ok(s) = std::env::var("REPFLOW_CONSUMPTION") {
            if let Ok(v) = s.parse::<ConsumptionPolicy>() {
                cfg.consumption = v;
            }
        }

        cfg
    }
}

/// Split `"a, b,,c"` into `["a", "b", "c"]`.
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
