//! Per-run counters, reported through `tracing`.
//!
//! No exporter lives here; wire a subscriber in the binary layer.

use serde::Serialize;

pub fn emit_span(event: &str, key_values: &[(&str, String)]) {
    let span = tracing::trace_span!("repflow", event);
    let _entered = span.enter();
    for (k, v) in key_values {
        tracing::trace!(%event, key = %k, value = %v, "metric");
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub nodes_executed: usize,
    pub sources: usize,
    pub dispatched: usize,
    /// Outputs materialized because they fed more than one edge.
    pub retained_for_fanout: usize,
}

impl RunStats {
    pub fn emit(&self, event: &str) {
        emit_span(
            event,
            &[
                ("nodes_executed", self.nodes_executed.to_string()),
                ("sources", self.sources.to_string()),
                ("dispatched", self.dispatched.to_string()),
                ("retained_for_fanout", self.retained_for_fanout.to_string()),
            ],
        );
    }
}
