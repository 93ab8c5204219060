//! Metrics sink interface.
//!
//! The orchestration subsystem does not implement metrics export itself; it
//! emits per-call events through this narrow trait and the hosting process
//! decides where they go. The default sink drops everything.

use crate::routing::TaskClassification;

/// Consumer of per-call telemetry events.
pub trait MetricsSink: Send + Sync {
    /// Records one provider invocation.
    fn record_call(
        &self,
        provider: &str,
        classification: TaskClassification,
        latency_ms: u64,
        success: bool,
    );
}

/// A sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_call(
        &self,
        _provider: &str,
        _classification: TaskClassification,
        _latency_ms: u64,
        _success: bool,
    ) {
    }
}
