//! Structured lifecycle events for oracle runs and gate evaluation.
//!
//! Every event carries an `event` field so JSON log consumers can filter
//! on it without parsing messages.

use tracing::{debug, info, warn};

/// RAII guard tagging everything inside one CLI invocation with its digest.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(command: &str, run_digest: &str) -> Self {
        let span = tracing::info_span!("mailparity.run", command = %command, run_digest = %run_digest);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_oracle_started(oracle: &str, files: usize) {
    info!(event = "oracle.started", oracle = %oracle, files = files);
}

pub fn emit_oracle_finished(oracle: &str, duration_ms: u64, rows: usize) {
    info!(
        event = "oracle.finished",
        oracle = %oracle,
        duration_ms = duration_ms,
        rows = rows,
    );
}

/// Oracle skipped because its installation root is absent.
pub fn emit_oracle_skipped(oracle: &str, reason: &str) {
    warn!(event = "oracle.skipped", oracle = %oracle, reason = %reason);
}

pub fn emit_oracle_failed(oracle: &str, error: &dyn std::fmt::Display) {
    warn!(event = "oracle.failed", oracle = %oracle, error = %error);
}

/// A protocol line that was not a recognised, complete row.
pub fn emit_line_skipped(oracle: &str, line_no: usize, reason: &str) {
    debug!(
        event = "protocol.line_skipped",
        oracle = %oracle,
        line_no = line_no,
        reason = %reason,
    );
}

pub fn emit_gate_evaluated(gate: &str, files: usize, violations: usize, passed: bool) {
    info!(
        event = "gate.evaluated",
        gate = %gate,
        files = files,
        violations = violations,
        passed = passed,
    );
}
