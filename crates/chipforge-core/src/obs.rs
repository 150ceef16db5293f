//! Structured observability hooks for design sessions and lifecycle events.
//!
//! This module provides:
//! - Session-scoped tracing spans via `SessionSpan` RAII guard
//! - Emission functions for key events: session start, iteration, finish, stage recorded
//!
//! Events are emitted at `info!` level; filter with `RUST_LOG`.

use tracing::info;

/// RAII guard that enters a session-scoped tracing span for the duration of
/// an optimization session.
///
/// # Example
///
/// ```ignore
/// let _span = SessionSpan::enter("7f1c...");
/// // every event below carries session_id
/// ```
pub struct SessionSpan {
    _span: tracing::span::EnteredSpan,
}

impl SessionSpan {
    pub fn enter(session_id: &str) -> Self {
        let span = tracing::info_span!("chipforge.session", session_id = %session_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: session started from an initial snapshot.
pub fn emit_session_started(session_id: &str, snapshot_id: &str, max_iterations: u32) {
    info!(
        event = "session.started",
        session_id = %session_id,
        snapshot_id = %snapshot_id,
        max_iterations = max_iterations,
    );
}

/// Emit event: one candidate analyzed and evaluated (debug level).
pub fn emit_iteration_evaluated(session_id: &str, iteration: u32, revision: u32, overall: f64, passed: bool) {
    tracing::debug!(
        event = "session.iteration",
        session_id = %session_id,
        iteration = iteration,
        revision = revision,
        overall = overall,
        passed = passed,
    );
}

/// Emit event: session finished with its outcome and best score.
pub fn emit_session_finished(session_id: &str, outcome: &str, iterations: u32, best_overall: f64) {
    info!(
        event = "session.finished",
        session_id = %session_id,
        outcome = %outcome,
        iterations = iterations,
        best_overall = best_overall,
    );
}

/// Emit event: session cancelled (warning level).
pub fn emit_session_cancelled(session_id: &str, iterations: u32) {
    tracing::warn!(event = "session.cancelled", session_id = %session_id, iterations = iterations);
}

/// Emit event: lifecycle stage entry appended.
pub fn emit_stage_recorded(chip_id: &str, stage: &str, seq: u64) {
    info!(event = "lifecycle.stage_recorded", chip_id = %chip_id, stage = %stage, seq = seq);
}

/// Emit event: lifecycle transition rejected (warning level).
pub fn emit_transition_rejected(chip_id: &str, current: &str, target: &str) {
    tracing::warn!(
        event = "lifecycle.transition_rejected",
        chip_id = %chip_id,
        current = %current,
        target = %target,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_span_create() {
        let _span = SessionSpan::enter("test-session");
        emit_stage_recorded("chip-a", "DESIGN", 1);
    }
}
