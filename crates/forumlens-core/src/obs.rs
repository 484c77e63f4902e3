//! Structured lifecycle events for reduction runs.
//!
//! A [`ReductionSpan`] tags everything logged during one run with its id;
//! the `emit_*` helpers log the milestones with an `event` field so they can
//! be filtered in JSON output.

use tracing::{info, warn};

use crate::audit::AuditEntry;
use crate::domain::{OracleError, Phase};

/// Run-scoped span carrying the id of one reduction.
///
/// The span is not entered here: the coordinator attaches it to the run's
/// future with `Instrument`, so it stays correct across `.await` points.
#[derive(Debug, Clone)]
pub struct ReductionSpan {
    run_id: String,
    span: tracing::Span,
}

impl ReductionSpan {
    /// A fresh span with a random (v4) run id.
    pub fn new() -> Self {
        Self::with_run_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_run_id(run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        let span = tracing::info_span!("forumlens.reduce", run_id = %run_id);
        Self { run_id, span }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

impl Default for ReductionSpan {
    fn default() -> Self {
        Self::new()
    }
}

pub fn emit_reduction_started(run_id: &str, items: usize, input_total: u64, category_count: usize) {
    info!(
        event = "reduce.started",
        run_id = %run_id,
        items,
        input_total,
        category_count,
    );
}

pub fn emit_round_started(run_id: &str, round: usize, items: usize, chunks: usize) {
    info!(event = "round.started", run_id = %run_id, round, items, chunks);
}

pub fn emit_round_finished(run_id: &str, round: usize, combined: usize, combined_cost: usize) {
    info!(
        event = "round.finished",
        run_id = %run_id,
        round,
        combined,
        combined_cost,
    );
}

/// An oracle call failed (warning level).
pub fn emit_oracle_failure(
    run_id: &str,
    phase: Phase,
    round: usize,
    chunk: Option<usize>,
    error: &OracleError,
) {
    warn!(
        event = "oracle.failed",
        run_id = %run_id,
        phase = %phase,
        round,
        chunk = ?chunk,
        error = %error,
    );
}

/// Weight was not conserved (warning level).
pub fn emit_conservation_violation(run_id: &str, entry: &AuditEntry) {
    warn!(
        event = "conservation.violation",
        run_id = %run_id,
        stage = ?entry.stage,
        input_total = entry.report.input_total,
        output_total = entry.report.output_total,
        delta = entry.report.delta,
    );
}

pub fn emit_reduction_finished(
    run_id: &str,
    duration_ms: u64,
    rounds: usize,
    oracle_calls: usize,
    categories: usize,
    delta: i64,
) {
    info!(
        event = "reduce.finished",
        run_id = %run_id,
        duration_ms,
        rounds,
        oracle_calls,
        categories,
        delta,
    );
}
