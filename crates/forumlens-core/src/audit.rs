//! Weight-conservation auditing.
//!
//! Every oracle call should conserve weight: the categories it returns must
//! sum to the weight of the items it was given. The auditor measures the
//! drift; it never alters a result.

use serde::{Deserialize, Serialize};

use crate::domain::{total_weight, Phase, WeightedItem};

/// Totals on both sides of one oracle call (or of the whole pipeline).
///
/// `delta = input_total - output_total`: positive when weight was lost,
/// negative when the oracle invented weight. Saturates at the `i64` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub input_total: u64,
    pub output_total: u64,
    pub delta: i64,
}

impl AuditReport {
    pub fn is_conserved(&self) -> bool {
        self.delta == 0
    }
}

/// Compare the total weight of `input` with that of `output`.
pub fn audit(input: &[WeightedItem], output: &[WeightedItem]) -> AuditReport {
    audit_totals(total_weight(input), total_weight(output))
}

pub fn audit_totals(input_total: u64, output_total: u64) -> AuditReport {
    AuditReport {
        input_total,
        output_total,
        delta: signed_delta(input_total, output_total),
    }
}

fn signed_delta(input_total: u64, output_total: u64) -> i64 {
    let delta = i128::from(input_total) - i128::from(output_total);
    i64::try_from(delta).unwrap_or(if delta > 0 { i64::MAX } else { i64::MIN })
}

/// Where in the pipeline an audit was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum AuditStage {
    /// One chunk-level call; `dropped` when its reply failed to parse.
    Chunk {
        round: usize,
        chunk: usize,
        dropped: bool,
    },
    /// The final call of the round whose combined set fit the budget.
    Merge { round: usize },
    /// Original input against the final result.
    Pipeline,
}

impl AuditStage {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            AuditStage::Chunk { .. } => Some(Phase::Chunk),
            AuditStage::Merge { .. } => Some(Phase::Merge),
            AuditStage::Pipeline => None,
        }
    }
}

/// An audit report tagged with the stage it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(flatten)]
    pub stage: AuditStage,
    #[serde(flatten)]
    pub report: AuditReport,
}

impl AuditEntry {
    pub fn new(stage: AuditStage, report: AuditReport) -> Self {
        Self { stage, report }
    }

    pub fn is_violation(&self) -> bool {
        !self.report.is_conserved()
    }

    /// `Some` when this entry records drift.
    pub fn violation(&self) -> Option<ConservationViolation> {
        self.is_violation()
            .then(|| ConservationViolation { entry: *self })
    }
}

/// A non-fatal conservation failure, logged with its numeric delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error(
    "weight not conserved at {:?}: input {}, output {}, delta {}",
    .entry.stage,
    .entry.report.input_total,
    .entry.report.output_total,
    .entry.report.delta
)]
pub struct ConservationViolation {
    pub entry: AuditEntry,
}
