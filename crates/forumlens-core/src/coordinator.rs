//! Multi-round reduction of a weighted-item sequence into a fixed number of
//! categories through a size-constrained oracle.
//!
//! Each round chunks the working set, classifies every chunk independently
//! (concurrently, bounded by a semaphore), and concatenates the returned
//! categories in chunk order. When that combined set fits the budget a single
//! merge call produces the final result; otherwise the combined set becomes
//! the next round's input.
//!
//! Chunk-level parse failures are absorbed: the chunk contributes nothing and
//! the loss is recorded as a conservation violation. Transport failures and
//! timeouts abort the run, as does any failure of the merge call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::audit::{audit, audit_totals, AuditEntry, AuditReport, AuditStage, ConservationViolation};
use crate::chunker::chunk_with_meter;
use crate::config::PipelineConfig;
use crate::domain::{
    CategorizationRequest, CategorizationResult, Chunk, ItemKind, OracleError, OracleResult,
    Phase, PipelineError, Result, WeightedItem,
};
use crate::meter::{sequence_cost, TokenMeter};
use crate::metrics::METRICS;
use crate::obs::{self, ReductionSpan};
use crate::oracle::CategorizationOracle;

/// A completed reduction: the final categories plus every audit taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReductionOutcome {
    pub run_id: String,
    pub result: CategorizationResult,
    /// Chunk and merge audits in call order, then the end-to-end audit.
    pub audits: Vec<AuditEntry>,
    pub rounds: usize,
    pub oracle_calls: usize,
}

impl ReductionOutcome {
    /// Every audit entry that recorded drift.
    pub fn violations(&self) -> Vec<ConservationViolation> {
        self.audits.iter().filter_map(AuditEntry::violation).collect()
    }

    /// The end-to-end audit: original input against the final result.
    pub fn overall(&self) -> Option<&AuditReport> {
        self.audits
            .iter()
            .rev()
            .find(|entry| entry.stage == AuditStage::Pipeline)
            .map(|entry| &entry.report)
    }
}

/// Audit entries and call counts accumulated over one run.
struct RunLedger<'a> {
    run_id: &'a str,
    audits: Vec<AuditEntry>,
    oracle_calls: usize,
}

impl<'a> RunLedger<'a> {
    fn new(run_id: &'a str) -> Self {
        Self {
            run_id,
            audits: Vec::new(),
            oracle_calls: 0,
        }
    }

    fn count_call(&mut self) {
        self.oracle_calls += 1;
        METRICS.inc_oracle_calls();
    }

    fn record(&mut self, stage: AuditStage, report: AuditReport) {
        let entry = AuditEntry::new(stage, report);
        if entry.is_violation() {
            METRICS.inc_violations();
            obs::emit_conservation_violation(self.run_id, &entry);
        }
        self.audits.push(entry);
    }

    fn oracle_failure(
        &self,
        phase: Phase,
        round: usize,
        chunk: Option<usize>,
        error: &OracleError,
    ) {
        if error.is_parse() {
            METRICS.inc_parse_failures();
        } else {
            METRICS.inc_transport_failures();
        }
        obs::emit_oracle_failure(self.run_id, phase, round, chunk, error);
    }
}

/// Orchestrates chunk, classify, collect and merge rounds.
///
/// The oracle handle and token meter are injected; the coordinator holds no
/// other state and may run several reductions concurrently.
pub struct ReductionCoordinator {
    oracle: Arc<dyn CategorizationOracle>,
    meter: Arc<dyn TokenMeter>,
    config: PipelineConfig,
}

impl ReductionCoordinator {
    /// Fails with [`PipelineError::Configuration`] before any call when the
    /// configuration is invalid.
    pub fn new(
        oracle: Arc<dyn CategorizationOracle>,
        meter: Arc<dyn TokenMeter>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            oracle,
            meter,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Reduce `request.items` into `request.category_count` categories.
    ///
    /// Dropping the returned future aborts every in-flight oracle call.
    pub async fn reduce(&self, request: CategorizationRequest) -> Result<ReductionOutcome> {
        let span = ReductionSpan::new();
        let run_id = span.run_id().to_string();
        self.run(request, &run_id)
            .instrument(span.span().clone())
            .await
    }

    /// [`reduce`](Self::reduce), aborted with [`PipelineError::Cancelled`]
    /// as soon as `cancel` fires.
    pub async fn reduce_until_cancelled(
        &self,
        request: CategorizationRequest,
        cancel: &CancellationToken,
    ) -> Result<ReductionOutcome> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(event = "reduce.cancelled", "categorization cancelled by caller");
                Err(PipelineError::Cancelled)
            }
            outcome = self.reduce(request) => outcome,
        }
    }

    async fn run(&self, request: CategorizationRequest, run_id: &str) -> Result<ReductionOutcome> {
        if request.category_count == 0 {
            return Err(PipelineError::Configuration(
                "category_count must be greater than zero".to_string(),
            ));
        }

        let started = Instant::now();
        let budget = self.config.chunk_budget;
        let category_count = request.category_count;
        let input_total = request.total_weight();
        obs::emit_reduction_started(run_id, request.items.len(), input_total, category_count);

        let mut ledger = RunLedger::new(run_id);
        let mut working = request.items;
        let mut kind = request.item_kind;
        let mut round = 0usize;

        let result = if working.is_empty() {
            CategorizationResult::empty()
        } else {
            loop {
                round += 1;
                if round > self.config.max_rounds {
                    return Err(PipelineError::RoundLimitExceeded {
                        max_rounds: self.config.max_rounds,
                        remaining_cost: sequence_cost(&working, self.meter.as_ref()),
                        budget,
                    });
                }
                METRICS.inc_rounds();

                let chunks = chunk_with_meter(&working, budget, self.meter.as_ref())?;
                obs::emit_round_started(run_id, round, working.len(), chunks.len());

                let combined = self
                    .chunk_phase(round, kind, category_count, chunks, &mut ledger)
                    .await?;
                let combined_cost = sequence_cost(&combined, self.meter.as_ref());
                obs::emit_round_finished(run_id, round, combined.len(), combined_cost);

                if combined.is_empty() {
                    break CategorizationResult::empty();
                }
                if combined_cost <= budget {
                    break self
                        .merge_phase(round, combined, category_count, &mut ledger)
                        .await?;
                }
                working = combined;
                kind = ItemKind::Category;
            }
        };

        ledger.record(
            AuditStage::Pipeline,
            audit_totals(input_total, result.total_weight()),
        );
        let delta = ledger
            .audits
            .last()
            .map(|entry| entry.report.delta)
            .unwrap_or_default();
        obs::emit_reduction_finished(
            run_id,
            saturating_millis(started.elapsed()),
            round,
            ledger.oracle_calls,
            result.len(),
            delta,
        );

        Ok(ReductionOutcome {
            run_id: run_id.to_string(),
            result,
            audits: ledger.audits,
            rounds: round,
            oracle_calls: ledger.oracle_calls,
        })
    }

    /// Classify every chunk; return the concatenated categories in chunk order.
    async fn chunk_phase(
        &self,
        round: usize,
        kind: ItemKind,
        category_count: usize,
        chunks: Vec<Chunk>,
        ledger: &mut RunLedger<'_>,
    ) -> Result<Vec<WeightedItem>> {
        let chunk_count = chunks.len();
        let timeout = self.config.oracle_timeout;
        let semaphore = Arc::new(Semaphore::new(self.config.oracle_concurrency_limit));

        let mut join_set = JoinSet::new();
        for (idx, chunk) in chunks.into_iter().enumerate() {
            if chunk.is_oversized(self.config.chunk_budget) {
                tracing::warn!(
                    round,
                    chunk = idx,
                    cost = chunk.cost(),
                    budget = self.config.chunk_budget,
                    "single item exceeds chunk budget; sending it alone"
                );
            }
            let oracle = Arc::clone(&self.oracle);
            let semaphore = Arc::clone(&semaphore);
            let request = CategorizationRequest {
                items: chunk.into_items(),
                category_count,
                item_kind: kind,
            };
            join_set.spawn(
                async move {
                    let outcome = match semaphore.acquire_owned().await {
                        Ok(_permit) => call_oracle(oracle.as_ref(), &request, timeout).await,
                        Err(_) => Err(OracleError::transport("concurrency limiter closed")),
                    };
                    (idx, request.items, outcome)
                }
                .in_current_span(),
            );
        }

        let mut slots: Vec<Option<(Vec<WeightedItem>, OracleResult<CategorizationResult>)>> =
            (0..chunk_count).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (idx, items, outcome) = joined.map_err(|e| PipelineError::Oracle {
                phase: Phase::Chunk,
                round,
                source: OracleError::transport(format!("chunk task join error: {e}")),
            })?;
            ledger.count_call();

            if let Err(err) = &outcome {
                if err.is_transport() {
                    ledger.oracle_failure(Phase::Chunk, round, Some(idx), err);
                    // Dropping the join set aborts the chunks still in flight.
                    return Err(PipelineError::Oracle {
                        phase: Phase::Chunk,
                        round,
                        source: err.clone(),
                    });
                }
            }
            slots[idx] = Some((items, outcome));
        }

        let mut combined = Vec::new();
        for (idx, slot) in slots.into_iter().enumerate() {
            let (items, outcome) = slot.ok_or_else(|| PipelineError::Oracle {
                phase: Phase::Chunk,
                round,
                source: OracleError::transport(format!("missing result for chunk {idx}")),
            })?;
            match outcome {
                Ok(result) => {
                    ledger.record(
                        AuditStage::Chunk {
                            round,
                            chunk: idx,
                            dropped: false,
                        },
                        audit(&items, &result.categories),
                    );
                    combined.extend(result.categories);
                }
                Err(err) => {
                    ledger.oracle_failure(Phase::Chunk, round, Some(idx), &err);
                    ledger.record(
                        AuditStage::Chunk {
                            round,
                            chunk: idx,
                            dropped: true,
                        },
                        audit(&items, &[]),
                    );
                }
            }
        }
        Ok(combined)
    }

    async fn merge_phase(
        &self,
        round: usize,
        combined: Vec<WeightedItem>,
        category_count: usize,
        ledger: &mut RunLedger<'_>,
    ) -> Result<CategorizationResult> {
        let request = CategorizationRequest::categories(combined, category_count);
        ledger.count_call();

        match call_oracle(self.oracle.as_ref(), &request, self.config.oracle_timeout).await {
            Ok(result) => {
                ledger.record(
                    AuditStage::Merge { round },
                    audit(&request.items, &result.categories),
                );
                Ok(result)
            }
            Err(err) => {
                ledger.oracle_failure(Phase::Merge, round, None, &err);
                Err(PipelineError::Oracle {
                    phase: Phase::Merge,
                    round,
                    source: err,
                })
            }
        }
    }
}

/// One oracle call bounded by `timeout`; an elapsed deadline is a transport
/// failure.
fn saturating_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

async fn call_oracle(
    oracle: &dyn CategorizationOracle,
    request: &CategorizationRequest,
    timeout: Duration,
) -> OracleResult<CategorizationResult> {
    match tokio::time::timeout(timeout, oracle.categorize(request)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(OracleError::Timeout { after: timeout }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with one category per request holding the whole input weight.
    struct SingleBucket {
        seen: Mutex<Vec<CategorizationRequest>>,
    }

    #[async_trait]
    impl CategorizationOracle for SingleBucket {
        async fn categorize(
            &self,
            request: &CategorizationRequest,
        ) -> OracleResult<CategorizationResult> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(CategorizationResult::new(vec![WeightedItem::new(
                "Everything",
                request.total_weight(),
            )]))
        }
    }

    fn unit_meter() -> Arc<dyn TokenMeter> {
        Arc::new(|_: &WeightedItem| 1usize)
    }

    fn config(budget: usize) -> PipelineConfig {
        PipelineConfig::new(budget, 2, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_construction() {
        let oracle = Arc::new(SingleBucket {
            seen: Mutex::new(Vec::new()),
        });
        let result = ReductionCoordinator::new(oracle, unit_meter(), config(0));
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let oracle = Arc::new(SingleBucket {
            seen: Mutex::new(Vec::new()),
        });
        let coordinator =
            ReductionCoordinator::new(oracle.clone(), unit_meter(), config(3)).unwrap();

        let outcome = coordinator
            .reduce(CategorizationRequest::keywords(vec![], 2))
            .await
            .unwrap();

        assert!(outcome.result.is_empty());
        assert_eq!(outcome.oracle_calls, 0);
        assert_eq!(outcome.rounds, 0);
        assert!(outcome.overall().unwrap().is_conserved());
        assert!(oracle.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_category_count_is_configuration_error() {
        let oracle = Arc::new(SingleBucket {
            seen: Mutex::new(Vec::new()),
        });
        let coordinator = ReductionCoordinator::new(oracle, unit_meter(), config(3)).unwrap();
        let err = coordinator
            .reduce(CategorizationRequest::keywords(
                vec![WeightedItem::new("a", 1)],
                0,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_merge_request_uses_category_items() {
        let oracle = Arc::new(SingleBucket {
            seen: Mutex::new(Vec::new()),
        });
        let coordinator =
            ReductionCoordinator::new(oracle.clone(), unit_meter(), config(2)).unwrap();
        let items = vec![
            WeightedItem::new("a", 1),
            WeightedItem::new("b", 2),
            WeightedItem::new("c", 3),
        ];

        let outcome = coordinator
            .reduce(CategorizationRequest::keywords(items, 2))
            .await
            .unwrap();

        let seen = oracle.seen.lock().unwrap();
        // two chunk calls, then one merge call
        assert_eq!(seen.len(), 3);
        assert!(seen[..2].iter().all(|r| r.item_kind == ItemKind::Keyword));
        assert_eq!(seen[2].item_kind, ItemKind::Category);
        assert_eq!(seen[2].total_weight(), 6);
        assert_eq!(outcome.oracle_calls, 3);
        assert_eq!(outcome.result.total_weight(), 6);
    }

    #[test]
    fn test_elapsed_millis_saturate() {
        assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }
}
