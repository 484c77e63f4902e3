//! End-to-end operations over a [`ForumStore`]: keyword extraction for
//! stored submissions and categorization of the stored keyword tally.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use forumlens_state::ForumStore;

use crate::coordinator::{ReductionCoordinator, ReductionOutcome};
use crate::domain::{
    CategorizationRequest, OracleError, OracleResult, PipelineError, Result, WeightedItem,
};
use crate::oracle::{KeywordExtractor, KeywordsAndTopic};

/// Categorize the stored keyword weights and replace the category table.
///
/// The category table is only touched when the reduction succeeds.
pub async fn categorize_stored_keywords(
    store: &dyn ForumStore,
    coordinator: &ReductionCoordinator,
    cancel: &CancellationToken,
) -> Result<ReductionOutcome> {
    let items: Vec<WeightedItem> = store
        .keyword_weights()
        .await?
        .into_iter()
        .map(WeightedItem::from)
        .collect();
    tracing::info!(keywords = items.len(), "categorizing stored keyword weights");

    let request = CategorizationRequest::keywords(items, coordinator.config().category_count);
    let outcome = coordinator.reduce_until_cancelled(request, cancel).await?;

    store
        .replace_category_weights(&outcome.result.clone().into_records())
        .await?;
    Ok(outcome)
}

/// Per-submission results of an extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    pub updated: Vec<String>,
    /// Submissions skipped because they already carry keywords.
    pub skipped: Vec<String>,
    /// Submissions for which the service found nothing to extract.
    pub declined: Vec<String>,
    /// Submissions whose reply failed validation, with the reason.
    pub rejected: Vec<(String, String)>,
}

/// Extract keywords and a topic for every stored submission lacking keywords
/// (or for all of them when `force` is set).
///
/// Invalid replies are recorded and skipped; a transport failure, or a call
/// outliving `timeout`, aborts the pass with the submissions processed so far
/// already written.
pub async fn extract_missing_keywords(
    store: &dyn ForumStore,
    extractor: &dyn KeywordExtractor,
    force: bool,
    timeout: Duration,
) -> Result<ExtractionReport> {
    if timeout.is_zero() {
        return Err(PipelineError::Configuration(
            "extraction timeout must be greater than zero".to_string(),
        ));
    }
    let mut report = ExtractionReport::default();

    for submission in store.list_submissions().await? {
        if !force && !submission.keywords.is_empty() {
            report.skipped.push(submission.post_id);
            continue;
        }

        let outcome =
            extract_with_timeout(extractor, &submission.title, &submission.body, timeout).await;
        match outcome {
            Ok(Some(extracted)) => {
                store
                    .update_keywords_and_topic(
                        &submission.post_id,
                        &extracted.keywords,
                        Some(&extracted.topic),
                    )
                    .await?;
                tracing::debug!(post_id = %submission.post_id, topic = %extracted.topic, "keywords extracted");
                report.updated.push(submission.post_id);
            }
            Ok(None) => {
                tracing::debug!(post_id = %submission.post_id, "nothing to extract");
                report.declined.push(submission.post_id);
            }
            Err(err) if err.is_parse() => {
                tracing::warn!(post_id = %submission.post_id, error = %err, "rejected extraction reply");
                report.rejected.push((submission.post_id, err.to_string()));
            }
            Err(err) => {
                return Err(PipelineError::Extraction {
                    post_id: submission.post_id,
                    source: err,
                });
            }
        }
    }

    tracing::info!(
        updated = report.updated.len(),
        skipped = report.skipped.len(),
        declined = report.declined.len(),
        rejected = report.rejected.len(),
        "keyword extraction finished"
    );
    Ok(report)
}

async fn extract_with_timeout(
    extractor: &dyn KeywordExtractor,
    title: &str,
    body: &str,
    timeout: Duration,
) -> OracleResult<Option<KeywordsAndTopic>> {
    match tokio::time::timeout(timeout, extractor.extract(title, body)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(OracleError::Timeout { after: timeout }),
    }
}
