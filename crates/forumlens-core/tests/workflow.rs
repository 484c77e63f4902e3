//! Store-backed extraction and categorization.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forumlens_core::{
    categorize_stored_keywords, extract_missing_keywords, CategorizationOracle,
    CategorizationRequest, CategorizationResult, CharRatioMeter, KeywordExtractor,
    KeywordsAndTopic, OracleError, OracleResult, PipelineConfig, PipelineError,
    ReductionCoordinator, WeightedItem,
};
use forumlens_state::fakes::MemoryForumStore;
use forumlens_state::{CategoryWeightRecord, ForumStore, SubmissionRecord};
use tokio_util::sync::CancellationToken;

/// Collapses everything into one "Everything" category.
struct OneCategory;

#[async_trait]
impl CategorizationOracle for OneCategory {
    async fn categorize(
        &self,
        request: &CategorizationRequest,
    ) -> OracleResult<CategorizationResult> {
        Ok(CategorizationResult::new(vec![WeightedItem::new(
            "Everything",
            request.total_weight(),
        )]))
    }
}

struct Unreachable;

#[async_trait]
impl CategorizationOracle for Unreachable {
    async fn categorize(
        &self,
        _request: &CategorizationRequest,
    ) -> OracleResult<CategorizationResult> {
        Err(OracleError::transport("connection refused"))
    }
}

fn coordinator(oracle: Arc<dyn CategorizationOracle>) -> ReductionCoordinator {
    ReductionCoordinator::new(
        oracle,
        Arc::new(CharRatioMeter::default()),
        PipelineConfig::new(200, 3, Duration::from_secs(5)),
    )
    .unwrap()
}

async fn seeded_store() -> MemoryForumStore {
    let store = MemoryForumStore::new();
    store
        .add_submissions(&[
            SubmissionRecord::new("p-1", "u-1", "AskFrance", "Train", "…")
                .with_keywords(["train", "Marseille", "grève"]),
            SubmissionRecord::new("p-2", "u-2", "AskFrance", "Boulot", "…")
                .with_keywords(["train", "chômage", "CV"]),
        ])
        .await
        .unwrap();
    store.tally_keywords().await.unwrap();
    store
}

// ---- Categorization ----

#[tokio::test]
async fn categorize_replaces_category_table() {
    let store = seeded_store().await;
    store
        .replace_category_weights(&[CategoryWeightRecord::new("Stale", 99)])
        .await
        .unwrap();

    let outcome = categorize_stored_keywords(
        &store,
        &coordinator(Arc::new(OneCategory)),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.result.total_weight(), 6);
    assert_eq!(
        store.category_weights().await.unwrap(),
        vec![CategoryWeightRecord::new("Everything", 6)]
    );
}

#[tokio::test]
async fn failed_categorization_leaves_table_untouched() {
    let store = seeded_store().await;
    store
        .replace_category_weights(&[CategoryWeightRecord::new("Previous", 4)])
        .await
        .unwrap();

    let err = categorize_stored_keywords(
        &store,
        &coordinator(Arc::new(Unreachable)),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(err.oracle_error().unwrap().is_transport());
    assert_eq!(
        store.category_weights().await.unwrap(),
        vec![CategoryWeightRecord::new("Previous", 4)]
    );
}

#[tokio::test]
async fn cancelled_categorization_is_reported() {
    let store = seeded_store().await;
    let token = CancellationToken::new();
    token.cancel();

    let err = categorize_stored_keywords(&store, &coordinator(Arc::new(OneCategory)), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
}

// ---- Extraction ----

const EXTRACT_TIMEOUT: Duration = Duration::from_secs(5);

/// Answers by title: "none" declines, "junk" is invalid, "down" fails.
struct TitleExtractor;

#[async_trait]
impl KeywordExtractor for TitleExtractor {
    async fn extract(&self, title: &str, _body: &str) -> OracleResult<Option<KeywordsAndTopic>> {
        match title {
            "none" => Ok(None),
            "junk" => Err(OracleError::parse("expected 3 keywords, got 1")),
            "down" => Err(OracleError::transport("connection reset")),
            other => Ok(Some(KeywordsAndTopic {
                keywords: vec![other.to_string(), "b".to_string(), "c".to_string()],
                topic: format!("{other} topic"),
            })),
        }
    }
}

#[tokio::test]
async fn extraction_updates_only_missing_keywords() {
    let store = MemoryForumStore::new();
    store
        .add_submissions(&[
            SubmissionRecord::new("p-1", "u-1", "f", "ski", "body"),
            SubmissionRecord::new("p-2", "u-1", "f", "done", "body").with_keywords(["x", "y", "z"]),
            SubmissionRecord::new("p-3", "u-1", "f", "none", "body"),
            SubmissionRecord::new("p-4", "u-1", "f", "junk", "body"),
        ])
        .await
        .unwrap();

    let report = extract_missing_keywords(&store, &TitleExtractor, false, EXTRACT_TIMEOUT)
        .await
        .unwrap();

    assert_eq!(report.updated, vec!["p-1"]);
    assert_eq!(report.skipped, vec!["p-2"]);
    assert_eq!(report.declined, vec!["p-3"]);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].0, "p-4");

    let submissions = store.list_submissions().await.unwrap();
    let p1 = submissions.iter().find(|s| s.post_id == "p-1").unwrap();
    assert_eq!(p1.keywords, vec!["ski", "b", "c"]);
    assert_eq!(p1.topic.as_deref(), Some("ski topic"));
    let p2 = submissions.iter().find(|s| s.post_id == "p-2").unwrap();
    assert_eq!(p2.keywords, vec!["x", "y", "z"]);
}

#[tokio::test]
async fn forced_extraction_overwrites_existing_keywords() {
    let store = MemoryForumStore::new();
    store
        .add_submissions(&[
            SubmissionRecord::new("p-1", "u-1", "f", "fresh", "body").with_keywords(["old"])
        ])
        .await
        .unwrap();

    let report = extract_missing_keywords(&store, &TitleExtractor, true, EXTRACT_TIMEOUT)
        .await
        .unwrap();
    assert_eq!(report.updated, vec!["p-1"]);
    let keywords = &store.list_submissions().await.unwrap()[0].keywords;
    assert_eq!(keywords, &vec!["fresh", "b", "c"]);
}

#[tokio::test]
async fn extraction_transport_failure_aborts() {
    let store = MemoryForumStore::new();
    store
        .add_submissions(&[SubmissionRecord::new("p-9", "u-1", "f", "down", "body")])
        .await
        .unwrap();

    let err = extract_missing_keywords(&store, &TitleExtractor, false, EXTRACT_TIMEOUT)
        .await
        .unwrap_err();
    match err {
        PipelineError::Extraction { post_id, source } => {
            assert_eq!(post_id, "p-9");
            assert!(source.is_transport());
        }
        other => panic!("expected extraction failure, got {other}"),
    }
}

/// Never answers.
struct StalledExtractor;

#[async_trait]
impl KeywordExtractor for StalledExtractor {
    async fn extract(&self, _title: &str, _body: &str) -> OracleResult<Option<KeywordsAndTopic>> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_extraction_times_out_as_transport_failure() {
    let store = MemoryForumStore::new();
    store
        .add_submissions(&[SubmissionRecord::new("p-7", "u-1", "f", "slow", "body")])
        .await
        .unwrap();

    let err = extract_missing_keywords(&store, &StalledExtractor, false, Duration::from_secs(30))
        .await
        .unwrap_err();
    match err {
        PipelineError::Extraction { post_id, source } => {
            assert_eq!(post_id, "p-7");
            let OracleError::Timeout { after } = source else {
                panic!("expected a timeout, got {source}");
            };
            assert_eq!(after, Duration::from_secs(30));
        }
        other => panic!("expected extraction failure, got {other}"),
    }
    assert!(store.list_submissions().await.unwrap()[0].keywords.is_empty());
}

#[tokio::test]
async fn zero_extraction_timeout_is_rejected() {
    let store = MemoryForumStore::new();
    let err = extract_missing_keywords(&store, &TitleExtractor, false, Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
}
