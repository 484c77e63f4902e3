//! forumlens - forum keyword and category weighting CLI
//!
//! ## Commands
//!
//! - `import`: load authors, submissions and replies from a JSON dump
//! - `extract`: ask the classification service for keywords and topics
//! - `tally`: recompute the keyword occurrence table
//! - `categorize`: reduce the keyword table into a few weighted categories
//! - `keywords` / `categories`: print the stored tables
//! - `thread`: print a submission's indented reply thread

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use forumlens_core::config::{
    ENV_CATEGORY_COUNT, ENV_CHUNK_BUDGET, ENV_CONCURRENCY, ENV_MAX_ROUNDS, ENV_TIMEOUT_SECS,
};
use forumlens_core::metrics::METRICS;
use forumlens_core::{
    categorize_stored_keywords, extract_missing_keywords, CategorizationOracle, CharRatioMeter,
    ChatOracle, ChatOracleConfig, KeywordExtractor, LogFormat, PipelineConfig,
    ReductionCoordinator,
};
use forumlens_state::{
    render_thread, AuthorRecord, ForumStore, ReplyRecord, SubmissionRecord, SurrealHandle,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "forumlens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Forum keyword and category weighting", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a JSON dump of authors, submissions and replies
    Import {
        /// Path to the dump file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Extract keywords and a topic for submissions lacking keywords
    Extract {
        /// Re-extract submissions that already have keywords
        #[arg(long)]
        force: bool,

        /// Per-request timeout in seconds
        #[arg(long, env = "FORUMLENS_ORACLE_TIMEOUT_SECS", default_value = "60")]
        timeout_secs: u64,
    },

    /// Recompute keyword occurrence weights from stored submissions
    Tally,

    /// Group the stored keyword weights into categories
    ///
    /// Flags left out are read from the FORUMLENS_* environment variables.
    Categorize {
        /// Maximum token cost of one request to the service
        #[arg(long)]
        chunk_budget: Option<usize>,

        /// Number of categories to produce
        #[arg(long)]
        categories: Option<usize>,

        /// Maximum concurrent requests [default: 1]
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Reduction rounds allowed before giving up [default: 8]
        #[arg(long)]
        max_rounds: Option<usize>,
    },

    /// Print stored keyword weights
    Keywords,

    /// Print stored category weights
    Categories,

    /// Print the reply thread of a submission
    Thread {
        /// Submission id
        post_id: String,
    },
}

/// On-disk shape accepted by `import`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ForumDump {
    #[serde(default)]
    authors: Vec<AuthorRecord>,
    #[serde(default)]
    submissions: Vec<SubmissionRecord>,
    #[serde(default)]
    replies: Vec<ReplyRecord>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    forumlens_core::init_tracing(format, level);

    let handle = SurrealHandle::setup_from_env()
        .await
        .context("Failed to connect to forumlens database")?;

    match cli.command {
        Commands::Import { file } => cmd_import(&handle, &file).await,
        Commands::Extract {
            force,
            timeout_secs,
        } => {
            let oracle = chat_oracle_from_env()?;
            cmd_extract(&handle, &oracle, force, Duration::from_secs(timeout_secs)).await
        }
        Commands::Tally => cmd_tally(&handle).await,
        Commands::Categorize {
            chunk_budget,
            categories,
            concurrency,
            timeout_secs,
            max_rounds,
        } => {
            let overrides = categorize_overrides(
                chunk_budget,
                categories,
                concurrency,
                timeout_secs,
                max_rounds,
            );
            let config = PipelineConfig::from_env_with_overrides(&overrides)
                .context("Invalid categorization settings")?;
            let oracle = Arc::new(chat_oracle_from_env()?);

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });

            cmd_categorize(&handle, oracle, config, &cancel).await
        }
        Commands::Keywords => cmd_keywords(&handle).await,
        Commands::Categories => cmd_categories(&handle).await,
        Commands::Thread { post_id } => cmd_thread(&handle, &post_id).await,
    }
}

fn chat_oracle_from_env() -> Result<ChatOracle> {
    let config = ChatOracleConfig::from_env()
        .context("Classification service is not configured (AZURE_OPENAI_* variables)")?;
    Ok(ChatOracle::new(config))
}

/// Categorize flags as `FORUMLENS_*` overrides; absent flags fall through
/// to the environment.
fn categorize_overrides(
    chunk_budget: Option<usize>,
    categories: Option<usize>,
    concurrency: Option<usize>,
    timeout_secs: Option<u64>,
    max_rounds: Option<usize>,
) -> Vec<(&'static str, String)> {
    [
        (ENV_CHUNK_BUDGET, chunk_budget.map(|v| v.to_string())),
        (ENV_CATEGORY_COUNT, categories.map(|v| v.to_string())),
        (ENV_CONCURRENCY, concurrency.map(|v| v.to_string())),
        (ENV_TIMEOUT_SECS, timeout_secs.map(|v| v.to_string())),
        (ENV_MAX_ROUNDS, max_rounds.map(|v| v.to_string())),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| (name, v)))
    .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_dump(path: &Path) -> Result<ForumDump> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dump {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid dump {}", path.display()))
}

async fn cmd_import(store: &dyn ForumStore, path: &Path) -> Result<()> {
    let dump = load_dump(path)?;

    let authors = store.add_authors(&dump.authors).await?;
    let submissions = store.add_submissions(&dump.submissions).await?;
    let replies = store.add_replies(&dump.replies).await?;

    for skipped in authors
        .skipped
        .iter()
        .chain(&submissions.skipped)
        .chain(&replies.skipped)
    {
        tracing::warn!(id = %skipped.id, reason = %skipped.reason, "record skipped");
    }
    info!(
        authors = authors.inserted,
        submissions = submissions.inserted,
        replies = replies.inserted,
        "import finished"
    );

    print_json(&json!({
        "authors": authors,
        "submissions": submissions,
        "replies": replies,
    }))
}

async fn cmd_extract(
    store: &dyn ForumStore,
    extractor: &dyn KeywordExtractor,
    force: bool,
    timeout: Duration,
) -> Result<()> {
    let report = extract_missing_keywords(store, extractor, force, timeout)
        .await
        .context("Keyword extraction failed")?;
    METRICS.flush();
    print_json(&report)
}

async fn cmd_tally(store: &dyn ForumStore) -> Result<()> {
    let weights = store.tally_keywords().await?;
    info!(keywords = weights.len(), "keyword tally recomputed");
    print_json(&weights)
}

async fn cmd_categorize(
    store: &dyn ForumStore,
    oracle: Arc<dyn CategorizationOracle>,
    config: PipelineConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let coordinator = ReductionCoordinator::new(oracle, Arc::new(CharRatioMeter::default()), config)
        .context("Invalid categorization settings")?;

    let outcome = categorize_stored_keywords(store, &coordinator, cancel)
        .await
        .context("Categorization failed")?;
    METRICS.flush();

    let violations: Vec<_> = outcome
        .audits
        .iter()
        .filter(|entry| entry.is_violation())
        .collect();
    print_json(&json!({
        "run_id": outcome.run_id,
        "categories": outcome.result.categories,
        "rounds": outcome.rounds,
        "oracle_calls": outcome.oracle_calls,
        "overall": outcome.overall(),
        "violations": violations,
    }))
}

async fn cmd_keywords(store: &dyn ForumStore) -> Result<()> {
    print_json(&store.keyword_weights().await?)
}

async fn cmd_categories(store: &dyn ForumStore) -> Result<()> {
    print_json(&store.category_weights().await?)
}

async fn cmd_thread(store: &dyn ForumStore, post_id: &str) -> Result<()> {
    for line in thread_lines(store, post_id).await? {
        println!("{line}");
    }
    Ok(())
}

/// Title line followed by the indented replies.
async fn thread_lines(store: &dyn ForumStore, post_id: &str) -> Result<Vec<String>> {
    let submissions = store.list_submissions().await?;
    let Some(submission) = submissions.iter().find(|s| s.post_id == post_id) else {
        bail!("Submission '{post_id}' not found");
    };

    let replies = store.list_replies(post_id).await?;
    let mut lines = vec![submission.title.clone()];
    lines.extend(render_thread(&replies));
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forumlens_core::{
        CategorizationRequest, CategorizationResult, OracleResult, WeightedItem,
    };
    use forumlens_state::CategoryWeightRecord;

    const DUMP: &str = r#"{
        "authors": [
            {"author_id": "u-1", "name": "alice", "gender": "F", "age": 31},
            {"author_id": "u-2", "name": "bob", "gender": null, "age": null}
        ],
        "submissions": [
            {
                "post_id": "p-1",
                "author_id": "u-1",
                "created_at": "2024-03-01T09:00:00Z",
                "forum_id": "AskFrance",
                "url": "https://forum.example/p-1",
                "title": "Train pour Marseille",
                "body": "Des conseils ?",
                "keywords": ["train", "Marseille", "SNCF"],
                "topic": "Transport"
            }
        ],
        "replies": [
            {
                "reply_id": "c1",
                "author_id": "u-2",
                "created_at": "2024-03-01T09:05:00Z",
                "parent_id": "p-1",
                "submission_id": "p-1",
                "body": "Prends le TGV"
            },
            {
                "reply_id": "c2",
                "author_id": "u-1",
                "created_at": "2024-03-01T09:07:00Z",
                "parent_id": "c1",
                "submission_id": "p-1",
                "body": "Merci\nje regarde"
            }
        ]
    }"#;

    struct Everything;

    #[async_trait]
    impl CategorizationOracle for Everything {
        async fn categorize(
            &self,
            request: &CategorizationRequest,
        ) -> OracleResult<CategorizationResult> {
            Ok(CategorizationResult::new(vec![WeightedItem::new(
                "Transport",
                request.total_weight(),
            )]))
        }
    }

    async fn imported() -> (SurrealHandle, tempfile::TempDir) {
        let handle = SurrealHandle::setup_db().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.json");
        std::fs::write(&path, DUMP).unwrap();
        cmd_import(&handle, &path).await.unwrap();
        (handle, dir)
    }

    #[test]
    fn test_cli_parses_categorize_flags() {
        let cli = Cli::try_parse_from([
            "forumlens",
            "--json",
            "categorize",
            "--chunk-budget",
            "300",
            "--categories",
            "5",
            "--concurrency",
            "3",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Categorize {
                chunk_budget,
                categories,
                concurrency,
                timeout_secs,
                max_rounds,
            } => {
                assert_eq!(chunk_budget, Some(300));
                assert_eq!(categories, Some(5));
                assert_eq!(concurrency, Some(3));
                assert_eq!(timeout_secs, None);
                assert_eq!(max_rounds, None);

                let overrides = categorize_overrides(
                    chunk_budget,
                    categories,
                    concurrency,
                    timeout_secs,
                    max_rounds,
                );
                assert_eq!(
                    overrides,
                    vec![
                        (ENV_CHUNK_BUDGET, "300".to_string()),
                        (ENV_CATEGORY_COUNT, "5".to_string()),
                        (ENV_CONCURRENCY, "3".to_string()),
                    ]
                );
            }
            _ => panic!("expected categorize"),
        }
    }

    #[test]
    fn test_categorize_flags_build_a_config() {
        let overrides = categorize_overrides(Some(300), Some(5), None, Some(20), Some(4));
        let config = PipelineConfig::from_env_with_overrides(&overrides).unwrap();
        assert_eq!(config.chunk_budget, 300);
        assert_eq!(config.category_count, 5);
        assert_eq!(config.oracle_timeout, Duration::from_secs(20));
        assert_eq!(config.max_rounds, 4);
    }

    #[test]
    fn test_cli_parses_extract_timeout() {
        let cli =
            Cli::try_parse_from(["forumlens", "extract", "--force", "--timeout-secs", "15"])
                .unwrap();
        match cli.command {
            Commands::Extract {
                force,
                timeout_secs,
            } => {
                assert!(force);
                assert_eq!(timeout_secs, 15);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_cli_rejects_negative_budget() {
        let parsed = Cli::try_parse_from([
            "forumlens",
            "categorize",
            "--chunk-budget",
            "-3",
            "--categories",
            "5",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_dump_sections_default_to_empty() {
        let dump: ForumDump = serde_json::from_str(r#"{"authors": []}"#).unwrap();
        assert!(dump.submissions.is_empty());
        assert!(dump.replies.is_empty());
    }

    #[test]
    fn test_load_dump_reports_missing_file() {
        let err = load_dump(Path::new("/nonexistent/dump.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read dump"));
    }

    #[tokio::test]
    async fn test_import_then_tally() {
        let (handle, _dir) = imported().await;

        assert_eq!(handle.list_authors().await.unwrap().len(), 2);
        assert_eq!(handle.list_replies("p-1").await.unwrap().len(), 2);

        cmd_tally(&handle).await.unwrap();
        assert_eq!(handle.keyword_weights().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_categorize_writes_category_table() {
        let (handle, _dir) = imported().await;
        cmd_tally(&handle).await.unwrap();

        let config = PipelineConfig::new(500, 2, Duration::from_secs(5));
        cmd_categorize(&handle, Arc::new(Everything), config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            handle.category_weights().await.unwrap(),
            vec![CategoryWeightRecord::new("Transport", 3)]
        );
    }

    #[tokio::test]
    async fn test_categorize_rejects_zero_budget() {
        let (handle, _dir) = imported().await;
        let config = PipelineConfig::new(0, 2, Duration::from_secs(5));
        let err = cmd_categorize(&handle, Arc::new(Everything), config, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid categorization settings"));
    }

    #[tokio::test]
    async fn test_thread_lines_are_indented() {
        let (handle, _dir) = imported().await;
        let lines = thread_lines(&handle, "p-1").await.unwrap();
        assert_eq!(
            lines,
            vec![
                "Train pour Marseille".to_string(),
                "- Prends le TGV".to_string(),
                "    - Merci    je regarde".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_thread_of_unknown_submission_fails() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        assert!(thread_lines(&handle, "p-404").await.is_err());
    }
}
