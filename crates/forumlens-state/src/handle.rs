//! SurrealDB Handle - Connection and `ForumStore` implementation
//!
//! Supports in-memory (`mem://`), local file (`surrealkv://`) and cloud
//! (WebSocket) connections. Every connection runs the schema definition
//! before it is handed out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument, warn};

use crate::error::StorageError;
use crate::schema::{self, AuthorRow, ReplyRow, SubmissionRow};
use crate::storage_traits::{
    AuthorRecord, CategoryWeightRecord, ForumStore, InsertReport, KeywordWeightRecord,
    ReplyRecord, StorageResult, SubmissionRecord,
};
use crate::tally;

const DEFAULT_NAMESPACE: &str = "forumlens";
const DEFAULT_DATABASE: &str = "main";
const LOCAL_DB_PATH: &str = ".forumlens/db";

/// Configuration for SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "forumlens")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new cloud configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "forumlens")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// SurrealDB connection handle for forumlens
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

#[derive(Debug, Deserialize)]
struct KeyRow {
    key: String,
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> StorageResult<Self> {
        info!("Connecting to SurrealDB (in-memory)");
        Self::connect_url("mem://", DEFAULT_NAMESPACE, DEFAULT_DATABASE).await
    }

    /// Connect to SurrealDB Cloud with the given credentials
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn setup_cloud(config: CloudConfig) -> StorageResult<Self> {
        info!("Connecting to SurrealDB Cloud (root={})", config.is_root);

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StorageError::Connection(format!(
                    "Failed to connect to {}: {}",
                    config.endpoint, e
                ))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StorageError::Connection(format!("Root authentication failed: {e}")))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| {
                StorageError::Connection(format!("Database authentication failed: {e}"))
            })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StorageError::Connection(format!("Failed to select namespace/database: {e}"))
            })?;

        schema::init_schema(&db).await?;
        info!("SurrealDB Cloud connected and schema initialized");
        Ok(SurrealHandle { db })
    }

    /// Connect using environment variables
    ///
    /// If SURREALDB_ENDPOINT is set, connects to cloud.
    /// If SURREALDB_URL is set, connects to that URL.
    /// Otherwise, persists locally under `.forumlens/db`.
    #[instrument(skip_all)]
    pub async fn setup_from_env() -> StorageResult<Self> {
        if let Ok(config) = CloudConfig::from_env() {
            info!("Cloud config found, connecting to SurrealDB Cloud");
            return Self::setup_cloud(config).await;
        }

        if let Ok(url) = std::env::var("SURREALDB_URL") {
            info!("SURREALDB_URL found, connecting to {}", url);
            return Self::connect_url(&url, DEFAULT_NAMESPACE, DEFAULT_DATABASE).await;
        }

        std::fs::create_dir_all(LOCAL_DB_PATH).map_err(|e| {
            StorageError::Connection(format!(
                "Failed to create database directory {LOCAL_DB_PATH}: {e}"
            ))
        })?;
        let url = format!("surrealkv://{LOCAL_DB_PATH}");
        info!("No cloud config or SURREALDB_URL found, using local persistence: {}", url);
        Self::connect_url(&url, DEFAULT_NAMESPACE, DEFAULT_DATABASE).await
    }

    async fn connect_url(url: &str, namespace: &str, database: &str) -> StorageResult<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to connect to {url}: {e}")))?;

        db.use_ns(namespace)
            .use_db(database)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        schema::init_schema(&db).await?;
        debug!("SurrealDB connected to {}", url);
        Ok(SurrealHandle { db })
    }

    /// Whether a row with `field = id` exists in `table`.
    async fn exists(&self, table: &'static str, field: &'static str, id: &str) -> StorageResult<bool> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {field} AS key FROM {table} WHERE {field} = $id LIMIT 1"
            ))
            .bind(("id", id.to_string()))
            .await?;
        let rows: Vec<KeyRow> = result.take(0)?;
        Ok(rows.iter().any(|r| r.key == id))
    }

    /// Swap the contents of `table` for `rows` in one transaction.
    async fn replace_table<T>(&self, table: &'static str, rows: Vec<T>) -> StorageResult<()>
    where
        T: Serialize + 'static,
    {
        let insert = if rows.is_empty() {
            String::new()
        } else {
            format!("INSERT INTO {table} $rows;")
        };
        self.db
            .query(format!(
                "BEGIN TRANSACTION; DELETE {table}; {insert} COMMIT TRANSACTION;"
            ))
            .bind(("rows", rows))
            .await?
            .check()?;
        Ok(())
    }
}

#[async_trait]
impl ForumStore for SurrealHandle {
    #[instrument(skip(self, authors), fields(count = authors.len()))]
    async fn add_authors(&self, authors: &[AuthorRecord]) -> StorageResult<InsertReport> {
        let mut report = InsertReport::default();
        for author in authors {
            if let Err(e) = author.validate() {
                warn!(author_id = %author.author_id, error = %e, "skipping invalid author");
                report.skip(&author.author_id, e.to_string());
                continue;
            }
            if self.exists("authors", "author_id", &author.author_id).await? {
                report.skip(&author.author_id, "duplicate author_id");
                continue;
            }
            let _created: Option<AuthorRow> = self
                .db
                .create("authors")
                .content(AuthorRow::from(author))
                .await?;
            report.inserted += 1;
        }
        info!(inserted = report.inserted, skipped = report.skipped.len(), "authors added");
        Ok(report)
    }

    #[instrument(skip(self, submissions), fields(count = submissions.len()))]
    async fn add_submissions(
        &self,
        submissions: &[SubmissionRecord],
    ) -> StorageResult<InsertReport> {
        let mut report = InsertReport::default();
        for submission in submissions {
            if let Err(e) = submission.validate() {
                warn!(post_id = %submission.post_id, error = %e, "skipping invalid submission");
                report.skip(&submission.post_id, e.to_string());
                continue;
            }
            if self
                .exists("submissions", "post_id", &submission.post_id)
                .await?
            {
                report.skip(&submission.post_id, "duplicate post_id");
                continue;
            }
            let _created: Option<SubmissionRow> = self
                .db
                .create("submissions")
                .content(SubmissionRow::from(submission))
                .await?;
            report.inserted += 1;
        }
        info!(inserted = report.inserted, skipped = report.skipped.len(), "submissions added");
        Ok(report)
    }

    #[instrument(skip(self, replies), fields(count = replies.len()))]
    async fn add_replies(&self, replies: &[ReplyRecord]) -> StorageResult<InsertReport> {
        let mut report = InsertReport::default();
        for reply in replies {
            if let Err(e) = reply.validate() {
                warn!(reply_id = %reply.reply_id, error = %e, "skipping invalid reply");
                report.skip(&reply.reply_id, e.to_string());
                continue;
            }
            if !self
                .exists("submissions", "post_id", &reply.submission_id)
                .await?
            {
                report.skip(
                    &reply.reply_id,
                    format!("unknown submission {}", reply.submission_id),
                );
                continue;
            }
            if self.exists("replies", "reply_id", &reply.reply_id).await? {
                report.skip(&reply.reply_id, "duplicate reply_id");
                continue;
            }
            let _created: Option<ReplyRow> = self
                .db
                .create("replies")
                .content(ReplyRow::from(reply))
                .await?;
            report.inserted += 1;
        }
        info!(inserted = report.inserted, skipped = report.skipped.len(), "replies added");
        Ok(report)
    }

    #[instrument(skip(self, keywords))]
    async fn update_keywords_and_topic(
        &self,
        post_id: &str,
        keywords: &[String],
        topic: Option<&str>,
    ) -> StorageResult<()> {
        let mut result = self
            .db
            .query("UPDATE submissions SET keywords = $keywords, topic = $topic WHERE post_id = $id")
            .bind(("keywords", keywords.to_vec()))
            .bind(("topic", topic.map(str::to_string)))
            .bind(("id", post_id.to_string()))
            .await?;

        let updated: Vec<SubmissionRow> = result.take(0)?;
        if updated.is_empty() {
            return Err(StorageError::SubmissionNotFound {
                post_id: post_id.to_string(),
            });
        }
        debug!("Keywords and topic updated");
        Ok(())
    }

    async fn list_authors(&self) -> StorageResult<Vec<AuthorRecord>> {
        let mut result = self
            .db
            .query("SELECT author_id, name, gender, age FROM authors ORDER BY author_id ASC")
            .await?;
        let rows: Vec<AuthorRow> = result.take(0)?;
        rows.into_iter().map(AuthorRecord::try_from).collect()
    }

    async fn list_submissions(&self) -> StorageResult<Vec<SubmissionRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT post_id, author_id, created_at, forum_id, url, title, body, keywords, topic \
                 FROM submissions ORDER BY created_at ASC, post_id ASC",
            )
            .await?;
        let rows: Vec<SubmissionRow> = result.take(0)?;
        Ok(rows.into_iter().map(SubmissionRecord::from).collect())
    }

    async fn list_replies(&self, submission_id: &str) -> StorageResult<Vec<ReplyRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT reply_id, author_id, created_at, parent_id, submission_id, body \
                 FROM replies WHERE submission_id = $id ORDER BY created_at ASC, reply_id ASC",
            )
            .bind(("id", submission_id.to_string()))
            .await?;
        let rows: Vec<ReplyRow> = result.take(0)?;
        Ok(rows.into_iter().map(ReplyRecord::from).collect())
    }

    #[instrument(skip(self))]
    async fn tally_keywords(&self) -> StorageResult<Vec<KeywordWeightRecord>> {
        let submissions = self.list_submissions().await?;
        let tally = tally::tally_keywords(&submissions);

        for record in &tally {
            record.validate()?;
        }
        self.replace_table("keyword_weights", tally.clone()).await?;

        info!(
            keywords = tally.len(),
            submissions = submissions.len(),
            "keyword_weights table rebuilt"
        );
        Ok(tally)
    }

    async fn keyword_weights(&self) -> StorageResult<Vec<KeywordWeightRecord>> {
        let mut result = self
            .db
            .query("SELECT keyword, weight FROM keyword_weights ORDER BY weight DESC, keyword ASC")
            .await?;
        Ok(result.take(0)?)
    }

    #[instrument(skip(self, categories), fields(count = categories.len()))]
    async fn replace_category_weights(
        &self,
        categories: &[CategoryWeightRecord],
    ) -> StorageResult<()> {
        for record in categories {
            record.validate()?;
        }
        self.replace_table("category_weights", categories.to_vec())
            .await?;
        info!("category_weights table replaced");
        Ok(())
    }

    async fn category_weights(&self) -> StorageResult<Vec<CategoryWeightRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT category, weight FROM category_weights ORDER BY weight DESC, category ASC",
            )
            .await?;
        Ok(result.take(0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_surreal_connection_and_schema_creation() {
        let handle = SurrealHandle::setup_db().await;
        assert!(handle.is_ok(), "in-memory connection should succeed");
    }

    #[tokio::test]
    async fn test_exists_reports_inserted_author() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        handle
            .add_authors(&[AuthorRecord::new("u-1", "alice")])
            .await
            .unwrap();

        assert!(handle.exists("authors", "author_id", "u-1").await.unwrap());
        assert!(!handle.exists("authors", "author_id", "u-2").await.unwrap());
    }

    #[test]
    fn test_cloud_config_builders() {
        let config = CloudConfig::new("wss://db.example.test", "user", "pass")
            .with_namespace("ns")
            .with_database("db")
            .with_root(true);
        assert_eq!(config.namespace, "ns");
        assert_eq!(config.database, "db");
        assert!(config.is_root);
    }
}
