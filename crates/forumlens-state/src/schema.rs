//! SurrealDB table definitions and row mappings
//!
//! Tables:
//! - authors: forum accounts
//! - submissions: top-level posts, with extracted keywords and topic
//! - replies: threaded replies (parent is a reply or the submission)
//! - keyword_weights: keyword occurrence tally (replace-all)
//! - category_weights: categorization pipeline output (replace-all)
//!
//! Rows are converted to the `storage_traits` records at the boundary so
//! backend-specific encodings (datetimes, gender codes) stay in this module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::{AuthorRecord, Gender, ReplyRecord, StorageResult, SubmissionRecord};

/// Serialize chrono datetimes as native SurrealDB datetimes
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

const SCHEMA: &str = r#"
    DEFINE TABLE IF NOT EXISTS authors SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS author_id ON authors TYPE string;
    DEFINE FIELD IF NOT EXISTS name ON authors TYPE string;
    DEFINE FIELD IF NOT EXISTS gender ON authors TYPE option<string>;
    DEFINE FIELD IF NOT EXISTS age ON authors TYPE option<int>;
    DEFINE INDEX IF NOT EXISTS idx_author_id ON authors FIELDS author_id UNIQUE;

    DEFINE TABLE IF NOT EXISTS submissions SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS post_id ON submissions TYPE string;
    DEFINE FIELD IF NOT EXISTS author_id ON submissions TYPE string;
    DEFINE FIELD IF NOT EXISTS created_at ON submissions TYPE datetime;
    DEFINE FIELD IF NOT EXISTS forum_id ON submissions TYPE string;
    DEFINE FIELD IF NOT EXISTS url ON submissions TYPE string;
    DEFINE FIELD IF NOT EXISTS title ON submissions TYPE string;
    DEFINE FIELD IF NOT EXISTS body ON submissions TYPE string;
    DEFINE FIELD IF NOT EXISTS keywords ON submissions TYPE array<string>;
    DEFINE FIELD IF NOT EXISTS topic ON submissions TYPE option<string>;
    DEFINE INDEX IF NOT EXISTS idx_post_id ON submissions FIELDS post_id UNIQUE;
    DEFINE INDEX IF NOT EXISTS idx_post_author ON submissions FIELDS author_id;

    DEFINE TABLE IF NOT EXISTS replies SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS reply_id ON replies TYPE string;
    DEFINE FIELD IF NOT EXISTS author_id ON replies TYPE string;
    DEFINE FIELD IF NOT EXISTS created_at ON replies TYPE datetime;
    DEFINE FIELD IF NOT EXISTS parent_id ON replies TYPE string;
    DEFINE FIELD IF NOT EXISTS submission_id ON replies TYPE string;
    DEFINE FIELD IF NOT EXISTS body ON replies TYPE string;
    DEFINE INDEX IF NOT EXISTS idx_reply_id ON replies FIELDS reply_id UNIQUE;
    DEFINE INDEX IF NOT EXISTS idx_reply_submission ON replies FIELDS submission_id;

    DEFINE TABLE IF NOT EXISTS keyword_weights SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS keyword ON keyword_weights TYPE string;
    DEFINE FIELD IF NOT EXISTS weight ON keyword_weights TYPE int;
    DEFINE INDEX IF NOT EXISTS idx_keyword ON keyword_weights FIELDS keyword UNIQUE;

    DEFINE TABLE IF NOT EXISTS category_weights SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS category ON category_weights TYPE string;
    DEFINE FIELD IF NOT EXISTS weight ON category_weights TYPE int;
"#;

/// Define all forumlens tables. Idempotent.
pub(crate) async fn init_schema(db: &Surreal<Any>) -> StorageResult<()> {
    debug!("Initializing forumlens schema");

    db.query(SCHEMA)
        .await
        .map_err(|e| StorageError::SchemaSetup(e.to_string()))?
        .check()
        .map_err(|e| StorageError::SchemaSetup(e.to_string()))?;

    debug!("Schema initialized successfully");
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AuthorRow {
    pub author_id: String,
    pub name: String,
    pub gender: Option<String>,
    pub age: Option<u32>,
}

impl From<&AuthorRecord> for AuthorRow {
    fn from(record: &AuthorRecord) -> Self {
        AuthorRow {
            author_id: record.author_id.clone(),
            name: record.name.clone(),
            gender: record.gender.map(|g| g.as_code().to_string()),
            age: record.age,
        }
    }
}

impl TryFrom<AuthorRow> for AuthorRecord {
    type Error = StorageError;

    fn try_from(row: AuthorRow) -> Result<Self, Self::Error> {
        let gender = match row.gender.as_deref() {
            None => None,
            Some(code) => Some(Gender::from_code(code).ok_or_else(|| {
                StorageError::InvalidRecord {
                    entity: "author",
                    id: row.author_id.clone(),
                    reason: format!("unknown gender code '{code}'"),
                }
            })?),
        };
        Ok(AuthorRecord {
            author_id: row.author_id,
            name: row.name,
            gender,
            age: row.age,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SubmissionRow {
    pub post_id: String,
    pub author_id: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    pub forum_id: String,
    pub url: String,
    pub title: String,
    pub body: String,
    pub keywords: Vec<String>,
    pub topic: Option<String>,
}

impl From<&SubmissionRecord> for SubmissionRow {
    fn from(record: &SubmissionRecord) -> Self {
        SubmissionRow {
            post_id: record.post_id.clone(),
            author_id: record.author_id.clone(),
            created_at: record.created_at,
            forum_id: record.forum_id.clone(),
            url: record.url.clone(),
            title: record.title.clone(),
            body: record.body.clone(),
            keywords: record.keywords.clone(),
            topic: record.topic.clone(),
        }
    }
}

impl From<SubmissionRow> for SubmissionRecord {
    fn from(row: SubmissionRow) -> Self {
        SubmissionRecord {
            post_id: row.post_id,
            author_id: row.author_id,
            created_at: row.created_at,
            forum_id: row.forum_id,
            url: row.url,
            title: row.title,
            body: row.body,
            keywords: row.keywords,
            topic: row.topic,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ReplyRow {
    pub reply_id: String,
    pub author_id: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    pub parent_id: String,
    pub submission_id: String,
    pub body: String,
}

impl From<&ReplyRecord> for ReplyRow {
    fn from(record: &ReplyRecord) -> Self {
        ReplyRow {
            reply_id: record.reply_id.clone(),
            author_id: record.author_id.clone(),
            created_at: record.created_at,
            parent_id: record.parent_id.clone(),
            submission_id: record.submission_id.clone(),
            body: record.body.clone(),
        }
    }
}

impl From<ReplyRow> for ReplyRecord {
    fn from(row: ReplyRow) -> Self {
        ReplyRecord {
            reply_id: row.reply_id,
            author_id: row.author_id,
            created_at: row.created_at,
            parent_id: row.parent_id,
            submission_id: row.submission_id,
            body: row.body,
        }
    }
}
