//! Storage trait definitions for forumlens
//!
//! `ForumStore` is the single persistence seam of the system:
//! - forum content (authors, submissions, threaded replies) goes in via `add_*`
//! - the keyword tally is derived from submission keywords
//! - the categorization pipeline reads keyword weights and writes category
//!   weights back with replace-all semantics
//!
//! The trait is async and backend-agnostic. An in-memory fake is provided
//! in the `fakes` module; `SurrealHandle` is the production backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Forum content
// ---------------------------------------------------------------------------

/// Self-declared gender of an author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "NB")]
    NonBinary,
}

impl Gender {
    pub fn as_code(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::NonBinary => "NB",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "M" => Some(Gender::Male),
            "F" => Some(Gender::Female),
            "NB" => Some(Gender::NonBinary),
            _ => None,
        }
    }
}

/// A forum account that authored submissions or replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub author_id: String,
    pub name: String,
    pub gender: Option<Gender>,
    pub age: Option<u32>,
}

impl AuthorRecord {
    pub fn new(author_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            name: name.into(),
            gender: None,
            age: None,
        }
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn validate(&self) -> StorageResult<()> {
        require_non_blank("author", &self.author_id, "author_id", &self.author_id)?;
        require_non_blank("author", &self.author_id, "name", &self.name)
    }
}

/// A top-level forum post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub post_id: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    /// Identifier of the board/subforum the post belongs to
    pub forum_id: String,
    pub url: String,
    pub title: String,
    pub body: String,
    /// Keywords assigned by the extraction step (empty until extracted)
    #[serde(default)]
    pub keywords: Vec<String>,
    pub topic: Option<String>,
}

impl SubmissionRecord {
    pub fn new(
        post_id: impl Into<String>,
        author_id: impl Into<String>,
        forum_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            post_id: post_id.into(),
            author_id: author_id.into(),
            created_at: Utc::now(),
            forum_id: forum_id.into(),
            url: String::new(),
            title: title.into(),
            body: body.into(),
            keywords: Vec::new(),
            topic: None,
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn validate(&self) -> StorageResult<()> {
        require_non_blank("submission", &self.post_id, "post_id", &self.post_id)?;
        require_non_blank("submission", &self.post_id, "author_id", &self.author_id)?;
        require_non_blank("submission", &self.post_id, "title", &self.title)
    }
}

/// A reply inside a submission's thread.
///
/// `parent_id` is either another reply's id or, for top-level replies, the
/// id of the submission itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub reply_id: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub parent_id: String,
    pub submission_id: String,
    pub body: String,
}

impl ReplyRecord {
    pub fn new(
        reply_id: impl Into<String>,
        author_id: impl Into<String>,
        submission_id: impl Into<String>,
        parent_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            reply_id: reply_id.into(),
            author_id: author_id.into(),
            created_at: Utc::now(),
            parent_id: parent_id.into(),
            submission_id: submission_id.into(),
            body: body.into(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn validate(&self) -> StorageResult<()> {
        require_non_blank("reply", &self.reply_id, "reply_id", &self.reply_id)?;
        require_non_blank("reply", &self.reply_id, "submission_id", &self.submission_id)
    }
}

fn require_non_blank(
    entity: &'static str,
    id: &str,
    field: &str,
    value: &str,
) -> StorageResult<()> {
    if value.trim().is_empty() {
        return Err(StorageError::InvalidRecord {
            entity,
            id: id.to_string(),
            reason: format!("{field} must not be empty"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Weight tables
// ---------------------------------------------------------------------------

/// Largest weight the backends can store (signed 64-bit columns).
pub const MAX_STORED_WEIGHT: u64 = i64::MAX as u64;

fn require_storable_weight(entity: &'static str, id: &str, weight: u64) -> StorageResult<()> {
    if weight > MAX_STORED_WEIGHT {
        return Err(StorageError::InvalidRecord {
            entity,
            id: id.to_string(),
            reason: format!("weight {weight} exceeds {MAX_STORED_WEIGHT}"),
        });
    }
    Ok(())
}

/// Occurrence count of one keyword across all submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeywordWeightRecord {
    pub keyword: String,
    pub weight: u64,
}

impl KeywordWeightRecord {
    pub fn new(keyword: impl Into<String>, weight: u64) -> Self {
        Self {
            keyword: keyword.into(),
            weight,
        }
    }

    pub fn validate(&self) -> StorageResult<()> {
        require_non_blank("keyword weight", &self.keyword, "keyword", &self.keyword)?;
        require_storable_weight("keyword weight", &self.keyword, self.weight)
    }
}

/// Summed weight of the keywords assigned to one category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryWeightRecord {
    pub category: String,
    pub weight: u64,
}

impl CategoryWeightRecord {
    pub fn new(category: impl Into<String>, weight: u64) -> Self {
        Self {
            category: category.into(),
            weight,
        }
    }

    pub fn validate(&self) -> StorageResult<()> {
        require_non_blank("category weight", &self.category, "category", &self.category)?;
        require_storable_weight("category weight", &self.category, self.weight)
    }
}

// ---------------------------------------------------------------------------
// Bulk insert reporting
// ---------------------------------------------------------------------------

/// A record that a bulk insert did not write, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub id: String,
    pub reason: String,
}

/// Outcome of an `add_*` call. Records are inserted independently, so one
/// bad record never prevents the others from landing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertReport {
    pub inserted: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl InsertReport {
    pub fn skip(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedRecord {
            id: id.into(),
            reason: reason.into(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ForumStore
// ---------------------------------------------------------------------------

/// Persistence for forum content and the derived weight tables.
///
/// Guarantees:
/// - `add_*` skip (and report) duplicates and invalid records instead of failing.
/// - Replies are only accepted for submissions that already exist.
/// - `tally_keywords` and `replace_category_weights` replace their whole table.
/// - Weight tables are returned ordered by weight descending, then label ascending.
#[async_trait]
pub trait ForumStore: Send + Sync {
    /// Insert authors; duplicates by `author_id` are skipped.
    async fn add_authors(&self, authors: &[AuthorRecord]) -> StorageResult<InsertReport>;

    /// Insert submissions; duplicates by `post_id` are skipped.
    async fn add_submissions(
        &self,
        submissions: &[SubmissionRecord],
    ) -> StorageResult<InsertReport>;

    /// Insert replies; duplicates and replies to unknown submissions are skipped.
    async fn add_replies(&self, replies: &[ReplyRecord]) -> StorageResult<InsertReport>;

    /// Overwrite the keywords and topic of one submission.
    async fn update_keywords_and_topic(
        &self,
        post_id: &str,
        keywords: &[String],
        topic: Option<&str>,
    ) -> StorageResult<()>;

    /// All authors ordered by id.
    async fn list_authors(&self) -> StorageResult<Vec<AuthorRecord>>;

    /// All submissions ordered by creation time, then id.
    async fn list_submissions(&self) -> StorageResult<Vec<SubmissionRecord>>;

    /// Replies of one submission ordered by creation time, then id.
    async fn list_replies(&self, submission_id: &str) -> StorageResult<Vec<ReplyRecord>>;

    /// Recount keyword occurrences over all submissions and replace the
    /// keyword table with the result, which is also returned.
    async fn tally_keywords(&self) -> StorageResult<Vec<KeywordWeightRecord>>;

    /// The current keyword table.
    async fn keyword_weights(&self) -> StorageResult<Vec<KeywordWeightRecord>>;

    /// Clear the category table and write `categories` in its place.
    ///
    /// All or nothing: an invalid record fails the call before anything is
    /// cleared, and a backend failure leaves the previous rows in place.
    async fn replace_category_weights(
        &self,
        categories: &[CategoryWeightRecord],
    ) -> StorageResult<()>;

    /// The current category table.
    async fn category_weights(&self) -> StorageResult<Vec<CategoryWeightRecord>>;
}

/// Sort keyword weights into the canonical table order.
pub fn sort_keyword_weights(records: &mut [KeywordWeightRecord]) {
    records.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.keyword.cmp(&b.keyword)));
}

/// Sort category weights into the canonical table order.
pub fn sort_category_weights(records: &mut [CategoryWeightRecord]) {
    records.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then_with(|| a.category.cmp(&b.category))
    });
}
