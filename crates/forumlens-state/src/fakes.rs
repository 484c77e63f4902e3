//! In-memory fake for `ForumStore` (testing only)
//!
//! `MemoryForumStore` satisfies the trait contract without any external
//! dependencies; the integration tests run the same contract against it and
//! against the SurrealDB backend.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;
use crate::tally;

#[derive(Debug, Default)]
struct Tables {
    authors: BTreeMap<String, AuthorRecord>,
    submissions: BTreeMap<String, SubmissionRecord>,
    replies: BTreeMap<String, ReplyRecord>,
    keyword_weights: Vec<KeywordWeightRecord>,
    category_weights: Vec<CategoryWeightRecord>,
}

/// In-memory forum store backed by ordered maps behind a single mutex.
#[derive(Debug, Default)]
pub struct MemoryForumStore {
    tables: Mutex<Tables>,
}

impl MemoryForumStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| StorageError::Backend(format!("memory store poisoned: {e}")))
    }
}

#[async_trait]
impl ForumStore for MemoryForumStore {
    async fn add_authors(&self, authors: &[AuthorRecord]) -> StorageResult<InsertReport> {
        let mut tables = self.lock()?;
        let mut report = InsertReport::default();
        for author in authors {
            if let Err(e) = author.validate() {
                report.skip(&author.author_id, e.to_string());
                continue;
            }
            if tables.authors.contains_key(&author.author_id) {
                report.skip(&author.author_id, "duplicate author_id");
                continue;
            }
            tables
                .authors
                .insert(author.author_id.clone(), author.clone());
            report.inserted += 1;
        }
        Ok(report)
    }

    async fn add_submissions(
        &self,
        submissions: &[SubmissionRecord],
    ) -> StorageResult<InsertReport> {
        let mut tables = self.lock()?;
        let mut report = InsertReport::default();
        for submission in submissions {
            if let Err(e) = submission.validate() {
                report.skip(&submission.post_id, e.to_string());
                continue;
            }
            if tables.submissions.contains_key(&submission.post_id) {
                report.skip(&submission.post_id, "duplicate post_id");
                continue;
            }
            tables
                .submissions
                .insert(submission.post_id.clone(), submission.clone());
            report.inserted += 1;
        }
        Ok(report)
    }

    async fn add_replies(&self, replies: &[ReplyRecord]) -> StorageResult<InsertReport> {
        let mut tables = self.lock()?;
        let mut report = InsertReport::default();
        for reply in replies {
            if let Err(e) = reply.validate() {
                report.skip(&reply.reply_id, e.to_string());
                continue;
            }
            if !tables.submissions.contains_key(&reply.submission_id) {
                report.skip(
                    &reply.reply_id,
                    format!("unknown submission {}", reply.submission_id),
                );
                continue;
            }
            if tables.replies.contains_key(&reply.reply_id) {
                report.skip(&reply.reply_id, "duplicate reply_id");
                continue;
            }
            tables.replies.insert(reply.reply_id.clone(), reply.clone());
            report.inserted += 1;
        }
        Ok(report)
    }

    async fn update_keywords_and_topic(
        &self,
        post_id: &str,
        keywords: &[String],
        topic: Option<&str>,
    ) -> StorageResult<()> {
        let mut tables = self.lock()?;
        let submission = tables.submissions.get_mut(post_id).ok_or_else(|| {
            StorageError::SubmissionNotFound {
                post_id: post_id.to_string(),
            }
        })?;
        submission.keywords = keywords.to_vec();
        submission.topic = topic.map(str::to_string);
        Ok(())
    }

    async fn list_authors(&self) -> StorageResult<Vec<AuthorRecord>> {
        Ok(self.lock()?.authors.values().cloned().collect())
    }

    async fn list_submissions(&self) -> StorageResult<Vec<SubmissionRecord>> {
        let mut submissions: Vec<_> = self.lock()?.submissions.values().cloned().collect();
        submissions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.post_id.cmp(&b.post_id))
        });
        Ok(submissions)
    }

    async fn list_replies(&self, submission_id: &str) -> StorageResult<Vec<ReplyRecord>> {
        let mut replies: Vec<_> = self
            .lock()?
            .replies
            .values()
            .filter(|r| r.submission_id == submission_id)
            .cloned()
            .collect();
        replies.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.reply_id.cmp(&b.reply_id))
        });
        Ok(replies)
    }

    async fn tally_keywords(&self) -> StorageResult<Vec<KeywordWeightRecord>> {
        let mut tables = self.lock()?;
        let submissions: Vec<_> = tables.submissions.values().cloned().collect();
        let tally = tally::tally_keywords(&submissions);
        for record in &tally {
            record.validate()?;
        }
        tables.keyword_weights = tally.clone();
        Ok(tally)
    }

    async fn keyword_weights(&self) -> StorageResult<Vec<KeywordWeightRecord>> {
        Ok(self.lock()?.keyword_weights.clone())
    }

    async fn replace_category_weights(
        &self,
        categories: &[CategoryWeightRecord],
    ) -> StorageResult<()> {
        for record in categories {
            record.validate()?;
        }
        let mut records = categories.to_vec();
        sort_category_weights(&mut records);
        self.lock()?.category_weights = records;
        Ok(())
    }

    async fn category_weights(&self) -> StorageResult<Vec<CategoryWeightRecord>> {
        Ok(self.lock()?.category_weights.clone())
    }
}
