//! forumlens-state: persistence for forum content and derived weights
//!
//! This crate owns every byte forumlens stores: authors, submissions,
//! threaded replies, the keyword occurrence tally, and the category table
//! written by the categorization pipeline.
//!
//! ## Key Components
//!
//! - `ForumStore`: backend-agnostic async storage trait
//! - `SurrealHandle`: SurrealDB implementation (in-memory, local file, cloud)
//! - `fakes::MemoryForumStore`: in-memory implementation for tests
//! - `tally` / `thread`: pure helpers for keyword counting and reply nesting

mod error;
pub mod fakes;
mod handle;
mod schema;
pub mod storage_traits;
pub mod tally;
pub mod thread;

pub use error::StorageError;
pub use handle::{CloudConfig, SurrealHandle};
pub use storage_traits::{
    AuthorRecord, CategoryWeightRecord, ForumStore, Gender, InsertReport, KeywordWeightRecord,
    ReplyRecord, SkippedRecord, StorageResult, SubmissionRecord, MAX_STORED_WEIGHT,
};
pub use thread::{render_thread, reply_depths};

/// Result type for forumlens-state operations
pub type Result<T> = std::result::Result<T, StorageError>;
