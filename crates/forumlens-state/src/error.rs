//! Error types for forumlens-state

use thiserror::Error;

/// Errors that can occur in the persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection error
    #[error("database connection failed: {0}")]
    Connection(String),

    /// Schema setup error
    #[error("schema setup failed: {0}")]
    SchemaSetup(String),

    /// Query or statement failure reported by the backend
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A submission addressed by id does not exist
    #[error("submission not found: {post_id}")]
    SubmissionNotFound { post_id: String },

    /// A record failed field validation before it reached the backend
    #[error("invalid {entity} '{id}': {reason}")]
    InvalidRecord {
        entity: &'static str,
        id: String,
        reason: String,
    },
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_record_display_names_entity_and_id() {
        let err = StorageError::InvalidRecord {
            entity: "author",
            id: "u-1".to_string(),
            reason: "name must not be empty".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("author"));
        assert!(msg.contains("u-1"));
        assert!(msg.contains("name must not be empty"));
    }

    #[test]
    fn test_submission_not_found_display() {
        let err = StorageError::SubmissionNotFound {
            post_id: "p-42".to_string(),
        };
        assert_eq!(err.to_string(), "submission not found: p-42");
    }
}
