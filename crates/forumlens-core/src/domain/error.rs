//! Error taxonomy for the categorization pipeline.

use std::time::Duration;

/// Failures of a single oracle call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The service answered, but the reply is not the expected JSON shape.
    #[error("oracle reply could not be parsed: {detail}")]
    Parse { detail: String },

    /// The service could not be reached or answered with a failure status.
    #[error("oracle transport failed: {detail}")]
    Transport { detail: String },

    /// The call did not complete within the configured timeout.
    #[error("oracle call timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },
}

impl OracleError {
    pub fn parse(detail: impl Into<String>) -> Self {
        OracleError::Parse {
            detail: detail.into(),
        }
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        OracleError::Transport {
            detail: detail.into(),
        }
    }

    /// Timeouts are handled exactly like transport failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, OracleError::Transport { .. } | OracleError::Timeout { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, OracleError::Parse { .. })
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        OracleError::transport(err.to_string())
    }
}

/// Result type for oracle calls.
pub type OracleResult<T> = std::result::Result<T, OracleError>;

/// Failures of a whole pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid budget, count, limit or timeout; raised before any call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An oracle failure that the pipeline does not absorb.
    #[error("{phase} phase failed in round {round}: {source}")]
    Oracle {
        phase: Phase,
        round: usize,
        #[source]
        source: OracleError,
    },

    /// The working set was still over budget after `max_rounds` rounds.
    #[error("categorization did not converge within {max_rounds} rounds (working set cost {remaining_cost} > budget {budget})")]
    RoundLimitExceeded {
        max_rounds: usize,
        remaining_cost: usize,
        budget: usize,
    },

    /// Keyword extraction for one submission failed in transport.
    #[error("keyword extraction failed for submission {post_id}: {source}")]
    Extraction {
        post_id: String,
        #[source]
        source: OracleError,
    },

    /// The caller cancelled the run; in-flight calls were aborted.
    #[error("categorization cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(#[from] forumlens_state::StorageError),
}

impl PipelineError {
    /// The oracle error behind this failure, if any.
    pub fn oracle_error(&self) -> Option<&OracleError> {
        match self {
            PipelineError::Oracle { source, .. } | PipelineError::Extraction { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Which half of a reduction round an oracle call belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Chunk,
    Merge,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Chunk => write!(f, "chunk"),
            Phase::Merge => write!(f, "merge"),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
