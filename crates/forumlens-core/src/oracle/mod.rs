//! The external classification capability and its adapters.
//!
//! [`CategorizationOracle`] is the seam the reduction coordinator calls
//! through; [`KeywordExtractor`] produces the per-submission keywords that
//! feed the tally. [`ChatOracle`] implements both over a chat-completion
//! HTTP endpoint.

mod chat;
mod prompts;
pub mod wire;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CategorizationRequest, CategorizationResult, OracleResult};

pub use chat::{ChatOracle, ChatOracleConfig};

/// Groups a batch of weighted items into named, weighted categories.
///
/// Implementations do not mutate local state. Conservation of weight is
/// audited by the caller, never assumed.
#[async_trait]
pub trait CategorizationOracle: Send + Sync {
    async fn categorize(&self, request: &CategorizationRequest)
        -> OracleResult<CategorizationResult>;
}

/// Three keywords and a short general topic for one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordsAndTopic {
    pub keywords: Vec<String>,
    pub topic: String,
}

/// Extracts keywords and a topic from a submission's title and body.
///
/// `Ok(None)` means the service explicitly declined (nothing to extract).
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn extract(&self, title: &str, body: &str) -> OracleResult<Option<KeywordsAndTopic>>;
}
