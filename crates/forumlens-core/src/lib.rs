//! forumlens-core: the weighted-item categorization pipeline
//!
//! Turns an unbounded, weighted bag of keywords into a small number of named
//! categories through a size-constrained classification service, auditing
//! weight conservation across every chunked, multi-round call.
//!
//! ## Key Components
//!
//! - `meter`: `TokenMeter` cost accounting
//! - `chunker`: greedy budget-respecting partition
//! - `oracle`: `CategorizationOracle` / `KeywordExtractor` traits, wire codec,
//!   chat-completion adapter
//! - `coordinator`: `ReductionCoordinator` chunk/merge rounds
//! - `audit`: conservation reports
//! - `workflow`: store-backed extraction and categorization

pub mod audit;
pub mod chunker;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod meter;
pub mod metrics;
pub mod obs;
pub mod oracle;
pub mod telemetry;
pub mod workflow;

pub use audit::{audit, AuditEntry, AuditReport, AuditStage, ConservationViolation};
pub use chunker::{chunk, chunk_with_meter};
pub use config::PipelineConfig;
pub use coordinator::{ReductionCoordinator, ReductionOutcome};
pub use domain::{
    CategorizationRequest, CategorizationResult, Chunk, ItemKind, OracleError, OracleResult,
    Phase, PipelineError, Result, WeightedItem,
};
pub use meter::{CharRatioMeter, TokenMeter};
pub use oracle::{
    CategorizationOracle, ChatOracle, ChatOracleConfig, KeywordExtractor, KeywordsAndTopic,
};
pub use telemetry::{init_tracing, LogFormat};
pub use workflow::{categorize_stored_keywords, extract_missing_keywords, ExtractionReport};
