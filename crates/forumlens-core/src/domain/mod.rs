//! Domain types shared by every stage of the pipeline.

pub mod error;
pub mod item;

pub use error::{OracleError, OracleResult, Phase, PipelineError, Result};
pub use item::{
    total_weight, CategorizationRequest, CategorizationResult, Chunk, ItemKind, WeightedItem,
};
