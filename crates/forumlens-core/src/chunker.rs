//! Greedy, order-preserving partition of weighted items into
//! token-budget-respecting chunks.

use crate::domain::{Chunk, PipelineError, Result, WeightedItem};
use crate::meter::TokenMeter;

/// Split `items` into chunks whose summed cost stays within `budget`.
///
/// Items keep their order and every item lands in exactly one chunk. An item
/// whose own cost exceeds the budget is emitted alone instead of dropped.
/// Empty input yields no chunks; a zero budget is rejected.
pub fn chunk<F>(items: &[WeightedItem], budget: usize, cost_fn: F) -> Result<Vec<Chunk>>
where
    F: Fn(&WeightedItem) -> usize,
{
    if budget == 0 {
        return Err(PipelineError::Configuration(
            "chunk budget must be greater than zero".to_string(),
        ));
    }

    let mut chunks = Vec::new();
    let mut current: Vec<WeightedItem> = Vec::new();
    let mut current_cost = 0usize;

    for item in items {
        let cost = cost_fn(item);
        if !current.is_empty() && current_cost.saturating_add(cost) > budget {
            chunks.push(Chunk::new(std::mem::take(&mut current), current_cost));
            current_cost = 0;
        }
        current.push(item.clone());
        current_cost = current_cost.saturating_add(cost);
    }

    if !current.is_empty() {
        chunks.push(Chunk::new(current, current_cost));
    }

    tracing::debug!(
        items = items.len(),
        chunks = chunks.len(),
        budget,
        "chunked item sequence"
    );
    Ok(chunks)
}

/// [`chunk`] driven by a [`TokenMeter`].
pub fn chunk_with_meter<M>(items: &[WeightedItem], budget: usize, meter: &M) -> Result<Vec<Chunk>>
where
    M: TokenMeter + ?Sized,
{
    chunk(items, budget, |item| meter.cost(item))
}
