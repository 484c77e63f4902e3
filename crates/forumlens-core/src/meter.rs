//! Token cost accounting for weighted items.
//!
//! The chunker never embeds model-specific logic; it asks a [`TokenMeter`]
//! how much an item costs once serialized for the oracle.

use crate::domain::WeightedItem;

/// Measures the serialized size of an item under a model's accounting rules.
pub trait TokenMeter: Send + Sync {
    fn cost(&self, item: &WeightedItem) -> usize;
}

impl<F> TokenMeter for F
where
    F: Fn(&WeightedItem) -> usize + Send + Sync,
{
    fn cost(&self, item: &WeightedItem) -> usize {
        self(item)
    }
}

/// Approximate meter: roughly four characters per token plus a fixed
/// per-item overhead for the JSON envelope (`{"Keyword": ..., "Weight": ...}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRatioMeter {
    pub chars_per_token: usize,
    pub per_item_overhead: usize,
}

impl Default for CharRatioMeter {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            per_item_overhead: 8,
        }
    }
}

impl CharRatioMeter {
    pub fn new(chars_per_token: usize, per_item_overhead: usize) -> Self {
        Self {
            chars_per_token,
            per_item_overhead,
        }
    }
}

impl TokenMeter for CharRatioMeter {
    fn cost(&self, item: &WeightedItem) -> usize {
        let chars = item.label.chars().count() + item.weight.to_string().len();
        let ratio = self.chars_per_token.max(1);
        chars.div_ceil(ratio) + self.per_item_overhead
    }
}

/// Summed cost of a sequence of items.
pub fn sequence_cost<M>(items: &[WeightedItem], meter: &M) -> usize
where
    M: TokenMeter + ?Sized,
{
    items
        .iter()
        .fold(0usize, |acc, item| acc.saturating_add(meter.cost(item)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_ratio_meter_rounds_up() {
        let meter = CharRatioMeter::new(4, 0);
        // "python" + "5" = 7 chars -> 2 tokens
        assert_eq!(meter.cost(&WeightedItem::new("python", 5)), 2);
        // "api" + "4" = 4 chars -> 1 token
        assert_eq!(meter.cost(&WeightedItem::new("api", 4)), 1);
    }

    #[test]
    fn test_char_ratio_meter_counts_chars_not_bytes() {
        let meter = CharRatioMeter::new(1, 0);
        assert_eq!(meter.cost(&WeightedItem::new("chômage", 1)), 8);
    }

    #[test]
    fn test_zero_ratio_is_treated_as_one() {
        let meter = CharRatioMeter::new(0, 2);
        assert_eq!(meter.cost(&WeightedItem::new("ab", 1)), 5);
    }

    #[test]
    fn test_closures_are_meters() {
        let meter = |item: &WeightedItem| item.label.len() * 10;
        assert_eq!(meter.cost(&WeightedItem::new("abc", 0)), 30);

        let items = vec![WeightedItem::new("a", 1), WeightedItem::new("bb", 1)];
        assert_eq!(sequence_cost(&items, &meter), 30);
    }
}
