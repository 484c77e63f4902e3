//! Weighted items and the request/result types exchanged with the oracle.

use serde::{Deserialize, Serialize};

use forumlens_state::{CategoryWeightRecord, KeywordWeightRecord};

/// A label paired with a non-negative occurrence weight.
///
/// Used both for keywords (weight = occurrence count) and for categories
/// (weight = sum of the member keywords' weights).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeightedItem {
    pub label: String,
    pub weight: u64,
}

impl WeightedItem {
    pub fn new(label: impl Into<String>, weight: u64) -> Self {
        Self {
            label: label.into(),
            weight,
        }
    }
}

impl From<KeywordWeightRecord> for WeightedItem {
    fn from(record: KeywordWeightRecord) -> Self {
        WeightedItem::new(record.keyword, record.weight)
    }
}

impl From<WeightedItem> for CategoryWeightRecord {
    fn from(item: WeightedItem) -> Self {
        CategoryWeightRecord::new(item.label, item.weight)
    }
}

/// Sum of weights, saturating at `u64::MAX`.
pub fn total_weight(items: &[WeightedItem]) -> u64 {
    items
        .iter()
        .fold(0u64, |acc, item| acc.saturating_add(item.weight))
}

/// What the items of a request stand for; selects the key used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Keyword,
    Category,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Keyword => write!(f, "keyword"),
            ItemKind::Category => write!(f, "category"),
        }
    }
}

/// One categorization job: group `items` into `category_count` categories.
///
/// `category_count <= items.len()` is expected but not enforced; the oracle
/// may return any number of categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizationRequest {
    pub items: Vec<WeightedItem>,
    pub category_count: usize,
    pub item_kind: ItemKind,
}

impl CategorizationRequest {
    /// A first-round request over keyword items.
    pub fn keywords(items: Vec<WeightedItem>, category_count: usize) -> Self {
        Self {
            items,
            category_count,
            item_kind: ItemKind::Keyword,
        }
    }

    /// A reduction-round request over categories produced by earlier calls.
    pub fn categories(items: Vec<WeightedItem>, category_count: usize) -> Self {
        Self {
            items,
            category_count,
            item_kind: ItemKind::Category,
        }
    }

    pub fn total_weight(&self) -> u64 {
        total_weight(&self.items)
    }
}

/// Named, weighted categories returned by the oracle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizationResult {
    pub categories: Vec<WeightedItem>,
}

impl CategorizationResult {
    pub fn new(categories: Vec<WeightedItem>) -> Self {
        Self { categories }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn total_weight(&self) -> u64 {
        total_weight(&self.categories)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Convert into storage records for the category table.
    pub fn into_records(self) -> Vec<CategoryWeightRecord> {
        self.categories.into_iter().map(Into::into).collect()
    }
}

/// A budget-respecting run of consecutive items, with its summed cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    items: Vec<WeightedItem>,
    cost: usize,
}

impl Chunk {
    pub(crate) fn new(items: Vec<WeightedItem>, cost: usize) -> Self {
        Self { items, cost }
    }

    pub fn items(&self) -> &[WeightedItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<WeightedItem> {
        self.items
    }

    /// Summed token cost of the items.
    pub fn cost(&self) -> usize {
        self.cost
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_weight(&self) -> u64 {
        total_weight(&self.items)
    }

    /// A single item that alone exceeds `budget`, forwarded rather than dropped.
    pub fn is_oversized(&self, budget: usize) -> bool {
        self.cost > budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_weight_sums_and_saturates() {
        let items = vec![WeightedItem::new("a", 2), WeightedItem::new("b", 3)];
        assert_eq!(total_weight(&items), 5);

        let huge = vec![WeightedItem::new("a", u64::MAX), WeightedItem::new("b", 1)];
        assert_eq!(total_weight(&huge), u64::MAX);
        assert_eq!(total_weight(&[]), 0);
    }

    #[test]
    fn test_request_constructors_set_item_kind() {
        let items = vec![WeightedItem::new("python", 5)];
        assert_eq!(
            CategorizationRequest::keywords(items.clone(), 2).item_kind,
            ItemKind::Keyword
        );
        assert_eq!(
            CategorizationRequest::categories(items, 2).item_kind,
            ItemKind::Category
        );
    }

    #[test]
    fn test_result_into_records_keeps_order_and_weight() {
        let result = CategorizationResult::new(vec![
            WeightedItem::new("Tech", 23),
            WeightedItem::new("Travel", 4),
        ]);
        let records = result.into_records();
        assert_eq!(records[0], CategoryWeightRecord::new("Tech", 23));
        assert_eq!(records[1], CategoryWeightRecord::new("Travel", 4));
    }

    #[test]
    fn test_keyword_record_converts_to_item() {
        let item: WeightedItem = KeywordWeightRecord::new("sqlite", 3).into();
        assert_eq!(item, WeightedItem::new("sqlite", 3));
    }
}
