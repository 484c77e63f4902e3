//! Keyword occurrence tally over submissions.

use std::collections::HashMap;

use crate::storage_traits::{sort_keyword_weights, KeywordWeightRecord, SubmissionRecord};

/// Count how many times each keyword appears across `submissions`.
///
/// Keywords are trimmed and blank entries are ignored; labels are otherwise
/// compared verbatim (no case folding). The result is in table order.
pub fn tally_keywords(submissions: &[SubmissionRecord]) -> Vec<KeywordWeightRecord> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for submission in submissions {
        for keyword in &submission.keywords {
            let keyword = keyword.trim();
            if keyword.is_empty() {
                continue;
            }
            *counts.entry(keyword).or_insert(0) += 1;
        }
    }

    let mut records: Vec<KeywordWeightRecord> = counts
        .into_iter()
        .map(|(keyword, weight)| KeywordWeightRecord::new(keyword, weight))
        .collect();
    sort_keyword_weights(&mut records);
    records
}
