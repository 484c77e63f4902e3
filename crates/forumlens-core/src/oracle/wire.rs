//! JSON wire contract between the pipeline and the classification service.
//!
//! Request:
//! `{"weighted_objects": [{"Keyword": "python", "Weight": 5}], "category_number": 2}`
//! (`"Category"` instead of `"Keyword"` on reduction rounds).
//!
//! Reply: `[{"Category": "Tech", "Weight": 23}]` and nothing else.
//!
//! Validation is strict: unknown fields, missing fields, negative or
//! fractional weights, blank labels and trailing text are all rejected.

use serde::{Deserialize, Serialize};

use crate::domain::{
    CategorizationRequest, CategorizationResult, ItemKind, OracleError, OracleResult,
    WeightedItem,
};
use crate::oracle::KeywordsAndTopic;

/// Number of keywords a valid extraction reply carries.
pub const KEYWORDS_PER_SUBMISSION: usize = 3;

/// Largest weight a reply may carry; stored weights are signed 64-bit.
pub const MAX_REPLY_WEIGHT: u64 = i64::MAX as u64;

#[derive(Serialize)]
struct WireRequest<'a> {
    weighted_objects: Vec<WireItem<'a>>,
    category_number: usize,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireItem<'a> {
    Keyword {
        #[serde(rename = "Keyword")]
        label: &'a str,
        #[serde(rename = "Weight")]
        weight: u64,
    },
    Category {
        #[serde(rename = "Category")]
        label: &'a str,
        #[serde(rename = "Weight")]
        weight: u64,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireCategory {
    #[serde(rename = "Category")]
    category: String,
    #[serde(rename = "Weight")]
    weight: u64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireKeywords {
    keywords: Vec<String>,
    topic: String,
}

/// Serialize a request into the user message sent to the service.
pub fn encode_request(request: &CategorizationRequest) -> OracleResult<String> {
    let weighted_objects = request
        .items
        .iter()
        .map(|item| match request.item_kind {
            ItemKind::Keyword => WireItem::Keyword {
                label: &item.label,
                weight: item.weight,
            },
            ItemKind::Category => WireItem::Category {
                label: &item.label,
                weight: item.weight,
            },
        })
        .collect();

    serde_json::to_string(&WireRequest {
        weighted_objects,
        category_number: request.category_count,
    })
    .map_err(|e| OracleError::parse(format!("could not encode request: {e}")))
}

/// Parse a categorization reply.
pub fn parse_categories(reply: &str) -> OracleResult<CategorizationResult> {
    let entries: Vec<WireCategory> = serde_json::from_str(reply.trim())
        .map_err(|e| OracleError::parse(format!("expected a JSON array of categories: {e}")))?;

    let mut categories = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let label = entry.category.trim();
        if label.is_empty() {
            return Err(OracleError::parse(format!(
                "category at index {index} has a blank name"
            )));
        }
        if entry.weight > MAX_REPLY_WEIGHT {
            return Err(OracleError::parse(format!(
                "category '{label}' has weight {} above {MAX_REPLY_WEIGHT}",
                entry.weight
            )));
        }
        categories.push(WeightedItem::new(label, entry.weight));
    }
    Ok(CategorizationResult::new(categories))
}

/// Parse a keyword extraction reply.
///
/// The explicit empty form `{"keywords": [], "topic": ""}` yields `None`.
pub fn parse_keywords(reply: &str) -> OracleResult<Option<KeywordsAndTopic>> {
    let wire: WireKeywords = serde_json::from_str(reply.trim())
        .map_err(|e| OracleError::parse(format!("expected a keywords/topic object: {e}")))?;

    if wire.keywords.is_empty() && wire.topic.trim().is_empty() {
        return Ok(None);
    }

    let keywords: Vec<String> = wire
        .keywords
        .iter()
        .map(|k| k.trim().to_string())
        .collect();
    if keywords.len() != KEYWORDS_PER_SUBMISSION {
        return Err(OracleError::parse(format!(
            "expected {KEYWORDS_PER_SUBMISSION} keywords, got {}",
            keywords.len()
        )));
    }
    if keywords.iter().any(|k| k.is_empty()) {
        return Err(OracleError::parse("blank keyword in reply"));
    }
    let topic = wire.topic.trim();
    if topic.is_empty() {
        return Err(OracleError::parse("blank topic in reply"));
    }

    Ok(Some(KeywordsAndTopic {
        keywords,
        topic: topic.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_keyword_request() {
        let request = CategorizationRequest::keywords(
            vec![WeightedItem::new("python", 5), WeightedItem::new("sqlite", 3)],
            2,
        );
        let encoded = encode_request(&request).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "weighted_objects": [
                    {"Keyword": "python", "Weight": 5},
                    {"Keyword": "sqlite", "Weight": 3}
                ],
                "category_number": 2
            })
        );
    }

    #[test]
    fn test_encode_category_request_uses_category_key() {
        let request = CategorizationRequest::categories(vec![WeightedItem::new("Tech", 8)], 1);
        let value: serde_json::Value =
            serde_json::from_str(&encode_request(&request).unwrap()).unwrap();
        assert_eq!(value["weighted_objects"][0]["Category"], "Tech");
        assert!(value["weighted_objects"][0].get("Keyword").is_none());
    }

    #[test]
    fn test_parse_categories_accepts_surrounding_whitespace() {
        let result =
            parse_categories("\n [{\"Category\": \"Tech\", \"Weight\": 23}] \n").unwrap();
        assert_eq!(result.categories, vec![WeightedItem::new("Tech", 23)]);
    }

    #[test]
    fn test_parse_categories_empty_array_is_valid() {
        assert!(parse_categories("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_categories_rejects_malformed_replies() {
        let bad = [
            "Sure! Here are your categories: [{\"Category\": \"Tech\", \"Weight\": 1}]",
            "[{\"Category\": \"Tech\", \"Weight\": 1}] Hope this helps.",
            "{\"Category\": \"Tech\", \"Weight\": 1}",
            "[{\"Category\": \"Tech\"}]",
            "[{\"Category\": \"Tech\", \"Weight\": -3}]",
            "[{\"Category\": \"Tech\", \"Weight\": 2.5}]",
            "[{\"Category\": \"Tech\", \"Weight\": 1, \"Note\": \"x\"}]",
            "[{\"Keyword\": \"Tech\", \"Weight\": 1}]",
            "[{\"Category\": \"  \", \"Weight\": 1}]",
            "",
        ];
        for reply in bad {
            let err = parse_categories(reply).unwrap_err();
            assert!(err.is_parse(), "{reply:?} should be a parse error");
        }
    }

    #[test]
    fn test_parse_categories_bounds_weight_to_signed_range() {
        let max = format!("[{{\"Category\": \"Tech\", \"Weight\": {}}}]", i64::MAX);
        assert_eq!(parse_categories(&max).unwrap().total_weight(), MAX_REPLY_WEIGHT);

        let over = format!("[{{\"Category\": \"Tech\", \"Weight\": {}}}]", u64::MAX);
        let err = parse_categories(&over).unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("Tech"));
    }

    #[test]
    fn test_parse_keywords_valid() {
        let parsed = parse_keywords(
            r#"{"keywords": ["train", " Marseille ", "grève"], "topic": "Transport public"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(parsed.keywords, vec!["train", "Marseille", "grève"]);
        assert_eq!(parsed.topic, "Transport public");
    }

    #[test]
    fn test_parse_keywords_explicit_empty_is_none() {
        assert_eq!(parse_keywords(r#"{"keywords": [], "topic": ""}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_keywords_rejects_wrong_counts_and_blanks() {
        let bad = [
            r#"{"keywords": ["a", "b"], "topic": "t"}"#,
            r#"{"keywords": ["a", "b", "c", "d"], "topic": "t"}"#,
            r#"{"keywords": ["a", "", "c"], "topic": "t"}"#,
            r#"{"keywords": ["a", "b", "c"], "topic": " "}"#,
            r#"{"keywords": [], "topic": "t"}"#,
            r#"{"keywords": ["a", "b", "c"]}"#,
            "not json",
        ];
        for reply in bad {
            assert!(parse_keywords(reply).unwrap_err().is_parse(), "{reply}");
        }
    }
}
