//! Qdrant filter builders for owner-scoped queries.

use serde_json::{Value, json};

fn keyword_match(key: &str, value: &str) -> Value {
    json!({
        "key": key,
        "match": { "value": value }
    })
}

/// Filter restricting a query to one owner.
pub fn owner_filter(owner_id: &str) -> Value {
    json!({ "must": [keyword_match("owner_id", owner_id.trim())] })
}

/// Filter selecting one owner's chunks of a single source file.
pub fn source_file_filter(owner_id: &str, source_file: &str) -> Value {
    json!({
        "must": [
            keyword_match("owner_id", owner_id.trim()),
            keyword_match("source_file", source_file.trim()),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_filter_matches_keyword() {
        assert_eq!(
            owner_filter(" user-1 "),
            json!({
                "must": [
                    { "key": "owner_id", "match": { "value": "user-1" } }
                ]
            })
        );
    }

    #[test]
    fn source_file_filter_keeps_owner_scope() {
        let filter = source_file_filter("user-1", "report.md");
        let must = filter["must"].as_array().expect("must clause");
        assert_eq!(must.len(), 2);
        assert_eq!(must[0]["key"], "owner_id");
        assert_eq!(must[1]["match"]["value"], "report.md");
    }
}
