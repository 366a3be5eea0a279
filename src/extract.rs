//! Envelope normalization: digging the record array out of an arbitrary
//! JSON response.
//!
//! Response envelopes are not under this tool's control and vary across
//! deployments (`{"data": [...]}`, `{"result": {"items": [...]}}`, a
//! bare array). A fixed-key probe over two levels covers the shapes seen
//! in the wild without hard-coding a schema, and bounds the work: no
//! unbounded recursion over attacker-sized payloads.

use serde_json::Value;

/// Envelope keys conventionally wrapping record arrays, in priority
/// order.
pub const PRIORITY_KEYS: [&str; 6] = ["data", "items", "records", "result", "payload", "list"];

/// Longest snippet carried into logs and error messages.
const SNIPPET_LEN: usize = 300;

/// Extract the record list from a captured JSON payload.
///
/// Lookup order:
/// 1. the root itself, when it is an array;
/// 2. the first priority key holding an array;
/// 3. the first priority key holding an object that itself has a
///    priority key holding an array.
///
/// Depth-1 keys are all ruled out before any depth-2 descent, so a
/// shallow array always beats a nested one regardless of key order.
/// Nothing within two levels yields an empty list, which callers treat
/// as "no extractable payload". Records pass through verbatim.
pub fn extract_records(payload: &Value) -> Vec<Value> {
    if let Value::Array(records) = payload {
        return records.clone();
    }
    let Value::Object(map) = payload else {
        return Vec::new();
    };
    for key in PRIORITY_KEYS {
        if let Some(Value::Array(records)) = map.get(key) {
            return records.clone();
        }
    }
    for key in PRIORITY_KEYS {
        if let Some(Value::Object(inner)) = map.get(key) {
            for inner_key in PRIORITY_KEYS {
                if let Some(Value::Array(records)) = inner.get(inner_key) {
                    return records.clone();
                }
            }
        }
    }
    Vec::new()
}

/// Compact single-line snippet of a JSON payload, for triage logs.
pub fn body_snippet(payload: &Value) -> String {
    text_snippet(&payload.to_string())
}

/// Truncate text to the snippet budget on a char boundary.
pub fn text_snippet(text: &str) -> String {
    if text.len() <= SNIPPET_LEN {
        return text.to_string();
    }
    let mut cut = SNIPPET_LEN;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn test_bare_array_passes_through() {
        let payload = json!([{"id": 1}, {"id": 2}]);
        let records = extract_records(&payload);
        assert_eq!(records.len(), 2);
        assert_json_eq!(Value::Array(records), payload);

        // Scalar elements are records too.
        assert_eq!(extract_records(&json!([1, 2, 3])).len(), 3);
    }

    #[test]
    fn test_depth_one_priority_key() {
        let payload = json!({"data": [{"id": 1}], "total": 1});
        assert_json_eq!(
            Value::Array(extract_records(&payload)),
            json!([{"id": 1}])
        );
    }

    #[test]
    fn test_depth_two_nested_envelope() {
        let payload = json!({"result": {"items": [{"id": 7}], "page": 1}});
        assert_json_eq!(
            Value::Array(extract_records(&payload)),
            json!([{"id": 7}])
        );
    }

    #[test]
    fn test_priority_order_at_depth_one() {
        // "items" also holds an array, but "data" outranks it.
        let payload = json!({"items": [{"id": 2}], "data": [{"id": 1}]});
        assert_json_eq!(
            Value::Array(extract_records(&payload)),
            json!([{"id": 1}])
        );
    }

    #[test]
    fn test_shallow_array_beats_nested_one() {
        // "data" is scanned first but holds an object; the depth-1 pass
        // must finish (finding "list") before any depth-2 descent into
        // "data" happens.
        let payload = json!({"data": {"items": [{"id": 9}]}, "list": [{"id": 1}]});
        assert_json_eq!(
            Value::Array(extract_records(&payload)),
            json!([{"id": 1}])
        );
    }

    #[test]
    fn test_depth_three_is_out_of_reach() {
        let payload = json!({"data": {"data": {"data": [{"id": 1}]}}});
        assert!(extract_records(&payload).is_empty());
    }

    #[test]
    fn test_no_array_anywhere_yields_empty() {
        assert!(extract_records(&json!({"foo": "bar"})).is_empty());
        assert!(extract_records(&json!({"data": {"count": 3}})).is_empty());
        assert!(extract_records(&json!(null)).is_empty());
        assert!(extract_records(&json!("just a string")).is_empty());
        assert!(extract_records(&json!(42)).is_empty());
    }

    #[test]
    fn test_empty_array_is_a_defined_outcome() {
        // An empty "data" array is found, not skipped in favor of a
        // later key.
        let payload = json!({"data": [], "items": [{"id": 1}]});
        assert!(extract_records(&payload).is_empty());
    }

    #[test]
    fn test_records_survive_verbatim() {
        // Mixed-type elements and odd numeric formatting must come
        // through untouched.
        let payload = json!({"payload": [{"price": 1200.50}, "loose string", null, 3]});
        let records = extract_records(&payload);
        assert_eq!(records.len(), 4);
        assert_json_eq!(records[0], json!({"price": 1200.50}));
        assert_eq!(records[1], json!("loose string"));
        assert_eq!(records[2], Value::Null);
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        let long = "あ".repeat(400);
        let snippet = text_snippet(&long);
        assert!(snippet.len() <= 300 + "...".len());
        assert!(snippet.ends_with("..."));
        // No panic means the cut landed on a boundary; also verify the
        // content survived as whole characters.
        assert!(snippet.trim_end_matches("...").chars().all(|c| c == 'あ'));
    }

    #[test]
    fn test_snippet_leaves_short_bodies_alone() {
        let payload = json!({"ok": true});
        assert_eq!(body_snippet(&payload), payload.to_string());
    }
}
