use serde_json::json;

use crate::inference::extract::{extract, ExtractError, EXCERPT_LIMIT};

#[test]
fn tolerates_prose_around_a_fenced_block() {
    let raw = "Here is the result:\n```json\n{\"score\":85}\n```\nThanks!";
    let value = extract(raw).expect("extracts");
    assert_eq!(value["score"], 85);
}

#[test]
fn rejects_plain_prose() {
    match extract("not json at all") {
        Err(ExtractError::MalformedResponse { excerpt }) => assert_eq!(excerpt, "not json at all"),
        other => panic!("expected malformed response, got {other:?}"),
    }
}

#[test]
fn parses_fully_fenced_reply() {
    let raw = "  ```json\n{\"score\": 12, \"status\": \"REJECT\"}\n```  ";
    let value = extract(raw).expect("extracts");
    assert_eq!(value, json!({"score": 12, "status": "REJECT"}));
}

#[test]
fn keeps_nested_objects_between_outer_braces() {
    let raw = "Result -> {\"score\": 90, \"detail\": {\"skills\": [\"rust\"]}} <- end";
    let value = extract(raw).expect("extracts");
    assert_eq!(value["detail"]["skills"][0], "rust");
}

#[test]
fn falls_back_to_whole_text_when_brace_slice_is_invalid() {
    let raw = "[{\"score\": 1}, {\"score\": 2}]";
    let value = extract(raw).expect("array parses whole");
    assert_eq!(value.as_array().map(Vec::len), Some(2));
}

#[test]
fn broken_json_is_malformed_not_empty() {
    let raw = "{\"score\": 85, \"status\": }";
    assert!(matches!(
        extract(raw),
        Err(ExtractError::MalformedResponse { .. })
    ));
}

#[test]
fn long_raw_text_is_truncated_in_error() {
    let raw = "x".repeat(EXCERPT_LIMIT * 3);
    match extract(&raw) {
        Err(ExtractError::MalformedResponse { excerpt }) => {
            assert_eq!(excerpt.len(), EXCERPT_LIMIT + 3);
        }
        other => panic!("expected malformed response, got {other:?}"),
    }
}

#[test]
fn empty_input_is_malformed() {
    assert!(extract("   \n").is_err());
}
