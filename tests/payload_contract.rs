//! Purpose: Lock the flattening pipeline contract from response JSON to payload.
//! Exports: Integration tests only (no runtime exports).
//! Role: Catch drift in row ordering, comma escaping, and the payload byte ceiling.
//! Invariants: Scenario expectations stay byte-exact; payloads never exceed 256 bytes.
//! Invariants: Error kinds for empty and oversized results stay stable.

use rowpack::api::{
    ErrorKind, FlattenError, PAYLOAD_BYTE_CEILING, QueryResponse, ResultSet, cell_payload, flatten,
};
use serde_json::json;

fn result_set(doc: serde_json::Value) -> ResultSet {
    QueryResponse::from_json_value(doc)
        .expect("decode")
        .into_result_set()
        .expect("result set")
}

fn payload(doc: serde_json::Value) -> String {
    flatten(&result_set(doc)).expect("payload").into_string()
}

#[test]
fn single_row_joins_columns_in_insertion_order() {
    assert_eq!(payload(json!({"data": [{"A": 1, "B": 2}]})), "1,2");
}

#[test]
fn comma_in_value_becomes_pipe() {
    assert_eq!(payload(json!({"data": [{"A": "x,y"}]})), "x|y");
}

#[test]
fn rows_join_in_row_major_order() {
    assert_eq!(payload(json!({"data": [{"A": 1}, {"A": 2}]})), "1,2");
    assert_eq!(
        payload(json!({"data": [{"a": 1, "b": 2}, {"a": 3, "b": 4}]})),
        "1,2,3,4"
    );
}

#[test]
fn single_cell_has_no_trailing_separator() {
    assert_eq!(payload(json!({"data": [{"A": 5}]})), "5");
}

#[test]
fn empty_data_array_is_an_empty_response() {
    let err = QueryResponse::from_json_value(json!({"data": []}))
        .expect("decode")
        .into_result_set()
        .expect_err("err");
    assert_eq!(err.kind(), ErrorKind::EmptyResponse);
    assert_eq!(err.message(), Some("could not get response from API"));
}

#[test]
fn missing_data_field_is_an_empty_response() {
    let err = QueryResponse::from_json_value(json!({}))
        .expect("decode")
        .into_result_set()
        .expect_err("err");
    assert_eq!(err.kind(), ErrorKind::EmptyResponse);
}

#[test]
fn oversized_payload_is_invalid() {
    let value = "x".repeat(300);
    let result = result_set(json!({"data": [{"BLOB": value}]}));
    let err = flatten(&result).expect_err("err");
    assert!(matches!(err, FlattenError::CeilingExceeded { byte_len: 300 }));
}

#[test]
fn flatten_is_deterministic() {
    let result = result_set(json!({"data": [{"A": "x,y", "B": 2.5}, {"A": "z", "B": 3}]}));
    let first = flatten(&result).expect("payload");
    let second = flatten(&result).expect("payload");
    assert_eq!(first.as_str(), second.as_str());
}

#[test]
fn escaping_preserves_comma_count_as_pipes() {
    let value = "a,b,c";
    let result = result_set(json!({"data": [{"CSV": value, "N": 1}]}));
    let payload = flatten(&result).expect("payload");

    let segment = payload.as_str().rsplit_once(',').expect("separator").0;
    assert_eq!(segment, "a|b|c");
    assert_eq!(
        segment.matches('|').count(),
        value.matches(',').count()
    );
}

#[test]
fn separator_count_is_pair_count_minus_one() {
    let result = result_set(json!({"data": [
        {"a": "1", "b": "2", "c": "3"},
        {"a": "4", "b": "5", "c": "6"},
    ]}));
    let payload = flatten(&result).expect("payload");
    assert_eq!(payload.as_str().matches(',').count(), 2 * 3 - 1);
}

#[test]
fn ceiling_is_inclusive_and_measured_in_bytes() {
    let fits = "x".repeat(PAYLOAD_BYTE_CEILING);
    let result = result_set(json!({"data": [{"BLOB": fits}]}));
    let payload = flatten(&result).expect("payload");
    assert_eq!(payload.byte_len(), PAYLOAD_BYTE_CEILING);

    // 86 snowmen are only 86 chars but 258 UTF-8 bytes.
    let wide = "\u{2603}".repeat(86);
    assert_eq!(wide.chars().count(), 86);
    let result = result_set(json!({"data": [{"BLOB": wide}]}));
    assert!(matches!(
        flatten(&result).expect_err("err"),
        FlattenError::CeilingExceeded { byte_len: 258 }
    ));

    let narrow = "\u{2603}".repeat(85);
    let result = result_set(json!({"data": [{"BLOB": narrow}]}));
    assert_eq!(flatten(&result).expect("payload").byte_len(), 255);
}

#[test]
fn zero_row_result_set_is_invalid() {
    let empty = ResultSet::from_rows(&[]).expect("empty set");
    assert!(matches!(
        flatten(&empty).expect_err("err"),
        FlattenError::EmptyResultSet
    ));
}

#[test]
fn scalars_stringify_canonically() {
    assert_eq!(
        payload(json!({"data": [{"i": 1, "f": 2.5, "t": true, "z": null, "s": "ok"}]})),
        "1,2.5,true,null,ok"
    );
}

#[test]
fn bare_row_array_is_accepted() {
    assert_eq!(payload(json!([{"A": 5}])), "5");
}

#[test]
fn ragged_rows_are_invalid() {
    let err = QueryResponse::from_json_value(json!({"data": [{"A": 1}, {"A": 2, "B": 3}]}))
        .expect("decode")
        .into_result_set()
        .expect_err("err");
    assert_eq!(err.kind(), ErrorKind::Invalid);
    assert_eq!(err.message(), Some("invalid response"));
}

#[test]
fn nested_values_are_invalid() {
    let err = QueryResponse::from_json_value(json!({"data": [{"A": {"nested": 1}}]}))
        .expect("decode")
        .into_result_set()
        .expect_err("err");
    assert_eq!(err.kind(), ErrorKind::Invalid);
}

#[test]
fn cell_payload_returns_one_unescaped_cell() {
    let result = result_set(json!({"data": [{"PRICE": 42.5, "NOTE": "a,b"}]}));
    assert_eq!(
        cell_payload(&result, "PRICE").expect("payload").as_str(),
        "42.5"
    );
    assert_eq!(
        cell_payload(&result, "NOTE").expect("payload").as_str(),
        "a,b"
    );
}

#[test]
fn cell_payload_rejects_unknown_column() {
    let result = result_set(json!({"data": [{"PRICE": 42.5}]}));
    assert!(matches!(
        cell_payload(&result, "QTY").expect_err("err"),
        FlattenError::ColumnNotFound { .. }
    ));
}

#[test]
fn cell_payload_enforces_the_ceiling() {
    let value = "y".repeat(257);
    let result = result_set(json!({"data": [{"BLOB": value}]}));
    assert!(matches!(
        cell_payload(&result, "BLOB").expect_err("err"),
        FlattenError::CeilingExceeded { byte_len: 257 }
    ));
}
