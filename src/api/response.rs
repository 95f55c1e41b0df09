//! Purpose: Model the query API response envelope.
//! Exports: `QueryResponse`.
//! Role: Explicit presence checks between the transport and the tabular model.
//! Invariants: Absent, null, and empty `data` all map to the same EmptyResponse error.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use crate::core::table::ResultSet;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

/// The response object returned by the query API. Only the `data` field is
/// modeled; any other metadata the service returns is ignored.
#[derive(Clone, Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    data: Option<Vec<Map<String, JsonValue>>>,
}

impl QueryResponse {
    /// Accepts either a full response object (with a `data` field) or a bare
    /// array of row-objects, as saved responses come in both shapes.
    pub fn from_json_value(value: JsonValue) -> Result<Self, Error> {
        match value {
            JsonValue::Array(_) => {
                let rows = serde_json::from_value(value).map_err(|err| {
                    Error::new(ErrorKind::Invalid)
                        .with_message("invalid response")
                        .with_hint("Rows must be flat JSON objects of scalars.")
                        .with_source(err)
                })?;
                Ok(Self { data: Some(rows) })
            }
            JsonValue::Object(_) => serde_json::from_value(value).map_err(|err| {
                Error::new(ErrorKind::Invalid)
                    .with_message("invalid response")
                    .with_hint("The data field must be an array of flat row objects.")
                    .with_source(err)
            }),
            _ => Err(Error::new(ErrorKind::Invalid)
                .with_message("invalid response")
                .with_hint("Provide a response object or a JSON array of rows.")),
        }
    }

    pub fn rows(&self) -> Option<&[Map<String, JsonValue>]> {
        self.data.as_deref()
    }

    pub fn has_rows(&self) -> bool {
        self.data.as_ref().is_some_and(|rows| !rows.is_empty())
    }

    /// Converts into the typed model. No rows at all is EmptyResponse; rows
    /// that break the tabular contract are Invalid.
    pub fn into_result_set(self) -> Result<ResultSet, Error> {
        let rows = match self.data.as_deref() {
            Some(rows) if !rows.is_empty() => rows,
            _ => {
                return Err(Error::new(ErrorKind::EmptyResponse)
                    .with_message("could not get response from API")
                    .with_hint("Check that the query selects at least one row."));
            }
        };
        ResultSet::from_rows(rows).map_err(|err| {
            Error::new(ErrorKind::Invalid)
                .with_message("invalid response")
                .with_source(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::QueryResponse;
    use crate::core::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn missing_and_null_data_mean_no_rows() {
        let missing: QueryResponse = serde_json::from_str(r#"{"status": "ok"}"#).expect("decode");
        assert!(!missing.has_rows());
        assert!(missing.rows().is_none());

        let null: QueryResponse = serde_json::from_str(r#"{"data": null}"#).expect("decode");
        assert!(!null.has_rows());
    }

    #[test]
    fn empty_data_array_has_no_rows() {
        let response: QueryResponse = serde_json::from_str(r#"{"data": []}"#).expect("decode");
        assert!(!response.has_rows());
        assert!(response.rows().is_some());
    }

    #[test]
    fn rows_survive_decoding() {
        let response: QueryResponse =
            serde_json::from_str(r#"{"data": [{"a": 1}, {"a": 2}]}"#).expect("decode");
        assert!(response.has_rows());
        assert_eq!(response.rows().map(|rows| rows.len()), Some(2));
    }

    #[test]
    fn into_result_set_raises_empty_response() {
        let empty: QueryResponse = serde_json::from_str(r#"{"data": []}"#).expect("decode");
        let err = empty.into_result_set().expect_err("err");
        assert_eq!(err.kind(), ErrorKind::EmptyResponse);

        let missing: QueryResponse = serde_json::from_str(r#"{}"#).expect("decode");
        let err = missing.into_result_set().expect_err("err");
        assert_eq!(err.kind(), ErrorKind::EmptyResponse);
    }

    #[test]
    fn into_result_set_flags_broken_rows() {
        let response: QueryResponse =
            serde_json::from_str(r#"{"data": [{"a": {"nested": true}}]}"#).expect("decode");
        let err = response.into_result_set().expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn from_json_value_accepts_both_shapes() {
        let from_object =
            QueryResponse::from_json_value(json!({"data": [{"a": 1}]})).expect("object");
        assert!(from_object.has_rows());

        let from_array = QueryResponse::from_json_value(json!([{"a": 1}])).expect("array");
        assert!(from_array.has_rows());

        let err = QueryResponse::from_json_value(json!("just a string")).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn from_json_value_rejects_non_object_rows() {
        let err = QueryResponse::from_json_value(json!([1, 2, 3])).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }
}
