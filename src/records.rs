//! Decoding of `output_mode=json` result documents.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::models::splunk::ResultRow;

#[derive(Debug, Deserialize)]
struct ResultsDocument {
    results: Option<Vec<Map<String, Value>>>,
}

/// Parse the `results` array into rows, keeping server order.
///
/// Rows stay sparse: a field missing (or `null`) in one record is absent from
/// that row instead of being filled with an empty string.
pub fn parse_results(raw: &str) -> Result<Vec<ResultRow>, ProtocolError> {
    let document: ResultsDocument = serde_json::from_str(raw)?;
    let records = document.results.ok_or(ProtocolError::MissingResults)?;

    Ok(records.into_iter().map(into_row).collect())
}

fn into_row(record: Map<String, Value>) -> ResultRow {
    record
        .into_iter()
        .filter_map(|(field, value)| render(value).map(|v| (field, v)))
        .collect()
}

fn render(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        // Multivalue fields, joined the way Splunk displays them.
        Value::Array(values) => Some(
            values
                .into_iter()
                .filter_map(render)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        other => Some(other.to_string()),
    }
}
