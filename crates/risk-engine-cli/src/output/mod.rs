pub mod csv_out;
pub mod json;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
    }
}

/// An object whose every value is itself an object, such as stress results
/// keyed by scenario name.
pub(crate) fn as_keyed_records(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) if !map.is_empty() && map.values().all(Value::is_object) => Some(map),
        _ => None,
    }
}

/// Column headers for a list of records: keys of the first record, then any
/// keys only later records carry.
pub(crate) fn record_headers<'a>(records: impl Iterator<Item = &'a Value>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for record in records {
        if let Value::Object(map) = record {
            for key in map.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
        }
    }
    headers
}
