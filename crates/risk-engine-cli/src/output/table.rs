use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{as_keyed_records, record_headers};

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_object(value);
            }
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Array(arr) => print_array_table(arr),
        _ => print_object(result),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                println!("  - {}", format_warning(w));
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Keyed records become one row per key; anything else a field/value table.
fn print_object(value: &Value) {
    if let Some(records) = as_keyed_records(value) {
        print_keyed_table(records);
        return;
    }
    if let Value::Object(map) = value {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in map {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("{}", Table::from(builder));
    }
}

fn print_keyed_table(records: &Map<String, Value>) {
    let headers = record_headers(records.values());
    let mut builder = Builder::default();
    let mut header_row = vec!["name".to_string()];
    header_row.extend(headers.iter().cloned());
    builder.push_record(header_row);

    for (name, record) in records {
        let mut row = vec![name.clone()];
        row.extend(headers.iter().map(|h| {
            record
                .get(h.as_str())
                .map(format_value)
                .unwrap_or_default()
        }));
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if arr.iter().all(Value::is_object) {
        let headers = record_headers(arr.iter());
        let mut builder = Builder::default();
        builder.push_record(&headers);
        for item in arr {
            let row: Vec<String> = headers
                .iter()
                .map(|h| item.get(h.as_str()).map(format_value).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

/// `kind: detail` for a tagged warning, the raw text otherwise.
fn format_warning(w: &Value) -> String {
    match w {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let kind = map.get("kind").and_then(Value::as_str).unwrap_or("warning");
            let detail: Vec<String> = map
                .iter()
                .filter(|(k, _)| k.as_str() != "kind")
                .map(|(k, v)| format!("{k}={}", format_value(v)))
                .collect();
            format!("{kind}: {}", detail.join(", "))
        }
        other => format_value(other),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
