use serde_json::{Map, Value};
use std::io;

use super::{as_keyed_records, record_headers};

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Array(results)) => write_array_csv(&mut wtr, results),
            Some(result) => write_object_csv(&mut wtr, result),
            None => write_object_csv(&mut wtr, value),
        },
        Value::Array(arr) => write_array_csv(&mut wtr, arr),
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_object_csv(wtr: &mut StdoutWriter<'_>, value: &Value) {
    if let Some(records) = as_keyed_records(value) {
        write_keyed_csv(wtr, records);
    } else if let Value::Object(map) = value {
        let _ = wtr.write_record(["field", "value"]);
        for (key, val) in map {
            let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
        }
    } else {
        let _ = wtr.write_record([&format_csv_value(value)]);
    }
}

fn write_keyed_csv(wtr: &mut StdoutWriter<'_>, records: &Map<String, Value>) {
    let headers = record_headers(records.values());
    let mut header_row = vec!["name".to_string()];
    header_row.extend(headers.iter().cloned());
    let _ = wtr.write_record(&header_row);
    for (name, record) in records {
        let mut row = vec![name.clone()];
        row.extend(
            headers
                .iter()
                .map(|h| record.get(h.as_str()).map(format_csv_value).unwrap_or_default()),
        );
        let _ = wtr.write_record(&row);
    }
}

fn write_array_csv(wtr: &mut StdoutWriter<'_>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if arr.iter().all(Value::is_object) {
        let headers = record_headers(arr.iter());
        let _ = wtr.write_record(&headers);
        for item in arr {
            let row: Vec<String> = headers
                .iter()
                .map(|h| item.get(h.as_str()).map(format_csv_value).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&row);
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
