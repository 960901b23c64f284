use serde_json::Value;
use std::io;

use super::asset_rows;

/// Write output as CSV to stdout: one row per asset when the result has
/// per-asset fields, otherwise `field,value` pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => result,
            _ => map,
        },
        other => {
            let _ = wtr.write_record([format_csv_value(other)]);
            let _ = wtr.flush();
            return;
        }
    };

    if let Some((headers, rows)) = asset_rows(result) {
        let _ = wtr.write_record(&headers);
        for row in rows {
            let _ = wtr.write_record(&row);
        }
    } else {
        let _ = wtr.write_record(["field", "value"]);
        for (key, val) in result {
            let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
        }
    }

    let _ = wtr.flush();
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
