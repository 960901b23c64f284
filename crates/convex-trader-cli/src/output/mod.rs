pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Result fields that carry one entry per asset.
const PER_ASSET_FIELDS: [&str; 4] = ["holdings", "weights", "trades", "post_trade_weights"];

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("failed to render JSON: {}", e),
        },
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Per-asset view of a result: a header row and one row per asset, labelled
/// by `symbols` when present. None when the result has no per-asset arrays.
pub(crate) fn asset_rows(result: &Map<String, Value>) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let columns: Vec<(&str, &Vec<Value>)> = PER_ASSET_FIELDS
        .iter()
        .filter_map(|k| match result.get(*k) {
            Some(Value::Array(a)) => Some((*k, a)),
            _ => None,
        })
        .collect();
    let n = columns.first()?.1.len();
    if n == 0 || columns.iter().any(|(_, a)| a.len() != n) {
        return None;
    }

    let labels: Vec<String> = match result.get("symbols") {
        Some(Value::Array(s)) if s.len() == n => s.iter().map(format_value).collect(),
        _ => (0..n).map(|i| format!("asset_{}", i)).collect(),
    };

    let mut headers = vec!["symbol".to_string()];
    headers.extend(columns.iter().map(|(k, _)| k.to_string()));
    let rows = (0..n)
        .map(|i| {
            let mut row = vec![labels[i].clone()];
            row.extend(columns.iter().map(|(_, a)| format_value(&a[i])));
            row
        })
        .collect();
    Some((headers, rows))
}

pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_asset_rows_labels_by_symbol() {
        let result = json!({
            "symbols": ["AAPL", "MSFT"],
            "status": "optimal",
            "trades": [0.1, -0.1],
            "post_trade_weights": [0.6, 0.4],
        });
        let (headers, rows) = asset_rows(result.as_object().unwrap()).unwrap();
        assert_eq!(headers, vec!["symbol", "trades", "post_trade_weights"]);
        assert_eq!(rows[1], vec!["MSFT", "-0.1", "0.4"]);
    }

    #[test]
    fn test_asset_rows_requires_matching_lengths() {
        let result = json!({"holdings": [1, 2], "weights": [1.0]});
        assert!(asset_rows(result.as_object().unwrap()).is_none());
        let scalar = json!({"status": "optimal"});
        assert!(asset_rows(scalar.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_asset_rows_default_labels() {
        let result = json!({"trades": [[0.1, 0.0], [-0.1, 0.0]]});
        let (_, rows) = asset_rows(result.as_object().unwrap()).unwrap();
        assert_eq!(rows[0], vec!["asset_0", "0.1, 0.0"]);
    }
}
