pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;
use std::error::Error;

/// Read typed input from `--input <file>` or, failing that, piped stdin.
/// `what` names the command input in error messages.
pub fn read_input<T: DeserializeOwned>(path: Option<&str>, what: &str) -> Result<T, Box<dyn Error>> {
    match path {
        Some(path) => file::read_json(path, what),
        None => stdin::read_piped(what)?.ok_or_else(|| {
            format!("no {} input: pass --input <file.json> or pipe JSON on stdin", what).into()
        }),
    }
}

fn parse_json<T: DeserializeOwned>(text: &str, what: &str, source: &str) -> Result<T, Box<dyn Error>> {
    serde_json::from_str(text)
        .map_err(|e| format!("Invalid {} input from {}: {}", what, source, e).into())
}
