use serde::de::DeserializeOwned;
use std::error::Error;
use std::io::{self, Read};

use super::parse_json;

/// Typed input piped on stdin. `None` when stdin is a terminal or blank.
pub fn read_piped<T: DeserializeOwned>(what: &str) -> Result<Option<T>, Box<dyn Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    read_from(io::stdin().lock(), what)
}

fn read_from<R: Read, T: DeserializeOwned>(
    mut reader: R,
    what: &str,
) -> Result<Option<T>, Box<dyn Error>> {
    let mut buffer = String::new();
    reader.read_to_string(&mut buffer)?;
    match buffer.trim() {
        "" => Ok(None),
        text => parse_json(text, what, "stdin").map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convex_trader_core::optimization::SinglePeriodInput;
    use std::io::Cursor;

    #[test]
    fn test_blank_stdin_is_none() {
        let parsed: Option<SinglePeriodInput> = read_from(Cursor::new(" \n\t"), "spo").unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_piped_input_is_typed() {
        let json = r#"{"expected_returns": [0.1, 0.0], "current_weights": [0.5, 0.5]}"#;
        let parsed: Option<SinglePeriodInput> = read_from(Cursor::new(json), "spo").unwrap();
        let input = parsed.unwrap();
        assert_eq!(input.expected_returns, vec![0.1, 0.0]);
        assert_eq!(input.risk_aversion, 0.5);
    }

    #[test]
    fn test_parse_error_names_the_input() {
        let err = read_from::<_, SinglePeriodInput>(Cursor::new("{\"expected_returns\": 1}"), "spo")
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid spo input from stdin"));
    }
}
