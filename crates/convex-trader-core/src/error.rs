use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConvexTraderError {
    #[error("Validation error: {field} — {reason}")]
    Validation { field: String, reason: String },

    #[error("Insufficient holdings: cannot sell {requested} {symbol}, only {held} held")]
    InsufficientHoldings {
        symbol: String,
        held: u64,
        requested: u64,
    },

    #[error("Dimension mismatch: {field} expected {expected} entries but got {actual}")]
    DimensionMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid parameter: {field} — {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Missing price for {0}")]
    MissingPrice(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ConvexTraderError {
    pub(crate) fn dimension(field: impl Into<String>, expected: usize, actual: usize) -> Self {
        ConvexTraderError::DimensionMismatch {
            field: field.into(),
            expected,
            actual,
        }
    }
}

impl From<serde_json::Error> for ConvexTraderError {
    fn from(e: serde_json::Error) -> Self {
        ConvexTraderError::Serialization(e.to_string())
    }
}
