use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConvexTraderError;
use crate::types::Money;
use crate::ConvexTraderResult;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// A single executed buy or sell of one symbol.
///
/// Fields are private so a `Trade` can only exist in a validated state;
/// use [`Trade::new`] or deserialize and call [`Trade::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    symbol: String,
    quantity: u64,
    price: Money,
    timestamp: NaiveDateTime,
    side: TradeSide,
}

impl Trade {
    pub fn new(
        symbol: impl Into<String>,
        quantity: u64,
        price: Money,
        timestamp: NaiveDateTime,
        side: TradeSide,
    ) -> ConvexTraderResult<Self> {
        let trade = Trade {
            symbol: symbol.into(),
            quantity,
            price,
            timestamp,
            side,
        };
        trade.validate()?;
        Ok(trade)
    }

    /// Re-check field constraints, e.g. after deserialization.
    pub fn validate(&self) -> ConvexTraderResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(ConvexTraderError::Validation {
                field: "symbol".into(),
                reason: "Must be a non-empty ticker".into(),
            });
        }
        if self.quantity == 0 {
            return Err(ConvexTraderError::Validation {
                field: "quantity".into(),
                reason: "Must be a positive integer".into(),
            });
        }
        if self.price <= Decimal::ZERO {
            return Err(ConvexTraderError::Validation {
                field: "price".into(),
                reason: format!("Must be positive, got {}", self.price),
            });
        }
        Ok(())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn side(&self) -> TradeSide {
        self.side
    }

    /// Quantity times execution price.
    pub fn notional(&self) -> Money {
        Decimal::from(self.quantity) * self.price
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Trade(symbol={}, quantity={}, price={}, date={}, type={})>",
            self.symbol,
            self.quantity,
            self.price,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.side
        )
    }
}
