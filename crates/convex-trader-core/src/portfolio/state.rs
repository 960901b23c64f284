use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::asset_index::AssetIndex;
use crate::error::ConvexTraderError;
use crate::trade::{Trade, TradeSide};
use crate::types::{Money, Weight};
use crate::ConvexTraderResult;

/// Persistable form of a [`PortfolioState`]: the symbol order plus the
/// non-zero holdings. Restoring it reproduces identical vector alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub order: Vec<String>,
    pub holdings: BTreeMap<String, u64>,
}

/// Largest quantity a single position may reach. Up to this bound every
/// holding is exactly representable in the `f64` holdings vector.
pub const MAX_HOLDING: u64 = 1 << 53;

/// Holdings keyed by symbol plus dense vectors aligned with the asset index.
///
/// Mutated only through [`PortfolioState::apply_trade`].
#[derive(Debug, Clone, Default)]
pub struct PortfolioState {
    index: AssetIndex,
    holdings: HashMap<String, u64>,
    holdings_vector: Vec<f64>,
    weights_vector: Vec<Weight>,
}

impl PortfolioState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one trade. A rejected sell leaves the state untouched.
    pub fn apply_trade(&mut self, trade: &Trade) -> ConvexTraderResult<()> {
        let symbol = trade.symbol();
        let quantity = trade.quantity();

        match trade.side() {
            TradeSide::Buy => {
                let held = self
                    .holding(symbol)
                    .checked_add(quantity)
                    .filter(|q| *q <= MAX_HOLDING)
                    .ok_or_else(|| ConvexTraderError::InvalidParameter {
                        field: "quantity".into(),
                        reason: format!("{} holding would exceed {}", symbol, MAX_HOLDING),
                    })?;
                let idx = self.slot_for(symbol);
                self.holdings.insert(symbol.to_string(), held);
                self.holdings_vector[idx] = held as f64;
            }
            TradeSide::Sell => {
                let held = self.holding(symbol);
                if held < quantity {
                    return Err(ConvexTraderError::InsufficientHoldings {
                        symbol: symbol.to_string(),
                        held,
                        requested: quantity,
                    });
                }
                // A held symbol always has a slot.
                let idx = self.slot_for(symbol);
                let remaining = held - quantity;
                if remaining == 0 {
                    self.holdings.remove(symbol);
                } else {
                    self.holdings.insert(symbol.to_string(), remaining);
                }
                self.holdings_vector[idx] = remaining as f64;
            }
        }

        self.update_weights();
        Ok(())
    }

    /// Current weights keyed by symbol, including closed positions at zero.
    pub fn weights(&self) -> BTreeMap<String, Weight> {
        self.index
            .symbols()
            .iter()
            .cloned()
            .zip(self.weights_vector.iter().copied())
            .collect()
    }

    /// Market value of all holdings. Every held symbol must be priced.
    pub fn total_value(&self, prices: &HashMap<String, Money>) -> ConvexTraderResult<Money> {
        let mut total = Decimal::ZERO;
        for symbol in self.index.symbols() {
            let held = self.holding(symbol);
            if held == 0 {
                continue;
            }
            let price = prices
                .get(symbol)
                .ok_or_else(|| ConvexTraderError::MissingPrice(symbol.clone()))?;
            total += Decimal::from(held) * *price;
        }
        Ok(total)
    }

    pub fn symbols(&self) -> &[String] {
        self.index.symbols()
    }

    pub fn holdings(&self) -> &HashMap<String, u64> {
        &self.holdings
    }

    pub fn holding(&self, symbol: &str) -> u64 {
        self.holdings.get(symbol).copied().unwrap_or(0)
    }

    pub fn holdings_vector(&self) -> &[f64] {
        &self.holdings_vector
    }

    pub fn weights_vector(&self) -> &[Weight] {
        &self.weights_vector
    }

    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol)
    }

    /// Number of tracked assets (the optimizer dimension n).
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            order: self.index.symbols().to_vec(),
            holdings: self
                .holdings
                .iter()
                .map(|(s, q)| (s.clone(), *q))
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: &PortfolioSnapshot) -> ConvexTraderResult<Self> {
        let mut state = PortfolioState::new();
        for symbol in &snapshot.order {
            if symbol.trim().is_empty() {
                return Err(ConvexTraderError::Validation {
                    field: "order".into(),
                    reason: "Symbols must be non-empty".into(),
                });
            }
            let (_, created) = state.index.get_or_insert(symbol);
            if !created {
                return Err(ConvexTraderError::Validation {
                    field: "order".into(),
                    reason: format!("Duplicate symbol {}", symbol),
                });
            }
            state.holdings_vector.push(0.0);
            state.weights_vector.push(0.0);
        }

        for (symbol, &quantity) in &snapshot.holdings {
            let idx = state.index.get(symbol).ok_or_else(|| ConvexTraderError::Validation {
                field: "holdings".into(),
                reason: format!("{} is held but missing from order", symbol),
            })?;
            if quantity == 0 {
                return Err(ConvexTraderError::Validation {
                    field: "holdings".into(),
                    reason: format!("{} has a zero quantity entry", symbol),
                });
            }
            if quantity > MAX_HOLDING {
                return Err(ConvexTraderError::Validation {
                    field: "holdings".into(),
                    reason: format!("{} exceeds the maximum holding {}", symbol, MAX_HOLDING),
                });
            }
            state.holdings.insert(symbol.clone(), quantity);
            state.holdings_vector[idx] = quantity as f64;
        }

        state.update_weights();
        Ok(state)
    }

    /// Slot for `symbol`, growing both vectors with a zero entry if new.
    fn slot_for(&mut self, symbol: &str) -> usize {
        let (idx, created) = self.index.get_or_insert(symbol);
        if created {
            self.holdings_vector.push(0.0);
            self.weights_vector.push(0.0);
        }
        idx
    }

    fn update_weights(&mut self) {
        let total: f64 = self.holdings_vector.iter().sum();
        self.weights_vector = if total > 0.0 {
            self.holdings_vector.iter().map(|h| h / total).collect()
        } else {
            vec![0.0; self.holdings_vector.len()]
        };
    }
}
