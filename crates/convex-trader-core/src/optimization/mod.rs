//! Single- and multi-period rebalancing.
//!
//! Both optimizers validate their inputs up front and fail fast with a
//! [`ConvexTraderError`]. Anything the solver reports other than an optimal
//! solve is returned as zero trades carrying the solver's status.

pub mod multi_period;
pub mod single_period;

use serde::{Deserialize, Serialize};

use crate::error::ConvexTraderError;
use crate::solver::SolveStatus;
use crate::ConvexTraderResult;

pub use multi_period::{
    optimize_multi_period, MultiPeriodForecast, MultiPeriodInput, MultiPeriodOptimizer,
    MultiPeriodOutput, MultiPeriodSettings,
};
pub use single_period::{
    optimize_single_period, SinglePeriodInput, SinglePeriodOptimizer, SinglePeriodOutput,
    SinglePeriodSettings,
};

/// Risk aversion used when a caller does not supply one.
pub const DEFAULT_RISK_AVERSION: f64 = 0.5;

/// Weight-space trades for one period, aligned with the asset order.
pub type TradeVector = Vec<f64>;

/// Trades for `assets × periods`, stored column-major (one column per period).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMatrix {
    assets: usize,
    periods: usize,
    data: Vec<f64>,
}

impl TradeMatrix {
    pub fn zeros(assets: usize, periods: usize) -> Self {
        TradeMatrix {
            assets,
            periods,
            data: vec![0.0; assets * periods],
        }
    }

    pub(crate) fn from_column_major(assets: usize, periods: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), assets * periods);
        TradeMatrix {
            assets,
            periods,
            data,
        }
    }

    /// `(assets, periods)`
    pub fn shape(&self) -> (usize, usize) {
        (self.assets, self.periods)
    }

    pub fn get(&self, asset: usize, period: usize) -> Option<f64> {
        if asset >= self.assets || period >= self.periods {
            return None;
        }
        self.data.get(period * self.assets + asset).copied()
    }

    /// Trades of one period (column).
    pub fn period(&self, period: usize) -> Option<&[f64]> {
        if period >= self.periods {
            return None;
        }
        let start = period * self.assets;
        self.data.get(start..start + self.assets)
    }

    /// Row-major copy: one row per asset.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        (0..self.assets)
            .map(|i| {
                (0..self.periods)
                    .map(|t| self.data[t * self.assets + i])
                    .collect()
            })
            .collect()
    }

    pub fn is_all_zero(&self) -> bool {
        self.data.iter().all(|v| *v == 0.0)
    }
}

/// Result of one optimization call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rebalance<T> {
    pub status: SolveStatus,
    pub trades: T,
    /// Objective at the returned trades, present only for optimal solves.
    pub objective_value: Option<f64>,
    pub iterations: u32,
}

impl<T> Rebalance<T> {
    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }
}

pub(crate) fn check_len(field: &str, expected: usize, values: &[f64]) -> ConvexTraderResult<()> {
    if values.len() != expected {
        return Err(ConvexTraderError::dimension(field, expected, values.len()));
    }
    Ok(())
}

pub(crate) fn check_finite(field: &str, values: &[f64]) -> ConvexTraderResult<()> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ConvexTraderError::InvalidParameter {
            field: field.to_string(),
            reason: "values must be finite".into(),
        });
    }
    Ok(())
}

/// A `rows × cols` table with finite entries.
pub(crate) fn check_table(
    field: &str,
    rows: usize,
    cols: usize,
    table: &[Vec<f64>],
) -> ConvexTraderResult<()> {
    if table.len() != rows {
        return Err(ConvexTraderError::dimension(field, rows, table.len()));
    }
    for (i, row) in table.iter().enumerate() {
        let row_field = format!("{}[{}]", field, i);
        check_len(&row_field, cols, row)?;
        check_finite(&row_field, row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_matrix_layout() {
        let m = TradeMatrix::from_column_major(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.get(1, 0), Some(2.0));
        assert_eq!(m.get(0, 2), Some(5.0));
        assert_eq!(m.get(2, 0), None);
        assert_eq!(m.period(1), Some(&[3.0, 4.0][..]));
        assert_eq!(m.rows(), vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
        assert!(!m.is_all_zero());
        assert!(TradeMatrix::zeros(2, 2).is_all_zero());
    }

    #[test]
    fn test_check_table() {
        let t = vec![vec![0.1, 0.2], vec![0.3]];
        assert_eq!(
            check_table("returns", 2, 2, &t),
            Err(ConvexTraderError::dimension("returns[1]", 2, 1))
        );
        assert!(check_table("returns", 1, 2, &t[..1]).is_ok());
        assert!(matches!(
            check_table("returns", 1, 1, &[vec![f64::NAN]]),
            Err(ConvexTraderError::InvalidParameter { .. })
        ));
    }
}
