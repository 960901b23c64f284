pub mod asset_index;
pub mod state;

pub use asset_index::AssetIndex;
pub use state::{PortfolioSnapshot, PortfolioState, MAX_HOLDING};

use log::info;
use std::collections::{BTreeMap, HashMap};

use crate::cost::CostModel;
use crate::error::ConvexTraderError;
use crate::optimization::{
    MultiPeriodForecast, MultiPeriodOptimizer, Rebalance, SinglePeriodOptimizer, TradeMatrix,
    TradeVector, DEFAULT_RISK_AVERSION,
};
use crate::trade::Trade;
use crate::types::{Money, Weight};
use crate::ConvexTraderResult;

/// A tracked portfolio: holdings state, the log of applied trades and a
/// default risk aversion for rebalancing.
///
/// Optimization reads the current weights and never mutates the portfolio;
/// the caller decides which trades to execute.
#[derive(Debug, Clone)]
pub struct Portfolio {
    state: PortfolioState,
    trades: Vec<Trade>,
    risk_aversion: f64,
}

impl Default for Portfolio {
    fn default() -> Self {
        Portfolio {
            state: PortfolioState::new(),
            trades: Vec::new(),
            risk_aversion: DEFAULT_RISK_AVERSION,
        }
    }
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_risk_aversion(mut self, gamma: f64) -> ConvexTraderResult<Self> {
        if !gamma.is_finite() || gamma < 0.0 {
            return Err(ConvexTraderError::InvalidParameter {
                field: "risk_aversion".into(),
                reason: format!("must be finite and non-negative, got {}", gamma),
            });
        }
        self.risk_aversion = gamma;
        Ok(self)
    }

    /// Restore from a snapshot. The trade log starts empty.
    pub fn from_snapshot(snapshot: &PortfolioSnapshot) -> ConvexTraderResult<Self> {
        Ok(Portfolio {
            state: PortfolioState::from_snapshot(snapshot)?,
            ..Default::default()
        })
    }

    /// Apply a trade and record it. Rejected trades are not logged.
    pub fn execute_trade(&mut self, trade: Trade) -> ConvexTraderResult<()> {
        self.state.apply_trade(&trade)?;
        info!("executed {}", trade);
        self.trades.push(trade);
        Ok(())
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn risk_aversion(&self) -> f64 {
        self.risk_aversion
    }

    pub fn weights(&self) -> BTreeMap<String, Weight> {
        self.state.weights()
    }

    pub fn total_value(&self, prices: &HashMap<String, Money>) -> ConvexTraderResult<Money> {
        self.state.total_value(prices)
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        self.state.snapshot()
    }

    /// Single-period rebalance with the standard cost model. Returns are
    /// aligned with [`PortfolioState::symbols`].
    pub fn calculate_spo(
        &self,
        expected_returns: &[f64],
        gamma: f64,
    ) -> ConvexTraderResult<Rebalance<TradeVector>> {
        self.calculate_spo_with(
            &SinglePeriodOptimizer::new(),
            expected_returns,
            gamma,
            &CostModel::standard(),
        )
    }

    /// [`Portfolio::calculate_spo`] at the portfolio's own risk aversion.
    pub fn rebalance(&self, expected_returns: &[f64]) -> ConvexTraderResult<Rebalance<TradeVector>> {
        self.calculate_spo(expected_returns, self.risk_aversion)
    }

    pub fn calculate_spo_with<S: crate::solver::ConvexSolver>(
        &self,
        optimizer: &SinglePeriodOptimizer<S>,
        expected_returns: &[f64],
        gamma: f64,
        costs: &CostModel,
    ) -> ConvexTraderResult<Rebalance<TradeVector>> {
        optimizer.optimize(expected_returns, self.state.weights_vector(), gamma, costs)
    }

    /// Multi-period plan starting from the current weights.
    pub fn multi_period_optimize(
        &self,
        forecast: &MultiPeriodForecast,
    ) -> ConvexTraderResult<Rebalance<TradeMatrix>> {
        MultiPeriodOptimizer::new().optimize(forecast, self.state.weights_vector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SolveStatus;
    use crate::trade::TradeSide;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn trade(symbol: &str, qty: u64, side: TradeSide) -> Trade {
        let ts = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        Trade::new(symbol, qty, dec!(150), ts, side).unwrap()
    }

    #[test]
    fn test_trade_log_records_only_successes() {
        let mut p = Portfolio::new();
        p.execute_trade(trade("AAPL", 10, TradeSide::Buy)).unwrap();
        assert!(p.execute_trade(trade("AAPL", 11, TradeSide::Sell)).is_err());
        p.execute_trade(trade("AAPL", 4, TradeSide::Sell)).unwrap();
        assert_eq!(p.trades().len(), 2);
        assert_eq!(p.trades()[1].side(), TradeSide::Sell);
        assert_eq!(p.state().holding("AAPL"), 6);
    }

    #[test]
    fn test_rebalance_uses_default_gamma_and_does_not_mutate() {
        let mut p = Portfolio::new();
        p.execute_trade(trade("AAPL", 100, TradeSide::Buy)).unwrap();
        p.execute_trade(trade("MSFT", 100, TradeSide::Buy)).unwrap();
        assert_eq!(p.risk_aversion(), 0.5);

        let before = p.weights();
        let res = p.rebalance(&[0.08, 0.01]).unwrap();
        assert_eq!(res.status, SolveStatus::Optimal);
        assert_eq!(p.weights(), before);
        assert!(res.trades[0] > 0.0);
    }

    #[test]
    fn test_spo_length_must_match_symbols() {
        let mut p = Portfolio::new();
        p.execute_trade(trade("AAPL", 100, TradeSide::Buy)).unwrap();
        assert!(matches!(
            p.calculate_spo(&[0.1, 0.2], 0.5),
            Err(ConvexTraderError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_risk_aversion() {
        assert!(Portfolio::new().with_risk_aversion(-1.0).is_err());
        assert_eq!(
            Portfolio::new().with_risk_aversion(2.0).unwrap().risk_aversion(),
            2.0
        );
    }

    #[test]
    fn test_multi_period_from_current_weights() {
        let mut p = Portfolio::new();
        p.execute_trade(trade("AAPL", 50, TradeSide::Buy)).unwrap();
        p.execute_trade(trade("MSFT", 50, TradeSide::Buy)).unwrap();
        let forecast = MultiPeriodForecast {
            horizon: 3,
            expected_returns: vec![vec![0.0, 0.0], vec![0.05, 0.03], vec![0.04, 0.06]],
            risk_aversion: vec![1.0; 3],
            risk_factors: vec![vec![1.0, 1.0]; 3],
            trade_costs: vec![vec![0.01, 0.01]; 2],
            hold_costs: vec![vec![0.0, 0.0]; 2],
        };
        let res = p.multi_period_optimize(&forecast).unwrap();
        assert!(res.is_optimal());
        assert_eq!(res.trades.shape(), (2, 2));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut p = Portfolio::new();
        p.execute_trade(trade("AAPL", 100, TradeSide::Buy)).unwrap();
        p.execute_trade(trade("GOOGL", 50, TradeSide::Buy)).unwrap();
        let restored = Portfolio::from_snapshot(&p.snapshot()).unwrap();
        assert_eq!(restored.weights(), p.weights());
        assert!(restored.trades().is_empty());
    }
}
