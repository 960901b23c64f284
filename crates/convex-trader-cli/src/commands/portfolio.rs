use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use convex_trader_core::{Money, Portfolio, PortfolioSnapshot, Trade};

use crate::input;

#[derive(Args)]
pub struct PortfolioArgs {
    #[arg(long)]
    pub input: Option<String>,

    /// Override the risk aversion used for rebalancing
    #[arg(long)]
    pub gamma: Option<f64>,
}

/// Trades to replay, optionally on top of a saved snapshot.
#[derive(Debug, Deserialize)]
struct PortfolioCommandInput {
    #[serde(default)]
    snapshot: Option<PortfolioSnapshot>,
    #[serde(default)]
    trades: Vec<Trade>,
    #[serde(default)]
    prices: Option<HashMap<String, Money>>,
    /// Aligned with the portfolio's symbol order; triggers a rebalance.
    #[serde(default)]
    expected_returns: Option<Vec<f64>>,
    #[serde(default)]
    risk_aversion: Option<f64>,
}

pub fn run_portfolio(args: PortfolioArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let cmd: PortfolioCommandInput = input::read_input(args.input.as_deref(), "portfolio")?;

    let mut portfolio = match &cmd.snapshot {
        Some(snapshot) => Portfolio::from_snapshot(snapshot)?,
        None => Portfolio::new(),
    };
    if let Some(gamma) = args.gamma.or(cmd.risk_aversion) {
        portfolio = portfolio.with_risk_aversion(gamma)?;
    }

    for (i, trade) in cmd.trades.into_iter().enumerate() {
        trade
            .validate()
            .and_then(|_| portfolio.execute_trade(trade))
            .map_err(|e| format!("trade #{}: {}", i, e))?;
    }

    let state = portfolio.state();
    let symbols = state.symbols().to_vec();
    let holdings: Vec<u64> = symbols.iter().map(|s| state.holding(s)).collect();
    let mut warnings: Vec<String> = Vec::new();

    let total_value = match &cmd.prices {
        Some(prices) => Some(portfolio.total_value(prices)?),
        None => None,
    };

    let rebalance = match &cmd.expected_returns {
        Some(r) => {
            let res = portfolio.rebalance(r)?;
            if !res.is_optimal() {
                warnings.push(format!("Solver returned {}; no trades recommended", res.status));
            }
            Some(res)
        }
        None => None,
    };

    let mut result = json!({
        "symbols": symbols,
        "holdings": holdings,
        "weights": state.weights_vector(),
        "trade_count": portfolio.trades().len(),
        "risk_aversion": portfolio.risk_aversion(),
        "total_value": total_value.map(|v| v.to_string()),
        "snapshot": portfolio.snapshot(),
    });
    if let (Some(res), Value::Object(map)) = (rebalance, &mut result) {
        map.insert("status".into(), json!(res.status));
        map.insert("trades".into(), json!(res.trades));
        map.insert("objective_value".into(), json!(res.objective_value));
    }

    Ok(json!({
        "result": result,
        "methodology": "Trade replay with single-period convex rebalance",
        "warnings": warnings,
    }))
}
