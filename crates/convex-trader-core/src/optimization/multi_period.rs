use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{check_finite, check_len, check_table, Rebalance, TradeMatrix};
use crate::error::ConvexTraderError;
use crate::solver::expr::{weighted_abs, weighted_sum_squares};
use crate::solver::{
    AffineVec, ClarabelSolver, ConvexSolver, Constraint, Problem, ScalarExpr, SolveStatus,
    SolverSettings, Variable,
};
use crate::types::{with_metadata, ComputationOutput};
use crate::ConvexTraderResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Per-period forecasts over a horizon of `H` periods.
///
/// Period `τ` runs `1..H`. `expected_returns`, `risk_aversion` and
/// `risk_factors` have `H` rows indexed by `τ` (row 0 describes the current
/// period and is unused). `trade_costs` and `hold_costs` have either `H` rows
/// indexed by `τ` or `H − 1` rows indexed by `τ − 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPeriodForecast {
    pub horizon: usize,
    pub expected_returns: Vec<Vec<f64>>,
    pub risk_aversion: Vec<f64>,
    pub risk_factors: Vec<Vec<f64>>,
    pub trade_costs: Vec<Vec<f64>>,
    pub hold_costs: Vec<Vec<f64>>,
}

impl MultiPeriodForecast {
    fn cost_row<'a>(&self, costs: &'a [Vec<f64>], period: usize) -> &'a [f64] {
        if costs.len() == self.horizon {
            &costs[period]
        } else {
            &costs[period - 1]
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiPeriodSettings {
    /// Add `w_τ ≥ 0` for every period.
    pub long_only: bool,
}

/// JSON input for [`optimize_multi_period`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiPeriodInput {
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
    #[serde(flatten)]
    pub forecast: MultiPeriodForecast,
    pub current_weights: Vec<f64>,
    #[serde(default)]
    pub settings: MultiPeriodSettings,
    #[serde(default)]
    pub solver: SolverSettings,
}

/// Output of [`optimize_multi_period`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiPeriodOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<String>>,
    pub status: SolveStatus,
    /// One row per asset, one column per period `τ = 1..H`.
    pub trades: Vec<Vec<f64>>,
    /// Planned weights `w_τ`, one row per period.
    pub planned_weights: Vec<Vec<f64>>,
    pub objective_value: Option<f64>,
    pub iterations: u32,
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// Plans trades `z_τ` for `τ = 1..H` with `w_τ = w_{τ−1} + z_τ`, maximizing
///
/// `Σ_τ r_τ·w_τ − γ_τ·Σ ψ_τ⊙w_τ² − Σ h_τ⊙w_τ − Σ c_τ⊙|z_τ|`
///
/// subject to `Σ w_τ = 1` in every period.
#[derive(Debug, Clone)]
pub struct MultiPeriodOptimizer<S: ConvexSolver = ClarabelSolver> {
    solver: S,
    settings: MultiPeriodSettings,
}

impl MultiPeriodOptimizer<ClarabelSolver> {
    pub fn new() -> Self {
        Self::with_solver(ClarabelSolver::default())
    }
}

impl Default for MultiPeriodOptimizer<ClarabelSolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ConvexSolver> MultiPeriodOptimizer<S> {
    pub fn with_solver(solver: S) -> Self {
        MultiPeriodOptimizer {
            solver,
            settings: MultiPeriodSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: MultiPeriodSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Trade matrix of shape `n × (H − 1)`, or zeros with the solver's status
    /// when the solve is not optimal.
    pub fn optimize(
        &self,
        forecast: &MultiPeriodForecast,
        current_weights: &[f64],
    ) -> ConvexTraderResult<Rebalance<TradeMatrix>> {
        let (problem, z) = self.build_problem(forecast, current_weights)?;
        let n = current_weights.len();
        let periods = forecast.horizon - 1;

        let solution = self.solver.solve(&problem);
        if let (SolveStatus::Optimal, Some(values)) = (solution.status, solution.value(&z)) {
            debug!(
                "multi-period: optimal after {} iterations over {} periods",
                solution.iterations, periods
            );
            return Ok(Rebalance {
                status: SolveStatus::Optimal,
                trades: TradeMatrix::from_column_major(n, periods, values),
                objective_value: solution.objective_value,
                iterations: solution.iterations,
            });
        }

        let status = match solution.status {
            SolveStatus::Optimal => SolveStatus::Error,
            other => other,
        };
        warn!(
            "multi-period: solver returned {}, falling back to zero trades",
            status
        );
        Ok(Rebalance {
            status,
            trades: TradeMatrix::zeros(n, periods),
            objective_value: None,
            iterations: solution.iterations,
        })
    }

    pub fn build_problem(
        &self,
        forecast: &MultiPeriodForecast,
        current_weights: &[f64],
    ) -> ConvexTraderResult<(Problem, Variable)> {
        validate(forecast, current_weights)?;
        let n = current_weights.len();
        let h = forecast.horizon;

        let mut problem = Problem::new();
        let z = problem.matrix_variable(n, h - 1);

        let mut objective = ScalarExpr::zero();
        let mut weights = AffineVec::constants(current_weights);
        for tau in 1..h {
            let trades = z.column(tau - 1);
            weights = weights.plus(&trades);

            let gamma = forecast.risk_aversion[tau];
            let risk: Vec<f64> = forecast.risk_factors[tau].iter().map(|psi| gamma * psi).collect();
            let hold = forecast.cost_row(&forecast.hold_costs, tau);
            let trade = forecast.cost_row(&forecast.trade_costs, tau);

            objective = objective + ScalarExpr::from(weights.dot(&forecast.expected_returns[tau]))
                - weighted_sum_squares(&weights, &risk)
                - ScalarExpr::from(weights.dot(hold))
                - weighted_abs(&trades, trade);

            problem.constrain(Constraint::eq(weights.sum(), 1.0));
            if self.settings.long_only {
                problem.constrain_all(Constraint::elementwise_ge(&weights, &vec![0.0; n]));
            }
        }
        problem.maximize(objective);

        Ok((problem, z))
    }
}

fn validate(forecast: &MultiPeriodForecast, current_weights: &[f64]) -> ConvexTraderResult<()> {
    let h = forecast.horizon;
    if h < 2 {
        return Err(ConvexTraderError::InvalidParameter {
            field: "horizon".into(),
            reason: format!("at least 2 periods are required, got {}", h),
        });
    }
    let n = current_weights.len();
    if n == 0 {
        return Err(ConvexTraderError::InvalidParameter {
            field: "current_weights".into(),
            reason: "at least one asset is required".into(),
        });
    }
    check_finite("current_weights", current_weights)?;

    check_table("expected_returns", h, n, &forecast.expected_returns)?;
    check_len("risk_aversion", h, &forecast.risk_aversion)?;
    check_finite("risk_aversion", &forecast.risk_aversion)?;
    check_table("risk_factors", h, n, &forecast.risk_factors)?;

    for (field, costs) in [
        ("trade_costs", &forecast.trade_costs),
        ("hold_costs", &forecast.hold_costs),
    ] {
        let rows = if costs.len() == h - 1 { h - 1 } else { h };
        check_table(field, rows, n, costs)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Plan a multi-period rebalance described entirely by JSON input.
pub fn optimize_multi_period(
    input: &MultiPeriodInput,
) -> ConvexTraderResult<ComputationOutput<MultiPeriodOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let n = input.current_weights.len();

    if let Some(symbols) = &input.symbols {
        if symbols.len() != n {
            return Err(ConvexTraderError::dimension("symbols", n, symbols.len()));
        }
    }

    let optimizer = MultiPeriodOptimizer::with_solver(ClarabelSolver::new(input.solver.clone()))
        .with_settings(input.settings.clone());
    let rebalance = optimizer.optimize(&input.forecast, &input.current_weights)?;

    if !rebalance.is_optimal() {
        warnings.push(format!(
            "Solver returned {}; no trades recommended",
            rebalance.status
        ));
    }
    if input.forecast.risk_aversion.iter().any(|g| *g < 0.0) {
        warnings.push("Negative risk aversion makes the plan non-convex".into());
    }

    let (_, periods) = rebalance.trades.shape();
    let mut weights = Vec::with_capacity(periods);
    let mut current = input.current_weights.clone();
    for t in 0..periods {
        if let Some(z) = rebalance.trades.period(t) {
            for (w, dz) in current.iter_mut().zip(z) {
                *w += dz;
            }
        }
        weights.push(current.clone());
    }

    let output = MultiPeriodOutput {
        symbols: input.symbols.clone(),
        status: rebalance.status,
        trades: rebalance.trades.rows(),
        planned_weights: weights,
        objective_value: rebalance.objective_value,
        iterations: rebalance.iterations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Multi-period convex rebalance (Clarabel interior point)",
        &serde_json::json!({
            "n_assets": n,
            "horizon": input.forecast.horizon,
            "long_only": input.settings.long_only,
            "self_financing": true,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn forecast_h3() -> MultiPeriodForecast {
        MultiPeriodForecast {
            horizon: 3,
            expected_returns: vec![vec![0.0, 0.0], vec![0.10, 0.0], vec![0.04, 0.06]],
            risk_aversion: vec![1.0, 1.0, 1.0],
            risk_factors: vec![vec![1.0, 1.0]; 3],
            trade_costs: vec![vec![0.01, 0.01]; 2],
            hold_costs: vec![vec![0.0, 0.0]; 3],
        }
    }

    #[test]
    fn test_two_assets_three_periods() {
        let res = MultiPeriodOptimizer::new()
            .optimize(&forecast_h3(), &[0.5, 0.5])
            .unwrap();
        assert_eq!(res.status, SolveStatus::Optimal);
        assert_eq!(res.trades.shape(), (2, 2));

        let mut w = vec![0.5, 0.5];
        for t in 0..2 {
            let z = res.trades.period(t).unwrap();
            w[0] += z[0];
            w[1] += z[1];
            assert!((w[0] + w[1] - 1.0).abs() < 1e-6, "period {}: {:?}", t, w);
        }
        // Period 1 favors asset 0.
        assert!(res.trades.get(0, 0).unwrap() > 0.0);
    }

    #[test]
    fn test_cost_rows_indexed_by_period() {
        let mut f = forecast_h3();
        f.trade_costs = vec![vec![9.0, 9.0], vec![0.01, 0.01], vec![0.01, 0.01]];
        assert_eq!(f.cost_row(&f.trade_costs, 1), &[0.01, 0.01]);
        f.trade_costs.remove(0);
        assert_eq!(f.cost_row(&f.trade_costs, 2), &[0.01, 0.01]);
    }

    #[test]
    fn test_row_count_mismatch() {
        let mut f = forecast_h3();
        f.expected_returns.pop();
        let err = MultiPeriodOptimizer::new().optimize(&f, &[0.5, 0.5]).unwrap_err();
        assert_eq!(err, ConvexTraderError::dimension("expected_returns", 3, 2));
    }

    #[test]
    fn test_cost_sequence_length_checked() {
        let mut f = forecast_h3();
        f.hold_costs = vec![vec![0.0, 0.0]; 5];
        let err = MultiPeriodOptimizer::new().optimize(&f, &[0.5, 0.5]).unwrap_err();
        assert_eq!(err, ConvexTraderError::dimension("hold_costs", 3, 5));
    }

    #[test]
    fn test_row_width_mismatch() {
        let mut f = forecast_h3();
        f.risk_factors[2] = vec![1.0];
        let err = MultiPeriodOptimizer::new().optimize(&f, &[0.5, 0.5]).unwrap_err();
        assert_eq!(err, ConvexTraderError::dimension("risk_factors[2]", 2, 1));
    }

    #[test]
    fn test_short_horizon_rejected() {
        let mut f = forecast_h3();
        f.horizon = 1;
        let err = MultiPeriodOptimizer::new().optimize(&f, &[0.5, 0.5]).unwrap_err();
        assert!(matches!(err, ConvexTraderError::InvalidParameter { ref field, .. } if field == "horizon"));
    }

    #[test]
    fn test_negative_risk_aversion_is_non_convex() {
        let mut f = forecast_h3();
        f.risk_aversion = vec![1.0, -1.0, 1.0];
        let res = MultiPeriodOptimizer::new().optimize(&f, &[0.5, 0.5]).unwrap();
        assert_eq!(res.status, SolveStatus::NonConvex);
        assert_eq!(res.trades, TradeMatrix::zeros(2, 2));
    }

    #[test]
    fn test_long_only() {
        let mut f = forecast_h3();
        f.expected_returns[1] = vec![0.5, -0.5];
        f.risk_factors = vec![vec![0.01, 0.01]; 3];
        let opt = MultiPeriodOptimizer::new().with_settings(MultiPeriodSettings { long_only: true });
        let res = opt.optimize(&f, &[0.5, 0.5]).unwrap();
        assert!(res.is_optimal());
        let w1 = 0.5 + res.trades.get(1, 0).unwrap();
        assert!(w1 >= -1e-6, "{}", w1);
    }

    #[test]
    fn test_json_entry_point() {
        let input: MultiPeriodInput = serde_json::from_str(
            r#"{
                "symbols": ["AAPL", "MSFT"],
                "horizon": 3,
                "expected_returns": [[0, 0], [0.05, 0.03], [0.04, 0.06]],
                "risk_aversion": [1, 1, 1],
                "risk_factors": [[1, 1], [1, 1], [1, 1]],
                "trade_costs": [[0.01, 0.01], [0.01, 0.01]],
                "hold_costs": [[0, 0], [0, 0]],
                "current_weights": [0.5, 0.5]
            }"#,
        )
        .unwrap();
        let out = optimize_multi_period(&input).unwrap();
        assert_eq!(out.result.status, SolveStatus::Optimal);
        assert_eq!(out.result.trades.len(), 2);
        assert_eq!(out.result.trades[0].len(), 2);
        assert_eq!(out.result.planned_weights.len(), 2);
        for w in &out.result.planned_weights {
            assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        }
    }
}
