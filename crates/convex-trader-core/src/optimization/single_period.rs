use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{check_finite, check_len, check_table, Rebalance, TradeVector, DEFAULT_RISK_AVERSION};
use crate::cost::{CostModel, CostModelSpec};
use crate::error::ConvexTraderError;
use crate::solver::expr::{norm1, quad_form, sum_squares};
use crate::solver::{
    ClarabelSolver, ConvexSolver, Constraint, Problem, ScalarExpr, SolveStatus, SolverSettings,
    Variable,
};
use crate::types::{is_all_zero, l1_norm, with_metadata, ComputationOutput};
use crate::ConvexTraderResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Tuning of the single-period formulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinglePeriodSettings {
    /// Multiplier on both cost terms.
    pub cost_scale: f64,
    /// Bound on `‖z‖₁` when every expected return is zero.
    pub turnover_cap: f64,
    /// Expected returns at or below this magnitude count as zero.
    pub zero_return_tolerance: f64,
}

impl Default for SinglePeriodSettings {
    fn default() -> Self {
        SinglePeriodSettings {
            cost_scale: 0.01,
            turnover_cap: 1e-3,
            zero_return_tolerance: 1e-8,
        }
    }
}

/// JSON input for [`optimize_single_period`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinglePeriodInput {
    /// Optional asset labels, aligned with the vectors below.
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
    pub expected_returns: Vec<f64>,
    pub current_weights: Vec<f64>,
    #[serde(default = "default_risk_aversion")]
    pub risk_aversion: f64,
    /// n × n risk model; identity when omitted.
    #[serde(default)]
    pub covariance: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub costs: CostModelSpec,
    #[serde(default)]
    pub settings: SinglePeriodSettings,
    #[serde(default)]
    pub solver: SolverSettings,
}

fn default_risk_aversion() -> f64 {
    DEFAULT_RISK_AVERSION
}

/// Output of [`optimize_single_period`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinglePeriodOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<String>>,
    pub status: SolveStatus,
    /// Weight-space trades `z`.
    pub trades: Vec<f64>,
    /// `w + z`
    pub post_trade_weights: Vec<f64>,
    /// `‖z‖₁`
    pub turnover: f64,
    pub objective_value: Option<f64>,
    pub iterations: u32,
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// Maximizes `r·z − γ·risk(w + z) − s·trade(z) − s·hold(w + z)` subject to
/// `Σ(w + z) = 1` and `z ≥ −w`, where `risk(v) = vᵀΣv / n`.
#[derive(Debug, Clone)]
pub struct SinglePeriodOptimizer<S: ConvexSolver = ClarabelSolver> {
    solver: S,
    settings: SinglePeriodSettings,
    covariance: Option<Vec<Vec<f64>>>,
}

impl SinglePeriodOptimizer<ClarabelSolver> {
    pub fn new() -> Self {
        Self::with_solver(ClarabelSolver::default())
    }
}

impl Default for SinglePeriodOptimizer<ClarabelSolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ConvexSolver> SinglePeriodOptimizer<S> {
    pub fn with_solver(solver: S) -> Self {
        SinglePeriodOptimizer {
            solver,
            settings: SinglePeriodSettings::default(),
            covariance: None,
        }
    }

    pub fn with_settings(mut self, settings: SinglePeriodSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the identity risk model.
    pub fn with_covariance(mut self, covariance: Vec<Vec<f64>>) -> Self {
        self.covariance = Some(covariance);
        self
    }

    pub fn settings(&self) -> &SinglePeriodSettings {
        &self.settings
    }

    /// Optimal weight-space trades, or zero trades with the solver's status
    /// when the solve is not optimal.
    pub fn optimize(
        &self,
        expected_returns: &[f64],
        current_weights: &[f64],
        gamma: f64,
        costs: &CostModel,
    ) -> ConvexTraderResult<Rebalance<TradeVector>> {
        let (problem, z) = self.build_problem(expected_returns, current_weights, gamma, costs)?;
        let n = expected_returns.len();

        let solution = self.solver.solve(&problem);
        if let (SolveStatus::Optimal, Some(trades)) = (solution.status, solution.value(&z)) {
            debug!(
                "single-period: optimal after {} iterations, turnover {:.6}",
                solution.iterations,
                l1_norm(&trades)
            );
            return Ok(Rebalance {
                status: SolveStatus::Optimal,
                trades,
                objective_value: solution.objective_value,
                iterations: solution.iterations,
            });
        }

        let status = match solution.status {
            SolveStatus::Optimal => SolveStatus::Error,
            other => other,
        };
        warn!(
            "single-period: solver returned {}, falling back to zero trades",
            status
        );
        Ok(Rebalance {
            status,
            trades: vec![0.0; n],
            objective_value: None,
            iterations: solution.iterations,
        })
    }

    /// Validate inputs and describe the problem without solving it.
    pub fn build_problem(
        &self,
        expected_returns: &[f64],
        current_weights: &[f64],
        gamma: f64,
        costs: &CostModel,
    ) -> ConvexTraderResult<(Problem, Variable)> {
        self.validate(expected_returns, current_weights, gamma)?;
        let n = expected_returns.len();
        let s = self.settings.cost_scale;

        let mut problem = Problem::new();
        let z = problem.variable(n);
        let trades = z.expr();
        let post = trades.plus_constants(current_weights);

        let risk = match &self.covariance {
            Some(sigma) => quad_form(&post, sigma),
            None => sum_squares(&post),
        } * (1.0 / n as f64);

        let objective = ScalarExpr::from(trades.dot(expected_returns))
            - risk * gamma
            - costs.trade_cost(&trades) * s
            - costs.hold_cost(&post) * s;
        problem.maximize(objective);

        problem.constrain(Constraint::eq(post.sum(), 1.0));
        let lower: Vec<f64> = current_weights.iter().map(|w| -w).collect();
        problem.constrain_all(Constraint::elementwise_ge(&trades, &lower));

        if is_all_zero(expected_returns, self.settings.zero_return_tolerance) {
            problem.constrain(Constraint::le(norm1(&trades), self.settings.turnover_cap));
        }

        Ok((problem, z))
    }

    fn validate(
        &self,
        expected_returns: &[f64],
        current_weights: &[f64],
        gamma: f64,
    ) -> ConvexTraderResult<()> {
        let n = expected_returns.len();
        check_len("current_weights", n, current_weights)?;
        if n == 0 {
            return Err(ConvexTraderError::InvalidParameter {
                field: "expected_returns".into(),
                reason: "at least one asset is required".into(),
            });
        }
        check_finite("expected_returns", expected_returns)?;
        check_finite("current_weights", current_weights)?;
        if !gamma.is_finite() || gamma < 0.0 {
            return Err(ConvexTraderError::InvalidParameter {
                field: "gamma".into(),
                reason: format!("risk aversion must be finite and non-negative, got {}", gamma),
            });
        }

        let st = &self.settings;
        if !st.cost_scale.is_finite() || st.cost_scale < 0.0 {
            return Err(ConvexTraderError::InvalidParameter {
                field: "cost_scale".into(),
                reason: "must be finite and non-negative".into(),
            });
        }
        if !st.turnover_cap.is_finite() || st.turnover_cap < 0.0 {
            return Err(ConvexTraderError::InvalidParameter {
                field: "turnover_cap".into(),
                reason: "must be finite and non-negative".into(),
            });
        }

        if let Some(sigma) = &self.covariance {
            check_table("covariance", n, n, sigma)?;
            for i in 0..n {
                for j in (i + 1)..n {
                    let (a, b) = (sigma[i][j], sigma[j][i]);
                    if (a - b).abs() > 1e-10 * a.abs().max(b.abs()).max(1.0) {
                        return Err(ConvexTraderError::InvalidParameter {
                            field: "covariance".into(),
                            reason: format!("not symmetric at ({}, {})", i, j),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run one single-period rebalance described entirely by JSON input.
pub fn optimize_single_period(
    input: &SinglePeriodInput,
) -> ConvexTraderResult<ComputationOutput<SinglePeriodOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let n = input.expected_returns.len();

    if let Some(symbols) = &input.symbols {
        if symbols.len() != n {
            return Err(ConvexTraderError::dimension("symbols", n, symbols.len()));
        }
    }

    let costs = input.costs.build(n)?;
    let mut optimizer = SinglePeriodOptimizer::with_solver(ClarabelSolver::new(input.solver.clone()))
        .with_settings(input.settings.clone());
    if let Some(sigma) = &input.covariance {
        optimizer = optimizer.with_covariance(sigma.clone());
    }

    let rebalance = optimizer.optimize(
        &input.expected_returns,
        &input.current_weights,
        input.risk_aversion,
        &costs,
    )?;

    let weight_sum: f64 = input.current_weights.iter().sum();
    if (weight_sum - 1.0).abs() > 1e-9 {
        warnings.push(format!(
            "Current weights sum to {:.6}; trades also absorb the difference to 1",
            weight_sum
        ));
    }
    if !rebalance.is_optimal() {
        warnings.push(format!(
            "Solver returned {}; no trades recommended",
            rebalance.status
        ));
    }
    if is_all_zero(&input.expected_returns, input.settings.zero_return_tolerance) {
        warnings.push(format!(
            "All expected returns are zero; turnover capped at {}",
            input.settings.turnover_cap
        ));
    }

    let post_trade_weights: Vec<f64> = input
        .current_weights
        .iter()
        .zip(&rebalance.trades)
        .map(|(w, z)| w + z)
        .collect();

    let output = SinglePeriodOutput {
        symbols: input.symbols.clone(),
        status: rebalance.status,
        turnover: l1_norm(&rebalance.trades),
        trades: rebalance.trades,
        post_trade_weights,
        objective_value: rebalance.objective_value,
        iterations: rebalance.iterations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Single-period convex rebalance (Clarabel interior point)",
        &serde_json::json!({
            "n_assets": n,
            "risk_aversion": input.risk_aversion,
            "cost_scale": input.settings.cost_scale,
            "risk_model": if input.covariance.is_some() { "covariance" } else { "identity" },
            "self_financing": true,
            "no_short": true,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
