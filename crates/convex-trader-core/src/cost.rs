//! Trade and holding cost functions.
//!
//! A cost function maps an affine vector (trades `z` or post-trade weights
//! `w + z`) to a convex scalar expression the optimizers can place in their
//! objective. Any `Fn(&AffineVec) -> ScalarExpr` qualifies, so callers can
//! pass plain functions such as [`norm1`] or closures.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConvexTraderError;
use crate::solver::expr::{norm1, sum_squares, weighted_abs, weighted_sum_squares};
use crate::solver::{AffineVec, ScalarExpr};
use crate::ConvexTraderResult;

pub trait CostFunction: Send + Sync {
    fn cost(&self, x: &AffineVec) -> ScalarExpr;

    /// Numeric cost at a fixed vector.
    fn evaluate(&self, x: &[f64]) -> f64 {
        self.cost(&AffineVec::constants(x)).evaluate(&[])
    }
}

impl<F> CostFunction for F
where
    F: Fn(&AffineVec) -> ScalarExpr + Send + Sync,
{
    fn cost(&self, x: &AffineVec) -> ScalarExpr {
        self(x)
    }
}

/// The pair of cost functions supplied to an optimization call.
pub struct CostModel {
    trade: Box<dyn CostFunction>,
    hold: Box<dyn CostFunction>,
}

impl CostModel {
    pub fn new(trade: impl CostFunction + 'static, hold: impl CostFunction + 'static) -> Self {
        CostModel {
            trade: Box::new(trade),
            hold: Box::new(hold),
        }
    }

    /// Trade cost `‖z‖₁`, holding cost `‖w + z‖²`.
    pub fn standard() -> Self {
        CostModel::new(norm1, sum_squares)
    }

    pub fn zero() -> Self {
        CostModel::new(zero_cost, zero_cost)
    }

    pub fn trade_cost(&self, z: &AffineVec) -> ScalarExpr {
        self.trade.cost(z)
    }

    pub fn hold_cost(&self, w: &AffineVec) -> ScalarExpr {
        self.hold.cost(w)
    }

    pub fn evaluate_trade_cost(&self, z: &[f64]) -> f64 {
        self.trade.evaluate(z)
    }

    pub fn evaluate_hold_cost(&self, w: &[f64]) -> f64 {
        self.hold.evaluate(w)
    }
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel::standard()
    }
}

impl fmt::Debug for CostModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CostModel").finish_non_exhaustive()
    }
}

fn zero_cost(_: &AffineVec) -> ScalarExpr {
    ScalarExpr::zero()
}

/// Serializable description of one cost function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CostSpec {
    None,
    /// `Σ cᵢ·xᵢ`
    Linear { coefficients: Vec<f64> },
    /// `Σ cᵢ·|xᵢ|`, unit coefficients when omitted.
    Absolute {
        #[serde(default)]
        coefficients: Option<Vec<f64>>,
    },
    /// `Σ cᵢ·xᵢ²`, unit coefficients when omitted.
    Quadratic {
        #[serde(default)]
        coefficients: Option<Vec<f64>>,
    },
}

impl CostSpec {
    pub fn validate(&self, n: usize, field: &str) -> ConvexTraderResult<()> {
        let (coefficients, must_be_non_negative) = match self {
            CostSpec::None => return Ok(()),
            CostSpec::Linear { coefficients } => (Some(coefficients), false),
            CostSpec::Absolute { coefficients } | CostSpec::Quadratic { coefficients } => {
                (coefficients.as_ref(), true)
            }
        };
        let Some(c) = coefficients else {
            return Ok(());
        };
        if c.len() != n {
            return Err(ConvexTraderError::dimension(field, n, c.len()));
        }
        if c.iter().any(|v| !v.is_finite()) {
            return Err(ConvexTraderError::InvalidParameter {
                field: field.to_string(),
                reason: "coefficients must be finite".into(),
            });
        }
        if must_be_non_negative && c.iter().any(|v| *v < 0.0) {
            return Err(ConvexTraderError::InvalidParameter {
                field: field.to_string(),
                reason: "coefficients must be non-negative".into(),
            });
        }
        Ok(())
    }

    pub fn into_function(self) -> Box<dyn CostFunction> {
        match self {
            CostSpec::None => Box::new(zero_cost),
            CostSpec::Linear { coefficients } => {
                Box::new(move |x: &AffineVec| ScalarExpr::from(x.dot(&coefficients)))
            }
            CostSpec::Absolute { coefficients: None } => Box::new(norm1),
            CostSpec::Absolute {
                coefficients: Some(c),
            } => Box::new(move |x: &AffineVec| weighted_abs(x, &c)),
            CostSpec::Quadratic { coefficients: None } => Box::new(sum_squares),
            CostSpec::Quadratic {
                coefficients: Some(c),
            } => Box::new(move |x: &AffineVec| weighted_sum_squares(x, &c)),
        }
    }
}

/// Serializable [`CostModel`]; defaults to the standard model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModelSpec {
    pub trade: CostSpec,
    pub hold: CostSpec,
}

impl Default for CostModelSpec {
    fn default() -> Self {
        CostModelSpec {
            trade: CostSpec::Absolute { coefficients: None },
            hold: CostSpec::Quadratic { coefficients: None },
        }
    }
}

impl CostModelSpec {
    /// Validate against `n` assets and build the model.
    pub fn build(&self, n: usize) -> ConvexTraderResult<CostModel> {
        self.trade.validate(n, "costs.trade.coefficients")?;
        self.hold.validate(n, "costs.hold.coefficients")?;
        Ok(CostModel {
            trade: self.trade.clone().into_function(),
            hold: self.hold.clone().into_function(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Curvature;

    #[test]
    fn test_standard_model_values() {
        let model = CostModel::standard();
        assert!((model.evaluate_trade_cost(&[0.1, -0.2, 0.05]) - 0.35).abs() < 1e-12);
        assert!((model.evaluate_hold_cost(&[0.5, 0.5]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_closure_cost_function() {
        let scaled = |x: &AffineVec| norm1(x) * 3.0;
        assert!((scaled.evaluate(&[1.0, -1.0]) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_model_is_constant() {
        let model = CostModel::zero();
        let x = AffineVec::constants(&[1.0, 2.0]);
        assert_eq!(model.trade_cost(&x).curvature(), Curvature::Constant);
        assert_eq!(model.evaluate_hold_cost(&[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_cost_spec_json_round_trip() {
        let json = r#"{"trade": {"type": "absolute", "coefficients": [0.5, 1.0]},
                       "hold": {"type": "none"}}"#;
        let spec: CostModelSpec = serde_json::from_str(json).unwrap();
        assert_eq!(
            spec.trade,
            CostSpec::Absolute {
                coefficients: Some(vec![0.5, 1.0])
            }
        );
        let model = spec.build(2).unwrap();
        assert!((model.evaluate_trade_cost(&[1.0, -1.0]) - 1.5).abs() < 1e-12);
        assert_eq!(model.evaluate_hold_cost(&[1.0, -1.0]), 0.0);
    }

    #[test]
    fn test_cost_spec_defaults_to_standard() {
        let spec: CostModelSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec, CostModelSpec::default());
    }

    #[test]
    fn test_cost_spec_validation() {
        let short = CostSpec::Linear {
            coefficients: vec![1.0],
        };
        assert!(matches!(
            short.validate(2, "trade"),
            Err(ConvexTraderError::DimensionMismatch { expected: 2, actual: 1, .. })
        ));
        let negative = CostSpec::Quadratic {
            coefficients: Some(vec![1.0, -1.0]),
        };
        assert!(matches!(
            negative.validate(2, "hold"),
            Err(ConvexTraderError::InvalidParameter { .. })
        ));
        let linear_negative = CostSpec::Linear {
            coefficients: vec![-0.1, 0.2],
        };
        assert!(linear_negative.validate(2, "hold").is_ok());
    }
}
