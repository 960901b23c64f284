//! Boundary to the convex-program solver.
//!
//! Optimizers describe a [`Problem`] and hand it to any [`ConvexSolver`].
//! Backends report a [`SolveStatus`] instead of failing; the convexity
//! pre-check is [`Problem::is_convex`].

pub mod conic;
pub mod expr;
pub mod problem;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use conic::ClarabelSolver;
pub use expr::{
    norm1, quad_form, sum_squares, weighted_abs, weighted_sum_squares, AffineExpr, AffineVec,
    Curvature, ScalarExpr, Variable,
};
pub use problem::{Constraint, Problem, Relation, Sense};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    MaxIterations,
    NonConvex,
    Error,
}

impl SolveStatus {
    pub fn is_optimal(self) -> bool {
        self == SolveStatus::Optimal
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::MaxIterations => "max_iterations",
            SolveStatus::NonConvex => "non_convex",
            SolveStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub status: SolveStatus,
    /// Values of every problem variable, present only when optimal.
    pub values: Option<Vec<f64>>,
    pub objective_value: Option<f64>,
    pub iterations: u32,
}

impl Solution {
    pub fn failed(status: SolveStatus, iterations: u32) -> Self {
        Solution {
            status,
            values: None,
            objective_value: None,
            iterations,
        }
    }

    /// Values of one variable block (column-major for matrix blocks).
    pub fn value(&self, var: &Variable) -> Option<Vec<f64>> {
        let values = self.values.as_ref()?;
        values
            .get(var.offset()..var.offset() + var.len())
            .map(|s| s.to_vec())
    }
}

/// A convex-program backend.
pub trait ConvexSolver: Send + Sync {
    fn solve(&self, problem: &Problem) -> Solution;
}

impl<S: ConvexSolver + ?Sized> ConvexSolver for &S {
    fn solve(&self, problem: &Problem) -> Solution {
        (**self).solve(problem)
    }
}

impl<S: ConvexSolver + ?Sized> ConvexSolver for Box<S> {
    fn solve(&self, problem: &Problem) -> Solution {
        (**self).solve(problem)
    }
}

/// Tuning for [`ClarabelSolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub max_iter: u32,
    /// Wall-clock limit in seconds; unlimited when absent.
    pub time_limit: Option<f64>,
    pub tol_gap_abs: f64,
    pub tol_gap_rel: f64,
    pub tol_feas: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            max_iter: 200,
            time_limit: None,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
            tol_feas: 1e-8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solution_value_slices_block() {
        let mut p = Problem::new();
        let a = p.variable(2);
        let b = p.matrix_variable(2, 2);
        let sol = Solution {
            status: SolveStatus::Optimal,
            values: Some(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            objective_value: Some(0.0),
            iterations: 1,
        };
        assert_eq!(sol.value(&a), Some(vec![1.0, 2.0]));
        assert_eq!(sol.value(&b), Some(vec![3.0, 4.0, 5.0, 6.0]));
        assert_eq!(Solution::failed(SolveStatus::Error, 0).value(&a), None);
    }

    #[test]
    fn test_settings_partial_json() {
        let s: SolverSettings = serde_json::from_str(r#"{"max_iter": 100}"#).unwrap();
        assert_eq!(s.max_iter, 100);
        assert_eq!(s.tol_feas, 1e-8);
        assert_eq!(s.time_limit, None);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SolveStatus::NonConvex.to_string(), "non_convex");
        assert!(SolveStatus::Optimal.is_optimal());
    }
}
