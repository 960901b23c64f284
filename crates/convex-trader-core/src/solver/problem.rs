use serde::{Deserialize, Serialize};

use super::expr::{AffineVec, ScalarExpr, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Eq,
    Le,
    Ge,
}

/// `lhs (== | <= | >=) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub lhs: ScalarExpr,
    pub relation: Relation,
    pub rhs: ScalarExpr,
}

impl Constraint {
    pub fn eq(lhs: impl Into<ScalarExpr>, rhs: impl Into<ScalarExpr>) -> Self {
        Constraint {
            lhs: lhs.into(),
            relation: Relation::Eq,
            rhs: rhs.into(),
        }
    }

    pub fn le(lhs: impl Into<ScalarExpr>, rhs: impl Into<ScalarExpr>) -> Self {
        Constraint {
            lhs: lhs.into(),
            relation: Relation::Le,
            rhs: rhs.into(),
        }
    }

    pub fn ge(lhs: impl Into<ScalarExpr>, rhs: impl Into<ScalarExpr>) -> Self {
        Constraint {
            lhs: lhs.into(),
            relation: Relation::Ge,
            rhs: rhs.into(),
        }
    }

    /// One `xᵢ >= boundᵢ` constraint per entry.
    pub fn elementwise_ge(x: &AffineVec, bounds: &[f64]) -> Vec<Constraint> {
        x.iter()
            .zip(bounds)
            .map(|(e, b)| Constraint::ge(e.clone(), *b))
            .collect()
    }

    /// `lhs - rhs`, oriented so the constraint reads `expr (== | <=) 0`.
    pub fn normalized(&self) -> (ScalarExpr, bool) {
        let diff = self.lhs.clone() - self.rhs.clone();
        match self.relation {
            Relation::Eq => (diff, true),
            Relation::Le => (diff, false),
            Relation::Ge => (-diff, false),
        }
    }

    pub fn is_convex(&self) -> bool {
        let (expr, is_eq) = self.normalized();
        let curvature = expr.curvature();
        if is_eq {
            curvature.is_affine()
        } else {
            curvature.is_convex()
        }
    }

    /// Amount by which `values` violates the constraint (0 when satisfied).
    pub fn violation(&self, values: &[f64]) -> f64 {
        let (expr, is_eq) = self.normalized();
        let v = expr.evaluate(values);
        if is_eq {
            v.abs()
        } else {
            v.max(0.0)
        }
    }
}

/// Objective plus constraints over declared variable blocks.
#[derive(Debug, Clone)]
pub struct Problem {
    sense: Sense,
    objective: ScalarExpr,
    constraints: Vec<Constraint>,
    num_vars: usize,
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            sense: Sense::Minimize,
            objective: ScalarExpr::zero(),
            constraints: Vec::new(),
            num_vars: 0,
        }
    }
}

impl Problem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(&mut self, len: usize) -> Variable {
        self.matrix_variable(len, 1)
    }

    pub fn matrix_variable(&mut self, rows: usize, cols: usize) -> Variable {
        let var = Variable::new(self.num_vars, rows, cols);
        self.num_vars += rows * cols;
        var
    }

    pub fn minimize(&mut self, objective: impl Into<ScalarExpr>) {
        self.sense = Sense::Minimize;
        self.objective = objective.into();
    }

    pub fn maximize(&mut self, objective: impl Into<ScalarExpr>) {
        self.sense = Sense::Maximize;
        self.objective = objective.into();
    }

    pub fn constrain(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn constrain_all(&mut self, constraints: impl IntoIterator<Item = Constraint>) {
        self.constraints.extend(constraints);
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn objective(&self) -> &ScalarExpr {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Convexity pre-check: a convex objective when minimizing (concave when
    /// maximizing), affine equalities, convex `<=` sides.
    pub fn is_convex(&self) -> bool {
        let objective_ok = match self.sense {
            Sense::Minimize => self.objective.curvature().is_convex(),
            Sense::Maximize => self.objective.curvature().is_concave(),
        };
        objective_ok && self.constraints.iter().all(Constraint::is_convex)
    }

    /// Every expression refers only to declared variables and has finite
    /// coefficients.
    pub fn is_well_formed(&self) -> bool {
        let exprs = std::iter::once(&self.objective).chain(
            self.constraints
                .iter()
                .flat_map(|c| [&c.lhs, &c.rhs]),
        );
        exprs.into_iter().all(|e| {
            e.is_finite() && e.max_index().map_or(true, |i| i < self.num_vars)
        })
    }

    /// Largest constraint violation at `values`.
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        self.constraints
            .iter()
            .map(|c| c.violation(values))
            .fold(0.0, f64::max)
    }
}
