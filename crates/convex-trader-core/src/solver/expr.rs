use std::ops::{Add, Mul, Neg, Sub};

use nalgebra::DMatrix;

/// Handle to a block of decision variables owned by a [`super::Problem`].
///
/// Matrix blocks are stored column-major so each column is one contiguous
/// trade vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    offset: usize,
    rows: usize,
    cols: usize,
}

impl Variable {
    pub(crate) fn new(offset: usize, rows: usize, cols: usize) -> Self {
        Variable { offset, rows, cols }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scalar entry `(row, col)`.
    pub fn at(&self, row: usize, col: usize) -> AffineExpr {
        assert!(row < self.rows && col < self.cols, "variable index out of range");
        AffineExpr::var(self.offset + col * self.rows + row)
    }

    /// The whole block as a vector (column-major).
    pub fn expr(&self) -> AffineVec {
        AffineVec(
            (0..self.len())
                .map(|k| AffineExpr::var(self.offset + k))
                .collect(),
        )
    }

    pub fn column(&self, col: usize) -> AffineVec {
        AffineVec((0..self.rows).map(|row| self.at(row, col)).collect())
    }
}

/// `Σ aᵢ·xᵢ + c` over problem variables, stored sparsely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AffineExpr {
    terms: Vec<(usize, f64)>,
    constant: f64,
}

impl AffineExpr {
    pub fn constant(c: f64) -> Self {
        AffineExpr {
            terms: Vec::new(),
            constant: c,
        }
    }

    pub fn var(index: usize) -> Self {
        AffineExpr {
            terms: vec![(index, 1.0)],
            constant: 0.0,
        }
    }

    pub fn terms(&self) -> &[(usize, f64)] {
        &self.terms
    }

    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    pub fn is_constant(&self) -> bool {
        self.terms.iter().all(|(_, a)| *a == 0.0)
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(i, a)| a * values.get(*i).copied().unwrap_or(0.0))
                .sum::<f64>()
    }

    /// Merge repeated indices and drop zero coefficients.
    pub fn compact(&self) -> AffineExpr {
        let mut terms = self.terms.clone();
        terms.sort_by_key(|(i, _)| *i);
        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(terms.len());
        for (i, a) in terms {
            match merged.last_mut() {
                Some((j, b)) if *j == i => *b += a,
                _ => merged.push((i, a)),
            }
        }
        merged.retain(|(_, a)| *a != 0.0);
        AffineExpr {
            terms: merged,
            constant: self.constant,
        }
    }

    pub fn max_index(&self) -> Option<usize> {
        self.terms.iter().map(|(i, _)| *i).max()
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.constant.is_finite() && self.terms.iter().all(|(_, a)| a.is_finite())
    }
}

impl Add for AffineExpr {
    type Output = AffineExpr;
    fn add(mut self, rhs: AffineExpr) -> AffineExpr {
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
        self
    }
}

impl Add<f64> for AffineExpr {
    type Output = AffineExpr;
    fn add(mut self, rhs: f64) -> AffineExpr {
        self.constant += rhs;
        self
    }
}

impl Neg for AffineExpr {
    type Output = AffineExpr;
    fn neg(self) -> AffineExpr {
        self * -1.0
    }
}

impl Sub for AffineExpr {
    type Output = AffineExpr;
    fn sub(self, rhs: AffineExpr) -> AffineExpr {
        self + (-rhs)
    }
}

impl Mul<f64> for AffineExpr {
    type Output = AffineExpr;
    fn mul(mut self, rhs: f64) -> AffineExpr {
        for (_, a) in self.terms.iter_mut() {
            *a *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

/// A vector of affine expressions, e.g. `w + z`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AffineVec(Vec<AffineExpr>);

impl AffineVec {
    pub fn constants(values: &[f64]) -> Self {
        AffineVec(values.iter().map(|v| AffineExpr::constant(*v)).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> &AffineExpr {
        &self.0[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = &AffineExpr> {
        self.0.iter()
    }

    /// Elementwise sum. Panics on length mismatch.
    pub fn plus(&self, other: &AffineVec) -> AffineVec {
        assert_eq!(self.len(), other.len(), "affine vector length mismatch");
        AffineVec(
            self.0
                .iter()
                .zip(&other.0)
                .map(|(a, b)| a.clone() + b.clone())
                .collect(),
        )
    }

    pub fn plus_constants(&self, values: &[f64]) -> AffineVec {
        assert_eq!(self.len(), values.len(), "affine vector length mismatch");
        AffineVec(
            self.0
                .iter()
                .zip(values)
                .map(|(a, v)| a.clone() + *v)
                .collect(),
        )
    }

    pub fn sum(&self) -> AffineExpr {
        self.0
            .iter()
            .cloned()
            .fold(AffineExpr::default(), |acc, e| acc + e)
    }

    pub fn dot(&self, coefficients: &[f64]) -> AffineExpr {
        self.0
            .iter()
            .zip(coefficients)
            .fold(AffineExpr::default(), |acc, (e, c)| acc + e.clone() * *c)
    }

    pub fn evaluate(&self, values: &[f64]) -> Vec<f64> {
        self.0.iter().map(|e| e.evaluate(values)).collect()
    }
}

/// Structural curvature of a scalar expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curvature {
    Constant,
    Affine,
    Convex,
    Concave,
    Unknown,
}

impl Curvature {
    pub fn is_convex(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine | Curvature::Convex)
    }

    pub fn is_concave(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine | Curvature::Concave)
    }

    pub fn is_affine(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine)
    }
}

/// `affine + Σ cₖ·(eₖ)² + Σ dₖ·|fₖ|`.
///
/// The sign of each `cₖ` and `dₖ` decides curvature: all non-negative is
/// convex, all non-positive is concave.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarExpr {
    affine: AffineExpr,
    squares: Vec<(f64, AffineExpr)>,
    abs: Vec<(f64, AffineExpr)>,
    indefinite: bool,
}

impl ScalarExpr {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn affine(&self) -> &AffineExpr {
        &self.affine
    }

    pub fn squares(&self) -> &[(f64, AffineExpr)] {
        &self.squares
    }

    pub fn abs_terms(&self) -> &[(f64, AffineExpr)] {
        &self.abs
    }

    pub fn has_squares(&self) -> bool {
        self.squares.iter().any(|(c, _)| *c != 0.0)
    }

    pub fn curvature(&self) -> Curvature {
        if self.indefinite {
            return Curvature::Unknown;
        }
        let coefs = self
            .squares
            .iter()
            .chain(self.abs.iter())
            .map(|(c, _)| *c)
            .filter(|c| *c != 0.0);
        let mut pos = false;
        let mut neg = false;
        for c in coefs {
            if c > 0.0 {
                pos = true;
            } else {
                neg = true;
            }
        }
        match (pos, neg) {
            (true, true) => Curvature::Unknown,
            (true, false) => Curvature::Convex,
            (false, true) => Curvature::Concave,
            (false, false) if self.affine.is_constant() => Curvature::Constant,
            (false, false) => Curvature::Affine,
        }
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        let sq: f64 = self
            .squares
            .iter()
            .map(|(c, e)| {
                let v = e.evaluate(values);
                c * v * v
            })
            .sum();
        let ab: f64 = self
            .abs
            .iter()
            .map(|(c, e)| c * e.evaluate(values).abs())
            .sum();
        self.affine.evaluate(values) + sq + ab
    }

    pub fn max_index(&self) -> Option<usize> {
        std::iter::once(&self.affine)
            .chain(self.squares.iter().map(|(_, e)| e))
            .chain(self.abs.iter().map(|(_, e)| e))
            .filter_map(|e| e.max_index())
            .max()
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.affine.is_finite()
            && self
                .squares
                .iter()
                .chain(self.abs.iter())
                .all(|(c, e)| c.is_finite() && e.is_finite())
    }
}

impl From<AffineExpr> for ScalarExpr {
    fn from(affine: AffineExpr) -> Self {
        ScalarExpr {
            affine,
            ..Default::default()
        }
    }
}

impl From<&AffineExpr> for ScalarExpr {
    fn from(e: &AffineExpr) -> Self {
        ScalarExpr::from(e.clone())
    }
}

impl From<Variable> for AffineVec {
    fn from(v: Variable) -> Self {
        v.expr()
    }
}

impl From<f64> for ScalarExpr {
    fn from(c: f64) -> Self {
        ScalarExpr::from(AffineExpr::constant(c))
    }
}

impl Add for ScalarExpr {
    type Output = ScalarExpr;
    fn add(mut self, rhs: ScalarExpr) -> ScalarExpr {
        self.affine = self.affine + rhs.affine;
        self.squares.extend(rhs.squares);
        self.abs.extend(rhs.abs);
        self.indefinite |= rhs.indefinite;
        self
    }
}

impl Neg for ScalarExpr {
    type Output = ScalarExpr;
    fn neg(self) -> ScalarExpr {
        self * -1.0
    }
}

impl Sub for ScalarExpr {
    type Output = ScalarExpr;
    fn sub(self, rhs: ScalarExpr) -> ScalarExpr {
        self + (-rhs)
    }
}

impl Mul<f64> for ScalarExpr {
    type Output = ScalarExpr;
    fn mul(mut self, rhs: f64) -> ScalarExpr {
        self.affine = self.affine * rhs;
        for (c, _) in self.squares.iter_mut().chain(self.abs.iter_mut()) {
            *c *= rhs;
        }
        self
    }
}

/// `Σ xᵢ²`
pub fn sum_squares(x: &AffineVec) -> ScalarExpr {
    ScalarExpr {
        squares: x.iter().map(|e| (1.0, e.clone())).collect(),
        ..Default::default()
    }
}

/// `Σ cᵢ·xᵢ²`
pub fn weighted_sum_squares(x: &AffineVec, coefficients: &[f64]) -> ScalarExpr {
    ScalarExpr {
        squares: x
            .iter()
            .zip(coefficients)
            .map(|(e, c)| (*c, e.clone()))
            .collect(),
        ..Default::default()
    }
}

/// `‖x‖₁`
pub fn norm1(x: &AffineVec) -> ScalarExpr {
    ScalarExpr {
        abs: x.iter().map(|e| (1.0, e.clone())).collect(),
        ..Default::default()
    }
}

/// `Σ cᵢ·|xᵢ|`
pub fn weighted_abs(x: &AffineVec, coefficients: &[f64]) -> ScalarExpr {
    ScalarExpr {
        abs: x
            .iter()
            .zip(coefficients)
            .map(|(e, c)| (*c, e.clone()))
            .collect(),
        ..Default::default()
    }
}

/// Relative size below which an eigenvalue of `sigma` counts as zero.
const EIGEN_TOL: f64 = 1e-12;

/// `xᵀ Σ x` for a symmetric `sigma`, expanded through the eigendecomposition
/// `Σ = V Λ Vᵀ` into `Σₖ λₖ·(vₖᵀ x)²`. A negative eigenvalue (or a `sigma`
/// of the wrong shape) yields an expression of unknown curvature.
pub fn quad_form(x: &AffineVec, sigma: &[Vec<f64>]) -> ScalarExpr {
    let n = x.len();
    let indefinite = ScalarExpr {
        indefinite: true,
        ..Default::default()
    };
    if sigma.len() != n || sigma.iter().any(|row| row.len() != n) {
        return indefinite;
    }
    if n == 0 {
        return ScalarExpr::zero();
    }

    let eigen = DMatrix::from_fn(n, n, |i, j| 0.5 * (sigma[i][j] + sigma[j][i])).symmetric_eigen();
    let tol = EIGEN_TOL * eigen.eigenvalues.amax().max(1.0);
    if eigen.eigenvalues.iter().any(|l| !l.is_finite() || *l < -tol) {
        return indefinite;
    }
    let squares = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .filter(|(_, l)| **l > tol)
        .map(|(k, l)| {
            let v: Vec<f64> = eigen.eigenvectors.column(k).iter().copied().collect();
            (*l, x.dot(&v))
        })
        .collect();
    ScalarExpr {
        squares,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_variable_is_column_major() {
        let v = Variable::new(3, 2, 2);
        assert_eq!(v.at(1, 0).terms(), &[(4, 1.0)]);
        assert_eq!(v.at(0, 1).terms(), &[(5, 1.0)]);
        let col = v.column(1);
        assert_eq!(col.get(1).terms(), &[(6, 1.0)]);
    }

    #[test]
    fn test_affine_evaluate_and_compact() {
        let e = AffineExpr::var(0) * 2.0 + AffineExpr::var(1) + AffineExpr::var(0) + 1.5;
        assert_eq!(e.evaluate(&[1.0, 2.0]), 6.5);
        assert_eq!(e.compact().terms(), &[(0, 3.0), (1, 1.0)]);
    }

    #[test]
    fn test_curvature_signs() {
        let x = Variable::new(0, 2, 1).expr();
        assert_eq!(ScalarExpr::from(x.sum()).curvature(), Curvature::Affine);
        assert_eq!(ScalarExpr::from(1.0).curvature(), Curvature::Constant);
        assert_eq!(sum_squares(&x).curvature(), Curvature::Convex);
        assert_eq!((-norm1(&x)).curvature(), Curvature::Concave);
        assert_eq!(
            (sum_squares(&x) - norm1(&x)).curvature(),
            Curvature::Unknown
        );
    }

    #[test]
    fn test_quad_form_matches_direct_evaluation() {
        let sigma = vec![vec![0.04, 0.01], vec![0.01, 0.03]];
        let x = Variable::new(0, 2, 1).expr().plus_constants(&[0.1, -0.2]);
        let q = quad_form(&x, &sigma);
        assert_eq!(q.curvature(), Curvature::Convex);
        let vals = [0.3, 0.5];
        let v = [0.4, 0.3];
        let direct = v[0] * (0.04 * v[0] + 0.01 * v[1]) + v[1] * (0.01 * v[0] + 0.03 * v[1]);
        assert!((q.evaluate(&vals) - direct).abs() < 1e-12);
        assert!(q.squares().iter().all(|(l, _)| *l > 0.0));
    }

    #[test]
    fn test_quad_form_indefinite_is_unknown() {
        let sigma = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        let x = Variable::new(0, 2, 1).expr();
        assert_eq!(quad_form(&x, &sigma).curvature(), Curvature::Unknown);
    }

    #[test]
    fn test_scaling_flips_abs_sign() {
        let x = Variable::new(0, 3, 1).expr();
        let e = norm1(&x) * 0.5;
        assert!((e.evaluate(&[1.0, -2.0, 3.0]) - 3.0).abs() < 1e-12);
        assert_eq!((e * -1.0).curvature(), Curvature::Concave);
    }
}
