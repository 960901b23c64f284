//! [`ConvexSolver`] backed by the Clarabel interior-point solver.
//!
//! A [`Problem`] is lowered to Clarabel's standard form
//! `min ½xᵀPx + qᵀx  s.t.  Ax + s = b, s ∈ K` where `K` is a zero cone for
//! equality rows followed by a non-negative cone for inequality rows. Every
//! `c·|a·x + b|` term becomes an epigraph column `t` with `±(a·x + b) ≤ t`.

use clarabel::algebra::CscMatrix;
use clarabel::solver::*;
use log::{debug, warn};

use super::expr::{AffineExpr, ScalarExpr};
use super::problem::{Problem, Sense};
use super::{ConvexSolver, Solution, SolveStatus, SolverSettings};

/// Default [`ConvexSolver`] backend.
#[derive(Debug, Clone, Default)]
pub struct ClarabelSolver {
    settings: SolverSettings,
}

impl ClarabelSolver {
    pub fn new(settings: SolverSettings) -> Self {
        ClarabelSolver { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    fn clarabel_settings(&self) -> DefaultSettings<f64> {
        DefaultSettings {
            max_iter: self.settings.max_iter,
            time_limit: self.settings.time_limit.unwrap_or(f64::INFINITY),
            tol_gap_abs: self.settings.tol_gap_abs,
            tol_gap_rel: self.settings.tol_gap_rel,
            tol_feas: self.settings.tol_feas,
            verbose: false,
            ..DefaultSettings::default()
        }
    }
}

impl ConvexSolver for ClarabelSolver {
    fn solve(&self, problem: &Problem) -> Solution {
        if !problem.is_convex() {
            warn!("clarabel: problem failed the convexity check, not solving");
            return Solution::failed(SolveStatus::NonConvex, 0);
        }
        let data = match ConicData::lower(problem) {
            Ok(data) => data,
            Err(LoweringError::NotWellFormed) => {
                warn!("clarabel: problem references unknown variables or non-finite data");
                return Solution::failed(SolveStatus::Error, 0);
            }
            Err(LoweringError::QuadraticConstraint) => {
                warn!("clarabel: quadratic constraints are not supported");
                return Solution::failed(SolveStatus::Error, 0);
            }
        };

        let mut solver = DefaultSolver::new(
            &data.p,
            &data.q,
            &data.a,
            &data.b,
            &data.cones,
            self.clarabel_settings(),
        );
        solver.solve();

        let result = &solver.solution;
        let status = map_status(&result.status);
        debug!(
            "clarabel: {:?} -> {} after {} iterations ({} vars, {} rows)",
            result.status,
            status,
            result.iterations,
            data.q.len(),
            data.b.len()
        );
        if !status.is_optimal() {
            return Solution::failed(status, result.iterations);
        }

        let values = result.x[..data.num_user_vars].to_vec();
        Solution {
            status,
            objective_value: Some(problem.objective().evaluate(&values)),
            values: Some(values),
            iterations: result.iterations,
        }
    }
}

fn map_status(status: &SolverStatus) -> SolveStatus {
    match status {
        SolverStatus::Solved => SolveStatus::Optimal,
        SolverStatus::AlmostSolved => {
            warn!("clarabel: solved to reduced accuracy");
            SolveStatus::Optimal
        }
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            SolveStatus::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            SolveStatus::Unbounded
        }
        SolverStatus::MaxIterations | SolverStatus::MaxTime => SolveStatus::MaxIterations,
        _ => SolveStatus::Error,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoweringError {
    NotWellFormed,
    QuadraticConstraint,
}

/// Problem data in Clarabel's form. Columns `0..num_user_vars` are the
/// problem's own variables; the rest are epigraph columns.
struct ConicData {
    p: CscMatrix<f64>,
    q: Vec<f64>,
    a: CscMatrix<f64>,
    b: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
    num_user_vars: usize,
}

/// `terms · x ≤ rhs` (or `=` for equality rows).
struct Row {
    terms: Vec<(usize, f64)>,
    rhs: f64,
}

#[derive(Default)]
struct Builder {
    /// Upper-triangle entries of `P` as `(row, col, value)`.
    p: Vec<(usize, usize, f64)>,
    q: Vec<(usize, f64)>,
    equalities: Vec<Row>,
    inequalities: Vec<Row>,
    next_col: usize,
}

impl ConicData {
    fn lower(problem: &Problem) -> Result<ConicData, LoweringError> {
        if !problem.is_well_formed() {
            return Err(LoweringError::NotWellFormed);
        }
        let sign = match problem.sense() {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        };
        let objective = problem.objective().clone() * sign;

        let num_user_vars = problem.num_vars();
        let mut builder = Builder {
            next_col: num_user_vars,
            ..Default::default()
        };
        builder.add_objective(&objective);
        for c in problem.constraints() {
            let (expr, is_eq) = c.normalized();
            if expr.has_squares() {
                return Err(LoweringError::QuadraticConstraint);
            }
            builder.add_constraint(&expr, is_eq);
        }
        Ok(builder.finish(num_user_vars))
    }
}

impl Builder {
    /// `objective` is already oriented for minimization and convex.
    fn add_objective(&mut self, objective: &ScalarExpr) {
        for (i, a) in objective.affine().compact().terms() {
            self.q.push((*i, *a));
        }

        // c·(a·x + b)² = ½xᵀ(2c·aaᵀ)x + 2cb·a·x + cb²
        for (c, e) in objective.squares() {
            if *c == 0.0 {
                continue;
            }
            let e = e.compact();
            let b = e.constant_term();
            for (i, ai) in e.terms() {
                self.q.push((*i, 2.0 * c * b * ai));
                for (j, aj) in e.terms() {
                    if i <= j {
                        self.p.push((*i, *j, 2.0 * c * ai * aj));
                    }
                }
            }
        }

        for (c, e) in objective.abs_terms() {
            if *c == 0.0 {
                continue;
            }
            let t = self.epigraph(e);
            self.q.push((t, *c));
        }
    }

    /// `expr == 0` or `expr <= 0`, `expr` free of squares.
    fn add_constraint(&mut self, expr: &ScalarExpr, is_eq: bool) {
        let affine = expr.affine().compact();
        let mut terms = affine.terms().to_vec();
        for (c, e) in expr.abs_terms() {
            if *c == 0.0 {
                continue;
            }
            let t = self.epigraph(e);
            terms.push((t, *c));
        }
        let row = Row {
            terms,
            rhs: -affine.constant_term(),
        };
        if is_eq {
            self.equalities.push(row);
        } else {
            self.inequalities.push(row);
        }
    }

    /// Allocate `t ≥ |e|` and return its column.
    fn epigraph(&mut self, e: &AffineExpr) -> usize {
        let t = self.next_col;
        self.next_col += 1;
        let e = e.compact();
        let b = e.constant_term();

        let mut pos = e.terms().to_vec();
        pos.push((t, -1.0));
        self.inequalities.push(Row { terms: pos, rhs: -b });

        let mut neg: Vec<(usize, f64)> = e.terms().iter().map(|(i, a)| (*i, -a)).collect();
        neg.push((t, -1.0));
        self.inequalities.push(Row { terms: neg, rhs: b });
        t
    }

    fn finish(self, num_user_vars: usize) -> ConicData {
        let n = self.next_col;
        let mut q = vec![0.0; n];
        for (i, v) in self.q {
            q[i] += v;
        }

        let mut cones = Vec::new();
        if !self.equalities.is_empty() {
            cones.push(SupportedConeT::ZeroConeT(self.equalities.len()));
        }
        if !self.inequalities.is_empty() {
            cones.push(SupportedConeT::NonnegativeConeT(self.inequalities.len()));
        }

        let mut entries = Vec::new();
        let mut b = Vec::with_capacity(self.equalities.len() + self.inequalities.len());
        for (r, row) in self
            .equalities
            .into_iter()
            .chain(self.inequalities)
            .enumerate()
        {
            entries.extend(row.terms.into_iter().map(|(c, v)| (r, c, v)));
            b.push(row.rhs);
        }

        ConicData {
            p: csc(n, n, self.p),
            q,
            a: csc(b.len(), n, entries),
            b,
            cones,
            num_user_vars,
        }
    }
}

/// Compressed-column matrix from `(row, col, value)` triplets; duplicates
/// are summed and explicit zeros dropped.
fn csc(m: usize, n: usize, mut entries: Vec<(usize, usize, f64)>) -> CscMatrix<f64> {
    entries.retain(|(_, _, v)| *v != 0.0);
    entries.sort_by(|x, y| (x.1, x.0).cmp(&(y.1, y.0)));

    let mut colptr = vec![0usize; n + 1];
    let mut rowval = Vec::with_capacity(entries.len());
    let mut nzval: Vec<f64> = Vec::with_capacity(entries.len());
    let mut last = None;
    for (r, c, v) in entries {
        if last == Some((r, c)) {
            if let Some(acc) = nzval.last_mut() {
                *acc += v;
            }
            continue;
        }
        rowval.push(r);
        nzval.push(v);
        colptr[c + 1] += 1;
        last = Some((r, c));
    }
    for c in 0..n {
        colptr[c + 1] += colptr[c];
    }
    CscMatrix::new(m, n, colptr, rowval, nzval)
}
