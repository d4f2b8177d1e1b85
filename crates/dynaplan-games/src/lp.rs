//! Dense two-phase simplex solver for the small linear programs that
//! matrix-game solvers produce
//!
//! All variables are non-negative. Pivoting follows Bland's rule, so the
//! solver cannot cycle on degenerate programs.

use ndarray::Array2;

use dynaplan_core::{PlanningError, Result};

const EPS: f64 = 1e-9;
const FEASIBILITY_TOLERANCE: f64 = 1e-7;
const MAX_PIVOTS: usize = 50_000;

/// Constraint relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `a . x <= b`
    LessEq,
    /// `a . x >= b`
    GreaterEq,
    /// `a . x == b`
    Equal,
}

impl Relation {
    fn flipped(self) -> Self {
        match self {
            Self::LessEq => Self::GreaterEq,
            Self::GreaterEq => Self::LessEq,
            Self::Equal => Self::Equal,
        }
    }
}

/// A single linear constraint
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Coefficient of each variable
    pub coefficients: Vec<f64>,
    /// Relation between the left- and right-hand side
    pub relation: Relation,
    /// Right-hand side
    pub rhs: f64,
}

/// Optimization direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Maximize the objective
    Maximize,
    /// Minimize the objective
    Minimize,
}

/// Optimal point of a linear program
#[derive(Debug, Clone)]
pub struct LpSolution {
    /// Variable values
    pub x: Vec<f64>,
    /// Objective value at `x`
    pub objective: f64,
}

/// A linear program over non-negative variables
#[derive(Debug, Clone)]
pub struct LinearProgram {
    objective: Vec<f64>,
    direction: Direction,
    constraints: Vec<Constraint>,
}

impl LinearProgram {
    /// Program maximizing `objective . x`
    #[must_use]
    pub fn maximize(objective: Vec<f64>) -> Self {
        Self {
            objective,
            direction: Direction::Maximize,
            constraints: Vec::new(),
        }
    }

    /// Program minimizing `objective . x`
    #[must_use]
    pub fn minimize(objective: Vec<f64>) -> Self {
        Self {
            objective,
            direction: Direction::Minimize,
            constraints: Vec::new(),
        }
    }

    /// Number of variables
    #[must_use]
    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    /// Add a constraint
    pub fn constrain(&mut self, coefficients: Vec<f64>, relation: Relation, rhs: f64) -> Result<&mut Self> {
        if coefficients.len() != self.num_vars() {
            return Err(PlanningError::Solver(format!(
                "constraint has {} coefficients for {} variables",
                coefficients.len(),
                self.num_vars()
            )));
        }
        self.constraints.push(Constraint {
            coefficients,
            relation,
            rhs,
        });
        Ok(self)
    }

    /// Solve the program
    pub fn solve(&self) -> Result<LpSolution> {
        let n = self.num_vars();
        let m = self.constraints.len();

        let rows: Vec<Constraint> = self
            .constraints
            .iter()
            .map(|c| {
                if c.rhs < 0.0 {
                    Constraint {
                        coefficients: c.coefficients.iter().map(|a| -a).collect(),
                        relation: c.relation.flipped(),
                        rhs: -c.rhs,
                    }
                } else {
                    c.clone()
                }
            })
            .collect();

        let n_slack = rows.iter().filter(|c| c.relation != Relation::Equal).count();
        let n_artificial = rows.iter().filter(|c| c.relation != Relation::LessEq).count();
        let artificial_start = n + n_slack;
        let total = artificial_start + n_artificial;

        let mut tableau = Array2::<f64>::zeros((m + 1, total + 1));
        let mut basis = vec![0; m];
        let mut next_slack = n;
        let mut next_artificial = artificial_start;

        for (i, row) in rows.iter().enumerate() {
            for (j, a) in row.coefficients.iter().enumerate() {
                tableau[[i, j]] = *a;
            }
            tableau[[i, total]] = row.rhs;
            match row.relation {
                Relation::LessEq => {
                    tableau[[i, next_slack]] = 1.0;
                    basis[i] = next_slack;
                    next_slack += 1;
                }
                Relation::GreaterEq => {
                    tableau[[i, next_slack]] = -1.0;
                    next_slack += 1;
                    tableau[[i, next_artificial]] = 1.0;
                    basis[i] = next_artificial;
                    next_artificial += 1;
                }
                Relation::Equal => {
                    tableau[[i, next_artificial]] = 1.0;
                    basis[i] = next_artificial;
                    next_artificial += 1;
                }
            }
        }

        if n_artificial > 0 {
            let cost: Vec<f64> = (0..total)
                .map(|j| if j >= artificial_start { -1.0 } else { 0.0 })
                .collect();
            price_out(&mut tableau, &basis, &cost);
            run_simplex(&mut tableau, &mut basis, total)?;
            if tableau[[m, total]] > FEASIBILITY_TOLERANCE {
                return Err(PlanningError::Solver("linear program is infeasible".to_string()));
            }
            for i in 0..m {
                if basis[i] >= artificial_start {
                    if let Some(j) = (0..artificial_start).find(|&j| tableau[[i, j]].abs() > EPS) {
                        pivot(&mut tableau, &mut basis, i, j);
                    }
                }
            }
        }

        let sign = match self.direction {
            Direction::Maximize => 1.0,
            Direction::Minimize => -1.0,
        };
        let cost: Vec<f64> = (0..total)
            .map(|j| if j < n { sign * self.objective[j] } else { 0.0 })
            .collect();
        price_out(&mut tableau, &basis, &cost);
        run_simplex(&mut tableau, &mut basis, artificial_start)?;

        let mut x = vec![0.0; n];
        for (i, &b) in basis.iter().enumerate() {
            if b < n {
                x[b] = tableau[[i, total]].max(0.0);
            }
        }
        let objective = x.iter().zip(&self.objective).map(|(a, c)| a * c).sum();
        Ok(LpSolution { x, objective })
    }
}

/// Write reduced costs for `cost` into the objective row.
/// The objective row's right-hand side holds minus the current objective.
fn price_out(tableau: &mut Array2<f64>, basis: &[usize], cost: &[f64]) {
    let m = basis.len();
    let rhs = tableau.ncols() - 1;
    for j in 0..=rhs {
        let base = if j == rhs { 0.0 } else { cost[j] };
        let priced: f64 = basis
            .iter()
            .enumerate()
            .map(|(i, &b)| cost[b] * tableau[[i, j]])
            .sum();
        tableau[[m, j]] = base - priced;
    }
}

/// Pivot until no column below `allowed` has a positive reduced cost.
fn run_simplex(tableau: &mut Array2<f64>, basis: &mut [usize], allowed: usize) -> Result<()> {
    let m = basis.len();
    let rhs = tableau.ncols() - 1;

    for _ in 0..MAX_PIVOTS {
        let Some(col) = (0..allowed).find(|&j| tableau[[m, j]] > EPS) else {
            return Ok(());
        };

        let mut leaving: Option<(usize, f64)> = None;
        for i in 0..m {
            let a = tableau[[i, col]];
            if a <= EPS {
                continue;
            }
            let ratio = tableau[[i, rhs]] / a;
            leaving = match leaving {
                None => Some((i, ratio)),
                Some((_, best)) if ratio < best - EPS => Some((i, ratio)),
                Some((r, best)) if ratio <= best + EPS && basis[i] < basis[r] => Some((i, best.min(ratio))),
                keep => keep,
            };
        }

        let Some((row, _)) = leaving else {
            return Err(PlanningError::Solver("linear program is unbounded".to_string()));
        };
        pivot(tableau, basis, row, col);
    }

    Err(PlanningError::Solver(format!(
        "simplex did not finish within {MAX_PIVOTS} pivots"
    )))
}

fn pivot(tableau: &mut Array2<f64>, basis: &mut [usize], row: usize, col: usize) {
    let p = tableau[[row, col]];
    tableau.row_mut(row).mapv_inplace(|v| v / p);
    let pivot_row = tableau.row(row).to_owned();
    for i in 0..tableau.nrows() {
        if i == row {
            continue;
        }
        let factor = tableau[[i, col]];
        if factor != 0.0 {
            tableau.row_mut(i).scaled_add(-factor, &pivot_row);
        }
    }
    basis[row] = col;
}
