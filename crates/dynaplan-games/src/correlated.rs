//! Correlated equilibria of two-player general-sum matrix games

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use dynaplan_core::{PlanningError, Result};

use crate::lp::{LinearProgram, Relation};
use crate::matrix::{joint_expected_payoff, normalized};

/// Objective selecting one equilibrium among the correlated equilibria
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelatedObjective {
    /// Maximize the sum of both players' payoffs
    #[default]
    Utilitarian,
    /// Maximize the smaller of the two players' payoffs
    Egalitarian,
    /// Maximize the larger of the two players' payoffs
    Republican,
    /// Maximize the row player's own payoff
    Libertarian,
}

/// Solve for a correlated equilibrium joint distribution
///
/// Both matrices are indexed `[row action][column action]`. The result is
/// a distribution over action pairs in the same layout.
pub fn correlated_equilibrium(
    row_payoff: &Array2<f64>,
    col_payoff: &Array2<f64>,
    objective: CorrelatedObjective,
) -> Result<Array2<f64>> {
    if row_payoff.dim() != col_payoff.dim() {
        return Err(PlanningError::Solver("payoff matrices differ in shape".to_string()));
    }
    let (rows, cols) = row_payoff.dim();
    if rows == 0 || cols == 0 {
        return Err(PlanningError::Solver("empty payoff matrix".to_string()));
    }

    // Equilibrium constraints only see payoff differences, so a common shift
    // leaves the feasible set unchanged and keeps payoffs positive.
    let min = row_payoff
        .iter()
        .chain(col_payoff.iter())
        .copied()
        .fold(f64::INFINITY, f64::min);
    let shift = 1.0 - min;
    let row = row_payoff.mapv(|v| v + shift);
    let col = col_payoff.mapv(|v| v + shift);

    match objective {
        CorrelatedObjective::Utilitarian => solve(&row, &col, |i, j| row[[i, j]] + col[[i, j]], false),
        CorrelatedObjective::Libertarian => solve(&row, &col, |i, j| row[[i, j]], false),
        CorrelatedObjective::Egalitarian => solve(&row, &col, |_, _| 0.0, true),
        CorrelatedObjective::Republican => {
            let for_row = solve(&row, &col, |i, j| row[[i, j]], false)?;
            let for_col = solve(&row, &col, |i, j| col[[i, j]], false)?;
            if joint_expected_payoff(&row, &for_row) >= joint_expected_payoff(&col, &for_col) {
                Ok(for_row)
            } else {
                Ok(for_col)
            }
        }
    }
}

fn solve(
    row: &Array2<f64>,
    col: &Array2<f64>,
    weight: impl Fn(usize, usize) -> f64,
    egalitarian: bool,
) -> Result<Array2<f64>> {
    let (rows, cols) = row.dim();
    let cells = rows * cols;
    let width = if egalitarian { cells + 1 } else { cells };
    let index = |i: usize, j: usize| i * cols + j;

    let mut objective = vec![0.0; width];
    for i in 0..rows {
        for j in 0..cols {
            objective[index(i, j)] = weight(i, j);
        }
    }
    if egalitarian {
        objective[cells] = 1.0;
    }
    let mut lp = LinearProgram::maximize(objective);

    // Row player gains nothing by deviating from a recommended row.
    for i in 0..rows {
        for k in (0..rows).filter(|&k| k != i) {
            let mut coefficients = vec![0.0; width];
            for j in 0..cols {
                coefficients[index(i, j)] = row[[i, j]] - row[[k, j]];
            }
            lp.constrain(coefficients, Relation::GreaterEq, 0.0)?;
        }
    }
    // Column player likewise.
    for j in 0..cols {
        for l in (0..cols).filter(|&l| l != j) {
            let mut coefficients = vec![0.0; width];
            for i in 0..rows {
                coefficients[index(i, j)] = col[[i, j]] - col[[i, l]];
            }
            lp.constrain(coefficients, Relation::GreaterEq, 0.0)?;
        }
    }

    let mut total = vec![1.0; width];
    if egalitarian {
        total[cells] = 0.0;
        for payoff in [row, col] {
            let mut coefficients: Vec<f64> = payoff.iter().map(|v| -v).collect();
            coefficients.push(1.0);
            lp.constrain(coefficients, Relation::LessEq, 0.0)?;
        }
    }
    lp.constrain(total, Relation::Equal, 1.0)?;

    let solution = lp.solve()?;
    let probabilities = normalized(&solution.x[..cells]);
    Array2::from_shape_vec((rows, cols), probabilities)
        .map_err(|e| PlanningError::Solver(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{marginalize_columns, marginalize_rows};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn chicken() -> (Array2<f64>, Array2<f64>) {
        (array![[6.0, 2.0], [7.0, 0.0]], array![[6.0, 7.0], [2.0, 0.0]])
    }

    #[test]
    fn test_utilitarian_chicken() {
        let (row, col) = chicken();
        let joint = correlated_equilibrium(&row, &col, CorrelatedObjective::Utilitarian).unwrap();
        assert_relative_eq!(joint[[0, 0]], 0.5, epsilon = 1e-7);
        assert_relative_eq!(joint[[0, 1]], 0.25, epsilon = 1e-7);
        assert_relative_eq!(joint[[1, 0]], 0.25, epsilon = 1e-7);
        assert_relative_eq!(joint[[1, 1]], 0.0, epsilon = 1e-7);
        assert_relative_eq!(joint_expected_payoff(&row, &joint), 5.25, epsilon = 1e-7);
    }

    #[test]
    fn test_egalitarian_chicken_is_symmetric() {
        let (row, col) = chicken();
        let joint = correlated_equilibrium(&row, &col, CorrelatedObjective::Egalitarian).unwrap();
        assert_relative_eq!(joint_expected_payoff(&row, &joint), 5.25, epsilon = 1e-7);
        assert_relative_eq!(joint_expected_payoff(&col, &joint), 5.25, epsilon = 1e-7);
    }

    #[test]
    fn test_libertarian_favours_row_player() {
        let (row, col) = chicken();
        let joint = correlated_equilibrium(&row, &col, CorrelatedObjective::Libertarian).unwrap();
        // Pure equilibrium (Dare, Chicken) gives the row player 7.
        assert_relative_eq!(joint_expected_payoff(&row, &joint), 7.0, epsilon = 1e-7);
        let republican = correlated_equilibrium(&row, &col, CorrelatedObjective::Republican).unwrap();
        assert_relative_eq!(joint_expected_payoff(&row, &republican), 7.0, epsilon = 1e-7);
    }

    #[test]
    fn test_equilibrium_is_a_distribution() {
        let row = array![[3.0, 0.0, 1.0], [5.0, 1.0, -2.0]];
        let col = array![[3.0, 5.0, 0.0], [0.0, 1.0, 4.0]];
        let joint = correlated_equilibrium(&row, &col, CorrelatedObjective::Utilitarian).unwrap();
        assert_relative_eq!(joint.sum(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(marginalize_rows(&joint).iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_eq!(marginalize_columns(&joint).len(), 3);
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let row = array![[1.0, 2.0]];
        let col = array![[1.0], [2.0]];
        assert!(correlated_equilibrium(&row, &col, CorrelatedObjective::Utilitarian).is_err());
    }
}
