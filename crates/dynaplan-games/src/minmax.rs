//! Maximin strategies of two-player zero-sum matrix games

use ndarray::Array2;

use dynaplan_core::{PlanningError, Result};

use crate::lp::{LinearProgram, Relation};
use crate::matrix::{expected_payoff, normalized};

/// Maximin mixed strategy of the row player
///
/// `payoff[[i, j]]` is the row player's payoff when row plays `i` and
/// column plays `j`.
pub fn row_player_strategy(payoff: &Array2<f64>) -> Result<Vec<f64>> {
    let (rows, cols) = payoff.dim();
    if rows == 0 || cols == 0 {
        return Err(PlanningError::Solver("empty payoff matrix".to_string()));
    }

    // Shift payoffs positive so the game value variable is non-negative.
    let min = payoff.iter().copied().fold(f64::INFINITY, f64::min);
    let shift = 1.0 - min;

    let mut objective = vec![0.0; rows + 1];
    objective[rows] = 1.0;
    let mut lp = LinearProgram::maximize(objective);
    for j in 0..cols {
        let mut coefficients: Vec<f64> = (0..rows).map(|i| payoff[[i, j]] + shift).collect();
        coefficients.push(-1.0);
        lp.constrain(coefficients, Relation::GreaterEq, 0.0)?;
    }
    let mut simplex = vec![1.0; rows];
    simplex.push(0.0);
    lp.constrain(simplex, Relation::Equal, 1.0)?;

    let solution = lp.solve()?;
    Ok(normalized(&solution.x[..rows]))
}

/// Maximin mixed strategy of the column player
///
/// `payoff[[i, j]]` is the column player's payoff when row plays `i` and
/// column plays `j`.
pub fn column_player_strategy(payoff: &Array2<f64>) -> Result<Vec<f64>> {
    row_player_strategy(&payoff.t().to_owned())
}

/// Value of a zero-sum game to the row player
pub fn game_value(payoff: &Array2<f64>) -> Result<f64> {
    let row = row_player_strategy(payoff)?;
    let col = column_player_strategy(&payoff.mapv(|v| -v))?;
    Ok(expected_payoff(payoff, &row, &col))
}
