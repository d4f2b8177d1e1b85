//! Bimatrix game utilities

use ndarray::Array2;

/// Expected payoff of a matrix under independent mixed strategies
#[must_use]
pub fn expected_payoff(payoff: &Array2<f64>, row_strategy: &[f64], col_strategy: &[f64]) -> f64 {
    payoff
        .indexed_iter()
        .map(|((i, j), v)| row_strategy[i] * col_strategy[j] * v)
        .sum()
}

/// Expected payoffs of both players under independent mixed strategies
#[must_use]
pub fn expected_payoffs(
    row_payoff: &Array2<f64>,
    col_payoff: &Array2<f64>,
    row_strategy: &[f64],
    col_strategy: &[f64],
) -> (f64, f64) {
    (
        expected_payoff(row_payoff, row_strategy, col_strategy),
        expected_payoff(col_payoff, row_strategy, col_strategy),
    )
}

/// Expected payoff of a matrix under a joint distribution over action pairs
#[must_use]
pub fn joint_expected_payoff(payoff: &Array2<f64>, joint: &Array2<f64>) -> f64 {
    (payoff * joint).sum()
}

/// Joint distribution induced by independent mixed strategies
#[must_use]
pub fn joint_strategy(row_strategy: &[f64], col_strategy: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((row_strategy.len(), col_strategy.len()), |(i, j)| {
        row_strategy[i] * col_strategy[j]
    })
}

/// Row player's marginal of a joint distribution
#[must_use]
pub fn marginalize_rows(joint: &Array2<f64>) -> Vec<f64> {
    joint.rows().into_iter().map(|r| r.sum()).collect()
}

/// Column player's marginal of a joint distribution
#[must_use]
pub fn marginalize_columns(joint: &Array2<f64>) -> Vec<f64> {
    joint.columns().into_iter().map(|c| c.sum()).collect()
}

/// Negated payoff matrix, the opponent's view of a zero-sum game
#[must_use]
pub fn negated(payoff: &Array2<f64>) -> Array2<f64> {
    payoff.mapv(|v| -v)
}

/// Clamp tiny negative round-off to zero and rescale to a distribution
///
/// Falls back to uniform when no positive mass remains.
#[must_use]
pub fn normalized(weights: &[f64]) -> Vec<f64> {
    let clamped: Vec<f64> = weights.iter().map(|w| w.max(0.0)).collect();
    let total: f64 = clamped.iter().sum();
    if total > 0.0 {
        clamped.iter().map(|w| w / total).collect()
    } else {
        #[allow(clippy::cast_precision_loss)]
        let p = 1.0 / weights.len().max(1) as f64;
        vec![p; weights.len()]
    }
}
