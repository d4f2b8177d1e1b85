//! Backup operators for stochastic games
//!
//! Each operator reduces a state's stage game to one agent's value. The
//! two-agent operators fail with an agent-count error for any other number
//! of agents.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use dynaplan_core::Result;

use crate::correlated::{correlated_equilibrium, CorrelatedObjective};
use crate::matrix::{expected_payoff, joint_expected_payoff};
use crate::minmax::{column_player_strategy, row_player_strategy};
use crate::stage::StageGame;

/// Reduces a stage game to the value of one agent
pub trait SgBackupOperator {
    /// Backed-up value of `agent` in the stage game
    fn backup(&self, stage: &StageGame, agent: usize) -> Result<f64>;
}

impl<T: SgBackupOperator + ?Sized> SgBackupOperator for Box<T> {
    fn backup(&self, stage: &StageGame, agent: usize) -> Result<f64> {
        (**self).backup(stage, agent)
    }
}

/// The agent's own best joint-action Q-value, ignoring the other agents
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MaxQBackup;

impl SgBackupOperator for MaxQBackup {
    fn backup(&self, stage: &StageGame, agent: usize) -> Result<f64> {
        stage.max_q(agent)
    }
}

/// Both agents' Q matrices with `agent`'s actions as rows
pub(crate) fn own_and_other(stage: &StageGame, agent: usize) -> Result<(Array2<f64>, Array2<f64>)> {
    stage.require_two_agents()?;
    let other = 1 - agent.min(1);
    Ok((stage.payoff_matrix(agent, agent)?, stage.payoff_matrix(other, agent)?))
}

/// Maximin strategies of the zero-sum game `(own - other) / 2`
pub(crate) fn advantage_strategies(
    own: &Array2<f64>,
    other: &Array2<f64>,
)  -> Result<(Array2<f64>, Vec<f64>, Vec<f64>)> {
    let advantage = (own - other) / 2.0;
    let mine = row_player_strategy(&advantage)?;
    let theirs = column_player_strategy(&advantage.mapv(|v| -v))?;
    Ok((advantage, mine, theirs))
}

/// Minimax-Q: solve the zero-sum advantage game and report the agent's
/// expected raw Q-value under the resulting strategy pair
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MinMaxQBackup;

impl SgBackupOperator for MinMaxQBackup {
    fn backup(&self, stage: &StageGame, agent: usize) -> Result<f64> {
        let (own, other) = own_and_other(stage, agent)?;
        let (_, mine, theirs) = advantage_strategies(&own, &other)?;
        Ok(expected_payoff(&own, &mine, &theirs))
    }
}

/// Correlated-Q: expected Q-value under a correlated equilibrium
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CorrelatedQBackup {
    /// Equilibrium selection objective
    pub objective: CorrelatedObjective,
}

impl CorrelatedQBackup {
    /// Create a new correlated-Q operator
    #[must_use]
    pub fn new(objective: CorrelatedObjective) -> Self {
        Self { objective }
    }
}

impl SgBackupOperator for CorrelatedQBackup {
    fn backup(&self, stage: &StageGame, agent: usize) -> Result<f64> {
        let (own, other) = own_and_other(stage, agent)?;
        let joint = correlated_equilibrium(&own, &other, self.objective)?;
        Ok(joint_expected_payoff(&own, &joint))
    }
}

/// Coco-Q: half the best joint payoff plus the minimax value of the
/// payoff-difference game
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CoCoQBackup;

impl SgBackupOperator for CoCoQBackup {
    fn backup(&self, stage: &StageGame, agent: usize) -> Result<f64> {
        let (own, other) = own_and_other(stage, agent)?;
        let cooperative = (&own + &other).iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (advantage, mine, theirs) = advantage_strategies(&own, &other)?;
        Ok(cooperative / 2.0 + expected_payoff(&advantage, &mine, &theirs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dynaplan_core::PlanningError;
    use ndarray::array;

    fn stage(row: Array2<f64>, col: Array2<f64>) -> StageGame {
        StageGame::from_matrices(&row, &col).unwrap()
    }

    fn prisoners_dilemma() -> StageGame {
        stage(array![[3.0, 0.0], [5.0, 1.0]], array![[3.0, 5.0], [0.0, 1.0]])
    }

    #[test]
    fn test_max_ignores_other_agent() {
        let game = prisoners_dilemma();
        assert_relative_eq!(MaxQBackup.backup(&game, 0).unwrap(), 5.0);
        assert_relative_eq!(MaxQBackup.backup(&game, 1).unwrap(), 5.0);
    }

    #[test]
    fn test_minmax_matching_pennies() {
        let q = array![[1.0, -1.0], [-1.0, 1.0]];
        let game = stage(q.clone(), -q);
        assert_relative_eq!(MinMaxQBackup.backup(&game, 0).unwrap(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(MinMaxQBackup.backup(&game, 1).unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_minmax_mixed_zero_sum_game() {
        let q = array![[2.0, -1.0], [-1.0, 1.0]];
        let game = stage(q.clone(), -q);
        assert_relative_eq!(MinMaxQBackup.backup(&game, 0).unwrap(), 0.2, epsilon = 1e-9);
        assert_relative_eq!(MinMaxQBackup.backup(&game, 1).unwrap(), -0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_coco_prisoners_dilemma() {
        let game = prisoners_dilemma();
        // Cooperative maximum 6 split evenly; the difference game is a wash.
        assert_relative_eq!(CoCoQBackup.backup(&game, 0).unwrap(), 3.0, epsilon = 1e-9);
        assert_relative_eq!(CoCoQBackup.backup(&game, 1).unwrap(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_correlated_q_chicken() {
        let game = stage(array![[6.0, 2.0], [7.0, 0.0]], array![[6.0, 7.0], [2.0, 0.0]]);
        let op = CorrelatedQBackup::new(CorrelatedObjective::Utilitarian);
        assert_relative_eq!(op.backup(&game, 0).unwrap(), 5.25, epsilon = 1e-7);
        assert_relative_eq!(op.backup(&game, 1).unwrap(), 5.25, epsilon = 1e-7);
    }

    #[test]
    fn test_two_agent_operators_reject_other_counts() {
        let three = StageGame::new(vec![1, 1, 1], vec![vec![1.0]; 3]).unwrap();
        let operators: [Box<dyn SgBackupOperator>; 3] = [
            Box::new(MinMaxQBackup),
            Box::new(CorrelatedQBackup::default()),
            Box::new(CoCoQBackup),
        ];
        for op in operators {
            assert!(matches!(
                op.backup(&three, 0),
                Err(PlanningError::AgentCount { expected: 2, actual: 3 })
            ));
        }
        assert_relative_eq!(MaxQBackup.backup(&three, 2).unwrap(), 1.0);
    }
}
