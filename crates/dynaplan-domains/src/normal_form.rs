//! One-shot two-player matrix games
//!
//! The game has a start state and a terminal state; every joint action
//! moves from one to the other and pays both players from their payoff
//! matrices. Agents whose type is `"row"` pick rows, `"column"` picks
//! columns.

use ndarray::{array, Array2};
use serde::{Deserialize, Serialize};

use dynaplan_core::{PlanningError, Result};
use dynaplan_games::{AgentDefinition, JointAction, JointModel, JointTransition};

/// Agent type of the row player
pub const ROW_PLAYER: &str = "row";
/// Agent type of the column player
pub const COLUMN_PLAYER: &str = "column";

/// Whether the single round has been played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Play {
    /// Before the round
    Start,
    /// After the round
    Done,
}

/// A bimatrix game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalFormGame {
    name: String,
    row: Array2<f64>,
    column: Array2<f64>,
}

impl NormalFormGame {
    /// Create a game from both players' payoff matrices
    pub fn custom(name: impl Into<String>, row: Array2<f64>, column: Array2<f64>) -> Result<Self> {
        if row.dim() != column.dim() {
            return Err(PlanningError::Configuration(format!(
                "payoff shapes differ: {:?} vs {:?}",
                row.dim(),
                column.dim()
            )));
        }
        if row.is_empty() {
            return Err(PlanningError::Configuration("payoff matrices are empty".to_string()));
        }
        Ok(Self {
            name: name.into(),
            row,
            column,
        })
    }

    fn zero_sum(name: &str, row: Array2<f64>) -> Self {
        let column = row.mapv(|v| -v);
        Self {
            name: name.to_string(),
            row,
            column,
        }
    }

    /// Heads/tails; the row player wins on a match
    #[must_use]
    pub fn matching_pennies() -> Self {
        Self::zero_sum("matching pennies", array![[1.0, -1.0], [-1.0, 1.0]])
    }

    /// Rock, paper, scissors
    #[must_use]
    pub fn rock_paper_scissors() -> Self {
        Self::zero_sum(
            "rock paper scissors",
            array![[0.0, -1.0, 1.0], [1.0, 0.0, -1.0], [-1.0, 1.0, 0.0]],
        )
    }

    /// Cooperate/defect
    #[must_use]
    pub fn prisoners_dilemma() -> Self {
        Self {
            name: "prisoner's dilemma".to_string(),
            row: array![[3.0, 0.0], [5.0, 1.0]],
            column: array![[3.0, 5.0], [0.0, 1.0]],
        }
    }

    /// Swerve/dare
    #[must_use]
    pub fn chicken() -> Self {
        Self {
            name: "chicken".to_string(),
            row: array![[6.0, 2.0], [7.0, 0.0]],
            column: array![[6.0, 7.0], [2.0, 0.0]],
        }
    }

    /// Name of the game
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Row player's payoffs
    pub fn row_payoffs(&self) -> &Array2<f64> {
        &self.row
    }

    /// Column player's payoffs
    pub fn column_payoffs(&self) -> &Array2<f64> {
        &self.column
    }

    /// A row and a column player, in that order
    #[must_use]
    pub fn agents() -> Vec<AgentDefinition> {
        vec![
            AgentDefinition::new("row", ROW_PLAYER),
            AgentDefinition::new("column", COLUMN_PLAYER),
        ]
    }

    /// Both players' payoffs for a joint action of `(row, column)` indices
    pub fn payoffs(&self, joint: &JointAction<usize>) -> Result<Vec<f64>> {
        let (Some(&i), Some(&j)) = (joint.action(0), joint.action(1)) else {
            return Err(PlanningError::AgentCount {
                expected: 2,
                actual: joint.len(),
            });
        };
        match (self.row.get([i, j]), self.column.get([i, j])) {
            (Some(r), Some(c)) => Ok(vec![*r, *c]),
            _ => Err(PlanningError::Model(format!(
                "joint action ({i}, {j}) is outside the {:?} payoff matrix",
                self.row.dim()
            ))),
        }
    }

    pub(crate) fn actions_for(&self, agent: &AgentDefinition) -> Vec<usize> {
        match agent.agent_type.as_str() {
            ROW_PLAYER => (0..self.row.nrows()).collect(),
            COLUMN_PLAYER => (0..self.row.ncols()).collect(),
            _ => Vec::new(),
        }
    }
}

impl JointModel<Play, usize> for NormalFormGame {
    fn applicable_actions(&self, state: &Play, agent: &AgentDefinition) -> Vec<usize> {
        if self.is_terminal(state) {
            return Vec::new();
        }
        self.actions_for(agent)
    }

    fn transitions(&self, _state: &Play, joint: &JointAction<usize>) -> Result<Vec<JointTransition<Play>>> {
        Ok(vec![JointTransition {
            next_state: Play::Done,
            probability: 1.0,
            rewards: self.payoffs(joint)?,
            terminated: true,
        }])
    }

    fn is_terminal(&self, state: &Play) -> bool {
        *state == Play::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_types_select_action_sets() {
        let game = NormalFormGame::rock_paper_scissors();
        let agents = NormalFormGame::agents();
        assert_eq!(game.applicable_actions(&Play::Start, &agents[0]).len(), 3);
        assert_eq!(game.joint_actions(&Play::Start, &agents).len(), 9);
        assert!(game
            .applicable_actions(&Play::Start, &AgentDefinition::new("x", "spectator"))
            .is_empty());
    }

    #[test]
    fn test_payoffs_follow_agent_order() {
        let game = NormalFormGame::prisoners_dilemma();
        let outcome = game.transitions(&Play::Start, &JointAction(vec![1, 0])).unwrap();
        assert_eq!(outcome[0].rewards, vec![5.0, 0.0]);
        assert!(outcome[0].terminated);
    }

    #[test]
    fn test_bad_joint_actions() {
        let game = NormalFormGame::matching_pennies();
        assert!(game.payoffs(&JointAction(vec![0])).is_err());
        assert!(game.payoffs(&JointAction(vec![0, 7])).is_err());
        assert!(NormalFormGame::custom("bad", Array2::zeros((2, 2)), Array2::zeros((2, 3))).is_err());
    }
}
