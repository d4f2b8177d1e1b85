//! Small games shared by the unit tests of this crate

use ndarray::Array2;

use dynaplan_core::Result;

use crate::joint::{AgentDefinition, JointAction, JointModel, JointTransition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Round(pub u32);

/// A bimatrix game played a fixed number of times
pub struct RepeatedMatrixGame {
    row: Array2<f64>,
    col: Array2<f64>,
    rounds: u32,
}

impl RepeatedMatrixGame {
    pub fn new(row: Array2<f64>, col: Array2<f64>, rounds: u32) -> Self {
        Self { row, col, rounds }
    }
}

impl JointModel<Round, usize> for RepeatedMatrixGame {
    fn applicable_actions(&self, _state: &Round, agent: &AgentDefinition) -> Vec<usize> {
        if agent.name == "row" {
            (0..self.row.nrows()).collect()
        } else {
            (0..self.row.ncols()).collect()
        }
    }

    fn transitions(&self, state: &Round, joint: &JointAction<usize>) -> Result<Vec<JointTransition<Round>>> {
        let (i, j) = (joint.0[0], joint.0[1]);
        let next = Round(state.0 + 1);
        Ok(vec![JointTransition {
            terminated: next.0 >= self.rounds,
            next_state: next,
            probability: 1.0,
            rewards: vec![self.row[[i, j]], self.col[[i, j]]],
        }])
    }

    fn is_terminal(&self, state: &Round) -> bool {
        state.0 >= self.rounds
    }
}
