//! A normal-form game played for a fixed number of rounds

use serde::{Deserialize, Serialize};

use dynaplan_core::{PlanningError, Result};
use dynaplan_games::{AgentDefinition, JointAction, JointModel, JointTransition};

use crate::normal_form::NormalFormGame;

/// Number of rounds already played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundsPlayed(pub u32);

/// Repeated bimatrix game
#[derive(Debug, Clone)]
pub struct RepeatedGame {
    stage: NormalFormGame,
    rounds: u32,
}

impl RepeatedGame {
    /// Repeat `stage` for `rounds` rounds
    pub fn new(stage: NormalFormGame, rounds: u32) -> Result<Self> {
        if rounds == 0 {
            return Err(PlanningError::Configuration(
                "a repeated game needs at least one round".to_string(),
            ));
        }
        Ok(Self { stage, rounds })
    }

    /// The stage game
    pub fn stage(&self) -> &NormalFormGame {
        &self.stage
    }

    /// Total number of rounds
    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }
}

impl JointModel<RoundsPlayed, usize> for RepeatedGame {
    fn applicable_actions(&self, state: &RoundsPlayed, agent: &AgentDefinition) -> Vec<usize> {
        if self.is_terminal(state) {
            return Vec::new();
        }
        self.stage.actions_for(agent)
    }

    fn transitions(
        &self,
        state: &RoundsPlayed,
        joint: &JointAction<usize>,
    ) -> Result<Vec<JointTransition<RoundsPlayed>>> {
        let next = RoundsPlayed(state.0 + 1);
        Ok(vec![JointTransition {
            terminated: self.is_terminal(&next),
            next_state: next,
            probability: 1.0,
            rewards: self.stage.payoffs(joint)?,
        }])
    }

    fn is_terminal(&self, state: &RoundsPlayed) -> bool {
        state.0 >= self.rounds
    }
}
