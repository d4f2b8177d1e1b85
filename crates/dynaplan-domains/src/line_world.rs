//! One-dimensional corridor with an absorbing goal at the right end

use serde::{Deserialize, Serialize};
use tracing::debug;

use dynaplan_core::{Model, Outcome, PlanningError, Result, TransitionProb};

/// Line world configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineWorldConfig {
    /// Number of cells; the last one is the goal
    pub length: u32,
    /// Probability that a move leaves the agent where it is
    pub slip: f64,
    /// Reward of every step
    pub step_reward: f64,
}

impl Default for LineWorldConfig {
    fn default() -> Self {
        Self {
            length: 5,
            slip: 0.0,
            step_reward: -1.0,
        }
    }
}

/// Cell index along the line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position(pub u32);

/// Line world actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    /// Toward cell 0
    Left,
    /// Toward the goal
    Right,
}

/// Line world model
#[derive(Debug, Clone)]
pub struct LineWorld {
    config: LineWorldConfig,
}

impl LineWorld {
    /// Create a new line world
    pub fn new(config: LineWorldConfig) -> Result<Self> {
        if config.length < 2 {
            return Err(PlanningError::Configuration(format!(
                "a line world needs at least 2 cells, got {}",
                config.length
            )));
        }
        if !(0.0..1.0).contains(&config.slip) {
            return Err(PlanningError::Configuration(format!(
                "slip must lie in [0, 1), got {}",
                config.slip
            )));
        }
        debug!("Line world with {} cells, slip {}", config.length, config.slip);
        Ok(Self { config })
    }

    /// Get the configuration
    pub fn config(&self) -> &LineWorldConfig {
        &self.config
    }

    /// The absorbing goal cell
    #[must_use]
    pub fn goal(&self) -> Position {
        Position(self.config.length - 1)
    }

    /// Every cell, left to right
    pub fn positions(&self) -> impl Iterator<Item = Position> {
        (0..self.config.length).map(Position)
    }

    fn moved(&self, from: Position, action: Move) -> Position {
        match action {
            Move::Left => Position(from.0.saturating_sub(1)),
            Move::Right => Position((from.0 + 1).min(self.goal().0)),
        }
    }

    fn outcome(&self, next: Position) -> Outcome<Position> {
        Outcome::new(next, self.config.step_reward, next == self.goal())
    }
}

impl Model<Position, Move> for LineWorld {
    fn applicable_actions(&self, state: &Position) -> Vec<Move> {
        if self.is_terminal(state) {
            Vec::new()
        } else {
            vec![Move::Left, Move::Right]
        }
    }

    fn transitions(&self, state: &Position, action: &Move) -> Result<Vec<TransitionProb<Position>>> {
        let next = self.moved(*state, *action);
        if self.config.slip == 0.0 || next == *state {
            return Ok(vec![TransitionProb::new(self.outcome(next), 1.0)]);
        }
        Ok(vec![
            TransitionProb::new(self.outcome(next), 1.0 - self.config.slip),
            TransitionProb::new(self.outcome(*state), self.config.slip),
        ])
    }

    fn is_terminal(&self, state: &Position) -> bool {
        *state >= self.goal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynaplan_core::model::check_distribution;

    #[test]
    fn test_goal_is_terminal_and_absorbing() {
        let world = LineWorld::new(LineWorldConfig::default()).unwrap();
        assert_eq!(world.goal(), Position(4));
        assert!(world.is_terminal(&Position(4)));
        assert!(world.applicable_actions(&Position(4)).is_empty());

        let step = world.transitions(&Position(3), &Move::Right).unwrap();
        assert_eq!(step.len(), 1);
        assert!(step[0].outcome.terminated);
    }

    #[test]
    fn test_left_wall() {
        let world = LineWorld::new(LineWorldConfig::default()).unwrap();
        let step = world.transitions(&Position(0), &Move::Left).unwrap();
        assert_eq!(step[0].outcome.next_state, Position(0));
        assert_eq!(step[0].probability, 1.0);
    }

    #[test]
    fn test_slip_distribution() {
        let world = LineWorld::new(LineWorldConfig {
            slip: 0.25,
            ..LineWorldConfig::default()
        })
        .unwrap();
        for position in world.positions().filter(|p| !world.is_terminal(p)) {
            for action in world.applicable_actions(&position) {
                check_distribution(&world.transitions(&position, &action).unwrap(), 1e-12).unwrap();
            }
        }
    }

    #[test]
    fn test_invalid_config() {
        assert!(LineWorld::new(LineWorldConfig { length: 1, ..Default::default() }).is_err());
        assert!(LineWorld::new(LineWorldConfig { slip: 1.0, ..Default::default() }).is_err());
    }
}
