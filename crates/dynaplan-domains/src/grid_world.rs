//! Stochastic grid world with walls and a single goal cell
//!
//! A move succeeds with `success_probability`; otherwise the agent moves
//! in one of the three other directions, chosen uniformly. Moves into a
//! wall or off the grid leave the agent in place.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use dynaplan_core::policy::FnPolicy;
use dynaplan_core::{ActionProb, Model, Outcome, PlanningError, Result, TransitionProb};
use dynaplan_solvers::DeterministicTerminationOption;

/// Grid cell, `y` grows northward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl Cell {
    /// Create a new cell
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Compass moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// +y
    North,
    /// -y
    South,
    /// +x
    East,
    /// -x
    West,
}

impl Direction {
    /// All four directions
    pub const ALL: [Direction; 4] = [Self::North, Self::South, Self::East, Self::West];

    fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::South => (0, -1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }
}

/// Grid world configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridWorldConfig {
    /// Number of columns
    pub width: i32,
    /// Number of rows
    pub height: i32,
    /// Blocked cells
    pub walls: Vec<Cell>,
    /// Absorbing goal cell
    pub goal: Cell,
    /// Probability that the chosen direction is the one taken
    pub success_probability: f64,
    /// Reward of every step
    pub step_reward: f64,
}

impl Default for GridWorldConfig {
    fn default() -> Self {
        Self {
            width: 5,
            height: 5,
            walls: Vec::new(),
            goal: Cell::new(4, 4),
            success_probability: 0.8,
            step_reward: -1.0,
        }
    }
}

/// Grid world model
#[derive(Debug, Clone)]
pub struct GridWorld {
    config: GridWorldConfig,
    walls: HashSet<Cell>,
}

impl GridWorld {
    /// Create a new grid world
    pub fn new(config: GridWorldConfig) -> Result<Self> {
        if config.width <= 0 || config.height <= 0 {
            return Err(PlanningError::Configuration(format!(
                "grid must be non-empty, got {}x{}",
                config.width, config.height
            )));
        }
        if !(0.0..=1.0).contains(&config.success_probability) {
            return Err(PlanningError::Configuration(format!(
                "success probability must lie in [0, 1], got {}",
                config.success_probability
            )));
        }
        let walls: HashSet<Cell> = config.walls.iter().copied().collect();
        if walls.contains(&config.goal) {
            return Err(PlanningError::Configuration("the goal cell is a wall".to_string()));
        }
        debug!(
            "Grid world {}x{} with {} walls, goal {:?}",
            config.width,
            config.height,
            walls.len(),
            config.goal
        );
        Ok(Self { config, walls })
    }

    /// A 5x5 grid split by a wall at `x = 2` with a single door at (2, 2)
    pub fn two_rooms(success_probability: f64) -> Result<Self> {
        Self::new(GridWorldConfig {
            walls: (0..5).filter(|y| *y != 2).map(|y| Cell::new(2, y)).collect(),
            success_probability,
            ..GridWorldConfig::default()
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &GridWorldConfig {
        &self.config
    }

    /// Whether a cell is inside the grid and not a wall
    #[must_use]
    pub fn is_open(&self, cell: Cell) -> bool {
        (0..self.config.width).contains(&cell.x)
            && (0..self.config.height).contains(&cell.y)
            && !self.walls.contains(&cell)
    }

    fn moved(&self, from: Cell, direction: Direction) -> Cell {
        let to = from.step(direction);
        if self.is_open(to) {
            to
        } else {
            from
        }
    }

    /// An option that walks out of a room through `door`
    ///
    /// It may start anywhere `in_room` holds and ends on reaching the door
    /// or leaving the room. Inside the room it first lines up with the
    /// door's row, then walks along it.
    pub fn room_exit_option(
        name: impl Into<String>,
        in_room: impl Fn(Cell) -> bool + Send + Sync + Clone + 'static,
        door: Cell,
    ) -> DeterministicTerminationOption<Cell, Direction> {
        let terminate_outside = in_room.clone();
        DeterministicTerminationOption::new(
            name,
            move |cell: &Cell| in_room(*cell),
            move |cell: &Cell| *cell == door || !terminate_outside(*cell),
            FnPolicy::new(move |cell: &Cell| {
                let direction = if cell.y < door.y {
                    Direction::North
                } else if cell.y > door.y {
                    Direction::South
                } else if cell.x < door.x {
                    Direction::East
                } else {
                    Direction::West
                };
                vec![ActionProb::new(direction, 1.0)]
            }),
        )
    }
}

impl Model<Cell, Direction> for GridWorld {
    fn applicable_actions(&self, state: &Cell) -> Vec<Direction> {
        if self.is_terminal(state) {
            Vec::new()
        } else {
            Direction::ALL.to_vec()
        }
    }

    fn transitions(&self, state: &Cell, action: &Direction) -> Result<Vec<TransitionProb<Cell>>> {
        let p = self.config.success_probability;
        let slip = (1.0 - p) / 3.0;
        let mut merged: Vec<TransitionProb<Cell>> = Vec::with_capacity(4);
        for direction in Direction::ALL {
            let probability = if direction == *action { p } else { slip };
            if probability == 0.0 {
                continue;
            }
            let next = self.moved(*state, direction);
            match merged.iter_mut().find(|t| t.outcome.next_state == next) {
                Some(t) => t.probability += probability,
                None => merged.push(TransitionProb::new(
                    Outcome::new(next, self.config.step_reward, next == self.config.goal),
                    probability,
                )),
            }
        }
        Ok(merged)
    }

    fn is_terminal(&self, state: &Cell) -> bool {
        *state == self.config.goal
    }
}
