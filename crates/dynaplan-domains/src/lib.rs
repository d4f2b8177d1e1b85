//! Reference planning domains for Dynaplan
//!
//! This crate provides small, fully-specified models used by the test
//! suite, the benchmarks and the runnable demos:
//! - A line world with an absorbing goal
//! - A stochastic grid world with walls and a room-exit option
//! - Classic two-player normal-form games
//! - Repeated versions of those games

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod grid_world;
pub mod line_world;
pub mod normal_form;
pub mod repeated;

pub use grid_world::{Cell, Direction, GridWorld, GridWorldConfig};
pub use line_world::{LineWorld, LineWorldConfig, Move, Position};
pub use normal_form::{NormalFormGame, Play, COLUMN_PLAYER, ROW_PLAYER};
pub use repeated::{RepeatedGame, RoundsPlayed};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Cell, Direction, GridWorld, GridWorldConfig, LineWorld, LineWorldConfig, Move,
        NormalFormGame, Play, Position, RepeatedGame, RoundsPlayed,
    };
    pub use dynaplan_games::prelude::*;
    pub use dynaplan_solvers::prelude::*;
}
