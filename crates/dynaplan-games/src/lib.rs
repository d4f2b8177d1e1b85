//! Stochastic-game planning for Dynaplan
//!
//! This crate extends the single-agent machinery to several agents acting
//! at once:
//! - Joint actions and a joint transition model contract
//! - Stage games built from every agent's joint-action Q-values
//! - A dense simplex solver with minimax and correlated-equilibrium
//!   matrix-game solvers on top
//! - Max, minimax, correlated and coco backup operators
//! - Multi-agent value iteration and the joint policies it induces

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod correlated;
pub mod joint;
pub mod joint_policy;
pub mod lp;
pub mod ma_value_iteration;
pub mod matrix;
pub mod minmax;
pub mod operators;
pub mod stage;

#[cfg(test)]
mod test_games;

pub use correlated::{correlated_equilibrium, CorrelatedObjective};
pub use joint::{cartesian_product, AgentDefinition, JointAction, JointModel, JointTransition};
pub use joint_policy::{EquilibriumJointPolicy, SolutionConcept};
pub use lp::{LinearProgram, LpSolution, Relation};
pub use ma_value_iteration::{MaSweepSummary, MaValueIteration, MaValueIterationConfig};
pub use minmax::{column_player_strategy, game_value, row_player_strategy};
pub use operators::{CoCoQBackup, CorrelatedQBackup, MaxQBackup, MinMaxQBackup, SgBackupOperator};
pub use stage::StageGame;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AgentDefinition, CoCoQBackup, CorrelatedObjective, CorrelatedQBackup,
        EquilibriumJointPolicy, JointAction, JointModel, JointTransition, MaValueIteration,
        MaValueIterationConfig, MaxQBackup, MinMaxQBackup, SgBackupOperator, SolutionConcept,
    };
    pub use dynaplan_core::prelude::*;
}
