//! Core planning traits and types for Dynaplan
//!
//! This crate provides the foundational abstractions shared by every
//! planner: fully-specified stochastic models, canonical state hashing,
//! primitive actions and temporally-extended options, policies, tabular
//! value storage and the backup operators that turn Q-values into state
//! values.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod config;
pub mod error;
pub mod model;
pub mod operator;
pub mod policy;
pub mod reachability;
pub mod state;
pub mod trajectory;
pub mod value;

// Re-export core traits and types
pub use action::{Action, HistoryStep, TemporalOption};
pub use config::{from_json_str, load_config, save_config};
pub use error::{PlanningError, Result};
pub use model::{Model, Outcome, TransitionProb};
pub use operator::{BackupOperator, FixedPolicyBackup, MaxBackup, SoftmaxBackup};
pub use policy::{ActionProb, EpsilonGreedy, FnPolicy, Policy, RandomPolicy};
pub use reachability::{discover_reachable, Discovery};
pub use state::{IdentityHashing, KeyHashing, State, StateHashing};
pub use trajectory::{rollout, Trajectory, Transition};
pub use value::{ConstantValue, QProvider, QValue, ValueFunction, ValueTable};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Action, ActionProb, BackupOperator, ConstantValue, HistoryStep, IdentityHashing,
        MaxBackup, Model, Outcome, PlanningError, Policy, QProvider, QValue, Result,
        StateHashing, TemporalOption, TransitionProb, ValueFunction, ValueTable,
    };
}
