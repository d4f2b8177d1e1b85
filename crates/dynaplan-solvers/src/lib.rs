//! Single-agent planners for Dynaplan
//!
//! This crate provides the dynamic programming machinery built on the
//! core contracts:
//! - A Bellman backup engine with pluggable backup operators
//! - An option compiler that turns temporally-extended actions into
//!   multi-time transition models
//! - Real-time dynamic programming (online and batch rollouts)
//! - Bounded RTDP with lower and upper value bounds
//! - Value iteration over reachable states
//! - Greedy and Boltzmann policies derived from Q-values

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bounded_rtdp;
pub mod dp;
pub mod option_model;
pub mod options;
pub mod policies;
pub mod rtdp;
pub mod value_iteration;

#[cfg(test)]
mod test_models;

// Re-export planners
pub use bounded_rtdp::{Bound, BoundedRtdp, BoundedRtdpConfig, StateSelectionMode};
pub use dp::{DynamicProgramming, DynamicProgrammingConfig};
pub use rtdp::{PlanningSummary, RolloutPolicy, RolloutResult, Rtdp, RtdpConfig};
pub use value_iteration::{SweepSummary, ValueIteration, ValueIterationConfig};

// Re-export option components
pub use option_model::{CompiledOption, CompiledOutcome, OptionModel, OptionModelConfig, OptionOutcome};
pub use options::{DeterministicTerminationOption, HistoryOption, StochasticTerminationOption};

// Re-export derived policies
pub use policies::{BoltzmannQPolicy, GreedyQPolicy};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BoundedRtdp, BoundedRtdpConfig, DeterministicTerminationOption, DynamicProgramming, DynamicProgrammingConfig,
        GreedyQPolicy, OptionModelConfig, Rtdp, RtdpConfig, ValueIteration, ValueIterationConfig,
    };
    pub use dynaplan_core::prelude::*;
}
