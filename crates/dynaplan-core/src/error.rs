//! Error types for the planning core

use thiserror::Error;

/// Core error type for planning operations
#[derive(Error, Debug)]
pub enum PlanningError {
    /// Invalid planner or solver configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A game operator was used with the wrong number of agents
    #[error("Agent count mismatch: expected {expected}, got {actual}")]
    AgentCount {
        /// Number of agents the operation supports
        expected: usize,
        /// Number of agents supplied
        actual: usize,
    },

    /// Planning was requested before any state had been discovered
    #[error("No reachable states: run a reachability pass first")]
    NoReachableStates,

    /// Agent definitions were changed after planning began
    #[error("Planning already started: agent definitions are locked")]
    PlanningStarted,

    /// The model returned no outcomes for an applicable action
    #[error("Model returned no outcomes for action {action} in state {state}")]
    NoOutcomes {
        /// Debug rendering of the state
        state: String,
        /// Debug rendering of the action
        action: String,
    },

    /// A history-dependent option was given to a compiler that requires Markov options
    #[error("Option '{0}' is not Markov and cannot be compiled")]
    NonMarkovOption(String),

    /// A probability distribution was empty or did not sum to one
    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),

    /// The model violated its contract
    #[error("Model error: {0}")]
    Model(String),

    /// A numeric solver failed (infeasible, unbounded, iteration limit)
    #[error("Solver error: {0}")]
    Solver(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for planning operations
pub type Result<T> = std::result::Result<T, PlanningError>;
