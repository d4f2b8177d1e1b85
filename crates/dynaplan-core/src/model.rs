//! Transition models

use std::fmt::Debug;

use rand::RngCore;
use rand_distr::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::{PlanningError, Result};

/// Result of executing an action once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome<S> {
    /// State reached
    pub next_state: S,
    /// Reward received
    pub reward: f64,
    /// Whether the episode ended on this transition
    pub terminated: bool,
}

impl<S> Outcome<S> {
    /// Create a new outcome
    pub fn new(next_state: S, reward: f64, terminated: bool) -> Self {
        Self {
            next_state,
            reward,
            terminated,
        }
    }
}

/// A possible outcome of an action and its probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionProb<S> {
    /// The outcome
    pub outcome: Outcome<S>,
    /// Probability of the outcome
    pub probability: f64,
}

impl<S> TransitionProb<S> {
    /// Create a new transition entry
    pub fn new(outcome: Outcome<S>, probability: f64) -> Self {
        Self {
            outcome,
            probability,
        }
    }
}

/// A fully-specified stochastic model of a single-agent domain
///
/// `transitions` must return outcomes whose probabilities sum to one for
/// every applicable action of a non-terminal state.
pub trait Model<S, A> {
    /// Actions applicable in a state
    fn applicable_actions(&self, state: &S) -> Vec<A>;

    /// Full outcome distribution of taking an action in a state
    fn transitions(&self, state: &S, action: &A) -> Result<Vec<TransitionProb<S>>>;

    /// Sample one outcome of taking an action in a state
    fn sample(&self, state: &S, action: &A, rng: &mut dyn RngCore) -> Result<Outcome<S>>
    where
        S: Clone,
    {
        let transitions = self.transitions(state, action)?;
        sample_transition(&transitions, rng)
    }

    /// Whether a state is terminal
    fn is_terminal(&self, state: &S) -> bool;

    /// Whether the outcome distribution of a state-action pair is known
    ///
    /// Learned models return `false` for pairs they have not observed yet;
    /// planners then fall back to their value initializer.
    fn is_modeled(&self, _state: &S, _action: &A) -> bool {
        true
    }
}

/// Draw one outcome from an explicit distribution
pub fn sample_transition<S: Clone>(
    transitions: &[TransitionProb<S>],
    rng: &mut dyn RngCore,
) -> Result<Outcome<S>> {
    let index = weighted_choice(transitions.iter().map(|t| t.probability), rng)?;
    Ok(transitions[index].outcome.clone())
}

/// Sample an index from non-negative weights
pub fn weighted_choice<I>(weights: I, rng: &mut dyn RngCore) -> Result<usize>
where
    I: IntoIterator<Item = f64>,
{
    let dist = WeightedIndex::new(weights)
        .map_err(|e| PlanningError::InvalidDistribution(e.to_string()))?;
    Ok(dist.sample(rng))
}

/// Check that a transition list is a proper probability distribution
pub fn check_distribution<S: Debug>(transitions: &[TransitionProb<S>], tolerance: f64) -> Result<()> {
    if transitions.is_empty() {
        return Err(PlanningError::InvalidDistribution("no outcomes".to_string()));
    }
    if let Some(t) = transitions.iter().find(|t| t.probability < 0.0) {
        return Err(PlanningError::InvalidDistribution(format!(
            "negative probability {} for {:?}",
            t.probability, t.outcome.next_state
        )));
    }
    let total: f64 = transitions.iter().map(|t| t.probability).sum();
    if (total - 1.0).abs() > tolerance {
        return Err(PlanningError::InvalidDistribution(format!(
            "probabilities sum to {total}"
        )));
    }
    Ok(())
}
