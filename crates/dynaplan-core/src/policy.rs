//! Policy abstractions for action selection

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::model::weighted_choice;
use crate::{PlanningError, Result};

/// An action paired with its selection probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProb<A> {
    /// The action
    pub action: A,
    /// Probability of selecting it
    pub probability: f64,
}

impl<A> ActionProb<A> {
    /// Create a new action probability entry
    pub fn new(action: A, probability: f64) -> Self {
        Self {
            action,
            probability,
        }
    }
}

/// Core policy trait: a distribution over actions for every state
pub trait Policy<S, A> {
    /// Action distribution in a state
    fn distribution(&self, state: &S) -> Result<Vec<ActionProb<A>>>;

    /// Sample an action in a state
    fn sample(&self, state: &S, rng: &mut dyn RngCore) -> Result<A>
    where
        A: Clone,
    {
        sample_action(&self.distribution(state)?, rng)
    }

    /// Probability of selecting a specific action
    fn action_probability(&self, state: &S, action: &A) -> Result<f64>
    where
        A: PartialEq,
    {
        Ok(self
            .distribution(state)?
            .iter()
            .filter(|ap| &ap.action == action)
            .map(|ap| ap.probability)
            .sum())
    }

    /// Whether the policy is defined in a state
    fn is_defined_for(&self, _state: &S) -> bool {
        true
    }
}

impl<S, A, P: Policy<S, A> + ?Sized> Policy<S, A> for Box<P> {
    fn distribution(&self, state: &S) -> Result<Vec<ActionProb<A>>> {
        (**self).distribution(state)
    }

    fn is_defined_for(&self, state: &S) -> bool {
        (**self).is_defined_for(state)
    }
}

/// Sample an action from an explicit distribution
pub fn sample_action<A: Clone>(distribution: &[ActionProb<A>], rng: &mut dyn RngCore) -> Result<A> {
    if distribution.is_empty() {
        return Err(PlanningError::InvalidDistribution(
            "empty action distribution".to_string(),
        ));
    }
    let index = weighted_choice(distribution.iter().map(|ap| ap.probability), rng)?;
    Ok(distribution[index].action.clone())
}

/// Uniform distribution over a list of actions
#[must_use]
pub fn uniform<A>(actions: Vec<A>) -> Vec<ActionProb<A>> {
    #[allow(clippy::cast_precision_loss)]
    let p = 1.0 / actions.len().max(1) as f64;
    actions.into_iter().map(|a| ActionProb::new(a, p)).collect()
}

/// Policy defined by a closure returning a distribution
pub struct FnPolicy<F> {
    f: F,
}

impl<F> FnPolicy<F> {
    /// Create a new closure-backed policy
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<S, A, F> Policy<S, A> for FnPolicy<F>
where
    F: Fn(&S) -> Vec<ActionProb<A>>,
{
    fn distribution(&self, state: &S) -> Result<Vec<ActionProb<A>>> {
        Ok((self.f)(state))
    }
}

/// Random policy that selects uniformly among the available actions
pub struct RandomPolicy<F> {
    actions: F,
}

impl<F> RandomPolicy<F> {
    /// Create a new random policy from an action enumerator
    pub fn new(actions: F) -> Self {
        Self { actions }
    }
}

impl<S, A, F> Policy<S, A> for RandomPolicy<F>
where
    F: Fn(&S) -> Vec<A>,
{
    fn distribution(&self, state: &S) -> Result<Vec<ActionProb<A>>> {
        let actions = (self.actions)(state);
        if actions.is_empty() {
            return Err(PlanningError::InvalidDistribution(
                "no actions available".to_string(),
            ));
        }
        Ok(uniform(actions))
    }
}

/// Epsilon-greedy policy wrapper
///
/// With probability `epsilon` an action is chosen uniformly from the
/// enumerator; otherwise the base policy decides.
pub struct EpsilonGreedy<P, F> {
    /// Base policy
    pub policy: P,
    /// Exploration rate
    epsilon: f64,
    /// Action enumerator for exploration
    actions: F,
}

impl<P, F> EpsilonGreedy<P, F> {
    /// Create a new epsilon-greedy policy
    pub fn new(policy: P, epsilon: f64, actions: F) -> Self {
        Self {
            policy,
            epsilon: epsilon.clamp(0.0, 1.0),
            actions,
        }
    }

    /// Get the exploration rate
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Set the exploration rate
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }
}

impl<S, A, P, F> Policy<S, A> for EpsilonGreedy<P, F>
where
    P: Policy<S, A>,
    F: Fn(&S) -> Vec<A>,
    A: PartialEq,
{
    fn distribution(&self, state: &S) -> Result<Vec<ActionProb<A>>> {
        let base = self.policy.distribution(state)?;
        let mut mixed = uniform((self.actions)(state));
        for entry in &mut mixed {
            entry.probability *= self.epsilon;
        }
        for ap in base {
            let weight = (1.0 - self.epsilon) * ap.probability;
            match mixed.iter_mut().find(|m| m.action == ap.action) {
                Some(m) => m.probability += weight,
                None => mixed.push(ActionProb::new(ap.action, weight)),
            }
        }
        Ok(mixed)
    }

    fn sample(&self, state: &S, rng: &mut dyn RngCore) -> Result<A>
    where
        A: Clone,
    {
        if rng.gen::<f64>() < self.epsilon {
            sample_action(&uniform((self.actions)(state)), rng)
        } else {
            self.policy.sample(state, rng)
        }
    }

    fn is_defined_for(&self, state: &S) -> bool {
        self.policy.is_defined_for(state)
    }
}
