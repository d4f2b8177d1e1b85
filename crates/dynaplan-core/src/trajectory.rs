//! Trajectories produced by executing a policy in a model

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::model::Model;
use crate::policy::Policy;
use crate::Result;

/// Single step of a trajectory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition<S, A> {
    /// State the action was taken in
    pub state: S,
    /// Action taken
    pub action: A,
    /// Reward received
    pub reward: f64,
    /// State reached
    pub next_state: S,
    /// Whether the episode ended
    pub terminated: bool,
}

/// Sequence of transitions starting from an initial state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory<S, A> {
    /// State the trajectory started in
    pub initial_state: S,
    /// Steps taken
    pub transitions: Vec<Transition<S, A>>,
    /// Undiscounted total reward
    pub total_reward: f64,
}

impl<S: Clone, A> Trajectory<S, A> {
    /// Create a new empty trajectory
    pub fn new(initial_state: S) -> Self {
        Self {
            initial_state,
            transitions: Vec::new(),
            total_reward: 0.0,
        }
    }

    /// Add a transition to the trajectory
    pub fn push(&mut self, transition: Transition<S, A>) {
        self.total_reward += transition.reward;
        self.transitions.push(transition);
    }

    /// Get the number of steps taken
    #[must_use]
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Check if no steps were taken
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Last state of the trajectory
    #[must_use]
    pub fn final_state(&self) -> &S {
        self.transitions
            .last()
            .map_or(&self.initial_state, |t| &t.next_state)
    }

    /// Whether the trajectory ended in a terminal transition
    #[must_use]
    pub fn terminated(&self) -> bool {
        self.transitions.last().is_some_and(|t| t.terminated)
    }

    /// Every visited state in order, starting with the initial state
    pub fn states(&self) -> impl Iterator<Item = &S> {
        std::iter::once(&self.initial_state).chain(self.transitions.iter().map(|t| &t.next_state))
    }

    /// Discounted return from the initial state
    #[must_use]
    pub fn discounted_return(&self, gamma: f64) -> f64 {
        self.transitions
            .iter()
            .rev()
            .fold(0.0, |acc, t| t.reward + gamma * acc)
    }
}

/// Execute a policy in a model until a terminal state or `max_steps`
pub fn rollout<S, A, M, P>(
    model: &M,
    policy: &P,
    initial_state: &S,
    max_steps: usize,
    rng: &mut dyn RngCore,
) -> Result<Trajectory<S, A>>
where
    S: Clone,
    A: Clone,
    M: Model<S, A>,
    P: Policy<S, A> + ?Sized,
{
    let mut trajectory = Trajectory::new(initial_state.clone());
    let mut state = initial_state.clone();

    while trajectory.len() < max_steps && !model.is_terminal(&state) {
        let action = policy.sample(&state, rng)?;
        let outcome = model.sample(&state, &action, rng)?;
        let next_state = outcome.next_state.clone();
        trajectory.push(Transition {
            state,
            action,
            reward: outcome.reward,
            next_state: outcome.next_state,
            terminated: outcome.terminated,
        });
        state = next_state;
        if trajectory.terminated() {
            break;
        }
    }

    Ok(trajectory)
}
