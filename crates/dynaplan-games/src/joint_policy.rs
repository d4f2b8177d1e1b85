//! Joint policies derived from a multi-agent planner's Q-values
//!
//! The policy rebuilds the stage game of the queried state from the
//! planner's current values, solves it under the chosen solution concept
//! and mixes the result with a uniform distribution over joint actions.

use std::fmt::Debug;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use dynaplan_core::{ActionProb, PlanningError, Policy, Result, StateHashing};

use crate::correlated::{correlated_equilibrium, CorrelatedObjective};
use crate::joint::{JointAction, JointModel};
use crate::ma_value_iteration::MaValueIteration;
use crate::matrix::joint_strategy;
use crate::operators::{advantage_strategies, own_and_other};
use crate::stage::StageGame;

const TIE_TOLERANCE: f64 = 1e-10;

/// How a stage game is turned into a joint action distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SolutionConcept {
    /// Uniform over the joint actions with the largest summed Q-value
    MaxWelfare,
    /// Product of the minimax strategies of the advantage game
    MinMax,
    /// A correlated equilibrium selected by the objective
    Correlated(CorrelatedObjective),
}

/// Epsilon-mixed equilibrium policy over joint actions
pub struct EquilibriumJointPolicy<'a, S, A, M, H>
where
    H: StateHashing<S>,
{
    planner: &'a MaValueIteration<S, A, M, H>,
    concept: SolutionConcept,
    epsilon: f64,
    perspective: usize,
}

impl<'a, S, A, M, H> EquilibriumJointPolicy<'a, S, A, M, H>
where
    S: Clone + Debug + 'static,
    A: Clone + Debug,
    M: JointModel<S, A>,
    H: StateHashing<S>,
{
    /// Create a policy with no exploration, solved from agent 0's point of view
    pub fn new(planner: &'a MaValueIteration<S, A, M, H>, concept: SolutionConcept) -> Self {
        Self {
            planner,
            concept,
            epsilon: 0.0,
            perspective: 0,
        }
    }

    /// Set the probability mass spread uniformly over all joint actions
    pub fn with_epsilon(mut self, epsilon: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(PlanningError::Configuration(format!(
                "epsilon must lie in [0, 1], got {epsilon}"
            )));
        }
        self.epsilon = epsilon;
        Ok(self)
    }

    /// Solve two-agent games with this agent as the row player
    ///
    /// Only matters for the asymmetric correlated objectives.
    pub fn with_perspective(mut self, agent: usize) -> Result<Self> {
        if agent >= self.planner.agents().len() {
            return Err(PlanningError::AgentCount {
                expected: agent + 1,
                actual: self.planner.agents().len(),
            });
        }
        self.perspective = agent;
        Ok(self)
    }

    /// Solution concept in use
    pub fn concept(&self) -> SolutionConcept {
        self.concept
    }

    /// Exploration rate
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn max_welfare(stage: &StageGame) -> Result<Vec<f64>> {
        let mut welfare = vec![0.0; stage.num_joint_actions()];
        for agent in 0..stage.num_agents() {
            for (w, q) in welfare.iter_mut().zip(stage.q(agent)?) {
                *w += q;
            }
        }
        let best = welfare.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let ties: Vec<bool> = welfare.iter().map(|w| best - w <= TIE_TOLERANCE).collect();
        let count = ties.iter().filter(|t| **t).count() as f64;
        Ok(ties.into_iter().map(|t| if t { 1.0 / count } else { 0.0 }).collect())
    }

    /// Joint distribution with the perspective agent's actions as rows
    fn two_agent_joint(&self, stage: &StageGame) -> Result<Array2<f64>> {
        let (own, other) = own_and_other(stage, self.perspective)?;
        match self.concept {
            SolutionConcept::MinMax => {
                let (_, mine, theirs) = advantage_strategies(&own, &other)?;
                Ok(joint_strategy(&mine, &theirs))
            }
            SolutionConcept::Correlated(objective) => correlated_equilibrium(&own, &other, objective),
            SolutionConcept::MaxWelfare => Err(PlanningError::Solver(
                "max-welfare is solved over joint indices".to_string(),
            )),
        }
    }

    fn base_distribution(&self, stage: &StageGame) -> Result<Vec<f64>> {
        if self.concept == SolutionConcept::MaxWelfare {
            return Self::max_welfare(stage);
        }
        let joint = self.two_agent_joint(stage)?;
        let me = self.perspective;
        let mut probabilities = vec![0.0; stage.num_joint_actions()];
        for ((i, j), p) in joint.indexed_iter() {
            let mut indices = [0; 2];
            indices[me] = i;
            indices[1 - me] = j;
            probabilities[stage.joint_index(&indices)] = *p;
        }
        Ok(probabilities)
    }
}

impl<S, A, M, H> Policy<S, JointAction<A>> for EquilibriumJointPolicy<'_, S, A, M, H>
where
    S: Clone + Debug + 'static,
    A: Clone + Debug,
    M: JointModel<S, A>,
    H: StateHashing<S>,
{
    fn distribution(&self, state: &S) -> Result<Vec<ActionProb<JointAction<A>>>> {
        let (joints, stage) = self.planner.stage_game(state)?;
        if joints.is_empty() {
            return Ok(Vec::new());
        }
        let base = self.base_distribution(&stage)?;
        let uniform = 1.0 / joints.len() as f64;
        Ok(joints
            .into_iter()
            .zip(base)
            .map(|(joint, p)| ActionProb::new(joint, (1.0 - self.epsilon) * p + self.epsilon * uniform))
            .collect())
    }

    fn is_defined_for(&self, state: &S) -> bool {
        !self.planner.model().is_terminal(state)
    }
}
