//! Multi-agent value iteration over the states reachable from a seed
//!
//! Every agent keeps its own value table. A sweep visits the discovered
//! states in discovery order and, for each, builds the state's stage game
//! and hands it to the configured [`SgBackupOperator`] once per agent.

use std::fmt::Debug;
use std::marker::PhantomData;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use dynaplan_core::config::{check_discount, check_non_negative};
use dynaplan_core::{
    discover_reachable, ConstantValue, Discovery, PlanningError, Result, StateHashing,
    ValueFunction, ValueTable,
};

use crate::joint::{AgentDefinition, JointAction, JointModel};
use crate::operators::SgBackupOperator;
use crate::stage::StageGame;

/// Multi-agent value iteration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaValueIterationConfig {
    /// Discount factor
    pub gamma: f64,
    /// Stop once a full sweep changes no agent's value by more than this
    pub max_delta: f64,
    /// Hard cap on the number of sweeps
    pub max_iterations: usize,
}

impl Default for MaValueIterationConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            max_delta: 1e-4,
            max_iterations: 1000,
        }
    }
}

/// Outcome of running sweeps
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaSweepSummary {
    /// Sweeps performed
    pub iterations: usize,
    /// Largest change in the final sweep
    pub max_delta: f64,
    /// Whether the change threshold was reached
    pub converged: bool,
}

/// Value iteration for stochastic games
pub struct MaValueIteration<S, A, M, H>
where
    H: StateHashing<S>,
{
    model: M,
    hashing: H,
    config: MaValueIterationConfig,
    agents: Vec<AgentDefinition>,
    operator: Box<dyn SgBackupOperator>,
    initializer: Box<dyn ValueFunction<S>>,
    values: Vec<ValueTable<H::Handle>>,
    states: IndexMap<H::Handle, S>,
    planning_started: bool,
    _action: PhantomData<fn() -> A>,
}

impl<S, A, M, H> MaValueIteration<S, A, M, H>
where
    S: Clone + Debug + 'static,
    A: Clone + Debug,
    M: JointModel<S, A>,
    H: StateHashing<S>,
{
    /// Create a new planner
    pub fn new(
        model: M,
        hashing: H,
        agents: Vec<AgentDefinition>,
        operator: impl SgBackupOperator + 'static,
        config: MaValueIterationConfig,
    ) -> Result<Self> {
        check_discount(config.gamma)?;
        check_non_negative("max_delta", config.max_delta)?;
        if agents.is_empty() {
            return Err(PlanningError::Configuration("at least one agent is required".to_string()));
        }
        let values = agents.iter().map(|_| ValueTable::new()).collect();
        Ok(Self {
            model,
            hashing,
            config,
            agents,
            operator: Box::new(operator),
            initializer: Box::new(ConstantValue(0.0)),
            values,
            states: IndexMap::new(),
            planning_started: false,
            _action: PhantomData,
        })
    }

    /// Use a different value initializer, shared by all agents
    #[must_use]
    pub fn with_initializer(mut self, initializer: impl ValueFunction<S> + 'static) -> Self {
        self.initializer = Box::new(initializer);
        self
    }

    /// Replace the backup operator
    pub fn set_operator(&mut self, operator: impl SgBackupOperator + 'static) {
        self.operator = Box::new(operator);
    }

    /// Replace the agent definitions; fails once planning has started
    pub fn set_agents(&mut self, agents: Vec<AgentDefinition>) -> Result<()> {
        if self.planning_started {
            return Err(PlanningError::PlanningStarted);
        }
        if agents.is_empty() {
            return Err(PlanningError::Configuration("at least one agent is required".to_string()));
        }
        self.values = agents.iter().map(|_| ValueTable::new()).collect();
        self.agents = agents;
        Ok(())
    }

    /// Agent definitions, in reward order
    pub fn agents(&self) -> &[AgentDefinition] {
        &self.agents
    }

    /// Index of the agent with this name
    pub fn agent_index(&self, name: &str) -> Option<usize> {
        self.agents.iter().position(|a| a.name == name)
    }

    /// The joint model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Discovered states in discovery order
    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.states.values()
    }

    /// Number of discovered states
    #[must_use]
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    fn check_agent(&self, agent: usize) -> Result<()> {
        if agent < self.agents.len() {
            Ok(())
        } else {
            Err(PlanningError::AgentCount {
                expected: agent + 1,
                actual: self.agents.len(),
            })
        }
    }

    fn stored_value(&self, agent: usize, state: &S) -> f64 {
        if self.model.is_terminal(state) {
            return 0.0;
        }
        self.values[agent].get_or_else(&self.hashing.hash_state(state), || self.initializer.value(state))
    }

    /// Current value estimate of a state for one agent
    pub fn value(&self, agent: usize, state: &S) -> Result<f64> {
        self.check_agent(agent)?;
        if self.states.is_empty() {
            return Err(PlanningError::NoReachableStates);
        }
        Ok(self.stored_value(agent, state))
    }

    /// Joint actions available in a state
    pub fn joint_actions(&self, state: &S) -> Vec<JointAction<A>> {
        self.model.joint_actions(state, &self.agents)
    }

    fn joint_q_values(&self, state: &S, joint: &JointAction<A>) -> Result<Vec<f64>> {
        let transitions = self.model.transitions(state, joint)?;
        if transitions.is_empty() {
            return Err(PlanningError::NoOutcomes {
                state: format!("{state:?}"),
                action: format!("{joint:?}"),
            });
        }
        let mut q = vec![0.0; self.agents.len()];
        for tp in &transitions {
            if tp.rewards.len() != self.agents.len() {
                return Err(PlanningError::Model(format!(
                    "joint transition carries {} rewards for {} agents",
                    tp.rewards.len(),
                    self.agents.len()
                )));
            }
            for (agent, q_agent) in q.iter_mut().enumerate() {
                let future = if tp.terminated {
                    0.0
                } else {
                    self.stored_value(agent, &tp.next_state)
                };
                *q_agent += tp.probability * (tp.rewards[agent] + self.config.gamma * future);
            }
        }
        Ok(q)
    }

    /// One agent's Q-value of a joint action
    pub fn q_value(&self, agent: usize, state: &S, joint: &JointAction<A>) -> Result<f64> {
        self.check_agent(agent)?;
        if self.states.is_empty() {
            return Err(PlanningError::NoReachableStates);
        }
        Ok(self.joint_q_values(state, joint)?[agent])
    }

    /// Joint actions of a state and the stage game of all agents' Q-values over them
    pub fn stage_game(&self, state: &S) -> Result<(Vec<JointAction<A>>, StageGame)> {
        let action_counts: Vec<usize> = self
            .agents
            .iter()
            .map(|agent| self.model.applicable_actions(state, agent).len())
            .collect();
        let joints = self.joint_actions(state);
        let mut q = vec![Vec::with_capacity(joints.len()); self.agents.len()];
        for joint in &joints {
            for (agent, value) in self.joint_q_values(state, joint)?.into_iter().enumerate() {
                q[agent].push(value);
            }
        }
        let stage = StageGame::new(action_counts, q)?;
        if stage.num_joint_actions() != joints.len() {
            return Err(PlanningError::Model(format!(
                "model produced {} joint actions for a {}-cell stage game",
                joints.len(),
                stage.num_joint_actions()
            )));
        }
        Ok((joints, stage))
    }

    /// Back up every agent's value in one state; returns the largest change
    pub fn backup_all_value_functions(&mut self, state: &S) -> Result<f64> {
        let handle = self.hashing.hash_state(state);

        let new_values = if self.model.is_terminal(state) {
            vec![0.0; self.agents.len()]
        } else {
            let (_, stage) = self.stage_game(state)?;
            (0..self.agents.len())
                .map(|agent| self.operator.backup(&stage, agent))
                .collect::<Result<Vec<f64>>>()?
        };

        let mut delta: f64 = 0.0;
        for (agent, new) in new_values.into_iter().enumerate() {
            let old = self.stored_value(agent, state);
            self.values[agent].insert(handle.clone(), new);
            delta = delta.max((new - old).abs());
        }
        self.planning_started = true;
        Ok(delta)
    }

    /// Discover every state reachable from `seed` through joint actions
    pub fn perform_reachability_from(&mut self, seed: &S) -> Result<Discovery> {
        let model = &self.model;
        let hashing = &self.hashing;
        let agents = &self.agents;
        let discovery = discover_reachable(
            &mut self.states,
            seed,
            |s| hashing.hash_state(s),
            |s| {
                if model.is_terminal(s) {
                    return Ok(Vec::new());
                }
                let mut next = Vec::new();
                for joint in model.joint_actions(s, agents) {
                    next.extend(
                        model
                            .transitions(s, &joint)?
                            .into_iter()
                            .map(|tp| tp.next_state),
                    );
                }
                Ok(next)
            },
        )?;
        debug!("Reachability from {:?}: {:?}, {} states known", seed, discovery, self.states.len());
        Ok(discovery)
    }

    /// Sweep every discovered state until convergence or the iteration cap
    pub fn run_vi(&mut self) -> Result<MaSweepSummary> {
        if self.states.is_empty() {
            return Err(PlanningError::NoReachableStates);
        }

        let mut summary = MaSweepSummary {
            iterations: 0,
            max_delta: f64::INFINITY,
            converged: false,
        };
        while summary.iterations < self.config.max_iterations {
            let mut delta: f64 = 0.0;
            for i in 0..self.states.len() {
                let Some((_, state)) = self.states.get_index(i) else {
                    break;
                };
                let state = state.clone();
                delta = delta.max(self.backup_all_value_functions(&state)?);
            }
            summary.iterations += 1;
            summary.max_delta = delta;
            debug!("Sweep {}: max delta {:.6}", summary.iterations, delta);
            if delta < self.config.max_delta {
                summary.converged = true;
                break;
            }
        }

        if !summary.converged {
            warn!(
                "Multi-agent value iteration stopped at the iteration cap ({}) with max delta {:.6}",
                self.config.max_iterations, summary.max_delta
            );
        }
        Ok(summary)
    }

    /// Discover states from `initial` and, if anything new was found, sweep to convergence
    ///
    /// Returns `None` when `initial` was already known and no planning ran.
    pub fn plan_from_state(&mut self, initial: &S) -> Result<Option<MaSweepSummary>> {
        let _span = info_span!("ma_value_iteration", agents = self.agents.len()).entered();
        if !self.perform_reachability_from(initial)?.is_new() {
            return Ok(None);
        }
        let summary = self.run_vi()?;
        info!(
            "Multi-agent value iteration over {} states finished after {} sweeps",
            self.states.len(),
            summary.iterations
        );
        Ok(Some(summary))
    }

    /// Forget discovered states and values; agent definitions unlock again
    pub fn reset(&mut self) {
        self.states.clear();
        for table in &mut self.values {
            table.clear();
        }
        self.planning_started = false;
    }
}
