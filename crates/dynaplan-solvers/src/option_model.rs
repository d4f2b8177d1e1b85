//! Compiling options into multi-time transition models
//!
//! An option started in a state terminates somewhere after a random number
//! of primitive steps. [`OptionModel::compile`] enumerates the option's
//! execution tree breadth-first against the primitive model and summarizes
//! it as a distribution over termination states together with the expected
//! discounted reward accumulated on the way. Markov option results are
//! cached per option and per canonical start state.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::trace;

use dynaplan_core::policy::sample_action;
use dynaplan_core::{
    HistoryStep, Model, Outcome, PlanningError, Result, StateHashing, TemporalOption,
};

/// Option compilation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionModelConfig {
    /// Branches whose path probability falls below this are not followed
    pub cutoff_probability: f64,
    /// Stop the scan once this much termination mass has been found
    pub coverage_target: f64,
    /// Reject history-dependent options instead of compiling them uncached
    pub require_markov: bool,
    /// Depth limit for compilation and step limit for simulated execution
    pub max_rollout_steps: usize,
}

impl Default for OptionModelConfig {
    fn default() -> Self {
        Self {
            cutoff_probability: 0.001,
            coverage_target: 0.999,
            require_markov: true,
            max_rollout_steps: 10_000,
        }
    }
}

impl OptionModelConfig {
    /// Check that the truncation thresholds describe a usable scan
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.cutoff_probability) {
            return Err(PlanningError::Configuration(format!(
                "option cutoff probability must be in [0, 1), got {}",
                self.cutoff_probability
            )));
        }
        if !(self.coverage_target > 0.0 && self.coverage_target <= 1.0) {
            return Err(PlanningError::Configuration(format!(
                "option coverage target must be in (0, 1], got {}",
                self.coverage_target
            )));
        }
        Ok(())
    }
}

/// One possible termination state of a compiled option
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledOutcome<S> {
    /// State the option terminates in
    pub state: S,
    /// Normalized probability of terminating in this state
    pub probability: f64,
    /// Expected `gamma^k` over the step counts `k` that end here
    pub discount: f64,
    /// Whether the termination state is terminal for the model
    pub terminal: bool,
}

impl<S> CompiledOutcome<S> {
    /// Discount-folded transition weight `probability * discount`
    #[must_use]
    pub fn discounted_probability(&self) -> f64 {
        self.probability * self.discount
    }
}

/// Multi-time model of an option started in one state
#[derive(Debug, Clone)]
pub struct CompiledOption<S> {
    /// Expected discounted reward until termination
    pub reward: f64,
    /// Termination distribution; probabilities sum to one
    pub outcomes: Vec<CompiledOutcome<S>>,
    /// Raw termination mass found before normalization
    pub coverage: f64,
    /// Number of search nodes expanded
    pub expanded_nodes: usize,
}

/// Outcome of executing an option once by simulation
#[derive(Debug, Clone, PartialEq)]
pub struct OptionOutcome<S> {
    /// Termination state, discounted cumulative reward and model-terminal flag
    pub outcome: Outcome<S>,
    /// Number of primitive steps taken
    pub steps: usize,
    /// `gamma^steps`, the discount to apply to the value of the termination state
    pub discount: f64,
}

struct SearchNode<S> {
    state: S,
    probability: f64,
    reward: f64,
    depth: i32,
    terminated: bool,
    trail: Option<usize>,
}

struct TrailEntry<S, A> {
    step: HistoryStep<S, A>,
    parent: Option<usize>,
}

struct Termination<S> {
    state: S,
    mass: f64,
    discounted_mass: f64,
    terminal: bool,
}

fn history_from<S: Clone, A: Clone>(
    trail: &[TrailEntry<S, A>],
    mut index: Option<usize>,
) -> Vec<HistoryStep<S, A>> {
    let mut history = Vec::new();
    while let Some(i) = index {
        history.push(trail[i].step.clone());
        index = trail[i].parent;
    }
    history.reverse();
    history
}

/// Compiles and caches option transition models
pub struct OptionModel<S, H> {
    config: OptionModelConfig,
    cache: RefCell<HashMap<String, HashMap<H, Rc<CompiledOption<S>>>>>,
}

impl<S, H> OptionModel<S, H>
where
    S: Clone + std::fmt::Debug,
    H: Clone + Eq + Hash,
{
    /// Create a new option model
    pub fn new(config: OptionModelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &OptionModelConfig {
        &self.config
    }

    /// Replace the configuration; cached results are dropped
    pub fn set_config(&mut self, config: OptionModelConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.clear_cache();
        Ok(())
    }

    /// Drop every cached compilation
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Drop cached compilations of one option
    pub fn invalidate(&self, option_name: &str) {
        self.cache.borrow_mut().remove(option_name);
    }

    /// Number of cached (option, start state) compilations
    #[must_use]
    pub fn cached_entries(&self) -> usize {
        self.cache.borrow().values().map(HashMap::len).sum()
    }

    /// Compile the transition model of an option started in `state`
    pub fn compile<A, M, HS>(
        &self,
        model: &M,
        hashing: &HS,
        gamma: f64,
        state: &S,
        option: &dyn TemporalOption<S, A>,
    ) -> Result<Rc<CompiledOption<S>>>
    where
        A: Clone + std::fmt::Debug,
        M: Model<S, A>,
        HS: StateHashing<S, Handle = H>,
    {
        let markov = option.is_markov();
        if !markov && self.config.require_markov {
            return Err(PlanningError::NonMarkovOption(option.name().to_string()));
        }

        let handle = hashing.hash_state(state);
        if markov {
            if let Some(hit) = self
                .cache
                .borrow()
                .get(option.name())
                .and_then(|by_state| by_state.get(&handle))
            {
                return Ok(Rc::clone(hit));
            }
        }

        let compiled = Rc::new(self.scan(model, hashing, gamma, state, option)?);
        trace!(
            "Compiled option '{}' from {:?}: {} outcomes, coverage {:.6}, {} nodes",
            option.name(),
            state,
            compiled.outcomes.len(),
            compiled.coverage,
            compiled.expanded_nodes
        );

        if markov {
            self.cache
                .borrow_mut()
                .entry(option.name().to_string())
                .or_default()
                .insert(handle, Rc::clone(&compiled));
        }
        Ok(compiled)
    }

    fn scan<A, M, HS>(
        &self,
        model: &M,
        hashing: &HS,
        gamma: f64,
        state: &S,
        option: &dyn TemporalOption<S, A>,
    ) -> Result<CompiledOption<S>>
    where
        A: Clone + std::fmt::Debug,
        M: Model<S, A>,
        HS: StateHashing<S, Handle = H>,
    {
        let markov = option.is_markov();
        let max_depth = i32::try_from(self.config.max_rollout_steps).unwrap_or(i32::MAX);
        let mut terminations: IndexMap<H, Termination<S>> = IndexMap::new();
        let mut trail: Vec<TrailEntry<S, A>> = Vec::new();
        let mut frontier = VecDeque::from([SearchNode {
            state: state.clone(),
            probability: 1.0,
            reward: 0.0,
            depth: 0,
            terminated: false,
            trail: None,
        }]);
        let mut coverage = 0.0;
        let mut expected_return = 0.0;
        let mut expanded_nodes = 0;

        while let Some(node) = frontier.pop_front() {
            if coverage >= self.config.coverage_target {
                break;
            }
            expanded_nodes += 1;

            let history = if markov {
                Vec::new()
            } else {
                history_from(&trail, node.trail)
            };
            let terminal = node.terminated || model.is_terminal(&node.state);
            let p_terminate = if terminal {
                1.0
            } else if node.depth == 0 {
                0.0
            } else {
                option
                    .termination_probability(&node.state, &history)
                    .clamp(0.0, 1.0)
            };
            let stacked_discount = gamma.powi(node.depth);

            if p_terminate > 0.0 {
                let mass = node.probability * p_terminate;
                coverage += mass;
                expected_return += mass * node.reward;
                let entry = terminations
                    .entry(hashing.hash_state(&node.state))
                    .or_insert_with(|| Termination {
                        state: node.state.clone(),
                        mass: 0.0,
                        discounted_mass: 0.0,
                        terminal,
                    });
                entry.mass += mass;
                entry.discounted_mass += mass * stacked_discount;
                entry.terminal |= terminal;
            }

            let p_continue = 1.0 - p_terminate;
            if p_continue <= 0.0 || node.depth >= max_depth {
                continue;
            }

            for choice in option.policy_distribution(&node.state, &history)? {
                if choice.probability <= 0.0 {
                    continue;
                }
                let transitions = model.transitions(&node.state, &choice.action)?;
                if transitions.is_empty() {
                    return Err(PlanningError::NoOutcomes {
                        state: format!("{:?}", node.state),
                        action: format!("{:?}", choice.action),
                    });
                }
                let child_trail = if markov {
                    None
                } else {
                    trail.push(TrailEntry {
                        step: HistoryStep {
                            state: node.state.clone(),
                            action: choice.action.clone(),
                        },
                        parent: node.trail,
                    });
                    Some(trail.len() - 1)
                };
                for tp in transitions {
                    let probability = node.probability * choice.probability * tp.probability * p_continue;
                    if probability <= 0.0 || probability < self.config.cutoff_probability {
                        continue;
                    }
                    frontier.push_back(SearchNode {
                        state: tp.outcome.next_state,
                        probability,
                        reward: node.reward + stacked_discount * tp.outcome.reward,
                        depth: node.depth + 1,
                        terminated: tp.outcome.terminated,
                        trail: child_trail,
                    });
                }
            }
        }

        if coverage <= 0.0 {
            return Err(PlanningError::InvalidDistribution(format!(
                "option '{}' found no termination mass from {:?}",
                option.name(),
                state
            )));
        }

        let outcomes = terminations
            .into_values()
            .filter(|t| t.mass > 0.0)
            .map(|t| CompiledOutcome {
                state: t.state,
                probability: t.mass / coverage,
                discount: t.discounted_mass / t.mass,
                terminal: t.terminal,
            })
            .collect();

        Ok(CompiledOption {
            reward: expected_return / coverage,
            outcomes,
            coverage,
            expanded_nodes,
        })
    }

    /// Execute an option once by simulation
    ///
    /// The returned reward is discounted within the option; the caller
    /// applies [`OptionOutcome::discount`] to the value of the termination
    /// state.
    pub fn sample<A, M>(
        &self,
        model: &M,
        gamma: f64,
        state: &S,
        option: &dyn TemporalOption<S, A>,
        rng: &mut dyn RngCore,
    ) -> Result<OptionOutcome<S>>
    where
        A: Clone,
        M: Model<S, A>,
    {
        let markov = option.is_markov();
        let mut history = Vec::new();
        let mut current = state.clone();
        let mut reward = 0.0;
        let mut discount = 1.0;
        let mut steps = 0;
        let mut terminated = model.is_terminal(&current);

        while !terminated {
            if steps > 0 && rng.gen::<f64>() < option.termination_probability(&current, &history) {
                break;
            }
            if steps >= self.config.max_rollout_steps {
                return Err(PlanningError::Model(format!(
                    "option '{}' did not terminate within {} steps",
                    option.name(),
                    self.config.max_rollout_steps
                )));
            }
            let action = sample_action(&option.policy_distribution(&current, &history)?, rng)?;
            let outcome = model.sample(&current, &action, rng)?;
            reward += discount * outcome.reward;
            discount *= gamma;
            steps += 1;
            terminated = outcome.terminated || model.is_terminal(&outcome.next_state);
            if !markov {
                history.push(HistoryStep {
                    state: current,
                    action,
                });
            }
            current = outcome.next_state;
        }

        Ok(OptionOutcome {
            outcome: Outcome::new(current, reward, terminated),
            steps,
            discount,
        })
    }
}

impl<S, H> Default for OptionModel<S, H>
where
    S: Clone + std::fmt::Debug,
    H: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self {
            config: OptionModelConfig::default(),
            cache: RefCell::new(HashMap::new()),
        }
    }
}
