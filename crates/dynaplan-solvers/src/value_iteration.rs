//! Value iteration over the states reachable from a seed state

use std::fmt::Debug;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use dynaplan_core::config::check_non_negative;
use dynaplan_core::{discover_reachable, Action, Discovery, Model, PlanningError, Result, StateHashing};

use crate::dp::DynamicProgramming;
use crate::policies::GreedyQPolicy;

/// Value iteration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueIterationConfig {
    /// Stop once a full sweep changes no value by more than this
    pub max_delta: f64,
    /// Hard cap on the number of sweeps
    pub max_iterations: usize,
}

impl Default for ValueIterationConfig {
    fn default() -> Self {
        Self {
            max_delta: 1e-4,
            max_iterations: 1000,
        }
    }
}

/// Outcome of running sweeps
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepSummary {
    /// Sweeps performed
    pub iterations: usize,
    /// Largest change in the final sweep
    pub max_delta: f64,
    /// Whether the change threshold was reached
    pub converged: bool,
}

/// Value iteration planner
pub struct ValueIteration<S, A, M, H>
where
    H: StateHashing<S>,
{
    dp: DynamicProgramming<S, A, M, H>,
    config: ValueIterationConfig,
    states: IndexMap<H::Handle, S>,
}

impl<S, A, M, H> ValueIteration<S, A, M, H>
where
    S: Clone + Debug + 'static,
    A: Clone + Debug + PartialEq + 'static,
    M: Model<S, A>,
    H: StateHashing<S>,
{
    /// Create a new value iteration planner around a backup engine
    pub fn new(dp: DynamicProgramming<S, A, M, H>, config: ValueIterationConfig) -> Result<Self> {
        check_non_negative("max_delta", config.max_delta)?;
        Ok(Self {
            dp,
            config,
            states: IndexMap::new(),
        })
    }

    /// The backup engine
    pub fn planner(&self) -> &DynamicProgramming<S, A, M, H> {
        &self.dp
    }

    /// Mutable access to the backup engine
    pub fn planner_mut(&mut self) -> &mut DynamicProgramming<S, A, M, H> {
        &mut self.dp
    }

    /// Recover the backup engine
    pub fn into_planner(self) -> DynamicProgramming<S, A, M, H> {
        self.dp
    }

    /// Greedy policy over the current values
    pub fn greedy_policy(&self) -> GreedyQPolicy<&DynamicProgramming<S, A, M, H>> {
        GreedyQPolicy::new(&self.dp)
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

    /// Discover every state reachable from `seed` through primitive actions and options
    pub fn perform_reachability_from(&mut self, seed: &S) -> Result<Discovery> {
        let dp = &self.dp;
        let discovery = discover_reachable(
            &mut self.states,
            seed,
            |s| dp.handle(s),
            |s| {
                if dp.model().is_terminal(s) {
                    return Ok(Vec::new());
                }
                let mut next = Vec::new();
                for action in dp.applicable_actions(s) {
                    match &action {
                        Action::Primitive(a) => next.extend(
                            dp.model()
                                .transitions(s, a)?
                                .into_iter()
                                .map(|tp| tp.outcome.next_state),
                        ),
                        Action::Extended(option) => next.extend(
                            dp.compile_option(s, option.as_ref())?
                                .outcomes
                                .iter()
                                .map(|o| o.state.clone()),
                        ),
                    }
                }
                Ok(next)
            },
        )?;
        debug!("Reachability from {:?}: {:?}, {} states known", seed, discovery, self.states.len());
        Ok(discovery)
    }

    /// Sweep every discovered state until convergence or the iteration cap
    pub fn run_vi(&mut self) -> Result<SweepSummary> {
        if self.states.is_empty() {
            return Err(PlanningError::NoReachableStates);
        }

        let mut summary = SweepSummary {
            iterations: 0,
            max_delta: f64::INFINITY,
            converged: false,
        };
        while summary.iterations < self.config.max_iterations {
            let mut delta: f64 = 0.0;
            for state in self.states.values() {
                let old = self.dp.value(state);
                let new = self.dp.backup(state)?;
                delta = delta.max((new - old).abs());
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
                "Value iteration stopped at the iteration cap ({}) with max delta {:.6}",
                self.config.max_iterations, summary.max_delta
            );
        }
        Ok(summary)
    }

    /// Discover states from `initial` and, if anything new was found, sweep to convergence
    ///
    /// Returns `None` when `initial` was already known and no planning ran.
    pub fn plan_from_state(&mut self, initial: &S) -> Result<Option<SweepSummary>> {
        let _span = info_span!("value_iteration").entered();
        if !self.perform_reachability_from(initial)?.is_new() {
            return Ok(None);
        }
        let summary = self.run_vi()?;
        info!(
            "Value iteration over {} states finished after {} sweeps",
            self.states.len(),
            summary.iterations
        );
        Ok(Some(summary))
    }

    /// Forget discovered states, stored values and cached option models
    pub fn reset(&mut self) {
        self.states.clear();
        self.dp.reset();
    }
}
