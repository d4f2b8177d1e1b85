//! Bounded real-time dynamic programming
//!
//! Keeps a lower and an upper bound on the optimal value function and
//! rolls out greedily with respect to the upper bound, steering toward
//! successors whose bounds are still far apart. Planning stops once the
//! gap between the bounds at the initial state falls below `max_diff`.
//!
//! Both bounds live in the same [`DynamicProgramming`] engine; the
//! inactive table and its initializer are parked here and swapped in when
//! the other bound is needed.

use std::fmt::Debug;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use dynaplan_core::config::check_non_negative;
use dynaplan_core::model::weighted_choice;
use dynaplan_core::policy::{sample_action, uniform};
use dynaplan_core::{
    Action, Model, PlanningError, QValue, Result, StateHashing, ValueFunction, ValueTable,
};

use crate::dp::DynamicProgramming;
use crate::policies::GreedyQPolicy;
use crate::rtdp::PlanningSummary;

/// How the next state of a rollout is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateSelectionMode {
    /// Sample the successor from the model
    ModelBased,
    /// Sample successors in proportion to probability times bound gap
    WeightedMargin,
    /// Take the successor with the largest gap, ties broken uniformly
    MaxMargin,
}

/// Which bound the engine currently exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bound {
    /// Pessimistic value function
    Lower,
    /// Optimistic value function
    Upper,
}

/// Bounded RTDP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundedRtdpConfig {
    /// Hard cap on the number of rollouts
    pub max_rollouts: usize,
    /// Planning stops once the initial state's bound gap is at most this
    pub max_diff: f64,
    /// Maximum number of steps per rollout
    pub max_depth: usize,
    /// Successor selection rule
    pub selection: StateSelectionMode,
    /// Back up the visited states again in reverse order after each rollout
    pub reverse_rollouts: bool,
    /// Bound the engine exposes once planning returns
    pub bound_after_planning: Bound,
    /// Seed for the rollout random number generator
    pub seed: Option<u64>,
}

impl Default for BoundedRtdpConfig {
    fn default() -> Self {
        Self {
            max_rollouts: 1000,
            max_diff: 0.01,
            max_depth: 100,
            selection: StateSelectionMode::ModelBased,
            reverse_rollouts: true,
            bound_after_planning: Bound::Lower,
            seed: None,
        }
    }
}

struct Selection<S> {
    state: S,
    expected_gap: f64,
    terminated: bool,
}

/// Bounded real-time dynamic programming planner
pub struct BoundedRtdp<S, A, M, H>
where
    H: StateHashing<S>,
{
    dp: DynamicProgramming<S, A, M, H>,
    config: BoundedRtdpConfig,
    active: Bound,
    parked_values: ValueTable<H::Handle>,
    parked_initializer: Box<dyn ValueFunction<S>>,
    rng: StdRng,
}

impl<S, A, M, H> BoundedRtdp<S, A, M, H>
where
    S: Clone + Debug + 'static,
    A: Clone + Debug + PartialEq + 'static,
    M: Model<S, A>,
    H: StateHashing<S>,
{
    /// Create a planner from an engine and the two bound initializers
    ///
    /// The engine's stored values become the lower bound table.
    pub fn new(
        mut dp: DynamicProgramming<S, A, M, H>,
        lower: impl ValueFunction<S> + 'static,
        upper: impl ValueFunction<S> + 'static,
        config: BoundedRtdpConfig,
    ) -> Result<Self> {
        check_non_negative("max_diff", config.max_diff)?;
        dp.set_initializer(lower);
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Ok(Self {
            dp,
            config,
            active: Bound::Lower,
            parked_values: ValueTable::new(),
            parked_initializer: Box::new(upper),
            rng,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &BoundedRtdpConfig {
        &self.config
    }

    /// The backup engine, exposing the active bound
    pub fn planner(&self) -> &DynamicProgramming<S, A, M, H> {
        &self.dp
    }

    /// Recover the backup engine with the active bound installed
    pub fn into_planner(self) -> DynamicProgramming<S, A, M, H> {
        self.dp
    }

    /// Bound currently installed in the engine
    #[must_use]
    pub fn active_bound(&self) -> Bound {
        self.active
    }

    /// Expose the lower bound through the engine
    pub fn set_value_function_to_lower_bound(&mut self) {
        self.activate(Bound::Lower);
    }

    /// Expose the upper bound through the engine
    pub fn set_value_function_to_upper_bound(&mut self) {
        self.activate(Bound::Upper);
    }

    /// Greedy policy over the active bound
    pub fn greedy_policy(&self) -> GreedyQPolicy<&DynamicProgramming<S, A, M, H>> {
        GreedyQPolicy::new(&self.dp)
    }

    /// Current lower bound of a state
    pub fn lower_value(&self, state: &S) -> f64 {
        self.bound_value(Bound::Lower, state)
    }

    /// Current upper bound of a state
    pub fn upper_value(&self, state: &S) -> f64 {
        self.bound_value(Bound::Upper, state)
    }

    /// Distance between the bounds of a state
    pub fn gap(&self, state: &S) -> f64 {
        self.upper_value(state) - self.lower_value(state)
    }

    /// Roll out from `initial` until its bound gap closes or the rollout cap
    pub fn plan_from_state(&mut self, initial: &S) -> Result<PlanningSummary> {
        let _span = info_span!("bounded_rtdp", selection = ?self.config.selection).entered();
        let mut summary = PlanningSummary::default();

        while summary.rollouts < self.config.max_rollouts {
            let (steps, gap) = self.rollout(initial)?;
            summary.rollouts += 1;
            summary.total_steps += steps;
            debug!("Rollout {}: {} steps, gap {:.6}", summary.rollouts, steps, gap);
            if gap <= self.config.max_diff {
                summary.converged = true;
                break;
            }
        }

        summary.bellman_updates = self.dp.number_of_updates();
        info!(
            "Bounded RTDP finished after {} rollouts ({} backups, gap {:.6}, converged: {})",
            summary.rollouts,
            summary.bellman_updates,
            self.gap(initial),
            summary.converged
        );
        Ok(summary)
    }

    /// Perform one rollout; returns the steps taken and the final gap of `initial`
    pub fn rollout(&mut self, initial: &S) -> Result<(usize, f64)> {
        let mut trajectory = Vec::new();
        let mut state = initial.clone();
        let mut steps = 0;

        while !self.dp.model().is_terminal(&state) && steps < self.config.max_depth {
            if self.config.reverse_rollouts {
                trajectory.push(state.clone());
            }
            let (_, _, action) = self.backup_bounds(&state)?;
            steps += 1;

            let next = self.select_next(&state, &action)?;
            state = next.state;
            if next.terminated || next.expected_gap < self.config.max_diff {
                break;
            }
        }

        let mut gap = self.gap(initial);
        for s in trajectory.iter().rev() {
            let (lower, upper, _) = self.backup_bounds(s)?;
            gap = upper - lower;
        }

        self.activate(self.config.bound_after_planning);
        Ok((steps, gap))
    }

    fn activate(&mut self, bound: Bound) {
        if self.active != bound {
            self.dp
                .swap_value_function(&mut self.parked_values, &mut self.parked_initializer);
            self.active = bound;
        }
    }

    fn bound_value(&self, bound: Bound, state: &S) -> f64 {
        if bound == self.active {
            return self.dp.value(state);
        }
        if self.dp.model().is_terminal(state) {
            return 0.0;
        }
        self.parked_values
            .get_or_else(&self.dp.handle(state), || self.parked_initializer.value(state))
    }

    /// Max backup of both bounds; returns them with the upper-greedy action
    fn backup_bounds(&mut self, state: &S) -> Result<(f64, f64, Action<S, A>)> {
        self.activate(Bound::Lower);
        let lower = Self::max_q(state, &self.dp.q_values(state)?)?;
        self.dp.set_value(state, lower);

        self.activate(Bound::Upper);
        let q_values = self.dp.q_values(state)?;
        let upper = Self::max_q(state, &q_values)?;
        self.dp.set_value(state, upper);

        let best = q_values
            .into_iter()
            .filter(|q| q.q >= upper)
            .map(|q| q.action)
            .collect();
        let action = sample_action(&uniform(best), &mut self.rng)?;
        Ok((lower, upper, action))
    }

    fn max_q(state: &S, q_values: &[QValue<S, Action<S, A>>]) -> Result<f64> {
        if q_values.is_empty() {
            return Err(PlanningError::Model(format!(
                "no applicable actions in non-terminal state {state:?}"
            )));
        }
        Ok(q_values.iter().map(|q| q.q).fold(f64::NEG_INFINITY, f64::max))
    }

    /// Successor states of an action with their probabilities and terminal flags
    fn successors(&self, state: &S, action: &Action<S, A>) -> Result<Vec<(S, f64, bool)>> {
        match action {
            Action::Primitive(a) => Ok(self
                .dp
                .model()
                .transitions(state, a)?
                .into_iter()
                .map(|tp| (tp.outcome.next_state, tp.probability, tp.outcome.terminated))
                .collect()),
            Action::Extended(option) => Ok(self
                .dp
                .compile_option(state, option.as_ref())?
                .outcomes
                .iter()
                .map(|o| (o.state.clone(), o.probability, o.terminal))
                .collect()),
        }
    }

    fn successor_gap(&self, state: &S, terminated: bool) -> f64 {
        if terminated {
            0.0
        } else {
            self.gap(state)
        }
    }

    fn select_next(&mut self, state: &S, action: &Action<S, A>) -> Result<Selection<S>> {
        if self.config.selection == StateSelectionMode::ModelBased {
            let (outcome, _) = self.dp.sample(state, action, &mut self.rng)?;
            let expected_gap = self.successor_gap(&outcome.next_state, outcome.terminated);
            return Ok(Selection {
                state: outcome.next_state,
                expected_gap,
                terminated: outcome.terminated,
            });
        }

        let mut successors = self.successors(state, action)?;
        if successors.is_empty() {
            return Err(PlanningError::NoOutcomes {
                state: format!("{state:?}"),
                action: format!("{action:?}"),
            });
        }
        let gaps: Vec<f64> = successors
            .iter()
            .map(|(s, _, terminated)| self.successor_gap(s, *terminated))
            .collect();
        let expected_gap: f64 = successors.iter().zip(&gaps).map(|((_, p, _), g)| p * g).sum();

        let index = if expected_gap <= 0.0 {
            weighted_choice(successors.iter().map(|(_, p, _)| *p), &mut self.rng)?
        } else if self.config.selection == StateSelectionMode::WeightedMargin {
            weighted_choice(
                successors.iter().zip(&gaps).map(|((_, p, _), g)| p * g),
                &mut self.rng,
            )?
        } else {
            let widest = gaps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let ties: Vec<usize> = (0..gaps.len()).filter(|&i| gaps[i] >= widest).collect();
            sample_action(&uniform(ties), &mut self.rng)?
        };

        let (next, _, terminated) = successors.swap_remove(index);
        Ok(Selection {
            state: next,
            expected_gap,
            terminated,
        })
    }
}
