//! Real-time dynamic programming
//!
//! RTDP interleaves simulation and Bellman backups: it repeatedly rolls
//! out from an initial state, backing up the states it visits. With an
//! optimistic initializer the stored values of visited states are upper
//! bounds that tighten toward the optimal values; states never visited
//! keep the initializer's value.

use std::fmt::Debug;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use dynaplan_core::config::check_non_negative;
use dynaplan_core::{Action, Model, Policy, Result, StateHashing};

use crate::dp::DynamicProgramming;
use crate::policies::GreedyQPolicy;

/// RTDP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RtdpConfig {
    /// Hard cap on the number of rollouts
    pub num_rollouts: usize,
    /// A rollout whose largest value change is below this counts as small
    pub max_delta: f64,
    /// Maximum number of steps per rollout
    pub max_depth: usize,
    /// Stop after this many consecutive small-change rollouts
    pub min_rollouts_with_small_change: usize,
    /// Back up the whole trajectory in reverse order after each rollout
    pub batch: bool,
    /// Seed for the rollout random number generator
    pub seed: Option<u64>,
}

impl Default for RtdpConfig {
    fn default() -> Self {
        Self {
            num_rollouts: 1000,
            max_delta: 0.01,
            max_depth: 100,
            min_rollouts_with_small_change: 10,
            batch: false,
            seed: None,
        }
    }
}

/// Action selection used while rolling out
pub enum RolloutPolicy<S, A> {
    /// Greedy over the planner's current Q-values
    Greedy,
    /// Any other policy, e.g. the greedy policy of a previously solved planner
    Custom(Box<dyn Policy<S, Action<S, A>>>),
}

/// Statistics of a single rollout
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RolloutResult {
    /// Steps simulated
    pub steps: usize,
    /// Largest absolute value change among backed-up states
    pub max_delta: f64,
    /// Whether the rollout reached a terminal state
    pub terminated: bool,
}

/// Statistics of a planning run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PlanningSummary {
    /// Rollouts performed
    pub rollouts: usize,
    /// Steps simulated across all rollouts
    pub total_steps: usize,
    /// Bellman backups performed by the engine so far
    pub bellman_updates: usize,
    /// Whether the small-change criterion stopped planning
    pub converged: bool,
}

/// Real-time dynamic programming planner
pub struct Rtdp<S, A, M, H>
where
    H: StateHashing<S>,
{
    dp: DynamicProgramming<S, A, M, H>,
    config: RtdpConfig,
    rollout_policy: RolloutPolicy<S, A>,
    rng: StdRng,
}

impl<S, A, M, H> Rtdp<S, A, M, H>
where
    S: Clone + Debug + 'static,
    A: Clone + Debug + PartialEq + 'static,
    M: Model<S, A>,
    H: StateHashing<S>,
{
    /// Create a new RTDP planner around a backup engine
    pub fn new(dp: DynamicProgramming<S, A, M, H>, config: RtdpConfig) -> Result<Self> {
        check_non_negative("max_delta", config.max_delta)?;
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Ok(Self {
            dp,
            config,
            rollout_policy: RolloutPolicy::Greedy,
            rng,
        })
    }

    /// Use a different rollout policy
    pub fn set_rollout_policy(&mut self, policy: RolloutPolicy<S, A>) {
        self.rollout_policy = policy;
    }

    /// Get the configuration
    pub fn config(&self) -> &RtdpConfig {
        &self.config
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

    /// Roll out from `initial` until the convergence criterion or the rollout cap
    pub fn plan_from_state(&mut self, initial: &S) -> Result<PlanningSummary> {
        let _span = info_span!("rtdp", batch = self.config.batch).entered();
        let mut summary = PlanningSummary::default();
        let mut consecutive_small = 0;

        for i in 0..self.config.num_rollouts {
            let result = self.rollout(initial)?;
            summary.rollouts += 1;
            summary.total_steps += result.steps;
            debug!(
                "Rollout {}: {} steps, max delta {:.6}",
                i, result.steps, result.max_delta
            );

            if result.max_delta < self.config.max_delta {
                consecutive_small += 1;
            } else {
                consecutive_small = 0;
            }
            if consecutive_small >= self.config.min_rollouts_with_small_change {
                summary.converged = true;
                break;
            }
        }

        summary.bellman_updates = self.dp.number_of_updates();
        info!(
            "RTDP finished after {} rollouts ({} steps, {} backups, converged: {})",
            summary.rollouts, summary.total_steps, summary.bellman_updates, summary.converged
        );
        Ok(summary)
    }

    /// Perform a single rollout from `initial`
    pub fn rollout(&mut self, initial: &S) -> Result<RolloutResult> {
        if self.config.batch {
            self.batch_rollout(initial)
        } else {
            self.online_rollout(initial)
        }
    }

    fn online_rollout(&mut self, initial: &S) -> Result<RolloutResult> {
        let mut result = RolloutResult::default();
        let mut state = initial.clone();

        while !self.dp.model().is_terminal(&state) && result.steps < self.config.max_depth {
            let old = self.dp.value(&state);
            let new = self.dp.backup(&state)?;
            result.max_delta = result.max_delta.max((new - old).abs());
            let action = self.select_action(&state)?;

            let (outcome, _) = self.dp.sample(&state, &action, &mut self.rng)?;
            result.steps += 1;
            state = outcome.next_state;
            if outcome.terminated {
                result.terminated = true;
                break;
            }
        }

        result.terminated |= self.dp.model().is_terminal(&state);
        Ok(result)
    }

    fn batch_rollout(&mut self, initial: &S) -> Result<RolloutResult> {
        let mut result = RolloutResult::default();
        let mut visited = Vec::new();
        let mut state = initial.clone();

        while !self.dp.model().is_terminal(&state) && result.steps < self.config.max_depth {
            let action = self.select_action(&state)?;
            let (outcome, _) = self.dp.sample(&state, &action, &mut self.rng)?;
            visited.push(state);
            result.steps += 1;
            state = outcome.next_state;
            if outcome.terminated {
                result.terminated = true;
                break;
            }
        }
        result.terminated |= self.dp.model().is_terminal(&state);

        for s in visited.iter().rev() {
            let old = self.dp.value(s);
            let new = self.dp.backup(s)?;
            result.max_delta = result.max_delta.max((new - old).abs());
        }
        Ok(result)
    }

    fn select_action(&mut self, state: &S) -> Result<Action<S, A>> {
        match &self.rollout_policy {
            RolloutPolicy::Greedy => GreedyQPolicy::new(&self.dp).sample(state, &mut self.rng),
            RolloutPolicy::Custom(policy) => policy.sample(state, &mut self.rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dp::DynamicProgrammingConfig;
    use crate::test_models::{Chain, Step};
    use approx::assert_relative_eq;
    use dynaplan_core::policy::{ActionProb, FnPolicy};
    use dynaplan_core::{ConstantValue, FixedPolicyBackup, IdentityHashing};

    fn rtdp(batch: bool) -> Rtdp<u32, Step, Chain, IdentityHashing> {
        let dp = DynamicProgramming::new(
            Chain::new(5).with_slip(0.2),
            IdentityHashing,
            DynamicProgrammingConfig { gamma: 0.9 },
        )
        .unwrap()
        .with_initializer(ConstantValue(0.0));
        Rtdp::new(
            dp,
            RtdpConfig {
                num_rollouts: 500,
                max_delta: 1e-6,
                seed: Some(42),
                batch,
                ..RtdpConfig::default()
            },
        )
        .unwrap()
    }

    /// With slip s the value of Forward from distance d solves V_d = -1 + 0.9 (1-s) V_{d-1} + 0.9 s V_d.
    fn optimal(distance: u32) -> f64 {
        let (gamma, slip) = (0.9, 0.2);
        (0..distance).fold(0.0, |next, _| (-1.0 + gamma * (1.0 - slip) * next) / (1.0 - gamma * slip))
    }

    #[test]
    fn test_values_decrease_monotonically_toward_optimum() {
        let mut planner = rtdp(false);
        let mut previous = planner.planner().value(&0);
        for _ in 0..200 {
            planner.rollout(&0).unwrap();
            let current = planner.planner().value(&0);
            assert!(current <= previous + 1e-12);
            assert!(current >= optimal(5) - 1e-9);
            previous = current;
        }
        assert_relative_eq!(previous, optimal(5), epsilon = 1e-3);
    }

    #[test]
    fn test_batch_mode_converges() {
        let mut planner = rtdp(true);
        let summary = planner.plan_from_state(&0).unwrap();
        assert!(summary.rollouts > 0);
        assert_relative_eq!(planner.planner().value(&0), optimal(5), epsilon = 1e-3);
        assert_relative_eq!(planner.planner().value(&4), optimal(1), epsilon = 1e-3);
    }

    fn always_forward() -> FnPolicy<impl Fn(&u32) -> Vec<ActionProb<Action<u32, Step>>>> {
        FnPolicy::new(|_: &u32| vec![ActionProb::new(Action::Primitive(Step::Forward), 1.0)])
    }

    fn forward_only(batch: bool) -> Rtdp<u32, Step, Chain, IdentityHashing> {
        let dp = DynamicProgramming::new(Chain::new(4), IdentityHashing, DynamicProgrammingConfig { gamma: 0.5 })
            .unwrap()
            .with_operator(FixedPolicyBackup::new(always_forward()));
        let mut planner = Rtdp::new(
            dp,
            RtdpConfig {
                batch,
                seed: Some(3),
                ..RtdpConfig::default()
            },
        )
        .unwrap();
        planner.set_rollout_policy(RolloutPolicy::Custom(Box::new(always_forward())));
        planner
    }

    #[test]
    fn test_batch_rollout_backs_up_in_reverse_order() {
        let mut planner = forward_only(true);
        let result = planner.rollout(&0).unwrap();
        assert_eq!(result.steps, 4);
        assert!(result.terminated);
        // -1 - 0.5 - 0.25 - 0.125: the whole path in one pass
        assert_relative_eq!(planner.planner().value(&0), -1.875);
        assert_relative_eq!(planner.planner().value(&2), -1.5);
    }

    #[test]
    fn test_online_rollout_backs_up_before_moving_on() {
        let mut planner = forward_only(false);
        planner.rollout(&0).unwrap();
        assert_relative_eq!(planner.planner().value(&0), -1.0);
        assert_relative_eq!(planner.planner().value(&3), -1.0);
    }

    #[test]
    fn test_plan_stops_after_consecutive_small_changes() {
        let mut planner = rtdp(false);
        let summary = planner.plan_from_state(&0).unwrap();
        assert!(summary.converged);
        assert!(summary.rollouts < 500);
        assert!(summary.bellman_updates >= summary.total_steps);
    }

    #[test]
    fn test_rollouts_respect_max_depth() {
        let dp = DynamicProgramming::new(Chain::new(50), IdentityHashing, DynamicProgrammingConfig::default())
            .unwrap();
        let mut planner = Rtdp::new(
            dp,
            RtdpConfig {
                max_depth: 3,
                seed: Some(1),
                ..RtdpConfig::default()
            },
        )
        .unwrap();
        let result = planner.rollout(&0).unwrap();
        assert_eq!(result.steps, 3);
        assert!(!result.terminated);
    }

    #[test]
    fn test_solved_planner_drives_another_planner() {
        let mut leader = rtdp(false);
        leader.plan_from_state(&0).unwrap();
        let solved = GreedyQPolicy::new(leader.into_planner());

        let mut follower = rtdp(false);
        follower.set_rollout_policy(RolloutPolicy::Custom(Box::new(solved)));
        let result = follower.rollout(&0).unwrap();
        assert!(result.terminated);
    }
}
