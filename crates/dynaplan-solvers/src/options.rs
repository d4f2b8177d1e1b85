//! Concrete option types

use dynaplan_core::{ActionProb, HistoryStep, Policy, Result, TemporalOption};

type StatePredicate<S> = Box<dyn Fn(&S) -> bool + Send + Sync>;
type HistoryPolicy<S, A> = Box<dyn Fn(&S, &[HistoryStep<S, A>]) -> Vec<ActionProb<A>> + Send + Sync>;
type HistoryTermination<S, A> = Box<dyn Fn(&S, &[HistoryStep<S, A>]) -> f64 + Send + Sync>;

/// Markov option that terminates exactly when a goal test holds
///
/// The option also terminates in any state where its inner policy is
/// undefined.
pub struct DeterministicTerminationOption<S, A> {
    name: String,
    initiation: StatePredicate<S>,
    termination: StatePredicate<S>,
    policy: Box<dyn Policy<S, A> + Send + Sync>,
}

impl<S, A> DeterministicTerminationOption<S, A> {
    /// Create a new option
    pub fn new(
        name: impl Into<String>,
        initiation: impl Fn(&S) -> bool + Send + Sync + 'static,
        termination: impl Fn(&S) -> bool + Send + Sync + 'static,
        policy: impl Policy<S, A> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            initiation: Box::new(initiation),
            termination: Box::new(termination),
            policy: Box::new(policy),
        }
    }
}

impl<S, A> TemporalOption<S, A> for DeterministicTerminationOption<S, A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_initiate(&self, state: &S) -> bool {
        (self.initiation)(state)
    }

    fn policy_distribution(&self, state: &S, _history: &[HistoryStep<S, A>]) -> Result<Vec<ActionProb<A>>> {
        self.policy.distribution(state)
    }

    fn termination_probability(&self, state: &S, _history: &[HistoryStep<S, A>]) -> f64 {
        if (self.termination)(state) || !self.policy.is_defined_for(state) {
            1.0
        } else {
            0.0
        }
    }
}

/// Markov option with a state-dependent termination probability
pub struct StochasticTerminationOption<S, A> {
    name: String,
    initiation: StatePredicate<S>,
    termination: Box<dyn Fn(&S) -> f64 + Send + Sync>,
    policy: Box<dyn Policy<S, A> + Send + Sync>,
}

impl<S, A> StochasticTerminationOption<S, A> {
    /// Create a new option
    pub fn new(
        name: impl Into<String>,
        initiation: impl Fn(&S) -> bool + Send + Sync + 'static,
        termination: impl Fn(&S) -> f64 + Send + Sync + 'static,
        policy: impl Policy<S, A> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            initiation: Box::new(initiation),
            termination: Box::new(termination),
            policy: Box::new(policy),
        }
    }
}

impl<S, A> TemporalOption<S, A> for StochasticTerminationOption<S, A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_initiate(&self, state: &S) -> bool {
        (self.initiation)(state)
    }

    fn policy_distribution(&self, state: &S, _history: &[HistoryStep<S, A>]) -> Result<Vec<ActionProb<A>>> {
        self.policy.distribution(state)
    }

    fn termination_probability(&self, state: &S, _history: &[HistoryStep<S, A>]) -> f64 {
        (self.termination)(state)
    }
}

/// Non-Markov option whose policy and termination see the steps taken so far
pub struct HistoryOption<S, A> {
    name: String,
    initiation: StatePredicate<S>,
    policy: HistoryPolicy<S, A>,
    termination: HistoryTermination<S, A>,
}

impl<S, A> HistoryOption<S, A> {
    /// Create a new option
    pub fn new(
        name: impl Into<String>,
        initiation: impl Fn(&S) -> bool + Send + Sync + 'static,
        policy: impl Fn(&S, &[HistoryStep<S, A>]) -> Vec<ActionProb<A>> + Send + Sync + 'static,
        termination: impl Fn(&S, &[HistoryStep<S, A>]) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            initiation: Box::new(initiation),
            policy: Box::new(policy),
            termination: Box::new(termination),
        }
    }
}

impl<S, A> TemporalOption<S, A> for HistoryOption<S, A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_markov(&self) -> bool {
        false
    }

    fn can_initiate(&self, state: &S) -> bool {
        (self.initiation)(state)
    }

    fn policy_distribution(&self, state: &S, history: &[HistoryStep<S, A>]) -> Result<Vec<ActionProb<A>>> {
        Ok((self.policy)(state, history))
    }

    fn termination_probability(&self, state: &S, history: &[HistoryStep<S, A>]) -> f64 {
        (self.termination)(state, history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dp::{DynamicProgramming, DynamicProgrammingConfig};
    use crate::option_model::OptionModelConfig;
    use crate::test_models::{Chain, Step};
    use crate::value_iteration::{ValueIteration, ValueIterationConfig};
    use approx::assert_relative_eq;
    use dynaplan_core::policy::FnPolicy;
    use dynaplan_core::{Action, IdentityHashing};
    use std::sync::Arc;

    fn run_to(target: u32) -> DeterministicTerminationOption<u32, Step> {
        DeterministicTerminationOption::new(
            format!("run-to-{target}"),
            move |s: &u32| *s < target,
            move |s: &u32| *s >= target,
            FnPolicy::new(|_: &u32| vec![ActionProb::new(Step::Forward, 1.0)]),
        )
    }

    fn engine() -> DynamicProgramming<u32, Step, Chain, IdentityHashing> {
        DynamicProgramming::new(Chain::new(4), IdentityHashing, DynamicProgrammingConfig { gamma: 0.5 }).unwrap()
    }

    #[test]
    fn test_deterministic_option_q_value() {
        let mut dp = engine();
        let option: Arc<dyn TemporalOption<u32, Step>> = Arc::new(run_to(3));
        dp.add_option(Arc::clone(&option));

        let compiled = dp.compile_option(&0, option.as_ref()).unwrap();
        assert_eq!(compiled.outcomes.len(), 1);
        assert_eq!(compiled.outcomes[0].state, 3);
        assert_relative_eq!(compiled.outcomes[0].discount, 0.125);
        assert_relative_eq!(compiled.reward, -1.75);

        assert_relative_eq!(dp.q_value(&0, &Action::Extended(option)).unwrap(), -1.75);
        assert_eq!(dp.applicable_actions(&0).len(), 3);
        assert_eq!(dp.applicable_actions(&3).len(), 2);
    }

    #[test]
    fn test_options_do_not_change_optimal_values() {
        let mut dp = engine();
        dp.add_option(Arc::new(run_to(3)));
        let mut planner = ValueIteration::new(
            dp,
            ValueIterationConfig {
                max_delta: 1e-12,
                max_iterations: 200,
            },
        )
        .unwrap();
        planner.plan_from_state(&0).unwrap();
        assert_relative_eq!(planner.planner().value(&0), -1.875, epsilon = 1e-9);
    }

    #[test]
    fn test_history_option_counts_steps() {
        let dp = engine().with_option_config(OptionModelConfig {
            require_markov: false,
            ..OptionModelConfig::default()
        })
        .unwrap();
        let two_steps = HistoryOption::new(
            "two-steps",
            |_: &u32| true,
            |_: &u32, _: &[HistoryStep<u32, Step>]| vec![ActionProb::new(Step::Forward, 1.0)],
            |_: &u32, history: &[HistoryStep<u32, Step>]| if history.len() >= 2 { 1.0 } else { 0.0 },
        );
        let compiled = dp.compile_option(&0, &two_steps).unwrap();
        assert_eq!(compiled.outcomes[0].state, 2);
        assert_relative_eq!(compiled.reward, -1.5);
        assert_relative_eq!(compiled.outcomes[0].discount, 0.25);
    }

    #[test]
    fn test_stochastic_termination_splits_mass() {
        let dp = engine();
        let halfway = StochasticTerminationOption::new(
            "halfway",
            |_: &u32| true,
            |s: &u32| if *s == 1 { 0.5 } else { 1.0 },
            FnPolicy::new(|_: &u32| vec![ActionProb::new(Step::Forward, 1.0)]),
        );
        let compiled = dp.compile_option(&0, &halfway).unwrap();
        let at = |s: u32| compiled.outcomes.iter().find(|o| o.state == s).unwrap().clone();
        assert_relative_eq!(at(1).probability, 0.5);
        assert_relative_eq!(at(2).probability, 0.5);
        assert_relative_eq!(at(1).discount, 0.5);
        assert_relative_eq!(at(2).discount, 0.25);
        // 0.5 * (-1) + 0.5 * (-1 - 0.5)
        assert_relative_eq!(compiled.reward, -1.25);
    }
}
