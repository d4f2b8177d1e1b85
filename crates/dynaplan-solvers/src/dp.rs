//! Bellman backup engine shared by the single-agent planners

use std::fmt::Debug;
use std::rc::Rc;
use std::sync::Arc;

use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use dynaplan_core::config::check_discount;
use dynaplan_core::{
    Action, BackupOperator, ConstantValue, MaxBackup, Model, Outcome, PlanningError, QProvider,
    QValue, Result, StateHashing, TemporalOption, ValueFunction, ValueTable,
};

use crate::option_model::{CompiledOption, OptionModel, OptionModelConfig};

/// Dynamic programming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicProgrammingConfig {
    /// Discount factor
    pub gamma: f64,
}

impl Default for DynamicProgrammingConfig {
    fn default() -> Self {
        Self { gamma: 0.99 }
    }
}

/// Value table, model and backup operator bundled behind one interface
///
/// Values are stored per canonical state handle. States without a stored
/// value report the initializer's value; terminal states always report 0.
pub struct DynamicProgramming<S, A, M, H>
where
    H: StateHashing<S>,
{
    model: M,
    hashing: H,
    config: DynamicProgrammingConfig,
    values: ValueTable<H::Handle>,
    initializer: Box<dyn ValueFunction<S>>,
    operator: Box<dyn BackupOperator<S, Action<S, A>>>,
    options: Vec<Arc<dyn TemporalOption<S, A>>>,
    option_model: OptionModel<S, H::Handle>,
    updates: usize,
}

impl<S, A, M, H> DynamicProgramming<S, A, M, H>
where
    S: Clone + Debug + 'static,
    A: Clone + Debug + PartialEq + 'static,
    M: Model<S, A>,
    H: StateHashing<S>,
{
    /// Create a new engine with a zero initializer and the max operator
    pub fn new(model: M, hashing: H, config: DynamicProgrammingConfig) -> Result<Self> {
        check_discount(config.gamma)?;
        Ok(Self {
            model,
            hashing,
            config,
            values: ValueTable::new(),
            initializer: Box::new(ConstantValue(0.0)),
            operator: Box::new(MaxBackup),
            options: Vec::new(),
            option_model: OptionModel::default(),
            updates: 0,
        })
    }

    /// Use a different value initializer
    #[must_use]
    pub fn with_initializer(mut self, initializer: impl ValueFunction<S> + 'static) -> Self {
        self.initializer = Box::new(initializer);
        self
    }

    /// Use a different backup operator
    #[must_use]
    pub fn with_operator(mut self, operator: impl BackupOperator<S, Action<S, A>> + 'static) -> Self {
        self.operator = Box::new(operator);
        self
    }

    /// Use a different option compilation configuration
    pub fn with_option_config(mut self, config: OptionModelConfig) -> Result<Self> {
        self.option_model.set_config(config)?;
        Ok(self)
    }

    /// Replace the value initializer
    pub fn set_initializer(&mut self, initializer: impl ValueFunction<S> + 'static) {
        self.initializer = Box::new(initializer);
    }

    /// Replace the backup operator
    pub fn set_operator(&mut self, operator: impl BackupOperator<S, Action<S, A>> + 'static) {
        self.operator = Box::new(operator);
    }

    /// Make an option available alongside the model's primitive actions
    pub fn add_option(&mut self, option: Arc<dyn TemporalOption<S, A>>) {
        self.options.push(option);
    }

    /// Discount factor
    #[must_use]
    pub fn gamma(&self) -> f64 {
        self.config.gamma
    }

    /// The underlying model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The state hashing scheme
    pub fn hashing(&self) -> &H {
        &self.hashing
    }

    /// The option compiler
    pub fn option_model(&self) -> &OptionModel<S, H::Handle> {
        &self.option_model
    }

    /// Canonical handle of a state
    pub fn handle(&self, state: &S) -> H::Handle {
        self.hashing.hash_state(state)
    }

    /// Current value estimate of a state
    pub fn value(&self, state: &S) -> f64 {
        if self.model.is_terminal(state) {
            return 0.0;
        }
        self.values
            .get_or_else(&self.hashing.hash_state(state), || self.initializer.value(state))
    }

    /// Whether a backup has stored a value for this state
    pub fn has_computed_value(&self, state: &S) -> bool {
        self.values.contains(&self.hashing.hash_state(state))
    }

    /// The stored value table
    pub fn value_table(&self) -> &ValueTable<H::Handle> {
        &self.values
    }

    /// Number of backups performed since creation or the last reset
    #[must_use]
    pub fn number_of_updates(&self) -> usize {
        self.updates
    }

    /// Primitive actions and initiable options available in a state
    pub fn applicable_actions(&self, state: &S) -> Vec<Action<S, A>> {
        let mut actions: Vec<Action<S, A>> = self
            .model
            .applicable_actions(state)
            .into_iter()
            .map(Action::Primitive)
            .collect();
        actions.extend(
            self.options
                .iter()
                .filter(|o| o.can_initiate(state))
                .map(|o| Action::Extended(Arc::clone(o))),
        );
        actions
    }

    /// Compile (or fetch from cache) an option's model from a state
    pub fn compile_option(
        &self,
        state: &S,
        option: &dyn TemporalOption<S, A>,
    ) -> Result<Rc<CompiledOption<S>>> {
        self.option_model
            .compile(&self.model, &self.hashing, self.config.gamma, state, option)
    }

    /// One-step lookahead value of an action
    ///
    /// Primitive actions use `sum p * (r + gamma * V(s'))`; options use the
    /// compiled reward plus the discount-folded weights of their
    /// termination states. Outcomes flagged as terminated contribute no
    /// future value.
    pub fn q_value(&self, state: &S, action: &Action<S, A>) -> Result<f64> {
        match action {
            Action::Primitive(a) => {
                if !self.model.is_modeled(state, a) {
                    return Ok(self.value(state));
                }
                let transitions = self.model.transitions(state, a)?;
                if transitions.is_empty() {
                    return Err(PlanningError::NoOutcomes {
                        state: format!("{state:?}"),
                        action: format!("{a:?}"),
                    });
                }
                Ok(transitions
                    .iter()
                    .map(|tp| {
                        let future = if tp.outcome.terminated {
                            0.0
                        } else {
                            self.value(&tp.outcome.next_state)
                        };
                        tp.probability * (tp.outcome.reward + self.config.gamma * future)
                    })
                    .sum())
            }
            Action::Extended(option) => {
                let compiled = self.compile_option(state, option.as_ref())?;
                let future: f64 = compiled
                    .outcomes
                    .iter()
                    .filter(|o| !o.terminal)
                    .map(|o| o.discounted_probability() * self.value(&o.state))
                    .sum();
                Ok(compiled.reward + future)
            }
        }
    }

    /// Q-values of every applicable action in a state
    pub fn q_values(&self, state: &S) -> Result<Vec<QValue<S, Action<S, A>>>> {
        self.q_values_of(state, self.applicable_actions(state))
    }

    fn q_values_of(&self, state: &S, actions: Vec<Action<S, A>>) -> Result<Vec<QValue<S, Action<S, A>>>> {
        actions
            .into_iter()
            .map(|action| {
                let q = self.q_value(state, &action)?;
                Ok(QValue::new(state.clone(), action, q))
            })
            .collect()
    }

    /// Bellman backup of one state with the configured operator
    ///
    /// Stores and returns the new value. Terminal states are pinned to 0.
    pub fn backup(&mut self, state: &S) -> Result<f64> {
        let value = self.evaluate(state, self.operator.as_ref())?;
        self.store(state, value);
        Ok(value)
    }

    /// Backup of one state with an explicit operator, e.g. a fixed policy
    pub fn backup_with(
        &mut self,
        state: &S,
        operator: &dyn BackupOperator<S, Action<S, A>>,
    ) -> Result<f64> {
        let value = self.evaluate(state, operator)?;
        self.store(state, value);
        Ok(value)
    }

    fn evaluate(&self, state: &S, operator: &dyn BackupOperator<S, Action<S, A>>) -> Result<f64> {
        if self.model.is_terminal(state) {
            return Ok(0.0);
        }
        let actions = operator.required_actions(state, self.applicable_actions(state))?;
        let q_values = self.q_values_of(state, actions)?;
        operator.apply(state, &q_values)
    }

    /// Overwrite the stored value of a state; counts as an update
    pub fn set_value(&mut self, state: &S, value: f64) {
        self.store(state, value);
    }

    /// Exchange the active value table and initializer with another pair
    ///
    /// Planners that keep several value functions over one model, such as
    /// lower and upper bounds, switch between them with this.
    pub fn swap_value_function(
        &mut self,
        values: &mut ValueTable<H::Handle>,
        initializer: &mut Box<dyn ValueFunction<S>>,
    ) {
        std::mem::swap(&mut self.values, values);
        std::mem::swap(&mut self.initializer, initializer);
    }

    fn store(&mut self, state: &S, value: f64) {
        let handle = self.hashing.hash_state(state);
        self.values.insert(handle, value);
        self.updates += 1;
    }

    /// Sample the result of executing an action
    ///
    /// For options the reward is discounted within the option and the
    /// returned discount must be applied to the termination state's value.
    pub fn sample(
        &self,
        state: &S,
        action: &Action<S, A>,
        rng: &mut dyn RngCore,
    ) -> Result<(Outcome<S>, f64)> {
        match action {
            Action::Primitive(a) => Ok((self.model.sample(state, a, rng)?, self.config.gamma)),
            Action::Extended(option) => {
                let run = self.option_model.sample(
                    &self.model,
                    self.config.gamma,
                    state,
                    option.as_ref(),
                    rng,
                )?;
                Ok((run.outcome, run.discount))
            }
        }
    }

    /// Drop every stored value and cached option compilation
    pub fn reset(&mut self) {
        debug!("Resetting {} stored values", self.values.len());
        self.values.clear();
        self.option_model.clear_cache();
        self.updates = 0;
    }
}

impl<S, A, M, H> DynamicProgramming<S, A, M, H>
where
    H: StateHashing<S>,
    H::Handle: Serialize + DeserializeOwned,
{
    /// Export the stored values as JSON
    pub fn export_json(&self) -> Result<String> {
        self.values.to_json()
    }

    /// Replace the stored values with a JSON snapshot
    pub fn import_json(&mut self, json: &str) -> Result<()> {
        self.values = ValueTable::from_json(json)?;
        Ok(())
    }
}

impl<S, A, M, H> QProvider<S, Action<S, A>> for DynamicProgramming<S, A, M, H>
where
    S: Clone + Debug + 'static,
    A: Clone + Debug + PartialEq + 'static,
    M: Model<S, A>,
    H: StateHashing<S>,
{
    fn q_values(&self, state: &S) -> Result<Vec<QValue<S, Action<S, A>>>> {
        DynamicProgramming::q_values(self, state)
    }

    fn q_value(&self, state: &S, action: &Action<S, A>) -> Result<f64> {
        DynamicProgramming::q_value(self, state, action)
    }
}

impl<S, A, M, H> ValueFunction<S> for DynamicProgramming<S, A, M, H>
where
    S: Clone + Debug + 'static,
    A: Clone + Debug + PartialEq + 'static,
    M: Model<S, A>,
    H: StateHashing<S>,
{
    fn value(&self, state: &S) -> f64 {
        DynamicProgramming::value(self, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_models::{Chain, Step};
    use approx::assert_relative_eq;
    use dynaplan_core::policy::{ActionProb, FnPolicy};
    use dynaplan_core::{FixedPolicyBackup, IdentityHashing};

    fn engine() -> DynamicProgramming<u32, Step, Chain, IdentityHashing> {
        DynamicProgramming::new(Chain::new(4), IdentityHashing, DynamicProgrammingConfig { gamma: 0.5 })
            .unwrap()
    }

    #[test]
    fn test_rejects_invalid_discount() {
        let result = DynamicProgramming::<u32, Step, _, _>::new(
            Chain::new(4),
            IdentityHashing,
            DynamicProgrammingConfig { gamma: 1.5 },
        );
        assert!(matches!(result, Err(PlanningError::Configuration(_))));
    }

    #[test]
    fn test_terminal_value_is_zero_and_pinned_by_backup() {
        let mut dp = engine().with_initializer(ConstantValue(10.0));
        assert_relative_eq!(dp.value(&4), 0.0);
        assert_relative_eq!(dp.backup(&4).unwrap(), 0.0);
        assert_relative_eq!(dp.value(&3), 10.0);
    }

    #[test]
    fn test_q_value_of_primitive_action() {
        let dp = engine().with_initializer(ConstantValue(-2.0));
        // Forward from 3 reaches the goal: terminated, no future value.
        assert_relative_eq!(dp.q_value(&3, &Action::Primitive(Step::Forward)).unwrap(), -1.0);
        // Stay in 1: -1 + 0.5 * -2
        assert_relative_eq!(dp.q_value(&1, &Action::Primitive(Step::Stay)).unwrap(), -2.0);
    }

    #[test]
    fn test_backup_stores_value_and_counts_updates() {
        let mut dp = engine();
        assert!(!dp.has_computed_value(&3));
        assert_relative_eq!(dp.backup(&3).unwrap(), -1.0);
        assert!(dp.has_computed_value(&3));
        assert_eq!(dp.number_of_updates(), 1);

        dp.reset();
        assert!(!dp.has_computed_value(&3));
        assert_eq!(dp.number_of_updates(), 0);
    }

    #[test]
    fn test_unmodeled_action_falls_back_to_initializer() {
        let dp = DynamicProgramming::new(
            Chain::new(4).with_unmodeled(Step::Stay),
            IdentityHashing,
            DynamicProgrammingConfig { gamma: 0.5 },
        )
        .unwrap()
        .with_initializer(|s: &u32| f64::from(*s));
        assert_relative_eq!(dp.q_value(&2, &Action::Primitive(Step::Stay)).unwrap(), 2.0);
    }

    #[test]
    fn test_empty_outcomes_is_a_model_error() {
        let dp = DynamicProgramming::new(
            Chain::new(4).with_broken(Step::Forward),
            IdentityHashing,
            DynamicProgrammingConfig { gamma: 0.5 },
        )
        .unwrap();
        let result = dp.q_value(&0, &Action::Primitive(Step::Forward));
        assert!(matches!(result, Err(PlanningError::NoOutcomes { .. })));
    }

    #[test]
    fn test_fixed_policy_backup_evaluates_policy() {
        let mut dp = engine();
        let always_stay = FnPolicy::new(|_: &u32| vec![ActionProb::new(Action::Primitive(Step::Stay), 1.0)]);
        let op = FixedPolicyBackup::new(always_stay);
        for _ in 0..60 {
            dp.backup_with(&1, &op).unwrap();
        }
        // V = -1 + 0.5 V  =>  V = -2
        assert_relative_eq!(dp.value(&1), -2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fixed_policy_backup_skips_unused_options() {
        let mut dp = engine();
        dp.add_option(Arc::new(crate::options::DeterministicTerminationOption::<u32, Step>::new(
            "to-goal",
            |_: &u32| true,
            |s: &u32| *s >= 4,
            FnPolicy::new(|_: &u32| vec![ActionProb::new(Step::Forward, 1.0)]),
        )));
        let forward = FnPolicy::new(|_: &u32| vec![ActionProb::new(Action::Primitive(Step::Forward), 1.0)]);
        dp.backup_with(&3, &FixedPolicyBackup::new(forward)).unwrap();
        assert_relative_eq!(dp.value(&3), -1.0);
        assert_eq!(dp.option_model().cached_entries(), 0);

        dp.backup(&3).unwrap();
        assert_eq!(dp.option_model().cached_entries(), 1);
    }

    #[test]
    fn test_unmodeled_action_in_terminal_state_is_worth_zero() {
        let dp = DynamicProgramming::new(
            Chain::new(4).with_unmodeled(Step::Stay),
            IdentityHashing,
            DynamicProgrammingConfig { gamma: 0.5 },
        )
        .unwrap()
        .with_initializer(ConstantValue(7.0));
        assert_relative_eq!(dp.q_value(&4, &Action::Primitive(Step::Stay)).unwrap(), 0.0);
        assert_relative_eq!(dp.q_value(&2, &Action::Primitive(Step::Stay)).unwrap(), 7.0);
    }

    #[test]
    fn test_invalid_option_config_is_rejected() {
        let result = engine().with_option_config(OptionModelConfig {
            coverage_target: 0.0,
            ..OptionModelConfig::default()
        });
        assert!(matches!(result, Err(PlanningError::Configuration(_))));
    }

    #[test]
    fn test_value_snapshot_round_trip() {
        let mut dp = engine();
        dp.backup(&3).unwrap();
        dp.backup(&2).unwrap();
        let json = dp.export_json().unwrap();

        let mut restored = engine();
        restored.import_json(&json).unwrap();
        assert_relative_eq!(restored.value(&2), dp.value(&2));
        assert_eq!(restored.value_table().len(), 2);
    }
}
