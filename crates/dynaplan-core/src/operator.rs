//! Backup operators that collapse a state's Q-values into a state value

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::policy::Policy;
use crate::value::QValue;
use crate::{PlanningError, Result};

/// Collapses the Q-values of a state into a single value
pub trait BackupOperator<S, A> {
    /// Compute the backed-up value of a state
    fn apply(&self, state: &S, q_values: &[QValue<S, A>]) -> Result<f64>;

    /// Narrow the applicable actions to those whose Q-values `apply` reads
    fn required_actions(&self, _state: &S, applicable: Vec<A>) -> Result<Vec<A>> {
        Ok(applicable)
    }
}

fn require_actions<S: Debug, A>(state: &S, q_values: &[QValue<S, A>]) -> Result<()> {
    if q_values.is_empty() {
        return Err(PlanningError::Model(format!(
            "no applicable actions in non-terminal state {state:?}"
        )));
    }
    Ok(())
}

/// Bellman optimality operator: the maximum Q-value
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MaxBackup;

impl<S: Debug, A> BackupOperator<S, A> for MaxBackup {
    fn apply(&self, state: &S, q_values: &[QValue<S, A>]) -> Result<f64> {
        require_actions(state, q_values)?;
        Ok(q_values.iter().map(|q| q.q).fold(f64::NEG_INFINITY, f64::max))
    }
}

/// Boltzmann-weighted average of Q-values
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SoftmaxBackup {
    /// Inverse temperature; larger values approach the max operator
    pub beta: f64,
}

impl SoftmaxBackup {
    /// Create a new softmax operator
    #[must_use]
    pub fn new(beta: f64) -> Self {
        Self { beta }
    }
}

impl<S: Debug, A> BackupOperator<S, A> for SoftmaxBackup {
    fn apply(&self, state: &S, q_values: &[QValue<S, A>]) -> Result<f64> {
        require_actions(state, q_values)?;
        let max = q_values.iter().map(|q| q.q).fold(f64::NEG_INFINITY, f64::max);
        let mut norm = 0.0;
        let mut weighted = 0.0;
        for q in q_values {
            let w = (self.beta * (q.q - max)).exp();
            norm += w;
            weighted += w * q.q;
        }
        Ok(weighted / norm)
    }
}

/// Expected Q-value under a fixed policy, for policy evaluation
///
/// Only the policy's supported actions are evaluated. Policy mass on
/// actions without a Q-value contributes nothing.
pub struct FixedPolicyBackup<P> {
    policy: P,
}

impl<P> FixedPolicyBackup<P> {
    /// Create a new fixed-policy operator
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    /// The evaluated policy
    pub fn policy(&self) -> &P {
        &self.policy
    }
}

impl<S, A, P> BackupOperator<S, A> for FixedPolicyBackup<P>
where
    S: Debug,
    A: PartialEq,
    P: Policy<S, A>,
{
    fn apply(&self, state: &S, q_values: &[QValue<S, A>]) -> Result<f64> {
        require_actions(state, q_values)?;
        let distribution = self.policy.distribution(state)?;
        let mut value = 0.0;
        for ap in distribution.iter().filter(|ap| ap.probability > 0.0) {
            if let Some(q) = q_values.iter().find(|q| q.action == ap.action) {
                value += ap.probability * q.q;
            }
        }
        Ok(value)
    }

    fn required_actions(&self, state: &S, applicable: Vec<A>) -> Result<Vec<A>> {
        let distribution = self.policy.distribution(state)?;
        Ok(applicable
            .into_iter()
            .filter(|a| {
                distribution
                    .iter()
                    .any(|ap| ap.probability > 0.0 && &ap.action == a)
            })
            .collect())
    }
}
