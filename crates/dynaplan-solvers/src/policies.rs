//! Policies derived from a planner's Q-values

use dynaplan_core::policy::uniform;
use dynaplan_core::{ActionProb, PlanningError, Policy, QProvider, Result};

/// Q-values within this distance of the maximum count as ties
pub const TIE_TOLERANCE: f64 = 1e-10;

/// Greedy policy over Q-values; ties are broken uniformly
///
/// `Q` may be a planner by value or by reference, so a finished planner can
/// be moved into a greedy policy and handed to another planner as its
/// rollout policy.
pub struct GreedyQPolicy<Q> {
    source: Q,
}

impl<Q> GreedyQPolicy<Q> {
    /// Create a new greedy policy
    pub fn new(source: Q) -> Self {
        Self { source }
    }

    /// The Q-value source
    pub fn source(&self) -> &Q {
        &self.source
    }

    /// Recover the Q-value source
    pub fn into_inner(self) -> Q {
        self.source
    }
}

impl<S, A, Q> Policy<S, A> for GreedyQPolicy<Q>
where
    Q: QProvider<S, A>,
{
    fn distribution(&self, state: &S) -> Result<Vec<ActionProb<A>>> {
        let q_values = self.source.q_values(state)?;
        if q_values.is_empty() {
            return Err(PlanningError::InvalidDistribution(
                "no applicable actions".to_string(),
            ));
        }
        let max = q_values.iter().map(|q| q.q).fold(f64::NEG_INFINITY, f64::max);
        let best = q_values
            .into_iter()
            .filter(|q| q.q >= max - TIE_TOLERANCE)
            .map(|q| q.action)
            .collect();
        Ok(uniform(best))
    }
}

/// Boltzmann (softmax) policy over Q-values
pub struct BoltzmannQPolicy<Q> {
    source: Q,
    temperature: f64,
}

impl<Q> BoltzmannQPolicy<Q> {
    /// Create a new Boltzmann policy; the temperature must be positive
    pub fn new(source: Q, temperature: f64) -> Result<Self> {
        if temperature <= 0.0 || !temperature.is_finite() {
            return Err(PlanningError::Configuration(format!(
                "temperature must be positive, got {temperature}"
            )));
        }
        Ok(Self {
            source,
            temperature,
        })
    }

    /// Get the temperature
    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

impl<S, A, Q> Policy<S, A> for BoltzmannQPolicy<Q>
where
    Q: QProvider<S, A>,
{
    fn distribution(&self, state: &S) -> Result<Vec<ActionProb<A>>> {
        let q_values = self.source.q_values(state)?;
        if q_values.is_empty() {
            return Err(PlanningError::InvalidDistribution(
                "no applicable actions".to_string(),
            ));
        }
        let max = q_values.iter().map(|q| q.q).fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = q_values
            .iter()
            .map(|q| ((q.q - max) / self.temperature).exp())
            .collect();
        let norm: f64 = weights.iter().sum();
        Ok(q_values
            .into_iter()
            .zip(weights)
            .map(|(q, w)| ActionProb::new(q.action, w / norm))
            .collect())
    }
}
