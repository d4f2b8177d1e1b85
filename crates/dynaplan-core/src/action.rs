//! Primitive actions and temporally-extended options

use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::policy::ActionProb;
use crate::Result;

/// One step of an option's execution history
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStep<S, A> {
    /// State the step was taken from
    pub state: S,
    /// Primitive action chosen by the option
    pub action: A,
}

/// A temporally-extended action: an initiation set, an inner policy over
/// primitive actions and a termination condition
///
/// Markov options ignore the history argument. Non-Markov options may
/// condition both their policy and their termination on the states and
/// actions seen since the option was initiated.
pub trait TemporalOption<S, A>: Send + Sync {
    /// Unique name of the option, used as its cache key
    fn name(&self) -> &str;

    /// Whether the option's policy and termination depend only on the current state
    fn is_markov(&self) -> bool {
        true
    }

    /// Whether the option can be initiated in a state
    fn can_initiate(&self, state: &S) -> bool;

    /// Distribution over primitive actions in a state
    fn policy_distribution(
        &self,
        state: &S,
        history: &[HistoryStep<S, A>],
    ) -> Result<Vec<ActionProb<A>>>;

    /// Probability of terminating on arrival in a state
    fn termination_probability(&self, state: &S, history: &[HistoryStep<S, A>]) -> f64;
}

/// Action as seen by a planner: either a primitive model action or an option
pub enum Action<S, A> {
    /// Single-step action executed by the model
    Primitive(A),
    /// Temporally-extended option
    Extended(Arc<dyn TemporalOption<S, A>>),
}

impl<S, A> Action<S, A> {
    /// Check if this is a primitive action
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    /// Get the primitive action, if any
    #[must_use]
    pub fn as_primitive(&self) -> Option<&A> {
        match self {
            Self::Primitive(a) => Some(a),
            Self::Extended(_) => None,
        }
    }

    /// Get the option, if any
    #[must_use]
    pub fn as_option(&self) -> Option<&Arc<dyn TemporalOption<S, A>>> {
        match self {
            Self::Primitive(_) => None,
            Self::Extended(o) => Some(o),
        }
    }
}

impl<S, A: Clone> Clone for Action<S, A> {
    fn clone(&self) -> Self {
        match self {
            Self::Primitive(a) => Self::Primitive(a.clone()),
            Self::Extended(o) => Self::Extended(Arc::clone(o)),
        }
    }
}

impl<S, A: Debug> Debug for Action<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(a) => write!(f, "{a:?}"),
            Self::Extended(o) => write!(f, "Option({})", o.name()),
        }
    }
}

impl<S, A: PartialEq> PartialEq for Action<S, A> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Primitive(a), Self::Primitive(b)) => a == b,
            (Self::Extended(a), Self::Extended(b)) => a.name() == b.name(),
            _ => false,
        }
    }
}

impl<S, A> From<A> for Action<S, A> {
    fn from(action: A) -> Self {
        Self::Primitive(action)
    }
}
