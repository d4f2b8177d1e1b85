//! Value functions, Q-value providers and tabular value storage

use std::collections::HashMap;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Result;

/// State value function V(s)
pub trait ValueFunction<S> {
    /// Value of a state
    fn value(&self, state: &S) -> f64;
}

impl<S, F: Fn(&S) -> f64> ValueFunction<S> for F {
    fn value(&self, state: &S) -> f64 {
        self(state)
    }
}

/// Value initializer that returns the same value for every state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantValue(pub f64);

impl<S> ValueFunction<S> for ConstantValue {
    fn value(&self, _state: &S) -> f64 {
        self.0
    }
}

/// A Q-value for a state-action pair
#[derive(Debug, Clone)]
pub struct QValue<S, A> {
    /// State
    pub state: S,
    /// Action
    pub action: A,
    /// Estimated value of taking the action in the state
    pub q: f64,
}

impl<S, A> QValue<S, A> {
    /// Create a new Q-value
    pub fn new(state: S, action: A, q: f64) -> Self {
        Self { state, action, q }
    }
}

/// Source of Q-values for every action applicable in a state
pub trait QProvider<S, A> {
    /// Q-values for all applicable actions in a state
    fn q_values(&self, state: &S) -> Result<Vec<QValue<S, A>>>;

    /// Q-value of one action in a state
    fn q_value(&self, state: &S, action: &A) -> Result<f64>;
}

impl<S, A, T: QProvider<S, A> + ?Sized> QProvider<S, A> for &T {
    fn q_values(&self, state: &S) -> Result<Vec<QValue<S, A>>> {
        (**self).q_values(state)
    }

    fn q_value(&self, state: &S, action: &A) -> Result<f64> {
        (**self).q_value(state, action)
    }
}

/// Tabular value storage keyed by canonical state handle
///
/// The table only stores values that a planner has written. Lookups of
/// unseen handles return `None`; planners fall back to their value
/// initializer in that case.
#[derive(Debug, Clone)]
pub struct ValueTable<H> {
    values: HashMap<H, f64>,
}

impl<H: Eq + Hash> ValueTable<H> {
    /// Create a new empty table
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Stored value for a handle
    #[must_use]
    pub fn get(&self, handle: &H) -> Option<f64> {
        self.values.get(handle).copied()
    }

    /// Stored value for a handle, or a lazily computed default
    pub fn get_or_else(&self, handle: &H, default: impl FnOnce() -> f64) -> f64 {
        self.get(handle).unwrap_or_else(default)
    }

    /// Store a value, returning the previous one
    pub fn insert(&mut self, handle: H, value: f64) -> Option<f64> {
        self.values.insert(handle, value)
    }

    /// Check whether a value has been stored for a handle
    #[must_use]
    pub fn contains(&self, handle: &H) -> bool {
        self.values.contains_key(handle)
    }

    /// Number of stored values
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Remove all stored values
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Iterate over stored handles and values
    pub fn iter(&self) -> impl Iterator<Item = (&H, f64)> {
        self.values.iter().map(|(h, v)| (h, *v))
    }
}

impl<H: Eq + Hash + Serialize> ValueTable<H> {
    /// Export the table as JSON
    ///
    /// Entries are written as `[handle, value]` pairs so that handles need
    /// not be strings.
    pub fn to_json(&self) -> Result<String> {
        let entries: Vec<(&H, f64)> = self.iter().collect();
        Ok(serde_json::to_string(&entries)?)
    }
}

impl<H: Eq + Hash + DeserializeOwned> ValueTable<H> {
    /// Import a table previously written by [`ValueTable::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<(H, f64)> = serde_json::from_str(json)?;
        Ok(Self {
            values: entries.into_iter().collect(),
        })
    }
}

impl<H: Eq + Hash> Default for ValueTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_value_table_basics() {
        let mut table = ValueTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get(&3), None);
        assert_relative_eq!(table.get_or_else(&3, || -1.5), -1.5);

        assert_eq!(table.insert(3, 2.0), None);
        assert_eq!(table.insert(3, 4.0), Some(2.0));
        assert!(table.contains(&3));
        assert_eq!(table.len(), 1);

        table.clear();
        assert!(table.is_empty());
    }

    #[test]
    fn test_value_table_json_round_trip() {
        let mut table = ValueTable::new();
        table.insert((0, 1), -3.5);
        table.insert((2, 2), 0.0);

        let json = table.to_json().unwrap();
        let restored: ValueTable<(i32, i32)> = ValueTable::from_json(&json).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(&(0, 1)), Some(-3.5));
    }

    #[test]
    fn test_closure_and_constant_initializers() {
        let constant = ConstantValue(1.25);
        let shaped = |s: &i32| f64::from(*s) * 2.0;
        assert_relative_eq!(ValueFunction::<i32>::value(&constant, &7), 1.25);
        assert_relative_eq!(shaped.value(&3), 6.0);
    }
}
