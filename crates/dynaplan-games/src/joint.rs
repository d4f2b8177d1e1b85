//! Agents, joint actions and the joint transition model

use serde::{Deserialize, Serialize};

use dynaplan_core::Result;

/// An agent taking part in a stochastic game
///
/// The agent type names the action set the model grants the agent, so
/// several agents may share a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique agent name
    pub name: String,
    /// Action-set identifier understood by the model
    pub agent_type: String,
}

impl AgentDefinition {
    /// Create a new agent definition
    pub fn new(name: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent_type: agent_type.into(),
        }
    }
}

/// One action per agent, in agent order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JointAction<A>(pub Vec<A>);

impl<A> JointAction<A> {
    /// Action of the agent at `index`
    #[must_use]
    pub fn action(&self, index: usize) -> Option<&A> {
        self.0.get(index)
    }

    /// Number of agents
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the joint action is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A possible outcome of a joint action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointTransition<S> {
    /// State reached
    pub next_state: S,
    /// Probability of the outcome
    pub probability: f64,
    /// Reward of each agent, in agent order
    pub rewards: Vec<f64>,
    /// Whether the game ended on this transition
    pub terminated: bool,
}

/// Fully-specified stochastic model of a multi-agent game
pub trait JointModel<S, A> {
    /// Actions the agent may take in a state
    fn applicable_actions(&self, state: &S, agent: &AgentDefinition) -> Vec<A>;

    /// Outcome distribution of a joint action; rewards are indexed like the agent list
    fn transitions(&self, state: &S, joint: &JointAction<A>) -> Result<Vec<JointTransition<S>>>;

    /// Whether a state is terminal
    fn is_terminal(&self, state: &S) -> bool;

    /// Every joint action available in a state
    fn joint_actions(&self, state: &S, agents: &[AgentDefinition]) -> Vec<JointAction<A>>
    where
        A: Clone,
    {
        let per_agent: Vec<Vec<A>> = agents
            .iter()
            .map(|agent| self.applicable_actions(state, agent))
            .collect();
        cartesian_product(&per_agent)
    }
}

/// All combinations of per-agent actions; the first agent varies slowest
#[must_use]
pub fn cartesian_product<A: Clone>(per_agent: &[Vec<A>]) -> Vec<JointAction<A>> {
    let mut joints: Vec<Vec<A>> = vec![Vec::new()];
    for actions in per_agent {
        joints = joints
            .iter()
            .flat_map(|prefix| {
                actions.iter().map(move |a| {
                    let mut joint = prefix.clone();
                    joint.push(a.clone());
                    joint
                })
            })
            .collect();
    }
    joints.into_iter().map(JointAction).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cartesian_product_order() {
        let joints = cartesian_product(&[vec!['a', 'b'], vec!['x', 'y', 'z']]);
        assert_eq!(joints.len(), 6);
        assert_eq!(joints[0], JointAction(vec!['a', 'x']));
        assert_eq!(joints[2], JointAction(vec!['a', 'z']));
        assert_eq!(joints[3], JointAction(vec!['b', 'x']));
    }

    #[test]
    fn test_cartesian_product_with_an_idle_agent() {
        let joints = cartesian_product::<char>(&[vec!['a'], vec![]]);
        assert!(joints.is_empty());
    }
}
