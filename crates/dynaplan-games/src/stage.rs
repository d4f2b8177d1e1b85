//! Stage games: the per-state Q tables a game backup operator works on

use ndarray::Array2;

use dynaplan_core::{PlanningError, Result};

/// Q-values of every agent for every joint action in one state
///
/// Joint actions are indexed with the first agent's action varying
/// slowest, matching [`crate::joint::cartesian_product`].
#[derive(Debug, Clone, PartialEq)]
pub struct StageGame {
    action_counts: Vec<usize>,
    q: Vec<Vec<f64>>,
}

impl StageGame {
    /// Create a stage game from per-agent action counts and per-agent Q rows
    pub fn new(action_counts: Vec<usize>, q: Vec<Vec<f64>>) -> Result<Self> {
        if action_counts.len() != q.len() {
            return Err(PlanningError::AgentCount {
                expected: action_counts.len(),
                actual: q.len(),
            });
        }
        let joint: usize = action_counts.iter().product();
        if joint == 0 {
            return Err(PlanningError::Model("an agent has no applicable actions".to_string()));
        }
        if let Some(row) = q.iter().find(|row| row.len() != joint) {
            return Err(PlanningError::Model(format!(
                "expected {joint} joint Q-values per agent, got {}",
                row.len()
            )));
        }
        Ok(Self { action_counts, q })
    }

    /// Two-agent stage game from payoff matrices indexed `[row action][column action]`
    pub fn from_matrices(row_q: &Array2<f64>, col_q: &Array2<f64>) -> Result<Self> {
        if row_q.dim() != col_q.dim() {
            return Err(PlanningError::Model("payoff matrices differ in shape".to_string()));
        }
        let (rows, cols) = row_q.dim();
        Self::new(
            vec![rows, cols],
            vec![row_q.iter().copied().collect(), col_q.iter().copied().collect()],
        )
    }

    /// Number of agents
    #[must_use]
    pub fn num_agents(&self) -> usize {
        self.action_counts.len()
    }

    /// Number of actions of each agent
    #[must_use]
    pub fn action_counts(&self) -> &[usize] {
        &self.action_counts
    }

    /// Number of joint actions
    #[must_use]
    pub fn num_joint_actions(&self) -> usize {
        self.action_counts.iter().product()
    }

    /// Q-values of an agent over all joint actions
    pub fn q(&self, agent: usize) -> Result<&[f64]> {
        self.q.get(agent).map(Vec::as_slice).ok_or(PlanningError::AgentCount {
            expected: agent + 1,
            actual: self.num_agents(),
        })
    }

    /// Joint index of per-agent action indices
    #[must_use]
    pub fn joint_index(&self, indices: &[usize]) -> usize {
        indices
            .iter()
            .zip(&self.action_counts)
            .fold(0, |acc, (i, n)| acc * n + i)
    }

    /// Largest Q-value of an agent
    pub fn max_q(&self, agent: usize) -> Result<f64> {
        Ok(self.q(agent)?.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }

    /// Fail unless exactly two agents take part
    pub fn require_two_agents(&self) -> Result<()> {
        if self.num_agents() == 2 {
            Ok(())
        } else {
            Err(PlanningError::AgentCount {
                expected: 2,
                actual: self.num_agents(),
            })
        }
    }

    /// Payoff matrix of `agent` with `row_agent`'s actions as rows
    pub fn payoff_matrix(&self, agent: usize, row_agent: usize) -> Result<Array2<f64>> {
        self.require_two_agents()?;
        if row_agent > 1 {
            return Err(PlanningError::AgentCount {
                expected: 2,
                actual: row_agent + 1,
            });
        }
        let q = self.q(agent)?;
        let col_agent = 1 - row_agent;
        let (rows, cols) = (self.action_counts[row_agent], self.action_counts[col_agent]);
        Ok(Array2::from_shape_fn((rows, cols), |(i, j)| {
            let mut indices = [0; 2];
            indices[row_agent] = i;
            indices[col_agent] = j;
            q[self.joint_index(&indices)]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_payoff_matrix_orientation() {
        let row = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let col = array![[-1.0, -2.0, -3.0], [-4.0, -5.0, -6.0]];
        let stage = StageGame::from_matrices(&row, &col).unwrap();

        assert_eq!(stage.num_joint_actions(), 6);
        assert_eq!(stage.joint_index(&[1, 2]), 5);
        assert_eq!(stage.payoff_matrix(0, 0).unwrap(), row);
        assert_eq!(stage.payoff_matrix(1, 1).unwrap(), col.t().to_owned());
        assert_eq!(stage.max_q(1).unwrap(), -1.0);
    }

    #[test]
    fn test_shape_validation() {
        assert!(StageGame::new(vec![2, 2], vec![vec![0.0; 4]]).is_err());
        assert!(StageGame::new(vec![2, 2], vec![vec![0.0; 4], vec![0.0; 3]]).is_err());
        let three = StageGame::new(vec![1, 1, 1], vec![vec![0.0]; 3]).unwrap();
        assert!(matches!(
            three.payoff_matrix(0, 0),
            Err(PlanningError::AgentCount { expected: 2, actual: 3 })
        ));
    }
}
