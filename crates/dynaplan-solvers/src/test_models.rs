//! Small models shared by the unit tests of this crate

use dynaplan_core::{Model, Outcome, Result, TransitionProb};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Forward,
    Stay,
}

/// States `0..=goal`; `Forward` advances, `Stay` idles, every step costs 1.
pub struct Chain {
    goal: u32,
    slip: f64,
    unmodeled: Option<Step>,
    broken: Option<Step>,
}

impl Chain {
    pub fn new(goal: u32) -> Self {
        Self {
            goal,
            slip: 0.0,
            unmodeled: None,
            broken: None,
        }
    }

    /// `Forward` fails and stays put with this probability
    pub fn with_slip(mut self, slip: f64) -> Self {
        self.slip = slip;
        self
    }

    pub fn with_unmodeled(mut self, step: Step) -> Self {
        self.unmodeled = Some(step);
        self
    }

    pub fn with_broken(mut self, step: Step) -> Self {
        self.broken = Some(step);
        self
    }
}

impl Model<u32, Step> for Chain {
    fn applicable_actions(&self, _state: &u32) -> Vec<Step> {
        vec![Step::Forward, Step::Stay]
    }

    fn transitions(&self, state: &u32, action: &Step) -> Result<Vec<TransitionProb<u32>>> {
        if self.broken == Some(*action) {
            return Ok(Vec::new());
        }
        let stay = TransitionProb::new(Outcome::new(*state, -1.0, false), 1.0);
        match action {
            Step::Stay => Ok(vec![stay]),
            Step::Forward => {
                let next = (*state + 1).min(self.goal);
                let advance = Outcome::new(next, -1.0, next == self.goal);
                if self.slip > 0.0 {
                    Ok(vec![
                        TransitionProb::new(advance, 1.0 - self.slip),
                        TransitionProb::new(stay.outcome, self.slip),
                    ])
                } else {
                    Ok(vec![TransitionProb::new(advance, 1.0)])
                }
            }
        }
    }

    fn is_terminal(&self, state: &u32) -> bool {
        *state >= self.goal
    }

    fn is_modeled(&self, _state: &u32, action: &Step) -> bool {
        self.unmodeled != Some(*action)
    }
}
