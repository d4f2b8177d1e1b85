//! Breadth-first state discovery shared by the sweeping planners

use std::collections::VecDeque;
use std::hash::Hash;

use indexmap::IndexMap;

use crate::Result;

/// Result of a reachability pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// The seed state was already known; nothing was explored
    AlreadyKnown,
    /// The pass ran and added this many states, including the seed
    Discovered(usize),
}

impl Discovery {
    /// Whether the pass found anything new
    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Discovered(_))
    }
}

/// Discover every state reachable from `seed`, appending new states to
/// `known` in breadth-first order
///
/// `successors` lists the states one step away; callers return an empty
/// list for states that must not be expanded, such as terminal states.
pub fn discover_reachable<S, H, FH, FS>(
    known: &mut IndexMap<H, S>,
    seed: &S,
    hash: FH,
    mut successors: FS,
) -> Result<Discovery>
where
    S: Clone,
    H: Eq + Hash,
    FH: Fn(&S) -> H,
    FS: FnMut(&S) -> Result<Vec<S>>,
{
    let seed_handle = hash(seed);
    if known.contains_key(&seed_handle) {
        return Ok(Discovery::AlreadyKnown);
    }

    let before = known.len();
    known.insert(seed_handle, seed.clone());
    let mut frontier = VecDeque::from([seed.clone()]);

    while let Some(state) = frontier.pop_front() {
        for next in successors(&state)? {
            let handle = hash(&next);
            if !known.contains_key(&handle) {
                known.insert(handle, next.clone());
                frontier.push_back(next);
            }
        }
    }

    Ok(Discovery::Discovered(known.len() - before))
}
