//! End-to-end properties of the single-agent planners on the reference domains

use std::collections::HashMap;
use std::sync::Arc;

use approx::assert_relative_eq;

use dynaplan_core::policy::FnPolicy;
use dynaplan_core::{
    ActionProb, Action, ConstantValue, Discovery, IdentityHashing, Model, Outcome, Result,
    TransitionProb,
};
use dynaplan_domains::{Cell, Direction, GridWorld, LineWorld, LineWorldConfig, Move, Position};
use dynaplan_solvers::{
    DynamicProgramming, DynamicProgrammingConfig, Rtdp, RtdpConfig, StochasticTerminationOption,
    ValueIteration, ValueIterationConfig,
};

fn line_world(slip: f64) -> LineWorld {
    LineWorld::new(LineWorldConfig {
        slip,
        ..LineWorldConfig::default()
    })
    .unwrap()
}

fn engine<S, A, M>(model: M, gamma: f64) -> DynamicProgramming<S, A, M, IdentityHashing>
where
    S: Clone + std::fmt::Debug + Eq + std::hash::Hash + 'static,
    A: Clone + std::fmt::Debug + PartialEq + 'static,
    M: Model<S, A>,
{
    DynamicProgramming::new(model, IdentityHashing, DynamicProgrammingConfig { gamma }).unwrap()
}

fn solved_line_world(slip: f64, gamma: f64) -> ValueIteration<Position, Move, LineWorld, IdentityHashing> {
    let mut vi = ValueIteration::new(
        engine(line_world(slip), gamma),
        ValueIterationConfig {
            max_delta: 1e-12,
            max_iterations: 10_000,
        },
    )
    .unwrap();
    vi.plan_from_state(&Position(0)).unwrap();
    vi
}

#[test]
fn test_line_world_geometric_values() {
    let vi = solved_line_world(0.0, 0.95);
    let dp = vi.planner();
    assert_relative_eq!(dp.value(&Position(4)), 0.0);
    assert_relative_eq!(dp.value(&Position(3)), -1.0, epsilon = 1e-9);
    assert_relative_eq!(dp.value(&Position(2)), -1.95, epsilon = 1e-9);
    assert_relative_eq!(dp.value(&Position(1)), -2.8525, epsilon = 1e-9);
    assert_relative_eq!(dp.value(&Position(0)), -3.709_875, epsilon = 1e-9);
}

#[test]
fn test_terminal_states_stay_at_zero() {
    let mut dp = engine(line_world(0.0), 0.95).with_initializer(ConstantValue(10.0));
    assert_relative_eq!(dp.value(&Position(4)), 0.0);
    assert_relative_eq!(dp.backup(&Position(4)).unwrap(), 0.0);
    assert_relative_eq!(dp.value(&Position(4)), 0.0);
    // Moving left from 3 still looks better than reaching the goal.
    assert_relative_eq!(dp.backup(&Position(3)).unwrap(), -1.0 + 0.95 * 10.0);
    assert!(dp.has_computed_value(&Position(3)));
    assert!(!dp.has_computed_value(&Position(2)));
}

#[test]
fn test_reachability_from_known_seed_is_a_no_op() {
    let mut vi = ValueIteration::new(engine(line_world(0.0), 0.9), ValueIterationConfig::default()).unwrap();
    assert_eq!(vi.perform_reachability_from(&Position(0)).unwrap(), Discovery::Discovered(5));
    let before: Vec<Position> = vi.states().copied().collect();
    assert_eq!(vi.perform_reachability_from(&Position(3)).unwrap(), Discovery::AlreadyKnown);
    assert_eq!(vi.states().copied().collect::<Vec<_>>(), before);
    assert!(vi.plan_from_state(&Position(0)).unwrap().is_none());
}

/// Acyclic deterministic graph: state -> [(next, reward)]; 5 and 6 are sinks
struct Dag {
    edges: HashMap<u32, Vec<(u32, f64)>>,
}

impl Dag {
    fn new() -> Self {
        let edges = HashMap::from([
            (0, vec![(1, -1.0), (2, -4.0)]),
            (1, vec![(3, -2.0), (4, -1.0)]),
            (2, vec![(4, 0.0)]),
            (3, vec![(5, -3.0)]),
            (4, vec![(5, -5.0), (6, -1.5)]),
        ]);
        Self { edges }
    }

    /// Values computed directly in reverse topological order
    fn direct_values(&self, gamma: f64) -> HashMap<u32, f64> {
        let mut values = HashMap::from([(5, 0.0), (6, 0.0)]);
        for state in [4, 3, 2, 1, 0] {
            let best = self.edges[&state]
                .iter()
                .map(|(next, reward)| reward + gamma * values[next])
                .fold(f64::NEG_INFINITY, f64::max);
            values.insert(state, best);
        }
        values
    }
}

impl Model<u32, usize> for Dag {
    fn applicable_actions(&self, state: &u32) -> Vec<usize> {
        self.edges.get(state).map_or_else(Vec::new, |e| (0..e.len()).collect())
    }

    fn transitions(&self, state: &u32, action: &usize) -> Result<Vec<TransitionProb<u32>>> {
        let (next, reward) = self.edges[state][*action];
        Ok(vec![TransitionProb::new(
            Outcome::new(next, reward, self.is_terminal(&next)),
            1.0,
        )])
    }

    fn is_terminal(&self, state: &u32) -> bool {
        !self.edges.contains_key(state)
    }
}

#[test]
fn test_bellman_fixed_point_on_acyclic_model() {
    let gamma = 0.9;
    let expected = Dag::new().direct_values(gamma);
    let mut vi = ValueIteration::new(engine(Dag::new(), gamma), ValueIterationConfig::default()).unwrap();
    let summary = vi.plan_from_state(&0).unwrap().unwrap();
    assert!(summary.converged);
    for (state, value) in expected {
        assert_relative_eq!(vi.planner().value(&state), value, epsilon = 1e-12);
    }
}

#[test]
fn test_rtdp_values_decrease_monotonically_toward_optimum() {
    let gamma = 0.95;
    let optimum = solved_line_world(0.2, gamma);

    let mut rtdp = Rtdp::new(
        engine(line_world(0.2), gamma).with_initializer(ConstantValue(0.0)),
        RtdpConfig {
            num_rollouts: 1,
            max_depth: 200,
            seed: Some(11),
            ..RtdpConfig::default()
        },
    )
    .unwrap();

    let positions: Vec<Position> = line_world(0.2).positions().collect();
    let mut previous: Vec<f64> = positions.iter().map(|p| rtdp.planner().value(p)).collect();
    for _ in 0..300 {
        rtdp.rollout(&Position(0)).unwrap();
        for (i, position) in positions.iter().enumerate() {
            let value = rtdp.planner().value(position);
            assert!(value <= previous[i] + 1e-12, "{position:?} rose from {} to {value}", previous[i]);
            assert!(value >= optimum.planner().value(position) - 1e-9);
            previous[i] = value;
        }
    }
    assert_relative_eq!(
        rtdp.planner().value(&Position(0)),
        optimum.planner().value(&Position(0)),
        epsilon = 1e-3
    );
}

#[test]
fn test_option_compiles_to_geometric_termination() {
    let gamma = 0.9;
    let dp = engine(line_world(0.0), gamma);
    let run_right = StochasticTerminationOption::new(
        "run right",
        |_: &Position| true,
        |_: &Position| 0.5,
        FnPolicy::new(|_: &Position| vec![ActionProb::new(Move::Right, 1.0)]),
    );

    let compiled = dp.compile_option(&Position(0), &run_right).unwrap();
    assert_relative_eq!(compiled.coverage, 1.0, epsilon = 1e-12);
    assert_relative_eq!(
        compiled.outcomes.iter().map(|o| o.probability).sum::<f64>(),
        1.0,
        epsilon = 1e-12
    );

    let expected = [(1, 0.5), (2, 0.25), (3, 0.125), (4, 0.125)];
    for (cell, probability) in expected {
        let outcome = compiled
            .outcomes
            .iter()
            .find(|o| o.state == Position(cell))
            .unwrap();
        assert_relative_eq!(outcome.probability, probability, epsilon = 1e-12);
        assert_relative_eq!(outcome.discount, gamma.powi(cell as i32), epsilon = 1e-12);
        assert_eq!(outcome.terminal, cell == 4);
    }

    // Expected discounted reward over the four termination depths.
    let partial = |k: i32| -> f64 { -(0..k).map(|t| gamma.powi(t)).sum::<f64>() };
    let reward = 0.5 * partial(1) + 0.25 * partial(2) + 0.125 * partial(3) + 0.125 * partial(4);
    assert_relative_eq!(compiled.reward, reward, epsilon = 1e-12);
}

#[test]
fn test_room_exit_option_in_stochastic_grid() {
    let gamma = 0.95;
    let west_room = |cell: Cell| cell.x < 2;
    let door = Cell::new(2, 2);

    // Deterministic moves: four steps to the door from the corner.
    let dp = engine(GridWorld::two_rooms(1.0).unwrap(), gamma);
    let exit = GridWorld::room_exit_option("exit west room", west_room, door);
    let compiled = dp.compile_option(&Cell::new(0, 0), &exit).unwrap();
    assert_eq!(compiled.outcomes.len(), 1);
    assert_eq!(compiled.outcomes[0].state, door);
    assert_relative_eq!(compiled.outcomes[0].discount, gamma.powi(4), epsilon = 1e-12);
    assert_relative_eq!(
        compiled.reward,
        -(1.0 + gamma + gamma.powi(2) + gamma.powi(3)),
        epsilon = 1e-12
    );

    // Slippery moves: the termination distribution still sums to one.
    let dp = engine(GridWorld::two_rooms(0.8).unwrap(), gamma);
    let exit = GridWorld::room_exit_option("exit west room", west_room, door);
    for start in [Cell::new(0, 0), Cell::new(1, 4), Cell::new(0, 2)] {
        let compiled = dp.compile_option(&start, &exit).unwrap();
        assert_relative_eq!(
            compiled.outcomes.iter().map(|o| o.probability).sum::<f64>(),
            1.0,
            epsilon = 1e-9
        );
        assert!(compiled.outcomes.iter().all(|o| o.discount > 0.0 && o.discount <= gamma));
    }
}

#[test]
fn test_value_iteration_with_room_exit_option() {
    let gamma = 0.95;
    let world = GridWorld::two_rooms(1.0).unwrap();

    let mut primitive_only = ValueIteration::new(engine(world.clone(), gamma), ValueIterationConfig::default()).unwrap();
    primitive_only.plan_from_state(&Cell::new(0, 0)).unwrap();

    let mut dp = engine(world, gamma);
    dp.add_option(Arc::new(GridWorld::room_exit_option(
        "exit west room",
        |cell: Cell| cell.x < 2,
        Cell::new(2, 2),
    )));
    let mut with_option = ValueIteration::new(dp, ValueIterationConfig::default()).unwrap();
    with_option.plan_from_state(&Cell::new(0, 0)).unwrap();

    // The option follows a shortest path, so it cannot change optimal values.
    for cell in primitive_only.states() {
        assert_relative_eq!(
            with_option.planner().value(cell),
            primitive_only.planner().value(cell),
            epsilon = 1e-6
        );
    }
    let actions = with_option.planner().applicable_actions(&Cell::new(0, 0));
    assert!(actions.iter().any(|a| matches!(a, Action::Extended(_))));
    assert!(actions.contains(&Action::Primitive(Direction::North)));
}
