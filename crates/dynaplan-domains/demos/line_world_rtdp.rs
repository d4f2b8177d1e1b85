//! Demo: RTDP on a slippery line world
//!
//! Pass a JSON file holding an `RtdpConfig` as the first argument to
//! override the planner settings. Set `RUST_LOG=debug` to see every rollout.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use dynaplan_core::policy::FnPolicy;
use dynaplan_core::{load_config, rollout, Action, ActionProb, IdentityHashing, Model, Policy};
use dynaplan_domains::{LineWorld, LineWorldConfig, Position};
use dynaplan_solvers::{DynamicProgramming, DynamicProgrammingConfig, Rtdp, RtdpConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => load_config::<RtdpConfig>(path)?,
        None => RtdpConfig {
            seed: Some(42),
            ..RtdpConfig::default()
        },
    };

    let world = LineWorld::new(LineWorldConfig {
        length: 8,
        slip: 0.2,
        ..LineWorldConfig::default()
    })?;
    let dp = DynamicProgramming::new(world.clone(), IdentityHashing, DynamicProgrammingConfig { gamma: 0.95 })?;
    let mut rtdp = Rtdp::new(dp, config)?;

    let summary = rtdp.plan_from_state(&Position(0))?;
    println!(
        "Planned with {} rollouts, {} steps, {} Bellman updates (converged: {})",
        summary.rollouts, summary.total_steps, summary.bellman_updates, summary.converged
    );

    let greedy = rtdp.greedy_policy();
    for position in world.positions() {
        let best = if !world.is_terminal(&position) {
            format!("{:?}", greedy.distribution(&position)?[0].action)
        } else {
            "goal".to_string()
        };
        println!(
            "V({:>2}) = {:>8.4}  best: {}",
            position.0,
            rtdp.planner().value(&position),
            best
        );
    }

    // Walk the greedy policy through the model.
    let primitive = FnPolicy::new(|state: &Position| {
        greedy
            .distribution(state)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|ap| match ap.action {
                Action::Primitive(a) => Some(ActionProb::new(a, ap.probability)),
                Action::Extended(_) => None,
            })
            .collect()
    });
    let mut rng = StdRng::seed_from_u64(7);
    let trajectory = rollout(&world, &primitive, &Position(0), 100, &mut rng)?;
    println!(
        "\nGreedy walk: {} steps, return {:.2}, discounted return {:.4}",
        trajectory.len(),
        trajectory.total_reward,
        trajectory.discounted_return(0.95)
    );

    Ok(())
}
