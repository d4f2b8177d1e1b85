//! Demo: solving classic normal-form games and a repeated matching-pennies game
//!
//! Pass a JSON file holding a `MaValueIterationConfig` as the first
//! argument to override the planner settings.

use tracing_subscriber::EnvFilter;

use dynaplan_core::{load_config, IdentityHashing, Policy};
use dynaplan_domains::{NormalFormGame, Play, RepeatedGame, RoundsPlayed};
use dynaplan_games::{
    CoCoQBackup, CorrelatedQBackup, EquilibriumJointPolicy, MaValueIteration,
    MaValueIterationConfig, MaxQBackup, MinMaxQBackup, SgBackupOperator, SolutionConcept,
};

fn one_shot_values(
    game: &NormalFormGame,
    label: &str,
    operator: impl SgBackupOperator + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut planner = MaValueIteration::new(
        game.clone(),
        IdentityHashing,
        NormalFormGame::agents(),
        operator,
        MaValueIterationConfig::default(),
    )?;
    planner.plan_from_state(&Play::Start)?;
    println!(
        "  {:<12} row {:>7.3}  column {:>7.3}",
        label,
        planner.value(0, &Play::Start)?,
        planner.value(1, &Play::Start)?
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => load_config::<MaValueIterationConfig>(path)?,
        None => MaValueIterationConfig {
            gamma: 0.9,
            ..MaValueIterationConfig::default()
        },
    };

    for game in [
        NormalFormGame::matching_pennies(),
        NormalFormGame::prisoners_dilemma(),
        NormalFormGame::chicken(),
        NormalFormGame::rock_paper_scissors(),
    ] {
        println!("{}:", game.name());
        one_shot_values(&game, "max", MaxQBackup)?;
        one_shot_values(&game, "minmax", MinMaxQBackup)?;
        one_shot_values(&game, "coco", CoCoQBackup)?;
        one_shot_values(&game, "correlated", CorrelatedQBackup::default())?;
    }

    let repeated = RepeatedGame::new(NormalFormGame::matching_pennies(), 2)?;
    let mut planner = MaValueIteration::new(
        repeated,
        IdentityHashing,
        NormalFormGame::agents(),
        MinMaxQBackup,
        config,
    )?;
    if let Some(summary) = planner.plan_from_state(&RoundsPlayed(0))? {
        println!(
            "\nRepeated matching pennies: {} states, {} sweeps, row value {:.4}",
            planner.num_states(),
            summary.iterations,
            planner.value(0, &RoundsPlayed(0))?
        );
    }

    let policy = EquilibriumJointPolicy::new(&planner, SolutionConcept::MinMax).with_epsilon(0.1)?;
    for entry in policy.distribution(&RoundsPlayed(0))? {
        println!("  {:?}: {:.3}", entry.action.0, entry.probability);
    }

    Ok(())
}
