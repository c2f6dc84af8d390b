#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays a scripted merge session and reports the outcome.

mod session;

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use merge_grid_core::config::GameConfig;

use crate::session::{Session, SessionPlan};

#[derive(Parser, Debug)]
#[command(name = "merge-grid", about = "Runs a scripted merge-board session")]
struct Args {
    /// TOML file overriding the default game configuration.
    #[arg(long, value_name = "path")]
    config: Option<PathBuf>,

    /// Seed for bot level selection.
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Rows of the bot block placed on board A.
    #[arg(long, default_value_t = 3)]
    bot_rows: u32,

    /// Columns of the bot block placed on board A.
    #[arg(long, default_value_t = 5)]
    bot_columns: u32,

    /// Knives recruited onto board B.
    #[arg(long, default_value_t = 8)]
    knives: u32,

    /// Guns recruited onto board B.
    #[arg(long, default_value_t = 4)]
    guns: u32,

    /// Maximum number of merge rounds.
    #[arg(long, default_value_t = 16)]
    rounds: u32,

    /// Swap the boards before reporting.
    #[arg(long)]
    swap: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<GameConfig> {
    let Some(path) = path else {
        return Ok(GameConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: GameConfig =
        toml::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

/// Entry point for the merge-grid command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = load_config(args.config.as_ref())?;
    let plan = SessionPlan {
        seed: args.seed,
        bot_rows: args.bot_rows,
        bot_columns: args.bot_columns,
        knives: args.knives,
        guns: args.guns,
        rounds: args.rounds,
        swap: args.swap,
    };
    info!("starting session with {plan:?}");

    let mut session = Session::new(&config).context("failed to build world")?;
    let summary = session.run(&plan);
    print!("{summary}");
    Ok(())
}
