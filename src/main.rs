mod config;
mod control;
mod core;
mod project;
mod render;
mod types;
mod ui;

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::FieldConfig;

/// Animated ball field: a clustered pseudo-3D body simulation that scatters
/// when the page scrolls past its threshold.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML file overriding any of the field constants.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of bodies.
    #[arg(long)]
    balls: Option<usize>,

    /// Seed for the body generator.
    #[arg(long)]
    seed: Option<u64>,

    /// Freeze the field in its first pose.
    #[arg(long)]
    reduced_motion: bool,

    /// Run this many frames offscreen and log a summary instead of opening the UI.
    #[arg(long, value_name = "FRAMES")]
    headless: Option<usize>,

    #[arg(long, default_value = config::DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

fn init_tracing(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn load_config(args: &Args) -> Result<FieldConfig> {
    let mut config = match &args.config {
        Some(path) => FieldConfig::from_yaml_path(path)?,
        None => FieldConfig::default(),
    };
    if let Some(count) = args.balls {
        config.count = count;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_file)?;
    let config = load_config(&args)?;
    tracing::info!(
        bodies = config.count,
        seed = ?config.seed,
        reduced_motion = args.reduced_motion,
        "starting ball field"
    );

    match args.headless {
        Some(frames) => {
            ui::run_headless(config, frames, args.reduced_motion)?;
            Ok(())
        }
        None => ui::run(config, args.reduced_motion),
    }
}
