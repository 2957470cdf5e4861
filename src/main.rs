//! Headless runner for lattice automata.
//!
//! ```text
//! lattice_studio run --model reproducing_pairs --width 128 --height 96 --ticks 500 --png out.png
//! lattice_studio run --config runs/pairs.json --frames frames/ --frame-every 5
//! lattice_studio init-config runs/gas.json --model hpp_gas
//! lattice_studio models
//! ```
//!
//! Logging goes through `tracing`; set `RUST_LOG` or `--log-level` to
//! change verbosity.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lattice_core::{ModelKind, SimulationConfig, World};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Run lattice automata without a window
#[derive(Parser)]
#[command(name = "lattice_studio")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LATTICE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation for a number of ticks
    Run(RunArgs),

    /// Write a config file with default parameters
    InitConfig {
        /// Output path
        path: PathBuf,

        /// Model to configure
        #[arg(short, long, default_value = "reproducing_pairs")]
        model: ModelKind,
    },

    /// List the available models
    Models,
}

#[derive(Args)]
struct RunArgs {
    /// JSON config; the options below override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Model with default parameters
    #[arg(short, long)]
    model: Option<ModelKind>,

    #[arg(long)]
    width: Option<usize>,

    #[arg(long)]
    height: Option<usize>,

    /// Run seed (random when absent)
    #[arg(long)]
    seed: Option<u64>,

    /// Ticks to run
    #[arg(short, long, default_value_t = 100)]
    ticks: u64,

    /// Evaluate cells on one thread
    #[arg(long)]
    sequential: bool,

    /// Write the final frame as PNG
    #[arg(long, value_name = "FILE")]
    png: Option<PathBuf>,

    /// Frame directory for periodic PNG snapshots
    #[arg(long, value_name = "DIR")]
    frames: Option<PathBuf>,

    /// Ticks between periodic snapshots
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    frame_every: u64,

    /// Screen pixels per cell in written PNGs
    #[arg(long, default_value_t = 4)]
    pixel_size: u32,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::InitConfig { path, model } => init_config(&path, model),
        Commands::Models => {
            for name in ModelKind::NAMES {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}

fn resolve_config(args: &RunArgs) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SimulationConfig::default(),
    };

    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.sequential {
        config.parallel = false;
    }
    Ok(config)
}

fn run(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let mut world = config.build_world().context("Failed to build world")?;

    if let Some(dir) = &args.frames {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create frame directory {}", dir.display()))?;
        write_frame(&world, &dir.join(frame_name(0)), args.pixel_size)?;
    }

    let started = Instant::now();
    for _ in 0..args.ticks {
        let report = world.step()?;
        if report.events > 0 {
            debug!(tick = report.tick, events = report.events, "rule events");
        }
        if let Some(dir) = &args.frames {
            if world.tick() % args.frame_every == 0 {
                write_frame(&world, &dir.join(frame_name(world.tick())), args.pixel_size)?;
            }
        }
    }

    let counters = world.counters();
    info!(
        model = world.rule().name(),
        ticks = world.tick(),
        events = counters.events,
        absorbed = counters.absorbed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run finished"
    );

    if let Some(path) = &args.png {
        write_frame(&world, path, args.pixel_size)?;
    }

    println!(
        "{}: {} ticks, {} events, {} absorbed (seed {})",
        world.rule().name(),
        world.tick(),
        counters.events,
        counters.absorbed,
        world.seed()
    );
    Ok(())
}

fn frame_name(tick: u64) -> String {
    format!("frame_{:06}.png", tick)
}

fn write_frame(world: &World, path: &Path, pixel_size: u32) -> Result<()> {
    world
        .render()
        .save_png(path, pixel_size)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), tick = world.tick(), "frame written");
    Ok(())
}

fn init_config(path: &Path, model: ModelKind) -> Result<()> {
    let config = SimulationConfig {
        model,
        ..SimulationConfig::default()
    };
    config
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), model = config.model.name(), "config written");
    Ok(())
}
