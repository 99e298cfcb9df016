#![forbid(unsafe_code)]

mod report;
mod scenario;
mod watch;

use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode, WriteLogger};
use spoor_grid::{Noise, SenseChannel, Smell, Touch, Vision};
use spoor_runtime::AlgorithmKind;
use spoor_senses::RippleMode;

use scenario::{ChannelName, Scenario};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AlgorithmArg {
    FloodFill,
    Ripple,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RippleModeArg {
    Tight,
    Regular,
    Loose,
    VeryLoose,
}

/// Runs a sense scenario and prints the composite field.
#[derive(Debug, Parser)]
#[command(name = "spoor", author, version, about, long_about = None)]
struct Cli {
    /// Scenario TOML with [sense], [[levels]] and [[sources]] tables.
    #[arg(long, value_name = "FILE")]
    scenario: PathBuf,
    /// Number of ticks to run before printing.
    #[arg(long, value_name = "N", default_value_t = 1)]
    ticks: u64,
    /// Overrides the scenario's propagation algorithm.
    #[arg(long, value_enum)]
    algorithm: Option<AlgorithmArg>,
    /// Overrides the scenario's ripple neighbour mode.
    #[arg(long = "ripple-mode", value_enum)]
    ripple_mode: Option<RippleModeArg>,
    /// Level to print.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    z: i32,
    /// Re-run whenever the scenario file changes.
    #[arg(long)]
    watch: bool,
    /// Also write debug logs to this file.
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Raise terminal log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    match &cli.log_file {
        Some(path) => {
            CombinedLogger::init(vec![
                TermLogger::new(
                    level,
                    simplelog::Config::default(),
                    TerminalMode::Mixed,
                    ColorChoice::Auto,
                ),
                WriteLogger::new(
                    level.max(LevelFilter::Debug),
                    simplelog::Config::default(),
                    File::create(path)?,
                ),
            ])?;
        }
        None => {
            let mut builder =
                env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
            if cli.verbose > 0 {
                builder.filter_level(level);
            }
            builder.try_init()?;
        }
    }
    Ok(())
}

fn apply_overrides(scenario: &mut Scenario, cli: &Cli) {
    if let Some(alg) = cli.algorithm {
        scenario.sense.algorithm = match alg {
            AlgorithmArg::FloodFill => AlgorithmKind::FloodFill,
            AlgorithmArg::Ripple => AlgorithmKind::Ripple,
        };
    }
    if let Some(mode) = cli.ripple_mode {
        scenario.sense.ripple_mode = match mode {
            RippleModeArg::Tight => RippleMode::Tight,
            RippleModeArg::Regular => RippleMode::Regular,
            RippleModeArg::Loose => RippleMode::Loose,
            RippleModeArg::VeryLoose => RippleMode::VeryLoose,
        };
    }
}

fn render<S: SenseChannel>(scenario: &Scenario, ticks: u64, z: i32) -> Result<String, Box<dyn Error>> {
    let sim = scenario.simulate::<S>(ticks)?;
    let rect = scenario.level(z).map(|l| l.rect()).unwrap_or_else(|| {
        sim.system
            .try_get_level(z)
            .map(|v| v.bounds())
            .unwrap_or_default()
    });
    let mut out = report::render_level(&sim.system, z, rect);
    out.push_str(&report::summary(&sim.last, &sim.system.stats()));
    Ok(out)
}

fn run_once(path: &Path, cli: &Cli) -> Result<(), Box<dyn Error>> {
    let mut scenario = Scenario::load(path)?;
    apply_overrides(&mut scenario, cli);
    log::info!(
        "{}: {} sources on {} levels, {} ticks",
        path.display(),
        scenario.sources.len(),
        scenario.levels.len(),
        cli.ticks
    );
    let out = match scenario.channel {
        ChannelName::Vision => render::<Vision>(&scenario, cli.ticks, cli.z)?,
        ChannelName::Smell => render::<Smell>(&scenario, cli.ticks, cli.z)?,
        ChannelName::Noise => render::<Noise>(&scenario, cli.ticks, cli.z)?,
        ChannelName::Touch => render::<Touch>(&scenario, cli.ticks, cli.z)?,
    };
    println!("{}", out);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    if !cli.watch {
        return run_once(&cli.scenario, &cli);
    }

    let (_watcher, rx) = watch::watch_file(&cli.scenario)?;
    loop {
        if let Err(e) = run_once(&cli.scenario, &cli) {
            log::error!("{}: {}", cli.scenario.display(), e);
        }
        log::info!("watching {} for changes", cli.scenario.display());
        if !watch::wait_for_change(&rx, Duration::from_millis(150)) {
            return Ok(());
        }
    }
}
