//! StressLab CLI: scenario export and full validation runs.
//!
//! Commands:
//! - `scenarios`: generate the five standard scenarios and write one CSV each
//! - `validate`: run sweep, stress, Monte Carlo and walk-forward, print the
//!   Markdown report, and save artifacts
//! - `config`: print the default configuration as TOML

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stresslab_core::{strategies, Scenario, ScenarioGenerator};
use stresslab_runner::export::{export_series_csv, save_artifacts};
use stresslab_runner::{run_validation, ValidationConfig};

#[derive(Parser)]
#[command(
    name = "stresslab",
    about = "StressLab CLI: strategy robustness validation on synthetic markets"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the standard scenario set and write one CSV per scenario.
    Scenarios {
        /// Bars per scenario.
        #[arg(long, default_value_t = 200)]
        bars: usize,

        /// Seed for every regime. Defaults to the config seed (42).
        #[arg(long)]
        seed: Option<u64>,

        /// Path to a TOML config file supplying the `[scenarios]` section.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for the CSV files.
        #[arg(long, default_value = "scenarios")]
        output_dir: PathBuf,
    },
    /// Run the full validation pipeline.
    Validate {
        /// Path to a TOML config file. Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Strategy name: dual_ma, buy_and_hold. Overrides the config.
        #[arg(long)]
        strategy: Option<String>,

        /// Artifact directory. Overrides the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Evaluate units on the rayon pool.
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },
    /// Print the default configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scenarios {
            bars,
            seed,
            config,
            output_dir,
        } => run_scenarios(bars, seed, config.as_deref(), &output_dir),
        Commands::Validate {
            config,
            strategy,
            output_dir,
            parallel,
        } => run_validate(config.as_deref(), strategy, output_dir, parallel),
        Commands::Config => {
            let text = ValidationConfig::default().to_toml_string()?;
            print!("{text}");
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ValidationConfig> {
    match path {
        Some(p) => ValidationConfig::load(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(ValidationConfig::default()),
    }
}

fn write_scenarios<'a>(
    scenarios: impl IntoIterator<Item = &'a Scenario>,
    output_dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    for scenario in scenarios {
        let path = output_dir.join(format!("{}.csv", scenario.name));
        let csv = export_series_csv(&scenario.series)?;
        std::fs::write(&path, csv)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(scenario = %scenario.name, path = %path.display(), "wrote scenario");
    }
    Ok(())
}

fn run_scenarios(
    bars: usize,
    seed: Option<u64>,
    config_path: Option<&Path>,
    output_dir: &Path,
) -> Result<()> {
    if bars == 0 {
        bail!("--bars must be at least 1");
    }
    let mut config = load_config(config_path)?;
    if let Some(seed) = seed {
        config.scenarios.seed = seed;
    }
    let generator = ScenarioGenerator::new(config.scenarios)?;
    let scenarios = generator.standard_set(bars)?;
    write_scenarios(scenarios.values(), output_dir)?;

    println!("{:<18} {:>6} {:>12} {:>12}", "scenario", "bars", "first", "last");
    for s in scenarios.values() {
        let closes = s.series.closes();
        println!(
            "{:<18} {:>6} {:>12.2} {:>12.2}",
            s.name,
            closes.len(),
            closes.first().copied().unwrap_or_default(),
            closes.last().copied().unwrap_or_default()
        );
    }
    println!("Scenarios saved to: {}", output_dir.display());
    Ok(())
}

fn run_validate(
    config_path: Option<&Path>,
    strategy: Option<String>,
    output_dir: Option<PathBuf>,
    parallel: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(name) = strategy {
        config.run.strategy = name;
    }
    if output_dir.is_some() {
        config.run.output_dir = output_dir;
    }
    if parallel {
        config = config.with_parallelism(true);
    }

    let Some(factory) = strategies::factory(&config.run.strategy) else {
        let valid: Vec<&str> = strategies::registry().keys().copied().collect();
        bail!(
            "unknown strategy '{}'. Valid: {}",
            config.run.strategy,
            valid.join(", ")
        );
    };

    let run = run_validation(&config, factory)?;
    print!("{}", run.report.to_markdown());

    if let Some(dir) = &config.run.output_dir {
        let written = save_artifacts(&run, dir)?;
        if config.run.write_scenarios {
            write_scenarios(run.scenarios.values(), &dir.join("scenarios"))?;
        }
        println!();
        println!("Artifacts saved to: {} ({} files)", dir.display(), written.len());
    }
    Ok(())
}
