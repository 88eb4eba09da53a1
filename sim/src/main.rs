//! MCL SIM: replay tool for the Monte Carlo localization filter.
//!
//! The tool operates in three modes:
//!
//! - `run`: replays a recorded data set (map, controls, ground truth and per-step observations) through the
//!   filter and reports the error of the estimate against ground truth. Per-step results can be written to
//!   CSV.
//! - `replay`: feeds a recorded simulator message log, one frame per line, through the filter and writes the
//!   frames the filter answers with.
//! - `config`: writes a template configuration file (TOML/JSON/YAML, chosen by extension).
//!
//! Filter settings come from a configuration file (`--config`, any supported format including the legacy
//! `KEY = value` text) with selected values overridable on the command line.
mod common;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use common::{ensure_parent_dir, init_logger, read_frames, validate_dataset_dir};
use log::{error, info, warn};
use std::io::Write;
use std::path::PathBuf;

use mcl::config::FilterConfig;
use mcl::dataset::Dataset;
use mcl::map::Map;
use mcl::particle::{AveragingStrategy, ResamplingStrategy};
use mcl::sim::{FilterDriver, run_dataset};

const LONG_ABOUT: &str = "MCL SIM: a replay tool for Monte Carlo localization of a planar vehicle.

- run: replay a recorded data set directory (map_data.txt, control_data.txt, gt_data.txt and
  observation/observations_NNNNNN.txt) and score the estimate against ground truth.

- replay: feed a recorded simulator message log (one frame per line) through the filter and
  write the best-particle replies.

- config: write a template configuration file.";

/// Command line arguments
#[derive(Parser)]
#[command(
    author,
    version,
    about = "Replay tool for the Monte Carlo localization filter.",
    long_about = LONG_ABOUT
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        name = "run",
        about = "Replay a recorded data set and score it against ground truth"
    )]
    Run(RunArgs),
    #[command(
        name = "replay",
        about = "Feed a simulator message log through the filter"
    )]
    Replay(ReplayArgs),
    #[command(name = "config", about = "Generate a template configuration file")]
    CreateConfig(CreateConfigArgs),
}

/// Filter settings shared by the replay modes
#[derive(Args, Clone, Debug, Default)]
struct FilterArgs {
    /// Configuration file (.toml/.json/.yaml/.yml, or .txt/.cfg in `KEY = value` form)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Random seed, overrides the configuration file
    #[arg(long)]
    seed: Option<u64>,

    /// Number of particles, overrides the configuration file
    #[arg(long)]
    particles: Option<usize>,

    /// Resampling strategy, overrides the configuration file
    #[arg(long, value_enum)]
    resampling: Option<ResamplingStrategy>,

    /// Point estimate strategy, overrides the configuration file
    #[arg(long, value_enum)]
    averaging: Option<AveragingStrategy>,
}
impl FilterArgs {
    fn load(&self) -> Result<FilterConfig> {
        let mut config = match &self.config {
            Some(path) => FilterConfig::from_file(path)
                .with_context(|| format!("loading configuration '{}'", path.display()))?,
            None => FilterConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(particles) = self.particles {
            config.particle_count = particles;
        }
        if let Some(resampling) = self.resampling {
            config.resampling = resampling;
        }
        if let Some(averaging) = self.averaging {
            config.averaging = averaging;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// Data set directory
    #[arg(short, long)]
    data: PathBuf,

    /// Per-step results CSV
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    filter: FilterArgs,
}

#[derive(Args, Clone, Debug)]
struct ReplayArgs {
    /// Message log, one frame per line
    #[arg(short, long)]
    messages: PathBuf,

    /// Landmark map (`x y id` per line)
    #[arg(long, default_value = "data/map_data.txt")]
    map: PathBuf,

    /// File receiving the reply frames, one per line (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    filter: FilterArgs,
}

#[derive(Args, Clone, Debug)]
struct CreateConfigArgs {
    /// Output file, format chosen by extension (.toml/.json/.yaml/.yml)
    #[arg(short, long)]
    output: PathBuf,
}

fn run(args: &RunArgs) -> Result<()> {
    validate_dataset_dir(&args.data)?;
    let config = args.filter.load()?;
    let dataset = Dataset::load(&args.data)
        .with_context(|| format!("loading data set '{}'", args.data.display()))?;
    info!(
        "Loaded {} steps and {} landmarks from {}",
        dataset.len(),
        dataset.map.len(),
        args.data.display()
    );
    let result = run_dataset(&config, &dataset)?;
    let mean = result.mean_error();
    let max = result.max_error();
    println!("steps: {}", result.len());
    println!(
        "mean error: x {:.4} m, y {:.4} m, yaw {:.4} rad",
        mean.x, mean.y, mean.theta
    );
    println!(
        "max error:  x {:.4} m, y {:.4} m, yaw {:.4} rad",
        max.x, max.y, max.theta
    );
    if let Some(output) = &args.output {
        ensure_parent_dir(output)?;
        result
            .to_csv(output)
            .with_context(|| format!("writing results to '{}'", output.display()))?;
        info!("Results written to {}", output.display());
    }
    Ok(())
}

fn replay(args: &ReplayArgs) -> Result<()> {
    let config = args.filter.load()?;
    let map = Map::from_file(&args.map)
        .with_context(|| format!("loading map '{}'", args.map.display()))?;
    let frames = read_frames(&args.messages)?;
    let mut driver = FilterDriver::new(config, map)?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => {
            ensure_parent_dir(path)?;
            Box::new(std::fs::File::create(path)?)
        }
        None => Box::new(std::io::stdout().lock()),
    };
    let mut replies = 0;
    for (line, frame) in frames.iter().enumerate() {
        match driver.handle_frame(frame) {
            Ok(Some(reply)) => {
                writeln!(out, "{}", reply)?;
                replies += 1;
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping frame on line {}: {}", line + 1, e),
        }
    }
    out.flush()?;
    info!("Answered {} of {} frames", replies, frames.len());
    Ok(())
}

fn create_config_file(args: &CreateConfigArgs) -> Result<()> {
    ensure_parent_dir(&args.output)?;
    FilterConfig::default()
        .to_file(&args.output)
        .with_context(|| format!("writing configuration '{}'", args.output.display()))?;
    println!("Template configuration written to {}", args.output.display());
    Ok(())
}

fn dispatch(command: &Command) -> Result<()> {
    match command {
        Command::Run(args) => {
            info!("Replaying data set {}", args.data.display());
            run(args)
        }
        Command::Replay(args) => {
            info!("Replaying message log {}", args.messages.display());
            replay(args)
        }
        Command::CreateConfig(args) => create_config_file(args),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_file.as_ref())?;
    dispatch(&cli.command).inspect_err(|e| error!("{:#}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "mcl-sim",
            "--log-level",
            "debug",
            "run",
            "--data",
            "data",
            "--seed",
            "7",
            "--resampling",
            "systematic",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.data, PathBuf::from("data"));
                assert_eq!(args.filter.seed, Some(7));
                assert_eq!(args.filter.resampling, Some(ResamplingStrategy::Systematic));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_requires_a_command() {
        assert!(Cli::try_parse_from(["mcl-sim"]).is_err());
    }

    #[test]
    fn test_filter_args_override_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filter.txt");
        fs::write(&path, "PARTICLES_NUMBER = 30\nTIMESTEP = 0.2\n").unwrap();
        let args = FilterArgs {
            config: Some(path),
            particles: Some(12),
            averaging: Some(AveragingStrategy::WeightedAverage),
            ..Default::default()
        };
        let config = args.load().unwrap();
        assert_eq!(config.particle_count, 12);
        assert_eq!(config.time_step, 0.2);
        assert_eq!(config.averaging, AveragingStrategy::WeightedAverage);
    }

    #[test]
    fn test_filter_args_reject_invalid_override() {
        let args = FilterArgs {
            particles: Some(0),
            ..Default::default()
        };
        assert!(args.load().is_err());
    }

    #[test]
    fn test_create_config_file() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("configs").join("filter.toml");
        create_config_file(&CreateConfigArgs {
            output: output.clone(),
        })
        .unwrap();
        assert_eq!(
            FilterConfig::from_file(&output).unwrap(),
            FilterConfig::default()
        );
    }

    #[test]
    fn test_replay_writes_replies() {
        let dir = tempdir().unwrap();
        let map = dir.path().join("map_data.txt");
        fs::write(&map, "10 0 1\n0 10 2\n").unwrap();
        let messages = dir.path().join("session.log");
        fs::write(
            &messages,
            concat!(
                "0{\"sid\":\"x\"}\n",
                "42[\"telemetry\",null]\n",
                "42[\"telemetry\",{\"sense_x\":\"0\",\"sense_y\":\"0\",\"sense_theta\":\"0\",",
                "\"sense_observations_x\":\"10\",\"sense_observations_y\":\"0\"}]\n",
                "42[\"telemetry\",{\"sense_x\":\"oops\"}]\n",
            ),
        )
        .unwrap();
        let output = dir.path().join("replies.log");
        replay(&ReplayArgs {
            messages,
            map,
            output: Some(output.clone()),
            filter: FilterArgs {
                seed: Some(1),
                particles: Some(10),
                ..Default::default()
            },
        })
        .unwrap();
        let replies = read_frames(&output).unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], "42[\"manual\",{}]");
        assert!(replies[1].starts_with("42[\"best_particle\""));
    }
}
