//! Shared helpers for the command line tool: logger setup and path handling.
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use mcl::dataset::{CONTROL_FILE, GROUND_TRUTH_FILE, MAP_FILE, OBSERVATION_DIR};

/// Crates whose records follow `--log-level`; everything else is capped at `warn`.
const LOG_MODULES: [&str; 2] = ["mcl", "mcl_sim"];

/// Parse a `--log-level` value, falling back to `info` on anything unrecognized.
pub fn parse_level(log_level: &str) -> log::LevelFilter {
    log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        log::LevelFilter::Info
    })
}

/// Initialize the logger.
///
/// `log_level` applies to the filter library and this tool. Dependencies log at `warn` at most, and
/// `RUST_LOG` directives take precedence over both.
///
/// # Errors
/// Returns an error if the log file cannot be opened or a logger is already installed.
pub fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<()> {
    use std::io::Write;

    let level = parse_level(log_level);
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.min(log::LevelFilter::Warn));
    for module in LOG_MODULES {
        builder.filter_module(module, level);
    }
    builder.parse_default_env();
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {:<5} {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        ensure_parent_dir(log_path)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("opening log file '{}'", log_path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    Ok(())
}

/// Check that `dir` is a directory laid out as a recorded data set.
pub fn validate_dataset_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("Data set path '{}' is not a directory.", dir.display());
    }
    for file in [MAP_FILE, CONTROL_FILE, GROUND_TRUTH_FILE] {
        if !dir.join(file).is_file() {
            bail!("Data set '{}' has no '{}'.", dir.display(), file);
        }
    }
    if !dir.join(OBSERVATION_DIR).is_dir() {
        bail!(
            "Data set '{}' has no '{}' directory.",
            dir.display(),
            OBSERVATION_DIR
        );
    }
    Ok(())
}

/// Create the parent directory of an output file if needed.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Non-empty lines of a recorded message log, one frame per line.
pub fn read_frames(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading message log '{}'", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}
