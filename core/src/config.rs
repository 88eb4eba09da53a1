//! Filter configuration.
//!
//! [`FilterConfig`] carries the scalar settings of a run: time step, sensor range, population size and the
//! noise standard deviations. It can be read from and written to JSON, YAML and TOML, and read from the
//! plain `KEY = value` text format used by the simulator setup files:
//!
//! ```text
//! TIMESTEP = 0.1
//! SENSOR_RANGE = 50
//! PARTICLES_NUMBER = 100
//! GPS_STD = 0.3, 0.3, 0.01
//! LANDMARK_STD = 0.3, 0.3
//! ```
//!
//! The scalar and array decoders used by the text format are public so that other text inputs (such as the
//! simulator messages) decode numbers the same way.
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{FilterError, Result};
use crate::geometry::{check_non_negative_std, check_positive_std};
use crate::particle::{AveragingStrategy, ParticleFilter, ResamplingStrategy};

fn default_time_step() -> f64 {
    0.1
}
fn default_sensor_range() -> f64 {
    50.0
}
fn default_particle_count() -> usize {
    100
}
fn default_position_std() -> [f64; 3] {
    [0.3, 0.3, 0.01]
}
fn default_landmark_std() -> [f64; 2] {
    [0.3, 0.3]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Time between steps in seconds
    #[serde(default = "default_time_step")]
    pub time_step: f64,

    /// Landmarks strictly closer than this (meters) are considered visible to a particle
    #[serde(default = "default_sensor_range")]
    pub sensor_range: f64,

    /// Fixed population size
    #[serde(default = "default_particle_count")]
    pub particle_count: usize,

    /// Initialization and process noise standard deviations: x (m), y (m), theta (rad)
    #[serde(default = "default_position_std")]
    pub position_std: [f64; 3],

    /// Landmark measurement standard deviations: x (m), y (m)
    #[serde(default = "default_landmark_std")]
    pub landmark_std: [f64; 2],

    #[serde(default)]
    pub resampling: ResamplingStrategy,

    #[serde(default)]
    pub averaging: AveragingStrategy,

    /// Seed for the filter's random source. Unset means a fresh seed per run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            time_step: default_time_step(),
            sensor_range: default_sensor_range(),
            particle_count: default_particle_count(),
            position_std: default_position_std(),
            landmark_std: default_landmark_std(),
            resampling: ResamplingStrategy::default(),
            averaging: AveragingStrategy::default(),
            seed: None,
        }
    }
}

impl FilterConfig {
    /// Check every setting the estimator would otherwise reject mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.particle_count == 0 {
            return Err(FilterError::InvalidParticleCount(0));
        }
        if !(self.time_step > 0.0 && self.time_step.is_finite()) {
            return Err(FilterError::InvalidTimeStep(self.time_step));
        }
        if !(self.sensor_range >= 0.0 && self.sensor_range.is_finite()) {
            return Err(FilterError::InvalidSensorRange(self.sensor_range));
        }
        check_non_negative_std("position_std_x", self.position_std[0])?;
        check_non_negative_std("position_std_y", self.position_std[1])?;
        check_non_negative_std("position_std_theta", self.position_std[2])?;
        check_positive_std("landmark_std_x", self.landmark_std[0])?;
        check_positive_std("landmark_std_y", self.landmark_std[1])?;
        Ok(())
    }

    /// Uninitialized filter with this configuration's strategies and seed.
    pub fn build_filter(&self) -> ParticleFilter {
        let filter = match self.seed {
            Some(seed) => ParticleFilter::with_seed(seed),
            None => ParticleFilter::new(),
        };
        filter.with_strategies(self.resampling, self.averaging)
    }

    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(|e| FilterError::Config(e.to_string()))
    }
    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(|e| FilterError::Config(e.to_string()))
    }
    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self).map_err(|e| FilterError::Config(e.to_string()))?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
    /// Read the configuration from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(file).map_err(|e| FilterError::Config(e.to_string()))
    }
    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self).map_err(|e| FilterError::Config(e.to_string()))?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
    /// Read the configuration from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut s = String::new();
        File::open(path)?.read_to_string(&mut s)?;
        toml::from_str(&s).map_err(|e| FilterError::Config(e.to_string()))
    }
    /// Read the legacy `KEY = value` text format.
    pub fn from_legacy<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut s = String::new();
        File::open(path)?.read_to_string(&mut s)?;
        Self::parse_legacy(&s)
    }
    /// Decode the legacy `KEY = value` text format, starting from the defaults.
    ///
    /// Blank lines and lines starting with `#` are skipped. `PORT` belongs to the message transport and is
    /// ignored; any other unknown key is ignored with a warning.
    pub fn parse_legacy(text: &str) -> Result<Self> {
        let mut config = FilterConfig::default();
        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = split_key_value(line).ok_or_else(|| {
                FilterError::Config(format!("line {}: expected `KEY = value`", number + 1))
            })?;
            match key {
                "TIMESTEP" => config.time_step = parse_scalar(value)?,
                "SENSOR_RANGE" => config.sensor_range = parse_scalar(value)?,
                "PARTICLES_NUMBER" => config.particle_count = parse_count(value)?,
                "GPS_STD" => config.position_std = parse_fixed_array(value)?,
                "LANDMARK_STD" => config.landmark_std = parse_fixed_array(value)?,
                "SEED" => config.seed = Some(parse_count(value)? as u64),
                "PORT" => debug!("Ignoring transport setting PORT = {}", value),
                other => warn!("Ignoring unknown configuration key '{}'", other),
            }
        }
        Ok(config)
    }

    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(FilterError::Config(format!(
                "unsupported configuration file extension: '{}'",
                p.display()
            ))),
        }
    }
    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml, .txt/.cfg for the legacy
    /// format)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            Some("txt") | Some("cfg") => Self::from_legacy(p),
            _ => Err(FilterError::Config(format!(
                "unsupported configuration file extension: '{}'",
                p.display()
            ))),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = match line.split_once('=') {
        Some(pair) => pair,
        None => line.split_once(char::is_whitespace)?,
    };
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        None
    } else {
        Some((key, value))
    }
}

/// Decode one real number, surrounding whitespace allowed.
pub fn parse_scalar(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    trimmed
        .parse::<f64>()
        .map_err(|e| FilterError::Config(format!("invalid number '{}': {}", trimmed, e)))
}

fn parse_count(text: &str) -> Result<usize> {
    let trimmed = text.trim();
    trimmed
        .parse::<usize>()
        .map_err(|e| FilterError::Config(format!("invalid count '{}': {}", trimmed, e)))
}

/// Decode a list of real numbers separated by commas and/or whitespace.
pub fn parse_array(text: &str) -> Result<Vec<f64>> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(parse_scalar)
        .collect()
}

fn parse_fixed_array<const N: usize>(text: &str) -> Result<[f64; N]> {
    let values = parse_array(text)?;
    let len = values.len();
    values.try_into().map_err(|_| {
        FilterError::Config(format!("expected {} values in '{}', found {}", N, text, len))
    })
}
