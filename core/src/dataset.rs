//! Recorded data sets.
//!
//! A data set directory holds whitespace separated text files without headers:
//! - `map_data.txt`: one landmark per line, `x y id`
//! - `control_data.txt`: one control per step, `velocity yaw_rate`
//! - `gt_data.txt`: one ground truth pose per step, `x y theta`
//! - `observation/observations_NNNNNN.txt`: one file per step (1-based, zero padded to six digits), each line
//!   a landmark detection `x y` in the vehicle frame
//!
//! The files are tokenized on any run of whitespace and decoded with the `csv` crate so that every row is
//! deserialized into its typed record.
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::{FilterError, Result};
use crate::map::Map;
use crate::observation::Observation;
use crate::{ControlInput, Pose};

pub const MAP_FILE: &str = "map_data.txt";
pub const CONTROL_FILE: &str = "control_data.txt";
pub const GROUND_TRUTH_FILE: &str = "gt_data.txt";
pub const OBSERVATION_DIR: &str = "observation";

/// Parse whitespace separated rows into typed records, skipping blank lines.
pub fn parse_whitespace_records<T: DeserializeOwned>(content: &str) -> Result<Vec<T>> {
    let normalized = content
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .from_reader(normalized.as_bytes());
    let mut records = Vec::new();
    for result in reader.deserialize() {
        let record: T = result?;
        records.push(record);
    }
    Ok(records)
}

/// Read a whitespace separated text file into typed records.
pub fn read_whitespace_records<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)?;
    parse_whitespace_records(&content)
}

pub fn read_controls<P: AsRef<Path>>(path: P) -> Result<Vec<ControlInput>> {
    read_whitespace_records(path)
}

pub fn read_ground_truth<P: AsRef<Path>>(path: P) -> Result<Vec<Pose>> {
    read_whitespace_records(path)
}

pub fn read_observations<P: AsRef<Path>>(path: P) -> Result<Vec<Observation>> {
    let rows: Vec<(f64, f64)> = read_whitespace_records(path)?;
    Ok(rows.into_iter().map(Observation::from).collect())
}

/// Observation file name for the zero-based `step`.
pub fn observation_file_name(step: usize) -> String {
    format!("observations_{:06}.txt", step + 1)
}

/// A complete recorded run.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub map: Map,
    pub controls: Vec<ControlInput>,
    pub ground_truth: Vec<Pose>,
    /// Vehicle-frame detections, one list per step
    pub observations: Vec<Vec<Observation>>,
}
impl Dataset {
    /// Load a data set directory laid out as described in the module documentation.
    ///
    /// # Errors
    /// I/O and parse errors from the individual files, and [`FilterError::Data`] when the number of controls
    /// does not match the number of ground truth poses.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let map = Map::from_file(dir.join(MAP_FILE))?;
        let controls = read_controls(dir.join(CONTROL_FILE))?;
        let ground_truth = read_ground_truth(dir.join(GROUND_TRUTH_FILE))?;
        if controls.len() != ground_truth.len() {
            return Err(FilterError::Data(format!(
                "{} controls but {} ground truth poses in '{}'",
                controls.len(),
                ground_truth.len(),
                dir.display()
            )));
        }
        let observation_dir = dir.join(OBSERVATION_DIR);
        let observations = (0..ground_truth.len())
            .map(|step| read_observations(observation_dir.join(observation_file_name(step))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Dataset {
            map,
            controls,
            ground_truth,
            observations,
        })
    }
    /// Number of time steps
    pub fn len(&self) -> usize {
        self.ground_truth.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ground_truth.is_empty()
    }
}
