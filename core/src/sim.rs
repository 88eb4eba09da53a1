//! Running the filter end to end.
//!
//! This module provides:
//! - [`FilterDriver`], which owns a configured filter and a map and runs one full filter step per input,
//!   either from typed inputs ([`FilterDriver::step`]) or from simulator frames
//!   ([`FilterDriver::handle_frame`])
//! - [`run_dataset`], which replays a recorded [`Dataset`] and scores the estimate against ground truth
//! - [`NavigationResult`] for storing the per-step estimates and exporting them to CSV
use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::FilterConfig;
use crate::dataset::Dataset;
use crate::error::{FilterError, Result};
use crate::geometry::pose_error;
use crate::map::Map;
use crate::messages::{
    BestParticleMessage, EVENT_PREFIX, MANUAL_FRAME, TELEMETRY_EVENT, TelemetryMessage,
    decode_event, extract_payload,
};
use crate::observation::Observation;
use crate::particle::{Particle, ParticleFilter};
use crate::{ControlInput, Pose};

/// Inputs of one filter step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepInput {
    /// Noisy absolute pose, only used to initialize the filter on the first step
    pub gps: Pose,
    /// Control applied between the previous step and this one
    pub previous_control: ControlInput,
    /// Vehicle-frame landmark detections
    pub observations: Vec<Observation>,
}
impl TryFrom<&TelemetryMessage> for StepInput {
    type Error = FilterError;
    fn try_from(msg: &TelemetryMessage) -> Result<Self> {
        Ok(StepInput {
            gps: msg.gps()?,
            previous_control: msg.control()?,
            observations: msg.observations()?,
        })
    }
}

/// Result of one filter step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutput {
    /// Heaviest particle after resampling, with its debug annotations
    pub best: Particle,
    /// Point estimate according to the configured averaging strategy
    pub estimate: Pose,
    pub effective_sample_size: f64,
}

/// A filter bound to its configuration and map.
#[derive(Debug)]
pub struct FilterDriver {
    config: FilterConfig,
    map: Map,
    filter: ParticleFilter,
}
impl FilterDriver {
    /// # Errors
    /// Any configuration error reported by [`FilterConfig::validate`].
    pub fn new(config: FilterConfig, map: Map) -> Result<Self> {
        config.validate()?;
        let filter = config.build_filter();
        Ok(FilterDriver {
            config,
            map,
            filter,
        })
    }
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
    pub fn map(&self) -> &Map {
        &self.map
    }
    pub fn filter(&self) -> &ParticleFilter {
        &self.filter
    }

    /// Run one step: initialize from the GPS pose on the first call, otherwise predict with the previous
    /// control, then weight, resample and report the best particle.
    pub fn step(&mut self, input: &StepInput) -> Result<StepOutput> {
        let config = &self.config;
        if !self.filter.is_initialized() {
            self.filter.init(
                config.particle_count,
                input.gps.x,
                input.gps.y,
                input.gps.theta,
                &config.position_std,
            )?;
        } else {
            self.filter.predict(
                config.time_step,
                &config.position_std,
                input.previous_control.velocity,
                input.previous_control.yaw_rate,
            )?;
        }
        self.filter.update_weights(
            config.sensor_range,
            &config.landmark_std,
            &input.observations,
            &self.map,
        )?;
        let effective_sample_size = self.filter.effective_sample_size();
        self.filter.resample()?;
        Ok(StepOutput {
            best: self.filter.best_particle()?,
            estimate: self.filter.estimate()?,
            effective_sample_size,
        })
    }

    /// Answer one simulator frame.
    ///
    /// Telemetry frames run a step and are answered with the best particle. Frames without data are
    /// answered with [`MANUAL_FRAME`]. Anything else gets no reply.
    pub fn handle_frame(&mut self, frame: &str) -> Result<Option<String>> {
        if !frame.starts_with(EVENT_PREFIX) {
            return Ok(None);
        }
        if extract_payload(frame).is_none() {
            return Ok(Some(MANUAL_FRAME.to_string()));
        }
        let Some((event, payload)) = decode_event(frame)? else {
            return Ok(None);
        };
        if event != TELEMETRY_EVENT {
            debug!("Ignoring '{}' event", event);
            return Ok(None);
        }
        let telemetry: TelemetryMessage = serde_json::from_value(payload)?;
        let output = self.step(&StepInput::try_from(&telemetry)?)?;
        BestParticleMessage::from(&output.best).to_frame().map(Some)
    }
}

/// One replayed step scored against ground truth.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationRecord {
    pub step: usize,
    pub truth_x: f64,
    pub truth_y: f64,
    pub truth_theta: f64,
    pub estimate_x: f64,
    pub estimate_y: f64,
    pub estimate_theta: f64,
    pub error_x: f64,
    pub error_y: f64,
    pub error_theta: f64,
    /// Effective sample size before resampling
    pub effective_sample_size: f64,
}
impl NavigationRecord {
    pub fn new(step: usize, truth: &Pose, estimate: &Pose, effective_sample_size: f64) -> Self {
        let error = pose_error(truth, estimate);
        NavigationRecord {
            step,
            truth_x: truth.x,
            truth_y: truth.y,
            truth_theta: truth.theta,
            estimate_x: estimate.x,
            estimate_y: estimate.y,
            estimate_theta: estimate.theta,
            error_x: error.x,
            error_y: error.y,
            error_theta: error.theta,
            effective_sample_size,
        }
    }
    pub fn error(&self) -> Pose {
        Pose::new(self.error_x, self.error_y, self.error_theta)
    }
}

/// Per-step estimates of a replayed run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NavigationResult {
    pub name: String,
    pub records: Vec<NavigationRecord>,
}
impl NavigationResult {
    pub fn new(name: &str) -> Self {
        NavigationResult {
            name: name.to_string(),
            records: Vec::new(),
        }
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    /// Mean absolute error per component, zero for an empty result.
    pub fn mean_error(&self) -> Pose {
        if self.records.is_empty() {
            return Pose::default();
        }
        let n = self.records.len() as f64;
        let sum = self.records.iter().fold(Pose::default(), |acc, r| {
            Pose::new(acc.x + r.error_x, acc.y + r.error_y, acc.theta + r.error_theta)
        });
        Pose::new(sum.x / n, sum.y / n, sum.theta / n)
    }
    /// Largest absolute error per component, zero for an empty result.
    pub fn max_error(&self) -> Pose {
        self.records.iter().fold(Pose::default(), |acc, r| {
            Pose::new(
                acc.x.max(r.error_x),
                acc.y.max(r.error_y),
                acc.theta.max(r.error_theta),
            )
        })
    }
    /// Write the records to a CSV file with a header row.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
    /// Read records written by [`NavigationResult::to_csv`].
    pub fn from_csv<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<NavigationRecord>, _>>()?;
        Ok(NavigationResult {
            name: name.to_string(),
            records,
        })
    }
}

/// Replay a recorded data set through the filter.
///
/// The first step initializes from the first ground truth pose perturbed with the configured position noise,
/// standing in for the GPS fix. Step `i > 0` predicts with control `i - 1`.
///
/// # Errors
/// Configuration errors, and [`FilterError::Data`] for an empty data set.
pub fn run_dataset(config: &FilterConfig, dataset: &Dataset) -> Result<NavigationResult> {
    if dataset.is_empty() {
        return Err(FilterError::Data("data set has no steps".to_string()));
    }
    let mut driver = FilterDriver::new(config.clone(), dataset.map.clone())?;
    let mut gps_rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_os_rng(),
    };
    let gps_noise = config
        .position_std
        .iter()
        .map(|&std| {
            Normal::new(0.0, std).map_err(|_| FilterError::InvalidStdDev {
                name: "position_std",
                value: std,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let start = &dataset.ground_truth[0];
    let gps = Pose::new(
        start.x + gps_noise[0].sample(&mut gps_rng),
        start.y + gps_noise[1].sample(&mut gps_rng),
        start.theta + gps_noise[2].sample(&mut gps_rng),
    );
    info!(
        "Replaying {} steps with {} particles over {} landmarks",
        dataset.len(),
        config.particle_count,
        dataset.map.len()
    );

    let mut result = NavigationResult::new("Particle Filter");
    for (i, truth) in dataset.ground_truth.iter().enumerate() {
        let input = StepInput {
            gps,
            previous_control: if i > 0 {
                dataset.controls[i - 1]
            } else {
                ControlInput::default()
            },
            observations: dataset.observations[i].clone(),
        };
        let output = driver.step(&input)?;
        let record =
            NavigationRecord::new(i, truth, &output.estimate, output.effective_sample_size);
        debug!(
            "Step {}: estimate ({:.3}, {:.3}, {:.3}), error ({:.3}, {:.3}, {:.3})",
            i,
            record.estimate_x,
            record.estimate_y,
            record.estimate_theta,
            record.error_x,
            record.error_y,
            record.error_theta
        );
        result.records.push(record);
    }
    let mean = result.mean_error();
    info!(
        "Mean error x {:.3} m, y {:.3} m, yaw {:.4} rad",
        mean.x, mean.y, mean.theta
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Landmark;
    use assert_approx_eq::assert_approx_eq;

    fn exact_config() -> FilterConfig {
        FilterConfig {
            particle_count: 20,
            position_std: [0.0, 0.0, 0.0],
            seed: Some(5),
            ..Default::default()
        }
    }
    fn square_map() -> Map {
        Map::new(vec![
            Landmark::new(1, 10.0, 0.0),
            Landmark::new(2, 0.0, 10.0),
            Landmark::new(3, -10.0, 0.0),
        ])
    }

    #[test]
    fn test_driver_rejects_invalid_config() {
        let config = FilterConfig {
            particle_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            FilterDriver::new(config, square_map()),
            Err(FilterError::InvalidParticleCount(0))
        ));
    }
    #[test]
    fn test_first_step_initializes_then_predicts() {
        let mut driver = FilterDriver::new(exact_config(), square_map()).unwrap();
        let input = StepInput {
            gps: Pose::new(0.0, 0.0, 0.0),
            previous_control: ControlInput::new(100.0, 0.0),
            observations: vec![Observation::new(10.0, 0.0)],
        };
        // control is ignored on the initializing step
        let output = driver.step(&input).unwrap();
        assert_approx_eq!(output.best.x, 0.0, 1e-12);
        assert_eq!(output.best.associations, vec![1]);
        assert_eq!(driver.filter().len(), 20);

        let input = StepInput {
            gps: Pose::new(50.0, 50.0, 0.0),
            previous_control: ControlInput::new(10.0, 0.0),
            observations: vec![Observation::new(9.0, 0.0)],
        };
        let output = driver.step(&input).unwrap();
        assert_approx_eq!(output.best.x, 1.0, 1e-9);
        assert_approx_eq!(output.estimate.y, 0.0, 1e-9);
    }
    #[test]
    fn test_handle_frame() {
        let mut driver = FilterDriver::new(exact_config(), square_map()).unwrap();
        assert_eq!(
            driver.handle_frame("42[\"telemetry\",null]").unwrap(),
            Some(MANUAL_FRAME.to_string())
        );
        assert_eq!(driver.handle_frame("2").unwrap(), None);
        assert_eq!(driver.handle_frame("42[\"manual\",{}]").unwrap(), None);
        assert!(!driver.filter().is_initialized());

        let frame = r#"42["telemetry",{"sense_x":"0","sense_y":"0","sense_theta":"0","sense_observations_x":"10 0","sense_observations_y":"0 10"}]"#;
        let reply = driver.handle_frame(frame).unwrap().unwrap();
        let (event, payload) = decode_event(&reply).unwrap().unwrap();
        assert_eq!(event, "best_particle");
        let best: BestParticleMessage = serde_json::from_value(payload).unwrap();
        assert_eq!(best.best_particle_associations, "1 2");
        assert_eq!(best.best_particle_sense_x, "10 0");
        assert!(driver.filter().is_initialized());
    }
    #[test]
    fn test_navigation_result_errors() {
        let mut result = NavigationResult::new("test");
        assert_eq!(result.mean_error(), Pose::default());
        let truth = Pose::new(0.0, 0.0, 0.0);
        result
            .records
            .push(NavigationRecord::new(0, &truth, &Pose::new(1.0, -2.0, 0.1), 10.0));
        result
            .records
            .push(NavigationRecord::new(1, &truth, &Pose::new(-3.0, 0.0, -0.3), 10.0));
        let mean = result.mean_error();
        assert_approx_eq!(mean.x, 2.0, 1e-12);
        assert_approx_eq!(mean.y, 1.0, 1e-12);
        assert_approx_eq!(mean.theta, 0.2, 1e-12);
        let max = result.max_error();
        assert_approx_eq!(max.x, 3.0, 1e-12);
        assert_approx_eq!(max.y, 2.0, 1e-12);
        assert_approx_eq!(max.theta, 0.3, 1e-12);
    }
    #[test]
    fn test_navigation_result_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.csv");
        let mut result = NavigationResult::new("written");
        for i in 0..3 {
            let truth = Pose::new(i as f64, 0.0, 0.1);
            let estimate = Pose::new(i as f64 + 0.5, 0.25, 0.0);
            result
                .records
                .push(NavigationRecord::new(i, &truth, &estimate, 4.0));
        }
        result.to_csv(&path).unwrap();
        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("step,truth_x,truth_y,truth_theta,estimate_x"));
        let read = NavigationResult::from_csv(&path, "read").unwrap();
        assert_eq!(read.name, "read");
        assert_eq!(read.records, result.records);
    }
    #[test]
    fn test_run_dataset_tracks_straight_line() {
        let steps = 5;
        let dataset = Dataset {
            map: square_map(),
            controls: vec![ControlInput::new(10.0, 0.0); steps],
            ground_truth: (0..steps).map(|i| Pose::new(i as f64, 0.0, 0.0)).collect(),
            observations: (0..steps)
                .map(|i| vec![Observation::new(10.0 - i as f64, 0.0)])
                .collect(),
        };
        let result = run_dataset(&exact_config(), &dataset).unwrap();
        assert_eq!(result.len(), steps);
        assert_approx_eq!(result.max_error().x, 0.0, 1e-9);
        assert_approx_eq!(result.max_error().theta, 0.0, 1e-9);
    }
    #[test]
    fn test_run_dataset_empty() {
        let result = run_dataset(&exact_config(), &Dataset::default());
        assert!(matches!(result, Err(FilterError::Data(_))));
    }
}
