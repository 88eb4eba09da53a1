//! Monte Carlo localization toolbox
//!
//! This crate estimates the planar pose (x, y, heading) of a vehicle moving through a known map of point
//! landmarks. The estimator is a Sequential Monte Carlo (particle) filter: a fixed-size population of weighted
//! pose hypotheses is propagated through a noisy motion model, re-weighted by how well each hypothesis explains
//! the current set of landmark detections, and resampled in proportion to those weights.
//!
//! The crate is built on a small set of dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): points and rigid transforms in the plane.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): the seedable
//!   random source owned by the filter and the Gaussian noise models.
//! - [`serde`](https://crates.io/crates/serde), [`csv`](https://crates.io/crates/csv) and friends: configuration
//!   files, recorded data sets and the simulator message format.
//!
//! ## Crate overview
//!
//! - [geometry]: Euclidean distance, the bivariate Gaussian density, frame transforms and pose error metrics.
//! - [map]: the static landmark map.
//! - [observation]: landmark detections in the vehicle frame.
//! - [particle]: the particle filter itself, data association and resampling strategies.
//! - [config]: typed filter configuration and the decoders for the supported file formats.
//! - [dataset]: loaders for recorded data sets (map, controls, ground truth, observations).
//! - [messages]: the text-frame message format spoken by the driving simulator.
//! - [sim]: the filter driver that glues inputs to the estimator and replays data sets.
//!
//! ## Coordinate conventions
//!
//! Poses are expressed in the global map frame. Heading `theta` is measured in radians counter-clockwise from
//! the map x-axis and is *not* wrapped by the motion model. Observations are expressed in the vehicle frame,
//! x forward and y to the left, and are brought into the map frame by a rotation through `theta` followed by a
//! translation by the vehicle position.
//!
//! ## Motion model
//!
//! Between two steps the vehicle is assumed to travel with constant velocity $v$ and yaw rate $\omega$ for $dt$
//! seconds. For $|\omega| > 0.001$ rad/s:
//!
//! $$
//! x' = x + \frac{v}{\omega} \left( \sin(\theta + \omega\,dt) - \sin\theta \right), \quad
//! y' = y + \frac{v}{\omega} \left( \cos\theta - \cos(\theta + \omega\,dt) \right), \quad
//! \theta' = \theta + \omega\,dt
//! $$
//!
//! and otherwise the straight-line limit $x' = x + v\,dt\cos\theta$, $y' = y + v\,dt\sin\theta$ is used.
pub mod config;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod map;
pub mod messages;
pub mod observation;
pub mod particle;
pub mod sim;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

pub use error::{FilterError, Result};

/// Below this yaw rate (rad/s) the motion model switches to straight-line motion.
pub const YAW_RATE_THRESHOLD: f64 = 0.001;

/// Planar pose in the map frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position along the map x-axis in meters
    pub x: f64,
    /// Position along the map y-axis in meters
    pub y: f64,
    /// Heading in radians
    pub theta: f64,
}
impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }
    /// Position component as a point in the map frame
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}
impl Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pose {{ x: {:.4} m, y: {:.4} m, theta: {:.4} rad }}",
            self.x, self.y, self.theta
        )
    }
}
impl From<(f64, f64, f64)> for Pose {
    fn from(tuple: (f64, f64, f64)) -> Self {
        Pose::new(tuple.0, tuple.1, tuple.2)
    }
}
impl From<Pose> for Vec<f64> {
    fn from(pose: Pose) -> Self {
        vec![pose.x, pose.y, pose.theta]
    }
}

/// Control input applied over the interval since the previous step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlInput {
    /// Forward velocity in m/s
    pub velocity: f64,
    /// Yaw rate in rad/s
    pub yaw_rate: f64,
}
impl ControlInput {
    pub fn new(velocity: f64, yaw_rate: f64) -> Self {
        ControlInput { velocity, yaw_rate }
    }
}
impl Display for ControlInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ControlInput {{ velocity: {:.4} m/s, yaw_rate: {:.4} rad/s }}",
            self.velocity, self.yaw_rate
        )
    }
}
impl From<(f64, f64)> for ControlInput {
    fn from(tuple: (f64, f64)) -> Self {
        ControlInput::new(tuple.0, tuple.1)
    }
}

/// Deterministic constant velocity / constant yaw rate motion model.
///
/// Advances `pose` by `dt` seconds under `control` without any process noise. Near-zero yaw rates use the
/// straight-line limit of the arc equations to avoid dividing by a vanishing yaw rate.
///
/// # Example
/// ```rust
/// use mcl::{ControlInput, Pose, forward};
/// let pose = Pose::new(0.0, 0.0, 0.0);
/// let next = forward(&pose, ControlInput::new(10.0, 0.0), 0.1);
/// assert!((next.x - 1.0).abs() < 1e-12);
/// assert!(next.y.abs() < 1e-12);
/// ```
pub fn forward(pose: &Pose, control: ControlInput, dt: f64) -> Pose {
    let ControlInput { velocity, yaw_rate } = control;
    let theta = pose.theta + yaw_rate * dt;
    if yaw_rate.abs() > YAW_RATE_THRESHOLD {
        let radius = velocity / yaw_rate;
        Pose {
            x: pose.x + radius * (theta.sin() - pose.theta.sin()),
            y: pose.y + radius * (pose.theta.cos() - theta.cos()),
            theta,
        }
    } else {
        Pose {
            x: pose.x + velocity * dt * pose.theta.cos(),
            y: pose.y + velocity * dt * pose.theta.sin(),
            theta,
        }
    }
}

/// Wrap an angle to the range $-\pi$ to $\pi$ radians
///
/// # Example
/// ```rust
/// use mcl::wrap_to_pi;
/// use std::f64::consts::PI;
/// let wrapped = wrap_to_pi(3.0 * PI / 2.0);
/// assert!((wrapped + PI / 2.0).abs() < 1e-12);
/// ```
pub fn wrap_to_pi(angle: f64) -> f64 {
    let mut wrapped = angle;
    while wrapped > std::f64::consts::PI {
        wrapped -= 2.0 * std::f64::consts::PI;
    }
    while wrapped < -std::f64::consts::PI {
        wrapped += 2.0 * std::f64::consts::PI;
    }
    wrapped
}
