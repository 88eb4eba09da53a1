//! Particle filter for landmark based localization.
//!
//! The filter owns a fixed-size population of weighted pose hypotheses and a seedable random source. One step
//! of the filter is `predict` → `update_weights` → `resample`, after which [`ParticleFilter::best_particle`]
//! (or [`ParticleFilter::estimate`]) yields the point estimate.
//!
//! # Sensor model
//!
//! For every particle the observations are moved into the map frame using the particle pose, and the map
//! landmarks strictly within sensor range of the particle become the *predicted* landmarks. Each observation
//! is tagged with its nearest predicted landmark ([`associate`]). The weight is then the product, over every
//! predicted landmark, of the bivariate Gaussian density of that landmark's nearest transformed observation.
//! Predicted landmarks without any observation contribute no factor, and a particle with no predicted
//! landmarks keeps a weight of 1.0 (empty product).
//!
//! # Example
//! ```rust
//! use mcl::map::{Landmark, Map};
//! use mcl::observation::Observation;
//! use mcl::particle::ParticleFilter;
//!
//! let map = Map::new(vec![Landmark::new(1, 5.0, 0.0)]);
//! let mut pf = ParticleFilter::with_seed(7);
//! pf.init(50, 0.0, 0.0, 0.0, &[0.3, 0.3, 0.01]).unwrap();
//! pf.predict(0.1, &[0.3, 0.3, 0.01], 1.0, 0.0).unwrap();
//! pf.update_weights(50.0, &[0.3, 0.3], &[Observation::new(4.9, 0.0)], &map).unwrap();
//! pf.resample().unwrap();
//! let best = pf.best_particle().unwrap();
//! assert_eq!(pf.len(), 50);
//! assert_eq!(best.associations, vec![1]);
//! ```
use log::{debug, info, warn};
use nalgebra::Point2;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};

use crate::error::{FilterError, Result};
use crate::geometry::{
    check_non_negative_std, check_positive_std, distance, gaussian_likelihood, local_to_map,
};
use crate::map::{Landmark, Map};
use crate::observation::Observation;
use crate::{ControlInput, Pose, forward};

/// One pose hypothesis.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Particle {
    /// Index within the current generation
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    /// Unnormalized importance weight
    pub weight: f64,
    /// Landmark id associated with each observation in the last update
    pub associations: Vec<u32>,
    /// Map-frame x of each associated observation in the last update
    pub sense_x: Vec<f64>,
    /// Map-frame y of each associated observation in the last update
    pub sense_y: Vec<f64>,
}
impl Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("id", &self.id)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("theta", &self.theta)
            .field("weight", &self.weight)
            .field("associations", &self.associations.len())
            .finish()
    }
}
impl Particle {
    pub fn new(id: usize, pose: Pose, weight: f64) -> Particle {
        Particle {
            id,
            x: pose.x,
            y: pose.y,
            theta: pose.theta,
            weight,
            ..Default::default()
        }
    }
    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.theta)
    }
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
    /// Overwrite the debug annotations of this particle.
    pub fn set_associations(&mut self, associations: &[u32], sense_x: &[f64], sense_y: &[f64]) {
        self.associations = associations.to_vec();
        self.sense_x = sense_x.to_vec();
        self.sense_y = sense_y.to_vec();
    }
    /// Associated landmark ids, space separated.
    pub fn associations_text(&self) -> String {
        join_space_separated(&self.associations)
    }
    /// Map-frame x coordinates of the associated observations, space separated.
    pub fn sense_x_text(&self) -> String {
        join_space_separated(&self.sense_x)
    }
    /// Map-frame y coordinates of the associated observations, space separated.
    pub fn sense_y_text(&self) -> String {
        join_space_separated(&self.sense_y)
    }
}

/// Return a copy of `particle` carrying the given debug annotations.
///
/// This has no effect on filtering and exists for visualization of the association step.
pub fn set_associations(
    particle: &Particle,
    associations: &[u32],
    sense_x: &[f64],
    sense_y: &[f64],
) -> Particle {
    let mut annotated = particle.clone();
    annotated.set_associations(associations, sense_x, sense_y);
    annotated
}

fn join_space_separated<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Nearest-neighbour data association.
///
/// Tags every observation with the id of the closest predicted landmark, or `None` when `predicted` is
/// empty. Ties go to the first landmark at the minimal distance in `predicted` order.
pub fn associate(predicted: &[&Landmark], observations: &mut [Observation]) {
    for observation in observations.iter_mut() {
        let position = observation.position();
        let mut closest: Option<(u32, f64)> = None;
        for landmark in predicted {
            let d = distance(&position, &landmark.position());
            if closest.is_none_or(|(_, best)| d < best) {
                closest = Some((landmark.id, d));
            }
        }
        observation.id = closest.map(|(id, _)| id);
    }
}

/// Index of the observation nearest to `landmark`, first one on ties.
fn nearest_observation(landmark: &Landmark, observations: &[Observation]) -> Option<usize> {
    let target = landmark.position();
    let mut nearest: Option<(usize, f64)> = None;
    for (k, observation) in observations.iter().enumerate() {
        let d = distance(&target, &observation.position());
        if nearest.is_none_or(|(_, best)| d < best) {
            nearest = Some((k, d));
        }
    }
    nearest.map(|(k, _)| k)
}

/// Normalize weights to sum to one.
///
/// Returns `None` when the weights cannot define a distribution: all zero, any negative or any non-finite.
pub fn normalize(weights: &[f64]) -> Option<Vec<f64>> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return None;
    }
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        Some(weights.iter().map(|w| w / sum).collect())
    } else {
        None
    }
}

/// How a new population is drawn from the weighted one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ResamplingStrategy {
    /// Independent categorical draws with replacement
    #[default]
    Multinomial,
    /// One uniform offset, evenly spaced pointers
    Systematic,
    /// Deterministic floor(N w) copies, remainder drawn systematically from the residuals
    Residual,
}
impl ResamplingStrategy {
    /// Draw `weights.len()` indices with probability proportional to `weights`.
    ///
    /// Weights need not sum to one.
    ///
    /// # Errors
    /// [`FilterError::DegenerateWeights`] when the weights are empty, all zero, negative or not finite.
    pub fn draw_indices<R: Rng>(&self, weights: &[f64], rng: &mut R) -> Result<Vec<usize>> {
        let weights = normalize(weights).ok_or(FilterError::DegenerateWeights)?;
        match self {
            ResamplingStrategy::Multinomial => Self::multinomial(&weights, rng),
            ResamplingStrategy::Systematic => Ok(Self::systematic(&weights, weights.len(), rng)),
            ResamplingStrategy::Residual => Ok(Self::residual(&weights, rng)),
        }
    }
    fn multinomial<R: Rng>(weights: &[f64], rng: &mut R) -> Result<Vec<usize>> {
        let index = WeightedIndex::new(weights).map_err(|_| FilterError::DegenerateWeights)?;
        Ok((0..weights.len()).map(|_| index.sample(rng)).collect())
    }
    fn systematic<R: Rng>(weights: &[f64], count: usize, rng: &mut R) -> Vec<usize> {
        let n = weights.len();
        let mut indices = Vec::with_capacity(count);
        if count == 0 || n == 0 {
            return indices;
        }
        let total: f64 = weights.iter().sum();
        let step = total / count as f64;
        let mut pointer = rng.random::<f64>() * step;
        let mut i = 0;
        let mut cumsum = weights[0];
        for _ in 0..count {
            while pointer > cumsum && i < n - 1 {
                i += 1;
                cumsum += weights[i];
            }
            indices.push(i);
            pointer += step;
        }
        indices
    }
    fn residual<R: Rng>(weights: &[f64], rng: &mut R) -> Vec<usize> {
        let n = weights.len();
        let mut indices = Vec::with_capacity(n);
        let mut residual = vec![0.0; n];
        for (i, &w) in weights.iter().enumerate() {
            let copies = (w * n as f64).floor() as usize;
            residual[i] = w * n as f64 - copies as f64;
            indices.extend(std::iter::repeat_n(i, copies));
        }
        indices.truncate(n);
        let remaining = n - indices.len();
        if remaining > 0 {
            indices.extend(Self::systematic(&residual, remaining, rng));
        }
        indices
    }
}

/// How the point estimate is formed from the population.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum AveragingStrategy {
    /// Pose of the heaviest particle
    #[default]
    HighestWeight,
    /// Weight-averaged pose, circular mean for the heading
    WeightedAverage,
    /// Plain average of all poses, circular mean for the heading
    UnweightedAverage,
}

/// Monte Carlo localization filter.
///
/// The filter starts uninitialized; [`ParticleFilter::init`] creates the population exactly once and every
/// other operation fails with [`FilterError::NotInitialized`] before that.
#[derive(Clone)]
pub struct ParticleFilter {
    particles: Vec<Particle>,
    initialized: bool,
    resampling_strategy: ResamplingStrategy,
    averaging_strategy: AveragingStrategy,
    rng: StdRng,
}
impl Debug for ParticleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min_weight = self
            .particles
            .iter()
            .map(|p| p.weight)
            .fold(f64::INFINITY, f64::min);
        let max_weight = self.particles.iter().map(|p| p.weight).fold(0.0, f64::max);
        f.debug_struct("ParticleFilter")
            .field("initialized", &self.initialized)
            .field("num_particles", &self.particles.len())
            .field("effective_particles", &self.effective_sample_size())
            .field(
                "weight_range",
                &format_args!("[{:.4e}, {:.4e}]", min_weight, max_weight),
            )
            .field("resampling_strategy", &self.resampling_strategy)
            .field("averaging_strategy", &self.averaging_strategy)
            .finish()
    }
}
impl Default for ParticleFilter {
    fn default() -> Self {
        Self::new()
    }
}
impl ParticleFilter {
    /// Uninitialized filter with an entropy-seeded random source.
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }
    /// Uninitialized filter with a deterministic random source.
    pub fn with_seed(seed: u64) -> Self {
        ParticleFilter {
            particles: Vec::new(),
            initialized: false,
            resampling_strategy: ResamplingStrategy::default(),
            averaging_strategy: AveragingStrategy::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }
    /// Initialized filter holding an existing population, as saved from a previous run.
    ///
    /// # Errors
    /// [`FilterError::EmptyPopulation`] when `particles` is empty.
    pub fn from_particles(particles: Vec<Particle>, seed: u64) -> Result<Self> {
        if particles.is_empty() {
            return Err(FilterError::EmptyPopulation);
        }
        let mut filter = Self::with_seed(seed);
        filter.particles = particles;
        filter.initialized = true;
        Ok(filter)
    }
    pub fn with_strategies(
        mut self,
        resampling_strategy: ResamplingStrategy,
        averaging_strategy: AveragingStrategy,
    ) -> Self {
        self.resampling_strategy = resampling_strategy;
        self.averaging_strategy = averaging_strategy;
        self
    }
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
    pub fn resampling_strategy(&self) -> ResamplingStrategy {
        self.resampling_strategy
    }
    pub fn averaging_strategy(&self) -> AveragingStrategy {
        self.averaging_strategy
    }
    /// Read-only view of the current population
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }
    pub fn len(&self) -> usize {
        self.particles.len()
    }
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
    fn ensure_initialized(&self) -> Result<()> {
        if !self.initialized {
            return Err(FilterError::NotInitialized);
        }
        if self.particles.is_empty() {
            return Err(FilterError::EmptyPopulation);
        }
        Ok(())
    }

    /// Create `count` particles drawn around `(x, y, theta)`.
    ///
    /// Each coordinate is drawn independently from a Gaussian with the matching entry of `std` as standard
    /// deviation (x, y, theta). All weights start at 1.0.
    ///
    /// # Errors
    /// - [`FilterError::AlreadyInitialized`] on a second call.
    /// - [`FilterError::InvalidParticleCount`] when `count` is zero.
    /// - [`FilterError::InvalidStdDev`] when a standard deviation is negative or not finite.
    pub fn init(&mut self, count: usize, x: f64, y: f64, theta: f64, std: &[f64; 3]) -> Result<()> {
        if self.initialized {
            return Err(FilterError::AlreadyInitialized);
        }
        if count == 0 {
            return Err(FilterError::InvalidParticleCount(count));
        }
        let [noise_x, noise_y, noise_theta] = process_noise(std)?;
        self.particles = (0..count)
            .map(|id| {
                let pose = Pose::new(
                    x + noise_x.sample(&mut self.rng),
                    y + noise_y.sample(&mut self.rng),
                    theta + noise_theta.sample(&mut self.rng),
                );
                Particle::new(id, pose, 1.0)
            })
            .collect();
        self.initialized = true;
        info!(
            "Initialized {} particles around ({:.3}, {:.3}, {:.3})",
            count, x, y, theta
        );
        Ok(())
    }

    /// Move every particle through the motion model and add process noise.
    ///
    /// Zero standard deviations give a deterministic update.
    ///
    /// # Errors
    /// [`FilterError::NotInitialized`], [`FilterError::InvalidTimeStep`] for a negative or non-finite `dt`,
    /// [`FilterError::InvalidStdDev`] for negative or non-finite noise.
    pub fn predict(
        &mut self,
        dt: f64,
        std_pos: &[f64; 3],
        velocity: f64,
        yaw_rate: f64,
    ) -> Result<()> {
        self.ensure_initialized()?;
        if !(dt >= 0.0 && dt.is_finite()) {
            return Err(FilterError::InvalidTimeStep(dt));
        }
        let [noise_x, noise_y, noise_theta] = process_noise(std_pos)?;
        let control = ControlInput::new(velocity, yaw_rate);
        for particle in &mut self.particles {
            let predicted = forward(&particle.pose(), control, dt);
            particle.x = predicted.x + noise_x.sample(&mut self.rng);
            particle.y = predicted.y + noise_y.sample(&mut self.rng);
            particle.theta = predicted.theta + noise_theta.sample(&mut self.rng);
        }
        Ok(())
    }

    /// Re-weight every particle by the likelihood of `observations` given `map`.
    ///
    /// Weights are overwritten, not accumulated across steps, and the debug annotations of every particle are
    /// replaced with the associations of this update.
    ///
    /// # Errors
    /// [`FilterError::NotInitialized`], [`FilterError::InvalidSensorRange`],
    /// [`FilterError::InvalidStdDev`] unless both landmark standard deviations are strictly positive.
    pub fn update_weights(
        &mut self,
        sensor_range: f64,
        std_landmark: &[f64; 2],
        observations: &[Observation],
        map: &Map,
    ) -> Result<()> {
        self.ensure_initialized()?;
        if !(sensor_range >= 0.0 && sensor_range.is_finite()) {
            return Err(FilterError::InvalidSensorRange(sensor_range));
        }
        check_positive_std("landmark_std_x", std_landmark[0])?;
        check_positive_std("landmark_std_y", std_landmark[1])?;

        for particle in &mut self.particles {
            let pose = particle.pose();
            let mut transformed: Vec<Observation> = observations
                .iter()
                .map(|obs| {
                    let p = local_to_map(&pose, &obs.position());
                    Observation::new(p.x, p.y)
                })
                .collect();
            let predicted = map.within_range(&pose.position(), sensor_range);
            associate(&predicted, &mut transformed);

            let mut weight = 1.0;
            for landmark in &predicted {
                if let Some(k) = nearest_observation(landmark, &transformed) {
                    weight *= gaussian_likelihood(
                        transformed[k].x,
                        transformed[k].y,
                        landmark.x,
                        landmark.y,
                        std_landmark[0],
                        std_landmark[1],
                    )?;
                }
            }
            particle.weight = weight;

            particle.associations.clear();
            particle.sense_x.clear();
            particle.sense_y.clear();
            for obs in &transformed {
                if let Some(id) = obs.id {
                    particle.associations.push(id);
                    particle.sense_x.push(obs.x);
                    particle.sense_y.push(obs.y);
                }
            }
        }
        debug!(
            "Updated weights for {} observations, effective sample size {:.1}",
            observations.len(),
            self.effective_sample_size()
        );
        Ok(())
    }

    /// Draw a new population of the same size, with replacement, proportional to weight.
    ///
    /// Drawn particles are copied by value, weight and annotations included, and renumbered in draw order.
    /// When the weights do not form a distribution (all zero, or non-finite) every particle is equally
    /// likely to be drawn.
    pub fn resample(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        let weights = self.normalized_weights().unwrap_or_else(|| {
            warn!(
                "Degenerate particle weights, resampling {} particles uniformly",
                self.particles.len()
            );
            vec![1.0 / self.particles.len() as f64; self.particles.len()]
        });
        let indices = self
            .resampling_strategy
            .draw_indices(&weights, &mut self.rng)?;
        self.particles = indices
            .into_iter()
            .enumerate()
            .map(|(id, index)| {
                let mut particle = self.particles[index].clone();
                particle.id = id;
                particle
            })
            .collect();
        Ok(())
    }

    /// Copy of the heaviest particle, first one on ties.
    pub fn best_particle(&self) -> Result<Particle> {
        self.ensure_initialized()?;
        let mut best = &self.particles[0];
        for particle in &self.particles[1..] {
            if particle.weight > best.weight {
                best = particle;
            }
        }
        Ok(best.clone())
    }

    /// Point estimate according to the configured [`AveragingStrategy`].
    pub fn estimate(&self) -> Result<Pose> {
        self.ensure_initialized()?;
        let n = self.particles.len();
        let weights = match self.averaging_strategy {
            AveragingStrategy::HighestWeight => return Ok(self.best_particle()?.pose()),
            AveragingStrategy::WeightedAverage => self
                .normalized_weights()
                .unwrap_or_else(|| vec![1.0 / n as f64; n]),
            AveragingStrategy::UnweightedAverage => vec![1.0 / n as f64; n],
        };
        let mut mean = Pose::default();
        let (mut sin_sum, mut cos_sum) = (0.0, 0.0);
        for (particle, w) in self.particles.iter().zip(&weights) {
            mean.x += w * particle.x;
            mean.y += w * particle.y;
            sin_sum += w * particle.theta.sin();
            cos_sum += w * particle.theta.cos();
        }
        mean.theta = sin_sum.atan2(cos_sum);
        Ok(mean)
    }

    /// Current weights normalized to sum to one, `None` if they are degenerate.
    pub fn normalized_weights(&self) -> Option<Vec<f64>> {
        let weights: Vec<f64> = self.particles.iter().map(|p| p.weight).collect();
        normalize(&weights)
    }

    /// N_eff = 1 / sum(w_i^2) over normalized weights, 0.0 for degenerate weights.
    pub fn effective_sample_size(&self) -> f64 {
        match self.normalized_weights() {
            Some(weights) => 1.0 / weights.iter().map(|w| w * w).sum::<f64>(),
            None => 0.0,
        }
    }
}

fn process_noise(std: &[f64; 3]) -> Result<[Normal<f64>; 3]> {
    const NAMES: [&str; 3] = ["position_std_x", "position_std_y", "position_std_theta"];
    let normal = |i: usize| -> Result<Normal<f64>> {
        check_non_negative_std(NAMES[i], std[i])?;
        Normal::new(0.0, std[i]).map_err(|_| FilterError::InvalidStdDev {
            name: NAMES[i],
            value: std[i],
        })
    };
    Ok([normal(0)?, normal(1)?, normal(2)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn filter_with_weights(weights: &[f64]) -> ParticleFilter {
        let mut pf = ParticleFilter::with_seed(1);
        pf.init(weights.len(), 0.0, 0.0, 0.0, &[0.0, 0.0, 0.0]).unwrap();
        for (i, (particle, &w)) in pf.particles.iter_mut().zip(weights).enumerate() {
            particle.x = i as f64;
            particle.weight = w;
        }
        pf
    }

    #[test]
    fn test_association_picks_nearest() {
        let a = Landmark::new(1, 0.0, 0.0);
        let b = Landmark::new(2, 5.0, 5.0);
        let mut observations = vec![Observation::new(0.1, 0.1), Observation::new(4.0, 4.5)];
        associate(&[&a, &b], &mut observations);
        assert_eq!(observations[0].id, Some(1));
        assert_eq!(observations[1].id, Some(2));
    }
    #[test]
    fn test_association_tie_goes_to_first() {
        let a = Landmark::new(7, -1.0, 0.0);
        let b = Landmark::new(3, 1.0, 0.0);
        let mut observations = vec![Observation::new(0.0, 0.0)];
        associate(&[&a, &b], &mut observations);
        assert_eq!(observations[0].id, Some(7));
        associate(&[&b, &a], &mut observations);
        assert_eq!(observations[0].id, Some(3));
    }
    #[test]
    fn test_association_without_landmarks() {
        let mut observations = vec![Observation {
            x: 1.0,
            y: 1.0,
            id: Some(9),
        }];
        associate(&[], &mut observations);
        assert_eq!(observations[0].id, None);
    }
    #[test]
    fn test_nearest_observation_tie_goes_to_first() {
        let landmark = Landmark::new(1, 0.0, 0.0);
        let observations = vec![
            Observation::new(0.0, 1.0),
            Observation::new(1.0, 0.0),
            Observation::new(0.0, -1.0),
        ];
        assert_eq!(nearest_observation(&landmark, &observations), Some(0));
        assert_eq!(nearest_observation(&landmark, &[]), None);
    }
    #[test]
    fn test_normalize() {
        let w = normalize(&[1.0, 3.0]).unwrap();
        assert_approx_eq!(w[0], 0.25, 1e-12);
        assert_approx_eq!(w[1], 0.75, 1e-12);
        assert!(normalize(&[0.0, 0.0]).is_none());
        assert!(normalize(&[1.0, f64::NAN]).is_none());
        assert!(normalize(&[1.0, -0.5]).is_none());
        assert!(normalize(&[]).is_none());
    }
    #[test]
    fn test_systematic_follows_weights() {
        let mut rng = StdRng::seed_from_u64(3);
        let indices = ResamplingStrategy::Systematic
            .draw_indices(&[0.5, 0.0, 0.5], &mut rng)
            .unwrap();
        assert_eq!(indices.len(), 3);
        assert!(indices.iter().all(|&i| i != 1));
        let indices = ResamplingStrategy::Systematic
            .draw_indices(&[0.0, 1.0, 0.0, 0.0], &mut rng)
            .unwrap();
        assert_eq!(indices, vec![1, 1, 1, 1]);
    }
    #[test]
    fn test_residual_deterministic_copies() {
        let mut rng = StdRng::seed_from_u64(3);
        // 4 * [0.5, 0.25, 0.25, 0.0] = exact integer copies
        let indices = ResamplingStrategy::Residual
            .draw_indices(&[0.5, 0.25, 0.25, 0.0], &mut rng)
            .unwrap();
        assert_eq!(indices, vec![0, 0, 1, 2]);
    }
    #[test]
    fn test_multinomial_rejects_zero_weights() {
        let mut rng = StdRng::seed_from_u64(3);
        let result = ResamplingStrategy::Multinomial.draw_indices(&[0.0, 0.0], &mut rng);
        assert!(matches!(result, Err(FilterError::DegenerateWeights)));
    }
    #[test]
    fn test_all_strategies_reject_degenerate_weights() {
        let mut rng = StdRng::seed_from_u64(3);
        for strategy in [
            ResamplingStrategy::Multinomial,
            ResamplingStrategy::Systematic,
            ResamplingStrategy::Residual,
        ] {
            for weights in [
                vec![0.0, 0.0, 0.0],
                vec![-1.0, 2.0, 0.0],
                vec![f64::NAN, 1.0, 1.0],
                vec![],
            ] {
                let result = strategy.draw_indices(&weights, &mut rng);
                assert!(
                    matches!(result, Err(FilterError::DegenerateWeights)),
                    "{:?} accepted {:?}",
                    strategy,
                    weights
                );
            }
        }
    }
    #[test]
    fn test_residual_normalizes_weights() {
        let third = 1.0 / 3.0;
        let scaled = ResamplingStrategy::Residual
            .draw_indices(&[10.0, 10.0, 10.0], &mut StdRng::seed_from_u64(3))
            .unwrap();
        let normalized = ResamplingStrategy::Residual
            .draw_indices(&[third, third, third], &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(scaled, normalized);
        assert_eq!(scaled, vec![0, 1, 2]);
    }
    #[test]
    fn test_best_particle_ties_go_to_first() {
        let pf = filter_with_weights(&[0.2, 0.7, 0.7, 0.1]);
        let best = pf.best_particle().unwrap();
        assert_eq!(best.id, 1);
    }
    #[test]
    fn test_weighted_average_estimate() {
        let pf = filter_with_weights(&[1.0, 3.0])
            .with_strategies(ResamplingStrategy::Multinomial, AveragingStrategy::WeightedAverage);
        let estimate = pf.estimate().unwrap();
        assert_approx_eq!(estimate.x, 0.75, 1e-12);
        assert_approx_eq!(estimate.theta, 0.0, 1e-12);

        let pf = pf.with_strategies(
            ResamplingStrategy::Multinomial,
            AveragingStrategy::UnweightedAverage,
        );
        assert_approx_eq!(pf.estimate().unwrap().x, 0.5, 1e-12);
    }
    #[test]
    fn test_circular_heading_average() {
        let mut pf = filter_with_weights(&[1.0, 1.0]).with_strategies(
            ResamplingStrategy::Multinomial,
            AveragingStrategy::UnweightedAverage,
        );
        pf.particles[0].theta = std::f64::consts::PI - 0.1;
        pf.particles[1].theta = -std::f64::consts::PI + 0.1;
        let theta = pf.estimate().unwrap().theta;
        assert_approx_eq!(theta.abs(), std::f64::consts::PI, 1e-9);
    }
    #[test]
    fn test_effective_sample_size() {
        let pf = filter_with_weights(&[1.0, 1.0, 1.0, 1.0]);
        assert_approx_eq!(pf.effective_sample_size(), 4.0, 1e-9);
        let pf = filter_with_weights(&[1.0, 0.0, 0.0, 0.0]);
        assert_approx_eq!(pf.effective_sample_size(), 1.0, 1e-9);
        let pf = filter_with_weights(&[0.0, 0.0]);
        assert_eq!(pf.effective_sample_size(), 0.0);
    }
    #[test]
    fn test_particle_text_formatting() {
        let particle = set_associations(
            &Particle::default(),
            &[1, 12, 3],
            &[1.5, -2.0, 0.25],
            &[0.0, 7.0, 3.5],
        );
        assert_eq!(particle.associations_text(), "1 12 3");
        assert_eq!(particle.sense_x_text(), "1.5 -2 0.25");
        assert_eq!(particle.sense_y_text(), "0 7 3.5");
        assert_eq!(Particle::default().associations_text(), "");
    }
    #[test]
    fn test_set_associations_overwrites() {
        let mut particle = Particle::default();
        particle.set_associations(&[1, 2], &[0.0, 1.0], &[2.0, 3.0]);
        particle.set_associations(&[5], &[9.0], &[8.0]);
        assert_eq!(particle.associations, vec![5]);
        assert_eq!(particle.sense_x, vec![9.0]);
        assert_eq!(particle.sense_y, vec![8.0]);
    }
}
