//! Geometry and probability helpers used by the sensor model.
//!
//! Everything here is a pure function of its arguments. The only fallible helper is the Gaussian density,
//! which rejects non-positive standard deviations instead of dividing by zero.
use nalgebra::{Isometry2, Point2, Vector2};
use std::f64::consts::PI;

use crate::error::{FilterError, Result};
use crate::{Pose, wrap_to_pi};

/// Euclidean distance between two points in the plane.
pub fn distance(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    nalgebra::distance(a, b)
}

/// Axis-aligned bivariate normal density evaluated at `(x, y)`.
///
/// The density has mean `(mu_x, mu_y)`, standard deviations `sigma_x` and `sigma_y` and zero correlation. The
/// result lies in $(0, 1 / (2 \pi \sigma_x \sigma_y)]$, with the maximum attained at the mean (far tails may
/// underflow to zero).
///
/// # Errors
/// [`FilterError::InvalidStdDev`] if either standard deviation is not strictly positive and finite.
///
/// # Example
/// ```rust
/// use mcl::geometry::gaussian_likelihood;
/// let peak = gaussian_likelihood(1.0, 2.0, 1.0, 2.0, 0.5, 0.5).unwrap();
/// assert!((peak - 1.0 / (2.0 * std::f64::consts::PI * 0.25)).abs() < 1e-12);
/// ```
pub fn gaussian_likelihood(
    x: f64,
    y: f64,
    mu_x: f64,
    mu_y: f64,
    sigma_x: f64,
    sigma_y: f64,
) -> Result<f64> {
    check_positive_std("sigma_x", sigma_x)?;
    check_positive_std("sigma_y", sigma_y)?;
    let dx = x - mu_x;
    let dy = y - mu_y;
    let exponent = dx * dx / (2.0 * sigma_x * sigma_x) + dy * dy / (2.0 * sigma_y * sigma_y);
    Ok((-exponent).exp() / (2.0 * PI * sigma_x * sigma_y))
}

pub(crate) fn check_positive_std(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(FilterError::InvalidStdDev { name, value })
    }
}

pub(crate) fn check_non_negative_std(name: &'static str, value: f64) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(FilterError::InvalidStdDev { name, value })
    }
}

/// Transform a point from the vehicle frame of `pose` into the map frame.
///
/// Rotation by the heading followed by translation by the vehicle position.
pub fn local_to_map(pose: &Pose, local: &Point2<f64>) -> Point2<f64> {
    let isometry = Isometry2::new(Vector2::new(pose.x, pose.y), pose.theta);
    isometry * local
}

/// Absolute component-wise error between a reference pose and an estimate.
///
/// Position errors are absolute differences. The heading error is folded into $[0, \pi]$ so that headings
/// which differ by whole turns compare equal.
pub fn pose_error(truth: &Pose, estimate: &Pose) -> Pose {
    Pose {
        x: (estimate.x - truth.x).abs(),
        y: (estimate.y - truth.y).abs(),
        theta: wrap_to_pi(estimate.theta - truth.theta).abs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_distance() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(3.0, 4.0);
        assert_approx_eq!(distance(&a, &b), 5.0, 1e-12);
        assert_approx_eq!(distance(&b, &a), 5.0, 1e-12);
        assert_eq!(distance(&a, &a), 0.0);
    }
    #[test]
    fn test_gaussian_peak_at_mean() {
        for (sx, sy) in [(0.3, 0.3), (1.0, 2.0), (0.05, 10.0)] {
            let peak = gaussian_likelihood(4.0, -2.0, 4.0, -2.0, sx, sy).unwrap();
            assert_approx_eq!(peak, 1.0 / (2.0 * PI * sx * sy), 1e-9);
        }
    }
    #[test]
    fn test_gaussian_decreases_away_from_mean() {
        let peak = gaussian_likelihood(0.0, 0.0, 0.0, 0.0, 0.3, 0.3).unwrap();
        let near = gaussian_likelihood(0.1, 0.0, 0.0, 0.0, 0.3, 0.3).unwrap();
        let far = gaussian_likelihood(1.0, 1.0, 0.0, 0.0, 0.3, 0.3).unwrap();
        assert!(peak > near);
        assert!(near > far);
        assert!(far > 0.0);
    }
    #[test]
    fn test_gaussian_known_value() {
        // One sigma along x only: exp(-0.5) / (2 pi)
        let value = gaussian_likelihood(1.0, 0.0, 0.0, 0.0, 1.0, 1.0).unwrap();
        assert_approx_eq!(value, (-0.5_f64).exp() / (2.0 * PI), 1e-12);
    }
    #[test]
    fn test_gaussian_rejects_bad_sigma() {
        assert!(matches!(
            gaussian_likelihood(0.0, 0.0, 0.0, 0.0, 0.0, 1.0),
            Err(FilterError::InvalidStdDev { name: "sigma_x", .. })
        ));
        assert!(matches!(
            gaussian_likelihood(0.0, 0.0, 0.0, 0.0, 1.0, -1.0),
            Err(FilterError::InvalidStdDev { name: "sigma_y", .. })
        ));
        assert!(gaussian_likelihood(0.0, 0.0, 0.0, 0.0, f64::NAN, 1.0).is_err());
    }
    #[test]
    fn test_local_to_map_rotation_and_translation() {
        let pose = Pose::new(4.0, 5.0, -FRAC_PI_2);
        let map = local_to_map(&pose, &Point2::new(2.0, 2.0));
        assert_approx_eq!(map.x, 6.0, 1e-12);
        assert_approx_eq!(map.y, 3.0, 1e-12);

        let identity = local_to_map(&Pose::default(), &Point2::new(1.5, -0.5));
        assert_approx_eq!(identity.x, 1.5, 1e-12);
        assert_approx_eq!(identity.y, -0.5, 1e-12);
    }
    #[test]
    fn test_pose_error_folds_heading() {
        let truth = Pose::new(1.0, 1.0, 0.1);
        let estimate = Pose::new(1.5, 0.0, 0.1 + 2.0 * PI - 0.2);
        let error = pose_error(&truth, &estimate);
        assert_approx_eq!(error.x, 0.5, 1e-12);
        assert_approx_eq!(error.y, 1.0, 1e-12);
        assert_approx_eq!(error.theta, 0.2, 1e-9);
    }
}
