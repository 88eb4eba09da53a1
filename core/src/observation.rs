//! Landmark detections for a single step.
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::error::{FilterError, Result};

/// One landmark detection.
///
/// Coordinates are in the vehicle frame when the observation arrives from the sensor. The sensor model
/// produces map-frame copies and fills in `id` with the nearest predicted landmark. `id` is a per-step
/// annotation, `None` until associated or when no landmark was in range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub id: Option<u32>,
}
impl Observation {
    pub fn new(x: f64, y: f64) -> Self {
        Observation { x, y, id: None }
    }
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
    /// Pair up separately transmitted x and y coordinate lists.
    ///
    /// # Errors
    /// [`FilterError::Data`] if the lists differ in length.
    pub fn from_components(xs: &[f64], ys: &[f64]) -> Result<Vec<Observation>> {
        if xs.len() != ys.len() {
            return Err(FilterError::Data(format!(
                "observation coordinate lists differ in length ({} x values, {} y values)",
                xs.len(),
                ys.len()
            )));
        }
        Ok(xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| Observation::new(x, y))
            .collect())
    }
}
impl Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(
                f,
                "Observation {{ x: {:.4}, y: {:.4}, id: {} }}",
                self.x, self.y, id
            ),
            None => write!(f, "Observation {{ x: {:.4}, y: {:.4}, id: - }}", self.x, self.y),
        }
    }
}
impl From<(f64, f64)> for Observation {
    fn from(tuple: (f64, f64)) -> Self {
        Observation::new(tuple.0, tuple.1)
    }
}
