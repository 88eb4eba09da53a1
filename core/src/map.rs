//! Static landmark map.
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dataset::read_whitespace_records;
use crate::error::Result;
use crate::geometry::distance;

/// A point landmark in the map frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Map-wide landmark identifier
    pub id: u32,
    /// Position along the map x-axis in meters
    pub x: f64,
    /// Position along the map y-axis in meters
    pub y: f64,
}
impl Landmark {
    pub fn new(id: u32, x: f64, y: f64) -> Self {
        Landmark { id, x, y }
    }
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

/// Row of a map file: `x y id`
#[derive(Debug, Deserialize)]
struct MapRecord {
    x: f64,
    y: f64,
    id: u32,
}

/// Flat list of landmarks, loaded once and never modified afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Map {
    landmarks: Vec<Landmark>,
}
impl Map {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Map { landmarks }
    }
    /// Read a whitespace separated map file with one `x y id` triple per line.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let records: Vec<MapRecord> = read_whitespace_records(path)?;
        Ok(Map::new(
            records
                .into_iter()
                .map(|r| Landmark::new(r.id, r.x, r.y))
                .collect(),
        ))
    }
    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
    /// Landmarks strictly closer than `range` to `center`, in map order.
    pub fn within_range(&self, center: &Point2<f64>, range: f64) -> Vec<&Landmark> {
        self.landmarks
            .iter()
            .filter(|landmark| distance(center, &landmark.position()) < range)
            .collect()
    }
}
impl From<Vec<Landmark>> for Map {
    fn from(landmarks: Vec<Landmark>) -> Self {
        Map::new(landmarks)
    }
}
