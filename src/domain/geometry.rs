//! Geometry primitives shared by the layout cache and the rendering seam.

use serde::{Deserialize, Serialize};

use super::{EdgeId, NodeId};

/// A point in container-relative pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An axis-aligned bounding box in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Resolved center coordinates for all five nodes, relative to the container.
///
/// Cached as a unit: either all five resolve or the cache is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeCenters {
    pub solar: Point,
    pub battery: Point,
    pub grid: Point,
    pub house: Point,
    pub inverter: Point,
}

impl NodeCenters {
    pub fn get(&self, node: NodeId) -> Point {
        match node {
            NodeId::Solar => self.solar,
            NodeId::Battery => self.battery,
            NodeId::Grid => self.grid,
            NodeId::House => self.house,
            NodeId::Inverter => self.inverter,
        }
    }

    /// Endpoints of an edge as (from, to) points.
    pub fn endpoints(&self, edge: EdgeId) -> (Point, Point) {
        let (from, to) = edge.endpoints();
        (self.get(from), self.get(to))
    }

    /// Maximum per-node displacement against another center set.
    pub fn max_displacement(&self, other: &NodeCenters) -> f64 {
        [
            self.solar.distance(&other.solar),
            self.battery.distance(&other.battery),
            self.grid.distance(&other.grid),
            self.house.distance(&other.house),
            self.inverter.distance(&other.inverter),
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }
}
