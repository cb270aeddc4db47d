//! # Domain Types
//!
//! Node and edge identities for the five-node energy dashboard, the
//! structured flow keys used to address animated streams, and the power
//! snapshot consumed from the sensor collaborator.

pub mod geometry;

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter};

pub use geometry::{NodeCenters, Point, Rect};

/// The five fixed nodes of the dashboard.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeId {
    Solar,
    Battery,
    Grid,
    House,
    Inverter,
}

/// The six base directed edges. Every edge touches the inverter hub.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EdgeId {
    SolarToInverter,
    BatteryToInverter,
    InverterToBattery,
    GridToInverter,
    InverterToGrid,
    InverterToHouse,
}

impl EdgeId {
    /// Directed endpoints of this edge: (from, to).
    pub fn endpoints(&self) -> (NodeId, NodeId) {
        match self {
            EdgeId::SolarToInverter => (NodeId::Solar, NodeId::Inverter),
            EdgeId::BatteryToInverter => (NodeId::Battery, NodeId::Inverter),
            EdgeId::InverterToBattery => (NodeId::Inverter, NodeId::Battery),
            EdgeId::GridToInverter => (NodeId::Grid, NodeId::Inverter),
            EdgeId::InverterToGrid => (NodeId::Inverter, NodeId::Grid),
            EdgeId::InverterToHouse => (NodeId::Inverter, NodeId::House),
        }
    }
}

/// Key addressing one animated stream: either a base edge, or one transient
/// sub-stream of a multi-source decomposition. Sub keys are structured
/// composites so cleanup is an exact match on the base edge, never a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FlowKey {
    Base(EdgeId),
    Sub {
        base: EdgeId,
        source: SourceKind,
        index: u8,
    },
}

impl FlowKey {
    /// The base edge this key belongs to.
    pub fn base(&self) -> EdgeId {
        match self {
            FlowKey::Base(edge) => *edge,
            FlowKey::Sub { base, .. } => *base,
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowKey::Base(edge) => write!(f, "{edge}"),
            FlowKey::Sub {
                base,
                source,
                index,
            } => write!(f, "{base}/{source}.{index}"),
        }
    }
}

/// Originating energy source of a flow contribution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceKind {
    Solar,
    Grid,
    Battery,
}

impl SourceKind {
    /// Color token the rendering surface maps to a concrete paint.
    pub fn color(&self) -> ColorToken {
        match self {
            SourceKind::Solar => ColorToken::Solar,
            SourceKind::Grid => ColorToken::Grid,
            SourceKind::Battery => ColorToken::Battery,
        }
    }
}

/// Named color token per energy source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorToken {
    Solar,
    Grid,
    Battery,
}

impl ColorToken {
    /// Concrete hex value for renderers without their own palette.
    pub fn hex(&self) -> &'static str {
        match self {
            ColorToken::Solar => "#fbc02d",
            ColorToken::Grid => "#42a5f5",
            ColorToken::Battery => "#66bb6a",
        }
    }
}

/// One per-source share of a composite edge's power. A list of these forms a
/// non-exceeding decomposition of the edge total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceContribution {
    pub kind: SourceKind,
    pub power_w: f64,
    pub color: ColorToken,
}

impl SourceContribution {
    pub fn new(kind: SourceKind, power_w: f64) -> Self {
        Self {
            kind,
            power_w,
            color: kind.color(),
        }
    }
}

/// Signed power scalars from the sensor collaborator, in watts.
///
/// Sign convention: positive battery = charging, positive grid = importing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSnapshot {
    pub solar_w: f64,
    pub battery_w: f64,
    pub grid_w: f64,
    pub house_w: f64,
}

impl PowerSnapshot {
    /// Largest absolute change of any scalar against a previous snapshot.
    pub fn max_abs_delta(&self, other: &PowerSnapshot) -> f64 {
        let deltas = [
            (self.solar_w - other.solar_w).abs(),
            (self.battery_w - other.battery_w).abs(),
            (self.grid_w - other.grid_w).abs(),
            (self.house_w - other.house_w).abs(),
        ];
        deltas.into_iter().fold(0.0, f64::max)
    }
}
