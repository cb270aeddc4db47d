//! # Layout Cache
//!
//! Caches the five node centers behind a geometry fingerprint so the hot
//! path (every update cycle) never recomputes geometry. The fingerprint
//! hashes whole-pixel bounding boxes relative to the container and ignores
//! anything text-derived, so data refreshes never re-fingerprint. A changed
//! fingerprint only disturbs running animations when the nodes actually
//! moved past the displacement threshold; smaller shifts are viewport
//! jitter.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use strum::IntoEnumIterator;

use crate::domain::{NodeCenters, NodeId, Point, Rect};
use crate::render::GeometryProvider;

/// Node movement below this is transient jitter, not a relayout.
pub const DISPLACEMENT_THRESHOLD_PX: f64 = 12.0;
/// Trailing debounce window for redrawing the static connector lines.
pub const CONNECTOR_REDRAW_DEBOUNCE_MS: u64 = 50;

/// Result of resolving node centers for one update cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayoutResolution {
    /// Container or a node box is missing; skip the update, no side effects.
    Unavailable,
    /// Fingerprint unchanged: the cached centers, no recomputation.
    Cached(NodeCenters),
    /// Geometry changed; `teardown` says running animations must go.
    Recomputed {
        centers: NodeCenters,
        teardown: bool,
    },
}

#[derive(Debug, Default)]
pub struct LayoutCache {
    fingerprint: Option<u64>,
    centers: Option<NodeCenters>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve node centers, recomputing only when the fingerprint moved.
    pub fn resolve(&mut self, geometry: &dyn GeometryProvider) -> LayoutResolution {
        let Some(container) = geometry.container() else {
            return LayoutResolution::Unavailable;
        };

        let mut boxes: [(NodeId, Rect); 5] = [(NodeId::Solar, Rect::default()); 5];
        for (slot, node) in boxes.iter_mut().zip(NodeId::iter()) {
            let Some(rect) = geometry.node_box(node) else {
                return LayoutResolution::Unavailable;
            };
            *slot = (node, rect);
        }

        let fingerprint = Self::fingerprint(&container, &boxes);
        if self.fingerprint == Some(fingerprint) {
            if let Some(centers) = self.centers {
                return LayoutResolution::Cached(centers);
            }
        }

        let scale = match geometry.scale() {
            s if s > 0.0 => s,
            _ => 1.0,
        };
        let center_of = |rect: &Rect| {
            Point::new(
                (rect.x - container.x + rect.width / 2.0) / scale,
                (rect.y - container.y + rect.height / 2.0) / scale,
            )
        };
        let centers = NodeCenters {
            solar: center_of(&boxes[0].1),
            battery: center_of(&boxes[1].1),
            grid: center_of(&boxes[2].1),
            house: center_of(&boxes[3].1),
            inverter: center_of(&boxes[4].1),
        };

        let fingerprint_changed = self.fingerprint.is_some_and(|prev| prev != fingerprint);
        let displacement = self
            .centers
            .map(|prev| prev.max_displacement(&centers))
            .unwrap_or(0.0);
        let teardown = fingerprint_changed && displacement >= DISPLACEMENT_THRESHOLD_PX;

        self.fingerprint = Some(fingerprint);
        self.centers = Some(centers);
        LayoutResolution::Recomputed { centers, teardown }
    }

    /// Whole-pixel box geometry relative to the container. Text-derived
    /// dimensions are deliberately not part of the hash.
    fn fingerprint(container: &Rect, boxes: &[(NodeId, Rect); 5]) -> u64 {
        let mut hasher = DefaultHasher::new();
        for (node, rect) in boxes {
            node.hash(&mut hasher);
            ((rect.x - container.x).round() as i64).hash(&mut hasher);
            ((rect.y - container.y).round() as i64).hash(&mut hasher);
            (rect.width.round() as i64).hash(&mut hasher);
            (rect.height.round() as i64).hash(&mut hasher);
        }
        hasher.finish()
    }

    pub fn cached(&self) -> Option<NodeCenters> {
        self.centers
    }

    pub fn invalidate(&mut self) {
        self.fingerprint = None;
        self.centers = None;
    }
}
