//! # Headless Rendering Stage
//!
//! Implements the geometry and transition seams without a GUI: node boxes
//! are plain rectangles and transitions are bookkeeping entries with a
//! completion time. The host advances the stage clock, drains completed
//! transitions and reports them back to the engine.

use std::collections::HashMap;

use crate::domain::{NodeCenters, NodeId, Rect};
use crate::render::{
    FlowRenderer, GeometryProvider, RenderError, TransitionHandle, TransitionSpec,
};

/// Static five-node dashboard layout: sources in a left column, inverter in
/// the middle, house on the right.
#[derive(Debug, Clone)]
pub struct DashboardGeometry {
    container: Option<Rect>,
    boxes: HashMap<NodeId, Rect>,
    scale: f64,
}

impl Default for DashboardGeometry {
    fn default() -> Self {
        let mut boxes = HashMap::new();
        boxes.insert(NodeId::Solar, Rect::new(40.0, 40.0, 120.0, 80.0));
        boxes.insert(NodeId::Battery, Rect::new(40.0, 260.0, 120.0, 80.0));
        boxes.insert(NodeId::Grid, Rect::new(40.0, 480.0, 120.0, 80.0));
        boxes.insert(NodeId::Inverter, Rect::new(340.0, 260.0, 120.0, 80.0));
        boxes.insert(NodeId::House, Rect::new(640.0, 260.0, 120.0, 80.0));
        Self {
            container: Some(Rect::new(0.0, 0.0, 800.0, 600.0)),
            boxes,
            scale: 1.0,
        }
    }
}

impl DashboardGeometry {
    /// Translate one node box, e.g. to simulate a relayout.
    pub fn shift_node(&mut self, node: NodeId, dx: f64, dy: f64) {
        if let Some(rect) = self.boxes.get_mut(&node) {
            rect.x += dx;
            rect.y += dy;
        }
    }

    /// Drop a node box to simulate an unmounted card.
    pub fn remove_node(&mut self, node: NodeId) {
        self.boxes.remove(&node);
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }
}

impl GeometryProvider for DashboardGeometry {
    fn container(&self) -> Option<Rect> {
        self.container
    }

    fn node_box(&self, node: NodeId) -> Option<Rect> {
        self.boxes.get(&node).copied()
    }

    fn scale(&self) -> f64 {
        self.scale
    }
}

#[derive(Debug, Clone)]
struct ActiveTransition {
    completes_at_ms: u64,
}

/// Transition bookkeeping without pixels. Completions are observed by
/// draining the stage on the host clock.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    now_ms: u64,
    next_handle: u64,
    live: HashMap<TransitionHandle, ActiveTransition>,
    connector_draws: usize,
    target_missing: bool,
}

impl HeadlessRenderer {
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn connector_draws(&self) -> usize {
        self.connector_draws
    }

    /// Simulate the rendering target disappearing mid-flight.
    pub fn set_target_missing(&mut self, missing: bool) {
        self.target_missing = missing;
    }

    /// Advance the stage clock and return every transition that finished.
    pub fn drain_completed(&mut self, now_ms: u64) -> Vec<TransitionHandle> {
        self.now_ms = now_ms;
        let mut done: Vec<TransitionHandle> = self
            .live
            .iter()
            .filter(|(_, t)| t.completes_at_ms <= now_ms)
            .map(|(h, _)| *h)
            .collect();
        done.sort_by_key(|h| h.0);
        for handle in &done {
            self.live.remove(handle);
        }
        done
    }
}

impl FlowRenderer for HeadlessRenderer {
    fn begin_transition(&mut self, spec: &TransitionSpec) -> Result<TransitionHandle, RenderError> {
        if self.target_missing {
            return Err(RenderError::TargetMissing("flow overlay".into()));
        }
        self.next_handle += 1;
        let handle = TransitionHandle(self.next_handle);
        self.live.insert(
            handle,
            ActiveTransition {
                completes_at_ms: self.now_ms + u64::from(spec.duration_ms),
            },
        );
        Ok(handle)
    }

    fn cancel_transition(&mut self, handle: TransitionHandle) {
        self.live.remove(&handle);
    }

    fn draw_connectors(&mut self, _centers: &NodeCenters) -> Result<(), RenderError> {
        if self.target_missing {
            return Err(RenderError::SurfaceGone);
        }
        self.connector_draws += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColorToken, Point};
    use crate::render::Easing;

    fn spec(duration_ms: u32) -> TransitionSpec {
        TransitionSpec {
            from: Point::new(0.0, 0.0),
            to: Point::new(100.0, 0.0),
            duration_ms,
            easing: Easing::Linear,
            color: ColorToken::Solar,
            size_px: 8,
            opacity: 0.5,
            fade_in_end: 0.1,
            fade_out_start: 0.9,
        }
    }

    #[test]
    fn test_transitions_complete_on_the_clock() {
        let mut stage = HeadlessRenderer::default();
        let a = stage.begin_transition(&spec(1000)).unwrap();
        let _b = stage.begin_transition(&spec(2000)).unwrap();

        assert!(stage.drain_completed(500).is_empty());
        assert_eq!(stage.drain_completed(1000), vec![a]);
        assert_eq!(stage.live_count(), 1);
        assert_eq!(stage.drain_completed(2000).len(), 1);
    }

    #[test]
    fn test_missing_target_rejects_creation() {
        let mut stage = HeadlessRenderer::default();
        stage.set_target_missing(true);
        assert!(stage.begin_transition(&spec(1000)).is_err());
    }

    #[test]
    fn test_default_geometry_resolves_all_nodes() {
        let geometry = DashboardGeometry::default();
        use strum::IntoEnumIterator;
        for node in NodeId::iter() {
            assert!(geometry.node_box(node).is_some());
        }
        assert!(geometry.container().is_some());
    }
}
