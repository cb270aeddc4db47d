//! # Rendering Seam
//!
//! The simulation core has zero dependency on a concrete rendering API. It
//! talks to the surface through two traits: [`GeometryProvider`] supplies
//! bounding boxes for the five nodes and their container, and
//! [`FlowRenderer`] supplies a scheduled-visual-transition capability. The
//! host observes transition completions on its own clock and reports them
//! back to the engine.

use thiserror::Error;

use crate::domain::{ColorToken, NodeCenters, NodeId, Point, Rect};

/// Failures at the rendering seam. Always absorbed and logged by the engine;
/// callers of the core never see them.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render target missing: {0}")]
    TargetMissing(String),

    #[error("rendering surface is gone")]
    SurfaceGone,
}

/// Easing applied to a scheduled transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    EaseInOut,
}

/// Opaque handle to one running visual transition, issued by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionHandle(pub u64);

/// A fully described visual transition: travel endpoints, timing and the
/// particle's appearance, including the travel fractions between which the
/// particle holds its full target opacity.
#[derive(Debug, Clone)]
pub struct TransitionSpec {
    pub from: Point,
    pub to: Point,
    pub duration_ms: u32,
    pub easing: Easing,
    pub color: ColorToken,
    pub size_px: u32,
    pub opacity: f64,
    pub fade_in_end: f64,
    pub fade_out_start: f64,
}

/// Capability to run timed visual transitions on the rendering surface.
pub trait FlowRenderer {
    /// Start one transition. Errors mean the target is absent and the
    /// particle is silently skipped upstream.
    fn begin_transition(&mut self, spec: &TransitionSpec) -> Result<TransitionHandle, RenderError>;

    /// Release a transition and remove its visual entity. Best effort;
    /// unknown handles are ignored.
    fn cancel_transition(&mut self, handle: TransitionHandle);

    /// Redraw the static connector lines between node centers.
    fn draw_connectors(&mut self, centers: &NodeCenters) -> Result<(), RenderError>;
}

/// Bounding-box geometry for the five named nodes and their container.
///
/// Implementations must report box geometry only; anything derived from text
/// content would re-fingerprint the layout on every data refresh.
pub trait GeometryProvider {
    fn container(&self) -> Option<Rect>;

    fn node_box(&self, node: NodeId) -> Option<Rect>;

    /// Active scale transform on the container, 1.0 when none.
    fn scale(&self) -> f64 {
        1.0
    }
}
