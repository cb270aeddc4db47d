//! # Particle Lifecycle
//!
//! Creates the ephemeral visual entities traveling along active edges and
//! keeps them self-perpetuating: a completed particle re-reads its edge's
//! current state and respawns itself with the current speed, so a live speed
//! change takes effect at the next traversal without a restart. A hard cap
//! on live particles is the sole backstop against unbounded growth under
//! oscillating power.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::domain::{ColorToken, FlowKey, Point};
use crate::render::{Easing, FlowRenderer, TransitionHandle, TransitionSpec};

use super::state::FlowStateStore;

/// Creation is rejected while the surface holds more than this many live
/// particles.
pub const PARTICLE_CAP: usize = 50;

/// Travel fraction at which fade-in completes.
pub const FADE_IN_END: f64 = 0.10;
/// Travel fraction at which fade-out begins.
pub const FADE_OUT_START: f64 = 0.90;

/// Everything needed to (re)create one particle.
#[derive(Debug, Clone)]
pub struct ParticleSpec {
    pub key: FlowKey,
    pub from: Point,
    pub to: Point,
    pub color: ColorToken,
    pub speed_ms: u32,
    pub size_px: u32,
    pub opacity: f64,
}

#[derive(Debug, Clone)]
struct Particle {
    spec: ParticleSpec,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct ParticleLifecycleManager {
    live: HashMap<TransitionHandle, Particle>,
}

impl ParticleLifecycleManager {
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Create one continuously traveling particle.
    ///
    /// No-op when the edge's record is gone, inactive, or from another
    /// generation; rejected with a log when the surface is over the cap;
    /// silently skipped when the renderer reports its target absent.
    pub fn spawn(
        &mut self,
        store: &FlowStateStore,
        renderer: &mut dyn FlowRenderer,
        spec: ParticleSpec,
        generation: u64,
    ) {
        let Some(record) = store.record(&spec.key) else {
            return;
        };
        if !record.active || record.generation != generation {
            return;
        }
        if self.live.len() > PARTICLE_CAP {
            warn!(
                key = %spec.key,
                live = self.live.len(),
                "particle cap exceeded, rejecting creation"
            );
            return;
        }

        let transition = TransitionSpec {
            from: spec.from,
            to: spec.to,
            duration_ms: spec.speed_ms,
            easing: Easing::Linear,
            color: spec.color,
            size_px: spec.size_px,
            opacity: spec.opacity,
            fade_in_end: FADE_IN_END,
            fade_out_start: FADE_OUT_START,
        };
        match renderer.begin_transition(&transition) {
            Ok(handle) => {
                self.live.insert(handle, Particle { spec, generation });
            }
            Err(err) => {
                debug!(key = %spec.key, error = %err, "particle creation skipped");
            }
        }
    }

    /// Handle a finished traversal: release the handle, drop the entity,
    /// then re-read the edge's *current* state and respawn at the same
    /// endpoints and color with the current speed if still warranted.
    pub fn on_complete(
        &mut self,
        handle: TransitionHandle,
        store: &FlowStateStore,
        renderer: &mut dyn FlowRenderer,
    ) {
        let Some(particle) = self.live.remove(&handle) else {
            return;
        };
        renderer.cancel_transition(handle);

        let Some(record) = store.record(&particle.spec.key) else {
            return;
        };
        if !record.active || record.generation != particle.generation {
            return;
        }
        let mut spec = particle.spec;
        spec.speed_ms = record.speed_ms;
        self.spawn(store, renderer, spec, particle.generation);
    }

    /// Forced cleanup: release every live handle. Best effort.
    pub fn clear(&mut self, renderer: &mut dyn FlowRenderer) {
        for (handle, _) in self.live.drain() {
            renderer.cancel_transition(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EdgeId, SourceKind};
    use crate::flow::params::FlowVisuals;
    use crate::render::RenderError;

    /// Minimal renderer double: counts live transitions, optionally reports
    /// its target missing.
    #[derive(Default)]
    struct StubRenderer {
        next: u64,
        live: std::collections::HashSet<TransitionHandle>,
        target_missing: bool,
        last_duration_ms: Option<u32>,
    }

    impl FlowRenderer for StubRenderer {
        fn begin_transition(
            &mut self,
            spec: &TransitionSpec,
        ) -> Result<TransitionHandle, RenderError> {
            if self.target_missing {
                return Err(RenderError::TargetMissing("stub".into()));
            }
            self.next += 1;
            let handle = TransitionHandle(self.next);
            self.live.insert(handle);
            self.last_duration_ms = Some(spec.duration_ms);
            Ok(handle)
        }

        fn cancel_transition(&mut self, handle: TransitionHandle) {
            self.live.remove(&handle);
        }

        fn draw_connectors(
            &mut self,
            _centers: &crate::domain::NodeCenters,
        ) -> Result<(), RenderError> {
            Ok(())
        }
    }

    const EDGE: EdgeId = EdgeId::SolarToInverter;

    fn activate(store: &mut FlowStateStore, speed_ms: u32) -> u64 {
        let v = FlowVisuals {
            active: true,
            intensity: 50.0,
            speed_ms,
            count: 2,
            size_px: 11,
            opacity: 0.6,
        };
        store.apply(EDGE, &v);
        store.record(&FlowKey::Base(EDGE)).unwrap().generation
    }

    fn spec(speed_ms: u32) -> ParticleSpec {
        ParticleSpec {
            key: FlowKey::Base(EDGE),
            from: Point::new(0.0, 0.0),
            to: Point::new(100.0, 0.0),
            color: SourceKind::Solar.color(),
            speed_ms,
            size_px: 11,
            opacity: 0.6,
        }
    }

    #[test]
    fn test_spawn_requires_active_record() {
        let store = FlowStateStore::new();
        let mut renderer = StubRenderer::default();
        let mut manager = ParticleLifecycleManager::default();
        manager.spawn(&store, &mut renderer, spec(2000), 1);
        assert_eq!(manager.live_count(), 0);
    }

    #[test]
    fn test_spawn_rejects_stale_generation() {
        let mut store = FlowStateStore::new();
        let g = activate(&mut store, 2000);
        let mut renderer = StubRenderer::default();
        let mut manager = ParticleLifecycleManager::default();
        manager.spawn(&store, &mut renderer, spec(2000), g - 1);
        assert_eq!(manager.live_count(), 0);
        manager.spawn(&store, &mut renderer, spec(2000), g);
        assert_eq!(manager.live_count(), 1);
    }

    #[test]
    fn test_cap_never_grows_past_rejection_point() {
        let mut store = FlowStateStore::new();
        let g = activate(&mut store, 2000);
        let mut renderer = StubRenderer::default();
        let mut manager = ParticleLifecycleManager::default();
        for _ in 0..200 {
            manager.spawn(&store, &mut renderer, spec(2000), g);
        }
        let saturated = manager.live_count();
        assert!(saturated <= PARTICLE_CAP + 1);
        manager.spawn(&store, &mut renderer, spec(2000), g);
        assert_eq!(manager.live_count(), saturated);
    }

    #[test]
    fn test_missing_target_is_silently_skipped() {
        let mut store = FlowStateStore::new();
        let g = activate(&mut store, 2000);
        let mut renderer = StubRenderer {
            target_missing: true,
            ..Default::default()
        };
        let mut manager = ParticleLifecycleManager::default();
        manager.spawn(&store, &mut renderer, spec(2000), g);
        assert_eq!(manager.live_count(), 0);
    }

    #[test]
    fn test_completion_respawns_with_current_speed() {
        let mut store = FlowStateStore::new();
        let g = activate(&mut store, 2000);
        let mut renderer = StubRenderer::default();
        let mut manager = ParticleLifecycleManager::default();
        manager.spawn(&store, &mut renderer, spec(2000), g);
        let handle = *renderer.live.iter().next().unwrap();

        // Speed drifts while the particle is in flight.
        activate(&mut store, 1600);
        manager.on_complete(handle, &store, &mut renderer);
        assert_eq!(manager.live_count(), 1);
        assert_eq!(renderer.last_duration_ms, Some(1600));
    }

    #[test]
    fn test_completion_declines_after_deactivation() {
        let mut store = FlowStateStore::new();
        let g = activate(&mut store, 2000);
        let mut renderer = StubRenderer::default();
        let mut manager = ParticleLifecycleManager::default();
        manager.spawn(&store, &mut renderer, spec(2000), g);
        let handle = *renderer.live.iter().next().unwrap();

        store.deactivate_all();
        manager.on_complete(handle, &store, &mut renderer);
        assert_eq!(manager.live_count(), 0);
        assert!(renderer.live.is_empty(), "handle released");
    }

    #[test]
    fn test_clear_releases_all_handles() {
        let mut store = FlowStateStore::new();
        let g = activate(&mut store, 2000);
        let mut renderer = StubRenderer::default();
        let mut manager = ParticleLifecycleManager::default();
        for _ in 0..5 {
            manager.spawn(&store, &mut renderer, spec(2000), g);
        }
        manager.clear(&mut renderer);
        assert_eq!(manager.live_count(), 0);
        assert!(renderer.live.is_empty());
        manager.clear(&mut renderer);
        assert_eq!(manager.live_count(), 0);
    }
}
