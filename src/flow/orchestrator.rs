//! # Flow Engine
//!
//! Per-update-cycle driver owning every piece of flow state: the record
//! store, the speed-smoothing cache, the layout cache, the particle manager
//! and the cooperative task queue. Constructed by the hosting controller and
//! passed `&mut` into every operation; there are no process-wide singletons.
//!
//! The host drives three entry points on its event loop:
//! - [`FlowEngine::animate_flow`] per data refresh,
//! - [`FlowEngine::tick`] per frame to flush due deferred work,
//! - [`FlowEngine::on_transition_complete`] when a traversal finishes.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EdgeMaxima;
use crate::domain::{
    ColorToken, EdgeId, FlowKey, NodeCenters, PowerSnapshot, SourceContribution,
};
use crate::render::{FlowRenderer, GeometryProvider};

use super::attribution;
use super::layout::{LayoutCache, LayoutResolution, CONNECTOR_REDRAW_DEBOUNCE_MS};
use super::params::{self, FlowVisuals, SpeedCache, MIN_FLOW_POWER_W};
use super::particles::{ParticleLifecycleManager, ParticleSpec};
use super::state::{
    FlowRecord, FlowStateStore, MultiSourceOutcome, Transition, PARTICLE_BUDGET_DIVISOR_W,
    SETTLE_DELAY_MS,
};
use super::timers::{ScheduledTask, TimerQueue};

/// A scalar jump above this, with enough particles live, warrants an eager
/// cleanup instead of waiting for natural attrition.
pub const EAGER_CLEANUP_DELTA_W: f64 = 2000.0;
pub const EAGER_CLEANUP_MIN_PARTICLES: usize = 10;

/// Point-in-time counters for manual inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub live_particles: usize,
    pub flow_records: usize,
    pub active_flows: usize,
    pub pending_tasks: usize,
    pub motion_disabled: bool,
}

pub struct FlowEngine {
    maxima: EdgeMaxima,
    store: FlowStateStore,
    speeds: SpeedCache,
    layout: LayoutCache,
    particles: ParticleLifecycleManager,
    timers: TimerQueue,
    connector_redraw_due: Option<u64>,
    last_snapshot: Option<PowerSnapshot>,
    reduced_motion: bool,
    motion_disabled: bool,
    update_in_progress: bool,
    pending_snapshot: Option<PowerSnapshot>,
}

impl FlowEngine {
    pub fn new(maxima: EdgeMaxima) -> Self {
        Self {
            maxima,
            store: FlowStateStore::new(),
            speeds: SpeedCache::default(),
            layout: LayoutCache::new(),
            particles: ParticleLifecycleManager::default(),
            timers: TimerQueue::default(),
            connector_redraw_due: None,
            last_snapshot: None,
            reduced_motion: false,
            motion_disabled: false,
            update_in_progress: false,
            pending_snapshot: None,
        }
    }

    /// Record the host's reduced-motion preference. Observed on the next
    /// update cycle; once observed, the subsystem stays off permanently.
    pub fn set_reduced_motion(&mut self, enabled: bool) {
        self.reduced_motion = enabled;
    }

    /// Run one update cycle against a fresh power snapshot.
    ///
    /// Re-entrant invocations (a completion callback refreshing data while
    /// an update runs) coalesce into a single trailing re-run.
    pub fn animate_flow(
        &mut self,
        snapshot: PowerSnapshot,
        geometry: &dyn GeometryProvider,
        renderer: &mut dyn FlowRenderer,
        now_ms: u64,
    ) {
        if self.update_in_progress {
            self.pending_snapshot = Some(snapshot);
            return;
        }
        self.update_in_progress = true;
        let mut next = Some(snapshot);
        while let Some(current) = next.take() {
            self.run_update(current, geometry, renderer, now_ms);
            next = self.pending_snapshot.take();
        }
        self.update_in_progress = false;
    }

    fn run_update(
        &mut self,
        snapshot: PowerSnapshot,
        geometry: &dyn GeometryProvider,
        renderer: &mut dyn FlowRenderer,
        now_ms: u64,
    ) {
        if self.reduced_motion && !self.motion_disabled {
            info!("reduced-motion preference set, disabling particle subsystem");
            self.stop_all(renderer);
            self.motion_disabled = true;
        }
        if self.motion_disabled {
            return;
        }

        let centers = match self.layout.resolve(geometry) {
            LayoutResolution::Unavailable => {
                debug!("node geometry unresolved, skipping update cycle");
                return;
            }
            LayoutResolution::Cached(centers) => centers,
            LayoutResolution::Recomputed { centers, teardown } => {
                if teardown {
                    info!("layout shifted past threshold, tearing down particles");
                    self.stop_all(renderer);
                    self.connector_redraw_due = Some(now_ms + CONNECTOR_REDRAW_DEBOUNCE_MS);
                }
                centers
            }
        };

        if let Some(previous) = self.last_snapshot {
            let delta = snapshot.max_abs_delta(&previous);
            if delta > EAGER_CLEANUP_DELTA_W
                && self.particles.live_count() > EAGER_CLEANUP_MIN_PARTICLES
            {
                info!(
                    delta_w = delta,
                    live = self.particles.live_count(),
                    "abrupt power transition, eager particle cleanup"
                );
                self.stop_all(renderer);
            }
        }

        self.update_solar_group(&snapshot, &centers, now_ms);
        self.update_battery_group(&snapshot, &centers, now_ms);
        self.update_grid_group(&snapshot, &centers, now_ms);
        self.update_house_group(&snapshot, now_ms);

        self.last_snapshot = Some(snapshot);
        self.flush_due(renderer, now_ms);
    }

    /// Flush deferred work due at `now_ms`. Called by the host once per
    /// frame and at the end of every update cycle.
    pub fn tick(&mut self, renderer: &mut dyn FlowRenderer, now_ms: u64) {
        if self.motion_disabled {
            return;
        }
        self.flush_due(renderer, now_ms);
    }

    /// Report a finished traversal; the particle decides for itself whether
    /// it respawns.
    pub fn on_transition_complete(
        &mut self,
        handle: crate::render::TransitionHandle,
        renderer: &mut dyn FlowRenderer,
    ) {
        self.particles.on_complete(handle, &self.store, renderer);
    }

    /// Stop everything: release live particles, drop deferred work,
    /// deactivate all flow records. Idempotent.
    pub fn stop_all(&mut self, renderer: &mut dyn FlowRenderer) {
        self.particles.clear(renderer);
        self.timers.clear();
        self.store.deactivate_all();
    }

    /// Full subsystem reset: stop-all plus clearing the smoothing and
    /// layout caches.
    pub fn reset(&mut self, renderer: &mut dyn FlowRenderer) {
        self.stop_all(renderer);
        self.speeds.clear();
        self.layout.invalidate();
        self.connector_redraw_due = None;
        self.last_snapshot = None;
    }

    /// Force the next cycle to recompute node geometry.
    pub fn invalidate_layout(&mut self) {
        self.layout.invalidate();
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            live_particles: self.particles.live_count(),
            flow_records: self.store.record_count(),
            active_flows: self.store.active_count(),
            pending_tasks: self.timers.len(),
            motion_disabled: self.motion_disabled,
        }
    }

    fn update_solar_group(
        &mut self,
        snapshot: &PowerSnapshot,
        centers: &NodeCenters,
        now_ms: u64,
    ) {
        let power = snapshot.solar_w.max(0.0);
        let v = params::visuals(
            FlowKey::Base(EdgeId::SolarToInverter),
            power,
            self.maxima.solar_w,
            &mut self.speeds,
        );
        self.commit_simple(EdgeId::SolarToInverter, v, ColorToken::Solar, centers, now_ms);
    }

    fn update_battery_group(
        &mut self,
        snapshot: &PowerSnapshot,
        centers: &NodeCenters,
        now_ms: u64,
    ) {
        let charging = snapshot.battery_w >= MIN_FLOW_POWER_W;
        let discharging = snapshot.battery_w <= -MIN_FLOW_POWER_W;

        // Charging side carries a decomposed stream per contributing source.
        let charge_power = if charging { snapshot.battery_w } else { 0.0 };
        let v = params::visuals(
            FlowKey::Base(EdgeId::InverterToBattery),
            charge_power,
            self.maxima.battery_w,
            &mut self.speeds,
        );
        let sources = if charging && v.active {
            attribution::battery_charge_sources(
                snapshot.solar_w,
                snapshot.grid_w,
                snapshot.battery_w,
            )
        } else {
            Vec::new()
        };
        self.commit_multi(EdgeId::InverterToBattery, sources, &v, self.maxima.battery_w, now_ms);

        let discharge_power = if discharging { -snapshot.battery_w } else { 0.0 };
        let v = params::visuals(
            FlowKey::Base(EdgeId::BatteryToInverter),
            discharge_power,
            self.maxima.battery_w,
            &mut self.speeds,
        );
        self.commit_simple(EdgeId::BatteryToInverter, v, ColorToken::Battery, centers, now_ms);
    }

    fn update_grid_group(
        &mut self,
        snapshot: &PowerSnapshot,
        centers: &NodeCenters,
        now_ms: u64,
    ) {
        let importing = snapshot.grid_w >= MIN_FLOW_POWER_W;
        let exporting = snapshot.grid_w <= -MIN_FLOW_POWER_W;

        let import_power = if importing { snapshot.grid_w } else { 0.0 };
        let v = params::visuals(
            FlowKey::Base(EdgeId::GridToInverter),
            import_power,
            self.maxima.grid_w,
            &mut self.speeds,
        );
        self.commit_simple(EdgeId::GridToInverter, v, ColorToken::Grid, centers, now_ms);

        // Export side is decomposed: solar surplus first, then battery.
        let export_power = if exporting { -snapshot.grid_w } else { 0.0 };
        let v = params::visuals(
            FlowKey::Base(EdgeId::InverterToGrid),
            export_power,
            self.maxima.grid_w,
            &mut self.speeds,
        );
        let sources = if exporting && v.active {
            attribution::grid_export_sources(snapshot.solar_w, snapshot.battery_w, export_power)
        } else {
            Vec::new()
        };
        self.commit_multi(EdgeId::InverterToGrid, sources, &v, self.maxima.grid_w, now_ms);
    }

    fn update_house_group(&mut self, snapshot: &PowerSnapshot, now_ms: u64) {
        let power = snapshot.house_w.max(0.0);
        let v = params::visuals(
            FlowKey::Base(EdgeId::InverterToHouse),
            power,
            self.maxima.house_w,
            &mut self.speeds,
        );
        let sources = if v.active {
            attribution::house_sources(
                snapshot.solar_w,
                snapshot.battery_w,
                snapshot.grid_w,
                snapshot.house_w,
            )
        } else {
            Vec::new()
        };
        self.commit_multi(EdgeId::InverterToHouse, sources, &v, self.maxima.house_w, now_ms);
    }

    fn commit_simple(
        &mut self,
        edge: EdgeId,
        v: FlowVisuals,
        color: ColorToken,
        centers: &NodeCenters,
        now_ms: u64,
    ) {
        match self.store.apply(edge, &v) {
            Transition::None | Transition::Deactivate => {}
            Transition::Soft { added, stagger_ms } => {
                let generation = self
                    .store
                    .record(&FlowKey::Base(edge))
                    .map(|r| r.generation)
                    .unwrap_or(0);
                // Incremental particles trail the already-running ones.
                self.schedule_wave(
                    edge,
                    added,
                    stagger_ms,
                    u64::from(stagger_ms),
                    &v,
                    color,
                    centers,
                    now_ms,
                    generation,
                );
            }
            Transition::Activate {
                count,
                stagger_ms,
                generation,
            } => {
                self.schedule_wave(
                    edge, count, stagger_ms, 0, &v, color, centers, now_ms, generation,
                );
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn schedule_wave(
        &mut self,
        edge: EdgeId,
        count: u8,
        stagger_ms: u32,
        initial_delay_ms: u64,
        v: &FlowVisuals,
        color: ColorToken,
        centers: &NodeCenters,
        now_ms: u64,
        generation: u64,
    ) {
        let (from, to) = centers.endpoints(edge);
        for i in 0..u64::from(count) {
            let spec = ParticleSpec {
                key: FlowKey::Base(edge),
                from,
                to,
                color,
                speed_ms: v.speed_ms,
                size_px: v.size_px,
                opacity: v.opacity,
            };
            let due = now_ms + initial_delay_ms + u64::from(stagger_ms) * i;
            self.timers
                .schedule(due, ScheduledTask::SpawnParticle { spec, generation });
        }
    }

    fn commit_multi(
        &mut self,
        edge: EdgeId,
        sources: Vec<SourceContribution>,
        v: &FlowVisuals,
        max_w: f64,
        now_ms: u64,
    ) {
        match self.store.apply_sources(edge, sources, v.speed_ms, max_w) {
            MultiSourceOutcome::Unchanged | MultiSourceOutcome::Deactivated => {}
            MultiSourceOutcome::Resettle { generation } => {
                self.timers.schedule(
                    now_ms + SETTLE_DELAY_MS,
                    ScheduledTask::MultiSourceRespawn { edge, generation },
                );
            }
        }
    }

    fn flush_due(&mut self, renderer: &mut dyn FlowRenderer, now_ms: u64) {
        // Respawn tasks enqueue follow-up spawns; drain until quiet.
        loop {
            let due = self.timers.pop_due(now_ms);
            if due.is_empty() {
                break;
            }
            for task in due {
                match task {
                    ScheduledTask::SpawnParticle { spec, generation } => {
                        self.particles.spawn(&self.store, renderer, spec, generation);
                    }
                    ScheduledTask::MultiSourceRespawn { edge, generation } => {
                        self.respawn_decomposition(edge, generation, now_ms);
                    }
                }
            }
        }

        if let Some(due) = self.connector_redraw_due {
            if due <= now_ms {
                self.connector_redraw_due = None;
                if let Some(centers) = self.layout.cached() {
                    if let Err(err) = renderer.draw_connectors(&centers) {
                        warn!(error = %err, "connector redraw failed");
                    }
                }
            }
        }
    }

    /// Materialize a settled decomposition: one sub record per source, with
    /// a particle budget proportional to each source's share.
    fn respawn_decomposition(&mut self, edge: EdgeId, generation: u64, now_ms: u64) {
        let Some(pending) = self.store.take_pending(edge, generation) else {
            return;
        };
        let Some(centers) = self.layout.cached() else {
            return;
        };
        let total: f64 = pending.sources.iter().map(|s| s.power_w).sum();
        if total <= 0.0 {
            return;
        }

        let budget = ((pending.sources.len() as f64 + total / PARTICLE_BUDGET_DIVISOR_W).ceil()
            as i64)
            .clamp(1, 4) as u32;
        let stagger_ms = u64::from(pending.speed_ms / budget / 2);
        let (from, to) = centers.endpoints(edge);

        let mut delay_ms = 0u64;
        for (index, source) in pending.sources.iter().enumerate() {
            // Per-source rounding can push the spawned total slightly past
            // the budget; known imprecision, kept as-is.
            let allocated = (((f64::from(budget) * source.power_w / total).round() as i64).max(1))
                .min(4) as u8;
            let key = FlowKey::Sub {
                base: edge,
                source: source.kind,
                index: index as u8,
            };
            let intensity = params::intensity(source.power_w, pending.max_w);
            self.store.insert_sub(
                key,
                FlowRecord {
                    active: true,
                    speed_ms: pending.speed_ms,
                    count: allocated,
                    sources: vec![source.clone()],
                    generation,
                },
            );
            for _ in 0..allocated {
                let spec = ParticleSpec {
                    key,
                    from,
                    to,
                    color: source.color,
                    speed_ms: pending.speed_ms,
                    size_px: params::particle_size_px(intensity),
                    opacity: params::particle_opacity(intensity),
                };
                self.timers.schedule(
                    now_ms + delay_ms,
                    ScheduledTask::SpawnParticle { spec, generation },
                );
                delay_ms += stagger_ms;
            }
        }
        debug!(edge = %edge, sources = pending.sources.len(), budget, "decomposition respawned");
    }
}
