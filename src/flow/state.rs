//! # Flow State Store
//!
//! One persistent [`FlowRecord`] per base edge plus transient sub-edge
//! records for multi-source decompositions. The store decides how a
//! requested visual state maps onto the running animation: soft update
//! (keep particles, absorb new speed/count), full transition (activate or
//! deactivate), or a settle-and-respawn of a changed decomposition.

use serde::Serialize;
use std::collections::HashMap;
use strum::IntoEnumIterator;

use crate::domain::{EdgeId, FlowKey, SourceContribution};

use super::params::FlowVisuals;

/// Speed changes above this restart threshold force a visible adjustment.
pub const RESTART_SPEED_DELTA_MS: i64 = 150;
/// Settle delay between tearing down a decomposition and respawning it.
pub const SETTLE_DELAY_MS: u64 = 100;
/// Watts per extra particle in the multi-source budget.
pub const PARTICLE_BUDGET_DIVISOR_W: f64 = 2000.0;

/// Persistent animation state for one flow key.
#[derive(Debug, Clone, Serialize)]
pub struct FlowRecord {
    pub active: bool,
    pub speed_ms: u32,
    pub count: u8,
    pub sources: Vec<SourceContribution>,
    /// Bumped on every activation boundary; pending spawns and respawns of
    /// an older generation decline to run.
    pub generation: u64,
}

impl FlowRecord {
    fn idle() -> Self {
        Self {
            active: false,
            speed_ms: 0,
            count: 1,
            sources: Vec::new(),
            generation: 0,
        }
    }
}

/// A decomposition waiting out its settle delay before respawning.
#[derive(Debug, Clone)]
pub struct PendingDecomposition {
    pub sources: Vec<SourceContribution>,
    pub speed_ms: u32,
    pub max_w: f64,
    pub generation: u64,
}

/// Outcome of committing a simple (single-source) visual state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to do; running particles absorb stored changes at respawn.
    None,
    /// Keep running particles, spawn only the incremental ones.
    Soft { added: u8, stagger_ms: u32 },
    /// Inactive edge became active: spawn a full staggered wave.
    Activate {
        count: u8,
        stagger_ms: u32,
        generation: u64,
    },
    /// Active edge stopped; particles observe the flag at next completion.
    Deactivate,
}

/// Outcome of committing a multi-source decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiSourceOutcome {
    Unchanged,
    /// Decomposition emptied out; sub records deleted, nothing respawns.
    Deactivated,
    /// Decomposition changed; respawn after the settle delay.
    Resettle { generation: u64 },
}

#[derive(Debug)]
pub struct FlowStateStore {
    base: HashMap<EdgeId, FlowRecord>,
    subs: HashMap<FlowKey, FlowRecord>,
    pending: HashMap<EdgeId, PendingDecomposition>,
}

impl Default for FlowStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowStateStore {
    /// Base records for all six edges exist for the engine lifetime.
    pub fn new() -> Self {
        Self {
            base: EdgeId::iter().map(|e| (e, FlowRecord::idle())).collect(),
            subs: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn record(&self, key: &FlowKey) -> Option<&FlowRecord> {
        match key {
            FlowKey::Base(edge) => self.base.get(edge),
            sub => self.subs.get(sub),
        }
    }

    fn base_mut(&mut self, edge: EdgeId) -> &mut FlowRecord {
        self.base.entry(edge).or_insert_with(FlowRecord::idle)
    }

    fn stagger_ms(speed_ms: u32, count: u8) -> u32 {
        speed_ms / u32::from(count.max(1)) / 2
    }

    /// Commit a simple visual state for a base edge and decide the spawn work.
    pub fn apply(&mut self, edge: EdgeId, v: &FlowVisuals) -> Transition {
        let rec = self.base_mut(edge);

        if rec.active && v.active {
            let count_changed = rec.count != v.count;
            let speed_jump =
                (i64::from(rec.speed_ms) - i64::from(v.speed_ms)).abs() > RESTART_SPEED_DELTA_MS;
            let added = v.count.saturating_sub(rec.count);
            rec.speed_ms = v.speed_ms;
            rec.count = v.count;
            if (count_changed || speed_jump) && added > 0 {
                return Transition::Soft {
                    added,
                    stagger_ms: Self::stagger_ms(v.speed_ms, v.count),
                };
            }
            // Count shrink or a pure speed change: excess particles end
            // naturally and respawns pick up the stored speed.
            return Transition::None;
        }

        let was_active = rec.active;
        rec.active = v.active;
        rec.speed_ms = v.speed_ms;
        rec.count = v.count;
        if v.active {
            rec.generation += 1;
            Transition::Activate {
                count: v.count,
                stagger_ms: Self::stagger_ms(v.speed_ms, v.count),
                generation: rec.generation,
            }
        } else if was_active {
            rec.generation += 1;
            Transition::Deactivate
        } else {
            Transition::None
        }
    }

    /// Commit a multi-source decomposition for a base edge.
    ///
    /// Changes are detected by structural equality on (kind, power, color)
    /// per index plus the smoothed speed. On any change the base edge goes
    /// inactive, its sub records are deleted exactly, and the new
    /// decomposition is parked for the settle delay.
    pub fn apply_sources(
        &mut self,
        edge: EdgeId,
        sources: Vec<SourceContribution>,
        speed_ms: u32,
        max_w: f64,
    ) -> MultiSourceOutcome {
        {
            let rec = self.base_mut(edge);
            let empty_stays_empty = sources.is_empty() && rec.sources.is_empty();
            if empty_stays_empty || (rec.sources == sources && rec.speed_ms == speed_ms) {
                return MultiSourceOutcome::Unchanged;
            }
        }

        self.remove_subs(edge);
        let rec = self.base_mut(edge);
        rec.active = false;
        rec.generation += 1;
        rec.speed_ms = speed_ms;
        rec.sources = sources.clone();
        let generation = rec.generation;

        if sources.is_empty() {
            self.pending.remove(&edge);
            return MultiSourceOutcome::Deactivated;
        }

        self.pending.insert(
            edge,
            PendingDecomposition {
                sources,
                speed_ms,
                max_w,
                generation,
            },
        );
        MultiSourceOutcome::Resettle { generation }
    }

    /// Claim a parked decomposition if its generation is still current.
    pub fn take_pending(&mut self, edge: EdgeId, generation: u64) -> Option<PendingDecomposition> {
        match self.pending.get(&edge) {
            Some(p) if p.generation == generation => self.pending.remove(&edge),
            _ => None,
        }
    }

    pub fn insert_sub(&mut self, key: FlowKey, record: FlowRecord) {
        self.subs.insert(key, record);
    }

    /// Delete every sub record belonging to one base edge.
    pub fn remove_subs(&mut self, edge: EdgeId) {
        self.subs.retain(|key, _| key.base() != edge);
    }

    /// Deactivate everything and invalidate all generations. Base records
    /// survive; sub records and parked decompositions are dropped.
    pub fn deactivate_all(&mut self) {
        for rec in self.base.values_mut() {
            rec.active = false;
            rec.sources.clear();
            rec.generation += 1;
        }
        self.subs.clear();
        self.pending.clear();
    }

    pub fn record_count(&self) -> usize {
        self.base.len() + self.subs.len()
    }

    pub fn active_count(&self) -> usize {
        self.base.values().filter(|r| r.active).count()
            + self.subs.values().filter(|r| r.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceKind;

    fn active_visuals(speed_ms: u32, count: u8) -> FlowVisuals {
        FlowVisuals {
            active: true,
            intensity: 50.0,
            speed_ms,
            count,
            size_px: 11,
            opacity: 0.6,
        }
    }

    fn inactive_visuals() -> FlowVisuals {
        FlowVisuals {
            active: false,
            intensity: 0.0,
            speed_ms: 3500,
            count: 1,
            size_px: 6,
            opacity: 0.3,
        }
    }

    const EDGE: EdgeId = EdgeId::SolarToInverter;

    #[test]
    fn test_activation_spawns_full_wave() {
        let mut store = FlowStateStore::new();
        match store.apply(EDGE, &active_visuals(2000, 3)) {
            Transition::Activate {
                count,
                stagger_ms,
                generation,
            } => {
                assert_eq!(count, 3);
                assert_eq!(stagger_ms, 2000 / 3 / 2);
                assert_eq!(generation, 1);
            }
            other => panic!("expected activation, got {other:?}"),
        }
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_count_increase_is_soft() {
        let mut store = FlowStateStore::new();
        store.apply(EDGE, &active_visuals(2000, 2));
        match store.apply(EDGE, &active_visuals(2000, 4)) {
            Transition::Soft { added, stagger_ms } => {
                assert_eq!(added, 2);
                assert_eq!(stagger_ms, 2000 / 4 / 2);
            }
            other => panic!("expected soft update, got {other:?}"),
        }
    }

    #[test]
    fn test_count_shrink_is_natural_attrition() {
        let mut store = FlowStateStore::new();
        store.apply(EDGE, &active_visuals(2000, 4));
        assert_eq!(store.apply(EDGE, &active_visuals(2000, 2)), Transition::None);
        // New count is stored so completed particles stop respawning past it.
        let rec = store.record(&FlowKey::Base(EDGE)).unwrap();
        assert_eq!(rec.count, 2);
    }

    #[test]
    fn test_speed_jump_stores_without_teardown() {
        let mut store = FlowStateStore::new();
        store.apply(EDGE, &active_visuals(2000, 2));
        let g = store.record(&FlowKey::Base(EDGE)).unwrap().generation;
        assert_eq!(
            store.apply(EDGE, &active_visuals(1700, 2)),
            Transition::None
        );
        let rec = store.record(&FlowKey::Base(EDGE)).unwrap();
        assert_eq!(rec.speed_ms, 1700);
        assert_eq!(rec.generation, g, "running particles must keep respawning");
    }

    #[test]
    fn test_small_speed_drift_is_absorbed() {
        let mut store = FlowStateStore::new();
        store.apply(EDGE, &active_visuals(2000, 2));
        assert_eq!(
            store.apply(EDGE, &active_visuals(1900, 2)),
            Transition::None
        );
        assert_eq!(store.record(&FlowKey::Base(EDGE)).unwrap().speed_ms, 1900);
    }

    #[test]
    fn test_deactivation_bumps_generation() {
        let mut store = FlowStateStore::new();
        store.apply(EDGE, &active_visuals(2000, 2));
        let g = store.record(&FlowKey::Base(EDGE)).unwrap().generation;
        assert_eq!(store.apply(EDGE, &inactive_visuals()), Transition::Deactivate);
        assert_eq!(store.record(&FlowKey::Base(EDGE)).unwrap().generation, g + 1);
        assert_eq!(store.apply(EDGE, &inactive_visuals()), Transition::None);
    }

    #[test]
    fn test_multi_source_unchanged() {
        let mut store = FlowStateStore::new();
        let sources = vec![
            SourceContribution::new(SourceKind::Solar, 1500.0),
            SourceContribution::new(SourceKind::Grid, 500.0),
        ];
        let edge = EdgeId::InverterToBattery;
        assert!(matches!(
            store.apply_sources(edge, sources.clone(), 1800, 5000.0),
            MultiSourceOutcome::Resettle { .. }
        ));
        assert_eq!(
            store.apply_sources(edge, sources, 1800, 5000.0),
            MultiSourceOutcome::Unchanged
        );
    }

    #[test]
    fn test_multi_source_change_resettles_and_clears_subs() {
        let mut store = FlowStateStore::new();
        let edge = EdgeId::InverterToHouse;
        let first = vec![SourceContribution::new(SourceKind::Solar, 3000.0)];
        let outcome = store.apply_sources(edge, first, 1800, 11000.0);
        let g1 = match outcome {
            MultiSourceOutcome::Resettle { generation } => generation,
            other => panic!("expected resettle, got {other:?}"),
        };
        let key = FlowKey::Sub {
            base: edge,
            source: SourceKind::Solar,
            index: 0,
        };
        store.insert_sub(
            key,
            FlowRecord {
                active: true,
                speed_ms: 1800,
                count: 2,
                sources: vec![SourceContribution::new(SourceKind::Solar, 3000.0)],
                generation: g1,
            },
        );

        let second = vec![
            SourceContribution::new(SourceKind::Solar, 2000.0),
            SourceContribution::new(SourceKind::Grid, 1000.0),
        ];
        let outcome = store.apply_sources(edge, second, 1800, 11000.0);
        match outcome {
            MultiSourceOutcome::Resettle { generation } => assert_eq!(generation, g1 + 1),
            other => panic!("expected resettle, got {other:?}"),
        }
        assert!(store.record(&key).is_none(), "old sub records deleted");
        // The older parked decomposition is no longer claimable.
        assert!(store.take_pending(edge, g1).is_none());
        assert!(store.take_pending(edge, g1 + 1).is_some());
    }

    #[test]
    fn test_multi_source_empty_deactivates() {
        let mut store = FlowStateStore::new();
        let edge = EdgeId::InverterToGrid;
        let sources = vec![SourceContribution::new(SourceKind::Battery, 500.0)];
        store.apply_sources(edge, sources, 2600, 11000.0);
        assert_eq!(
            store.apply_sources(edge, Vec::new(), 2700, 11000.0),
            MultiSourceOutcome::Deactivated
        );
        // Once empty, speed drift alone never re-triggers a transition.
        assert_eq!(
            store.apply_sources(edge, Vec::new(), 2900, 11000.0),
            MultiSourceOutcome::Unchanged
        );
    }

    #[test]
    fn test_deactivate_all_clears_activity() {
        let mut store = FlowStateStore::new();
        store.apply(EDGE, &active_visuals(2000, 2));
        store.insert_sub(
            FlowKey::Sub {
                base: EdgeId::InverterToHouse,
                source: SourceKind::Solar,
                index: 0,
            },
            FlowRecord {
                active: true,
                speed_ms: 1800,
                count: 1,
                sources: vec![],
                generation: 1,
            },
        );
        store.deactivate_all();
        assert_eq!(store.active_count(), 0);
        assert_eq!(store.record_count(), 6, "base records survive");
        store.deactivate_all();
        assert_eq!(store.active_count(), 0);
    }
}
