//! # Cooperative Task Queue
//!
//! Deferred engine work (staggered particle spawns, multi-source settle
//! delays) is queued as data-carrying tasks with a due time instead of
//! closures, so nothing captures stale geometry or colors across restarts.
//! The host drives the queue by calling the engine's `tick` with its clock.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::domain::EdgeId;

use super::particles::ParticleSpec;

/// One unit of deferred engine work.
#[derive(Debug, Clone)]
pub enum ScheduledTask {
    SpawnParticle { spec: ParticleSpec, generation: u64 },
    MultiSourceRespawn { edge: EdgeId, generation: u64 },
}

#[derive(Debug)]
struct TimerEntry {
    due_ms: u64,
    seq: u64,
    task: ScheduledTask,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    // Reversed so the max-heap pops the earliest entry; ties keep
    // scheduling order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_ms
            .cmp(&self.due_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    seq: u64,
}

impl TimerQueue {
    pub fn schedule(&mut self, due_ms: u64, task: ScheduledTask) {
        self.seq += 1;
        self.heap.push(TimerEntry {
            due_ms,
            seq: self.seq,
            task,
        });
    }

    /// Remove and return every task due at or before `now_ms`, in order.
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<ScheduledTask> {
        let mut due = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.due_ms > now_ms {
                break;
            }
            // peek() just confirmed the heap is non-empty
            if let Some(entry) = self.heap.pop() {
                due.push(entry.task);
            }
        }
        due
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
