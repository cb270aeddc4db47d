//! # Flow Parameter Calculation
//!
//! Maps a power magnitude and an edge identity to visual parameters. Speed
//! is damped by an exponential moving average with a hysteresis band so
//! small sensor jitter never restarts an animation, while sustained drift
//! still converges. The smoothing cache persists across update cycles and
//! is cleared only by a full engine reset.

use serde::Serialize;
use std::collections::HashMap;

use crate::domain::FlowKey;

/// Flows at or below this magnitude are treated as off.
pub const MIN_FLOW_POWER_W: f64 = 50.0;
/// Fastest traversal: one full edge in 500 ms at 100% intensity.
pub const SPEED_FLOOR_MS: f64 = 500.0;
/// Slowest traversal: 3500 ms at 0% intensity.
pub const SPEED_CEILING_MS: f64 = 3500.0;
/// Speed changes smaller than this keep the prior smoothed value.
pub const SPEED_HYSTERESIS_MS: i64 = 100;

const MS_PER_INTENSITY_POINT: f64 = 30.0;
const SMOOTHING_FACTOR: f64 = 0.3;

/// Visual parameters derived for one edge in one update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowVisuals {
    pub active: bool,
    pub intensity: f64,
    pub speed_ms: u32,
    pub count: u8,
    pub size_px: u32,
    pub opacity: f64,
}

/// Last smoothed speed per flow key. Persists for the engine lifetime.
#[derive(Debug, Default)]
pub struct SpeedCache {
    speeds: HashMap<FlowKey, u32>,
}

impl SpeedCache {
    pub fn len(&self) -> usize {
        self.speeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speeds.is_empty()
    }

    pub fn clear(&mut self) {
        self.speeds.clear();
    }
}

/// Normalized 0-100 measure of power magnitude against an edge maximum.
pub fn intensity(power_w: f64, max_w: f64) -> f64 {
    if max_w <= 0.0 {
        return 0.0;
    }
    (100.0 * power_w.abs() / max_w).min(100.0)
}

/// Linear inverse map from intensity to traversal time.
pub fn target_speed_ms(intensity: f64) -> u32 {
    (SPEED_CEILING_MS - MS_PER_INTENSITY_POINT * intensity)
        .round()
        .max(SPEED_FLOOR_MS) as u32
}

pub fn particle_count(intensity: f64) -> u8 {
    ((1.0 + intensity / 33.0).ceil() as i64).clamp(1, 4) as u8
}

pub fn particle_size_px(intensity: f64) -> u32 {
    (6.0 + intensity / 10.0).round() as u32
}

pub fn particle_opacity(intensity: f64) -> f64 {
    (0.3 + intensity / 150.0).min(1.0)
}

/// Derive visuals for one flow key and persist the smoothed speed.
///
/// Each key must be evaluated at most once per update cycle; a second
/// evaluation would feed the freshly smoothed value back into the average.
pub fn visuals(key: FlowKey, power_w: f64, max_w: f64, cache: &mut SpeedCache) -> FlowVisuals {
    let intensity = intensity(power_w, max_w);
    let target = target_speed_ms(intensity);

    let speed_ms = match cache.speeds.get(&key).copied() {
        None => target,
        Some(prior) => {
            let blended = (SMOOTHING_FACTOR * f64::from(target)
                + (1.0 - SMOOTHING_FACTOR) * f64::from(prior))
            .round() as u32;
            if (i64::from(blended) - i64::from(prior)).abs() < SPEED_HYSTERESIS_MS {
                prior
            } else {
                blended
            }
        }
    };
    cache.speeds.insert(key, speed_ms);

    FlowVisuals {
        active: power_w.abs() >= MIN_FLOW_POWER_W,
        intensity,
        speed_ms,
        count: particle_count(intensity),
        size_px: particle_size_px(intensity),
        opacity: particle_opacity(intensity),
    }
}
