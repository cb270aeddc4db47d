//! # Simulated Household Sensors
//!
//! A simple daily production/consumption model: solar follows a sine bell
//! through daylight hours with random jitter, the house carries a base load
//! with an evening bump, the battery absorbs surplus or covers deficit up to
//! its power limits, and the grid balances the rest.

use chrono::{DateTime, Local, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::domain::PowerSnapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorProfile {
    /// Peak midday solar production (W).
    pub solar_peak_w: f64,
    /// Always-on house base load (W).
    pub house_base_w: f64,
    /// Battery charge/discharge power limit (W).
    pub battery_limit_w: f64,
}

impl Default for SensorProfile {
    fn default() -> Self {
        Self {
            solar_peak_w: 5000.0,
            house_base_w: 400.0,
            battery_limit_w: 3000.0,
        }
    }
}

pub struct SimulatedSensors {
    profile: SensorProfile,
    rng: StdRng,
}

impl Default for SimulatedSensors {
    fn default() -> Self {
        Self::new(SensorProfile::default())
    }
}

impl SimulatedSensors {
    pub fn new(profile: SensorProfile) -> Self {
        Self {
            profile,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic variant for tests.
    pub fn seeded(profile: SensorProfile, seed: u64) -> Self {
        Self {
            profile,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Sample a power snapshot for the given wall-clock time.
    pub fn sample(&mut self, at: DateTime<Local>) -> PowerSnapshot {
        let hour = f64::from(at.hour()) + f64::from(at.minute()) / 60.0;

        // Daylight window 6:00-20:00, sine bell peaking at 13:00.
        let solar_w = if (6.0..20.0).contains(&hour) {
            let phase = (hour - 6.0) / 14.0 * PI;
            let jitter = self.rng.gen_range(0.85..1.0);
            self.profile.solar_peak_w * phase.sin().max(0.0) * jitter
        } else {
            0.0
        };

        let evening_bump = if (17.0..23.0).contains(&hour) {
            self.rng.gen_range(800.0..2500.0)
        } else {
            self.rng.gen_range(0.0..600.0)
        };
        let house_w = self.profile.house_base_w + evening_bump;

        let surplus = solar_w - house_w;
        let battery_w = surplus.clamp(-self.profile.battery_limit_w, self.profile.battery_limit_w);

        // Positive = importing. Balances production against load and battery.
        let grid_w = house_w + battery_w - solar_w;

        PowerSnapshot {
            solar_w,
            battery_w,
            grid_w,
            house_w,
        }
    }
}
