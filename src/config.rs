use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub maxima: EdgeMaxima,
}

/// Host-loop pacing and motion preferences.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Frame tick driving the cooperative task queue (ms).
    pub tick_ms: u64,
    /// Interval between sensor refreshes fed to the engine (ms).
    pub update_interval_ms: u64,
    /// Honor a reduced-motion preference: permanently disables particles.
    pub reduced_motion: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            update_interval_ms: 1000,
            reduced_motion: false,
        }
    }
}

/// Per-edge normalization ceilings in watts. Intensity is the power
/// magnitude relative to these.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeMaxima {
    pub solar_w: f64,
    pub battery_w: f64,
    pub grid_w: f64,
    pub house_w: f64,
}

impl Default for EdgeMaxima {
    fn default() -> Self {
        Self {
            solar_w: 5400.0,
            battery_w: 5000.0,
            grid_w: 11000.0,
            house_w: 11000.0,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("EFV__").split("__"));
        Ok(figment.extract()?)
    }
}
