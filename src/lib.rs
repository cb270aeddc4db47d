//! # Energy Flow Visualization Core
//!
//! Flow-simulation and particle-lifecycle engine for a live energy
//! dashboard: five fixed nodes (solar, battery, grid, house, inverter hub),
//! six directed edges, continuously regenerating particles whose speed,
//! density and color reflect instantaneous power magnitude and originating
//! source.
//!
//! The core is rendering-agnostic: hosts implement
//! [`render::GeometryProvider`] and [`render::FlowRenderer`] and drive a
//! [`FlowEngine`] from their event loop.

pub mod config;
pub mod domain;
pub mod flow;
pub mod render;
#[cfg(feature = "sim")]
pub mod sim;
pub mod telemetry;

pub use config::Config;
pub use flow::{Diagnostics, FlowEngine};
