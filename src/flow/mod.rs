//! # Flow Simulation Core
//!
//! The flow-simulation and particle-lifecycle engine: power-source
//! attribution, visual-parameter derivation with temporal smoothing, the
//! per-edge flow state machine, the bounded particle lifecycle and the
//! geometry-fingerprinted layout cache, all driven per update cycle by the
//! [`orchestrator::FlowEngine`].

pub mod attribution;
pub mod layout;
pub mod orchestrator;
pub mod params;
pub mod particles;
pub mod state;
pub mod timers;

pub use layout::{LayoutCache, LayoutResolution};
pub use orchestrator::{Diagnostics, FlowEngine};
pub use params::{FlowVisuals, SpeedCache};
pub use particles::{ParticleLifecycleManager, ParticleSpec, PARTICLE_CAP};
pub use state::{FlowRecord, FlowStateStore, MultiSourceOutcome, Transition};
