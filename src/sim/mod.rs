//! # Simulated Collaborators
//!
//! Stand-ins for the external collaborators: a sensor producing plausible
//! household power snapshots and a headless rendering stage implementing the
//! geometry and transition seams. Used by the demo binary and the
//! integration tests.

pub mod sensors;
pub mod stage;

pub use sensors::SimulatedSensors;
pub use stage::{DashboardGeometry, HeadlessRenderer};
