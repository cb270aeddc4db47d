//! # Power Source Attribution
//!
//! Pure functions decomposing a composite edge's power into ordered
//! per-source contributions. Precedence is fixed: solar is satisfied first,
//! then battery, then grid on every consumption-side edge; solar then grid
//! on the charge side. Contributions at or below the flicker threshold are
//! collapsed, never materialized.

use crate::domain::{SourceContribution, SourceKind};

use super::params::MIN_FLOW_POWER_W;

fn push_material(out: &mut Vec<SourceContribution>, kind: SourceKind, power_w: f64) {
    if power_w > MIN_FLOW_POWER_W {
        out.push(SourceContribution::new(kind, power_w));
    }
}

/// Sources feeding the battery while it charges (`battery_w > 0`).
///
/// Solar contributes up to the charge power; a shortfall above the flicker
/// threshold is filled entirely by the grid when the grid is importing.
pub fn battery_charge_sources(
    solar_w: f64,
    grid_w: f64,
    battery_w: f64,
) -> Vec<SourceContribution> {
    let charge = battery_w.max(0.0);
    let mut out = Vec::new();

    let solar_share = solar_w.max(0.0).min(charge);
    push_material(&mut out, SourceKind::Solar, solar_share);

    let shortfall = charge - solar_share;
    if shortfall > MIN_FLOW_POWER_W && grid_w > 0.0 {
        push_material(&mut out, SourceKind::Grid, shortfall);
    }

    out
}

/// Sources feeding a grid export (`grid_export_w` is the exported magnitude).
///
/// Solar first satisfies battery charging; only the remainder is available
/// for export. Any residual export is covered by battery discharge.
pub fn grid_export_sources(
    solar_w: f64,
    battery_w: f64,
    grid_export_w: f64,
) -> Vec<SourceContribution> {
    let export = grid_export_w.max(0.0);
    let mut out = Vec::new();

    let solar_available = (solar_w - battery_w.max(0.0)).max(0.0);
    let solar_share = solar_available.min(export);
    push_material(&mut out, SourceKind::Solar, solar_share);

    let remainder = export - solar_share;
    if battery_w < 0.0 {
        push_material(&mut out, SourceKind::Battery, remainder.min(-battery_w));
    }

    out
}

/// Sources covering house consumption.
///
/// Solar (after the battery-charging reservation) is assigned first, then
/// battery discharge, then grid import. The returned powers never sum above
/// the house demand.
pub fn house_sources(
    solar_w: f64,
    battery_w: f64,
    grid_w: f64,
    house_w: f64,
) -> Vec<SourceContribution> {
    let demand = house_w.max(0.0);
    let mut out = Vec::new();

    let solar_available = if battery_w > 0.0 {
        (solar_w - battery_w).max(0.0)
    } else {
        solar_w.max(0.0)
    };
    let solar_share = solar_available.min(demand);
    push_material(&mut out, SourceKind::Solar, solar_share);
    let mut remaining = demand - solar_share;

    if battery_w < 0.0 {
        let battery_share = remaining.min(-battery_w);
        push_material(&mut out, SourceKind::Battery, battery_share);
        remaining -= battery_share;
    }

    if grid_w > 0.0 {
        push_material(&mut out, SourceKind::Grid, remaining.min(grid_w));
    }

    out
}
