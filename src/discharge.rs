use crate::config::{Drainage, Experiment, Rheology};
use crate::constants::{G, GAMMA, LF, RHO_W};
use nalgebra::DVector;
use std::f64::consts::PI;

// Discharge (m^3 s^-1) through area `area` under pressure gradient `gradient`.
// A zero gradient gives exactly zero discharge.
#[inline]
pub fn conduit_discharge(area: f64, gradient: f64, friction: f64) -> f64 {
    if gradient == 0.0 {
        return 0.0;
    }
    -area.powf(1.25)
        * (1.0 / RHO_W / friction).sqrt()
        * PI.powf(-0.25)
        * gradient.abs().powf(-0.5)
        * gradient
}

pub fn conduit_discharge_field(
    area: &DVector<f64>,
    gradient: &DVector<f64>,
    friction: f64,
) -> DVector<f64> {
    area.zip_map(gradient, |s, g| conduit_discharge(s, g, friction))
}

// Pressure gradient that carries `discharge` through `area` in steady flow.
// Always non-positive.
#[inline]
pub fn quasi_steady_gradient(discharge: f64, area: f64, friction: f64) -> f64 {
    -discharge.powi(2) * PI.sqrt() * (friction * RHO_W) / area.powf(2.5)
}

// Melt rate (kg m^-1 s^-1) from energy dissipated by the flow, clamped at zero.
#[inline]
pub fn melt_rate(discharge: f64, gradient: f64) -> f64 {
    (discharge / LF * (GAMMA - 1.0) * gradient).max(0.0)
}

pub fn melt_rate_field(discharge: &DVector<f64>, gradient: &DVector<f64>) -> DVector<f64> {
    discharge.zip_map(gradient, melt_rate)
}

// Creep closure rate (m^2 s^-1) from Glen's flow law, clamped at zero.
#[inline]
pub fn creep_closure(area: f64, pressure: f64, ice_pressure: f64, rheology: &Rheology) -> f64 {
    let effective = (ice_pressure - pressure).max(0.0);
    let n = rheology.n;
    (2.0 * area * rheology.a * effective.powf(n) / n.powf(n)).max(0.0)
}

pub fn creep_closure_field(
    area: &DVector<f64>,
    pressure: &DVector<f64>,
    ice_pressure: f64,
    rheology: &Rheology,
) -> DVector<f64> {
    area.zip_map(pressure, |s, p| creep_closure(s, p, ice_pressure, rheology))
}

// Hydrostatic pressure at the base of a lake of height `height`.
#[inline]
pub fn lake_pressure(height: f64) -> f64 {
    RHO_W * G * height
}

// Discharge from the lake into the first conduit cell at time `t`.
// Pressure-coupled drainage never refills the lake from the conduit, and an
// empty lake (height <= 0) never drains, whatever the drainage mode.
pub fn lake_discharge(
    t: f64,
    inlet_area: f64,
    inlet_pressure: f64,
    lake_height: f64,
    experiment: &Experiment,
) -> f64 {
    if lake_height <= 0.0 {
        return 0.0;
    }
    match &experiment.drainage {
        Drainage::PressureCoupled => {
            let gradient = (inlet_pressure - lake_pressure(lake_height)) / experiment.grid.dx;
            conduit_discharge(inlet_area, gradient, experiment.rheology.f_r).max(0.0)
        }
        Drainage::Prescribed(q) => q(t),
    }
}
