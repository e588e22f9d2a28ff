// Physical constants. These are fixed for every experiment.

// Density of ice (kg m^-3)
pub const RHO_I: f64 = 917.0;
// Density of water (kg m^-3)
pub const RHO_W: f64 = 1000.0;
// Gravitational acceleration (m s^-2)
pub const G: f64 = 9.81;
// Latent heat of fusion (J kg^-1)
pub const LF: f64 = 3.34e5;
// Heat capacity of water (J kg^-1 K^-1)
pub const CW: f64 = 4.217e3;
// Clausius-Clapeyron (pressure-melting) coefficient (K Pa^-1)
pub const CT: f64 = 7.5e-8;
// Derived coefficient in the energy balance
pub const GAMMA: f64 = CT * RHO_W * CW;

// Rheology defaults, overridable per experiment

// Flow-law coefficient (Pa^-3 s^-1)
pub const DEFAULT_FLOW_LAW_COEFFICIENT: f64 = 2.4e-24;
// Glen's flow-law exponent
pub const DEFAULT_FLOW_LAW_EXPONENT: f64 = 3.0;
// Darcy-Weisbach friction factor
pub const DEFAULT_FRICTION_FACTOR: f64 = 0.15;
// Compressibility (Pa^-1)
pub const DEFAULT_COMPRESSIBILITY: f64 = 1e-7;

// Fixed-point iteration defaults for the quasi-steady solver
pub const DEFAULT_MAX_ITERATIONS: usize = 50;
pub const DEFAULT_PRESSURE_TOLERANCE: f64 = 1e-3;
