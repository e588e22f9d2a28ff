use crate::constants::{
    DEFAULT_COMPRESSIBILITY, DEFAULT_FLOW_LAW_COEFFICIENT, DEFAULT_FLOW_LAW_EXPONENT,
    DEFAULT_FRICTION_FACTOR, DEFAULT_MAX_ITERATIONS, DEFAULT_PRESSURE_TOLERANCE,
};
use crate::error::ConfigError;
use crate::integrator::StiffOptions;
use std::fmt;
use std::sync::Arc;

// A scalar function supplied by the caller (discharge vs time, area vs height).
pub type ScalarFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

// 1-D grid along the conduit
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub n: usize,
    pub dx: f64,
    pub length: f64,
    pub x: Vec<f64>,
    pub zb: Vec<f64>,
}

impl Grid {
    // Uniform grid of `n` cells starting at x = 0 over a flat bed.
    pub fn uniform(n: usize, dx: f64) -> Self {
        Grid {
            n,
            dx,
            length: n as f64 * dx,
            x: (0..n).map(|i| i as f64 * dx).collect(),
            zb: vec![0.0; n],
        }
    }

    pub fn with_bed(mut self, zb: Vec<f64>) -> Self {
        self.zb = zb;
        self
    }
}

// Ice rheology and hydraulic parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rheology {
    // Flow-law coefficient A (Pa^-3 s^-1)
    pub a: f64,
    // Flow-law exponent n
    pub n: f64,
    // Darcy-Weisbach friction factor fR
    pub f_r: f64,
    // Compressibility beta (Pa^-1)
    pub beta: f64,
}

impl Default for Rheology {
    fn default() -> Self {
        Rheology {
            a: DEFAULT_FLOW_LAW_COEFFICIENT,
            n: DEFAULT_FLOW_LAW_EXPONENT,
            f_r: DEFAULT_FRICTION_FACTOR,
            beta: DEFAULT_COMPRESSIBILITY,
        }
    }
}

impl Rheology {
    pub fn with_overrides(self, overrides: &RheologyOverrides) -> Self {
        Rheology {
            a: overrides.a.unwrap_or(self.a),
            n: overrides.n.unwrap_or(self.n),
            f_r: overrides.f_r.unwrap_or(self.f_r),
            beta: overrides.beta.unwrap_or(self.beta),
        }
    }
}

// Override table for `Rheology`. Keys follow the usual glaciological
// notation: `A`, `n`, `fR`, `beta`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RheologyOverrides {
    pub a: Option<f64>,
    pub n: Option<f64>,
    pub f_r: Option<f64>,
    pub beta: Option<f64>,
}

impl RheologyOverrides {
    // Build an override table from named values. Every key must be known and
    // may appear at most once.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut overrides = RheologyOverrides::default();
        for (key, value) in pairs {
            let slot = match key {
                "A" => &mut overrides.a,
                "n" => &mut overrides.n,
                "fR" => &mut overrides.f_r,
                "beta" => &mut overrides.beta,
                other => return Err(ConfigError::UnknownParameter(other.to_string())),
            };
            if slot.is_some() {
                return Err(ConfigError::DuplicateParameter(key.to_string()));
            }
            *slot = Some(value);
        }
        Ok(overrides)
    }

    pub fn parse<S: AsRef<str>>(items: &[S]) -> Result<Self, ConfigError> {
        let mut pairs = Vec::with_capacity(items.len());
        for item in items {
            let item = item.as_ref();
            let (key, value) = item
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedOverride(item.to_string()))?;
            let value = value
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::MalformedOverride(item.to_string()))?;
            pairs.push((key.trim(), value));
        }
        Self::from_pairs(pairs)
    }
}

// Surface area of the lake as a function of its height above the inlet.
pub trait LakeAreaModel {
    fn area(&self, height: f64) -> f64;
}

#[derive(Clone)]
pub enum LakeArea {
    Constant(f64),
    Hypsometry(ScalarFn),
}

impl LakeArea {
    pub fn hypsometry<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        LakeArea::Hypsometry(Arc::new(f))
    }
}

impl LakeAreaModel for LakeArea {
    fn area(&self, height: f64) -> f64 {
        match self {
            LakeArea::Constant(area) => *area,
            LakeArea::Hypsometry(f) => f(height),
        }
    }
}

impl fmt::Debug for LakeArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LakeArea::Constant(area) => f.debug_tuple("Constant").field(area).finish(),
            LakeArea::Hypsometry(_) => f.write_str("Hypsometry(<fn>)"),
        }
    }
}

// How water leaves the lake and enters the conduit
#[derive(Clone, Default)]
pub enum Drainage {
    // Discharge follows from the lake's hydrostatic pressure and the inlet cell.
    #[default]
    PressureCoupled,
    // Discharge is a caller-supplied function of time (m^3 s^-1).
    Prescribed(ScalarFn),
}

impl Drainage {
    pub fn prescribed<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Drainage::Prescribed(Arc::new(f))
    }
}

impl fmt::Debug for Drainage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drainage::PressureCoupled => f.write_str("PressureCoupled"),
            Drainage::Prescribed(_) => f.write_str("Prescribed(<fn>)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitialConditions {
    // Channel cross-sectional area (m^2), one per cell
    pub area: Vec<f64>,
    // Water pressure (Pa), one per cell
    pub pressure: Vec<f64>,
    // Lake height above the inlet (m)
    pub lake_height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeParams {
    pub dt: f64,
    pub t_span: (f64, f64),
    pub t_eval: Vec<f64>,
}

impl TimeParams {
    // `steps` evaluation times 0, dt, 2dt, ... spanning exactly the integration interval.
    pub fn regular(dt: f64, steps: usize) -> Self {
        let t_eval: Vec<f64> = (0..steps).map(|i| i as f64 * dt).collect();
        let end = t_eval.last().copied().unwrap_or(0.0);
        TimeParams {
            dt,
            t_span: (0.0, end),
            t_eval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPointOptions {
    pub max_iterations: usize,
    // Maximum pressure change (Pa) between successive iterates
    pub tolerance: f64,
}

impl Default for FixedPointOptions {
    fn default() -> Self {
        FixedPointOptions {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_PRESSURE_TOLERANCE,
        }
    }
}

// What to do when the quasi-steady iteration runs out of iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConvergencePolicy {
    // Log a warning and continue with the last iterate.
    #[default]
    Warn,
    // Abort the solve with `crate::error::SolverError::NonConvergence`.
    Fail,
}

// Complete, read-only description of one drainage experiment.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub grid: Grid,
    // Overburden ice pressure (Pa)
    pub ice_pressure: f64,
    pub lake_area: LakeArea,
    pub initial: InitialConditions,
    pub time: TimeParams,
    pub drainage: Drainage,
    pub rheology: Rheology,
    pub fixed_point: FixedPointOptions,
    pub convergence: ConvergencePolicy,
    pub integration: StiffOptions,
}

impl Experiment {
    pub fn new(
        grid: Grid,
        ice_pressure: f64,
        lake_area: LakeArea,
        initial: InitialConditions,
        time: TimeParams,
    ) -> Self {
        Experiment {
            grid,
            ice_pressure,
            lake_area,
            initial,
            time,
            drainage: Drainage::PressureCoupled,
            rheology: Rheology::default(),
            fixed_point: FixedPointOptions::default(),
            convergence: ConvergencePolicy::default(),
            integration: StiffOptions::default(),
        }
    }

    pub fn with_drainage(mut self, drainage: Drainage) -> Self {
        self.drainage = drainage;
        self
    }

    pub fn with_overrides(mut self, overrides: &RheologyOverrides) -> Self {
        self.rheology = self.rheology.with_overrides(overrides);
        self
    }

    pub fn with_fixed_point(mut self, options: FixedPointOptions) -> Self {
        self.fixed_point = options;
        self
    }

    pub fn with_convergence_policy(mut self, policy: ConvergencePolicy) -> Self {
        self.convergence = policy;
        self
    }

    pub fn with_integration(mut self, options: StiffOptions) -> Self {
        self.integration = options;
        self
    }

    // Structural checks: array lengths, positive spacings, ordered output times.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.grid.n;
        if n < 2 {
            return Err(ConfigError::TooFewCells(n));
        }
        if !(self.grid.dx > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "dx",
                value: self.grid.dx,
            });
        }
        if !(self.time.dt > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "dt",
                value: self.time.dt,
            });
        }

        for (name, len) in [
            ("x", self.grid.x.len()),
            ("zb", self.grid.zb.len()),
            ("init_S", self.initial.area.len()),
            ("init_pw", self.initial.pressure.len()),
        ] {
            if len != n {
                return Err(ConfigError::LengthMismatch {
                    name,
                    expected: n,
                    actual: len,
                });
            }
        }

        if self.time.t_eval.is_empty() {
            return Err(ConfigError::NoEvaluationTimes);
        }
        let (start, end) = self.time.t_span;
        let sorted = self.time.t_eval.windows(2).all(|w| w[0] <= w[1]);
        let inside = self
            .time
            .t_eval
            .iter()
            .all(|&t| t >= start && t <= end);
        if !sorted || !inside {
            return Err(ConfigError::EvaluationTimes { start, end });
        }

        Ok(())
    }
}
