use crate::integrator::IntegratorStats;
use crate::state::ConduitState;
use nalgebra::{DMatrix, DVector};
use std::time::Duration;

// Outcome of the quasi-steady pressure iteration at one output step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPointReport {
    pub iterations: usize,
    pub converged: bool,
    // Maximum pressure change (Pa) over the last iteration
    pub residual: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SolveDiagnostics {
    pub elapsed: Duration,
    // One entry per output step (incompressible scheme only)
    pub fixed_point: Vec<FixedPointReport>,
    // Step statistics (compressible scheme only)
    pub integrator: Option<IntegratorStats>,
}

// Dense time series of one experiment. Spatial fields are N x M with one
// column per evaluation time.
#[derive(Debug, Clone)]
pub struct Solution {
    pub times: Vec<f64>,
    pub area: DMatrix<f64>,
    pub pressure: DMatrix<f64>,
    pub discharge: DMatrix<f64>,
    pub lake_height: DVector<f64>,
    pub diagnostics: SolveDiagnostics,
}

impl Solution {
    pub fn cells(&self) -> usize {
        self.area.nrows()
    }

    pub fn samples(&self) -> usize {
        self.times.len()
    }

    pub fn all_converged(&self) -> bool {
        self.diagnostics.fixed_point.iter().all(|r| r.converged)
    }

    pub fn state_at(&self, j: usize) -> ConduitState {
        ConduitState::new(
            self.area.column(j).into_owned(),
            self.pressure.column(j).into_owned(),
            self.lake_height[j],
        )
    }
}
