pub mod compressible;
pub mod config;
pub mod constants;
pub mod discharge;
pub mod error;
pub mod forcing;
pub mod incompressible;
pub mod integrator;
pub mod io;
pub mod logging;
pub mod operators;
pub mod solution;
pub mod state;

pub use compressible::{rhs_compressible, solve_compressible, solve_compressible_with_progress};
pub use config::{
    ConvergencePolicy, Drainage, Experiment, FixedPointOptions, Grid, InitialConditions,
    LakeArea, Rheology, RheologyOverrides, TimeParams,
};
pub use error::{ConfigError, SolverError, SolverResult};
pub use incompressible::{solve_incompressible, solve_incompressible_with_progress};
pub use integrator::StiffOptions;
pub use solution::Solution;

use indicatif::ProgressBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Compressible,
    Incompressible,
}

pub fn solve(experiment: &Experiment, scheme: Scheme, pb: &ProgressBar) -> SolverResult<Solution> {
    match scheme {
        Scheme::Compressible => solve_compressible_with_progress(experiment, pb),
        Scheme::Incompressible => solve_incompressible_with_progress(experiment, pb),
    }
}
