use thiserror::Error;

// Problems with an experiment configuration or its forcing tables.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown rheology parameter '{0}' (expected one of A, n, fR, beta)")]
    UnknownParameter(String),

    #[error("rheology parameter '{0}' overridden more than once")]
    DuplicateParameter(String),

    #[error("malformed override '{0}', expected key=value")]
    MalformedOverride(String),

    #[error("grid needs at least 2 cells, got {0}")]
    TooFewCells(usize),

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("{name} has length {actual} but the grid has {expected} cells")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("evaluation times must be sorted and lie inside [{start}, {end}]")]
    EvaluationTimes { start: f64, end: f64 },

    #[error("no evaluation times requested")]
    NoEvaluationTimes,

    #[error("forcing table: {0}")]
    Table(String),
}

// Errors raised while solving an experiment.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("singular {rows}x{rows} linear system")]
    SingularSystem { rows: usize },

    #[error("linear solve produced non-finite values")]
    NonFiniteSolution,

    #[error("stiff integration failed at t={t:.6e}: {reason}")]
    IntegrationFailed { t: f64, reason: String },

    #[error(
        "fixed-point iteration did not converge at step {step} (t={time}): {iterations} iterations, residual {residual:.3e}"
    )]
    NonConvergence {
        step: usize,
        time: f64,
        iterations: usize,
        residual: f64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),
}

pub type SolverResult<T> = Result<T, SolverError>;
