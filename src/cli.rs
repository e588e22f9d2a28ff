use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SolverKind {
    Compressible,
    Incompressible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Netcdf,
    Both,
}

impl OutputFormat {
    pub fn csv(self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::Both)
    }

    pub fn netcdf(self) -> bool {
        matches!(self, OutputFormat::Netcdf | OutputFormat::Both)
    }
}

/// Simulate a subglacial lake draining through an ice conduit
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Number of grid cells along the conduit
    #[arg(long, default_value_t = 100)]
    pub cells: usize,

    /// Cell spacing (m)
    #[arg(long, default_value_t = 10.0)]
    pub dx: f64,

    /// Ice thickness above the conduit (m)
    #[arg(long, default_value_t = 100.0)]
    pub ice_thickness: f64,

    /// Initial lake height above the inlet (m)
    #[arg(long, default_value_t = 5.0)]
    pub lake_height: f64,

    /// Constant lake surface area (m^2)
    #[arg(long, default_value_t = 1.0e5, conflicts_with = "hypsometry")]
    pub lake_area: f64,

    /// CSV table of lake area against height (columns height,area)
    #[arg(long)]
    pub hypsometry: Option<PathBuf>,

    /// CSV table of bed elevation along the conduit (columns x,zb)
    #[arg(long)]
    pub bed: Option<PathBuf>,

    /// Initial channel cross-sectional area (m^2)
    #[arg(long, default_value_t = 1.0)]
    pub initial_area: f64,

    /// Output interval (s)
    #[arg(long, default_value_t = 60.0)]
    pub dt: f64,

    /// Number of output times, starting at t = 0
    #[arg(long, default_value_t = 100)]
    pub steps: usize,

    /// CSV table of lake discharge against time (columns time,discharge)
    #[arg(long)]
    pub hydrograph: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = SolverKind::Incompressible)]
    pub solver: SolverKind,

    /// Rheology override, e.g. `--rheology A=2.4e-24` (keys: A, n, fR, beta)
    #[arg(long = "rheology", value_name = "KEY=VALUE")]
    pub rheology: Vec<String>,

    /// Fail instead of warning when the pressure iteration does not converge
    #[arg(long)]
    pub strict_convergence: bool,

    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Reference time for NetCDF time units
    #[arg(long, default_value = "2000-01-01 00:00:00")]
    pub reference_time: String,

    /// Log level (error, warn, info, debug, trace); defaults to RUST_LOG or info
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn get_args() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["conduit_rs"]).unwrap();
        assert_eq!(args.solver, SolverKind::Incompressible);
        assert_eq!(args.format, OutputFormat::Csv);
        assert!(args.rheology.is_empty());
        assert!(!args.strict_convergence);
        assert!(args.bed.is_none());
    }

    #[test]
    fn test_bed_table_path() {
        let args = Args::try_parse_from(["conduit_rs", "--bed", "bed.csv"]).unwrap();
        assert_eq!(args.bed, Some(PathBuf::from("bed.csv")));
    }

    #[test]
    fn test_repeated_rheology() {
        let args = Args::try_parse_from([
            "conduit_rs",
            "--solver",
            "compressible",
            "--rheology",
            "A=1e-24",
            "--rheology",
            "fR=0.1",
            "--format",
            "both",
        ])
        .unwrap();
        assert_eq!(args.solver, SolverKind::Compressible);
        assert_eq!(args.rheology, vec!["A=1e-24", "fR=0.1"]);
        assert!(args.format.csv() && args.format.netcdf());
    }

    #[test]
    fn test_area_and_hypsometry_conflict() {
        let result = Args::try_parse_from([
            "conduit_rs",
            "--lake-area",
            "10",
            "--hypsometry",
            "lake.csv",
        ]);
        assert!(result.is_err());
    }
}
