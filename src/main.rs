use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use indicatif::{ProgressBar, ProgressStyle};

mod cli;

use cli::{SolverKind, get_args};
use conduit_rs::config::{ConvergencePolicy, Drainage, Experiment, Grid, InitialConditions, LakeArea};
use conduit_rs::config::{RheologyOverrides, TimeParams};
use conduit_rs::constants::{G, RHO_I};
use conduit_rs::discharge::lake_pressure;
use conduit_rs::io::csv::{load_series, write_solution_csv};
use conduit_rs::logging::init_logging;
use conduit_rs::{Scheme, solve};

fn main() -> Result<()> {
    let args = get_args();
    init_logging(args.log_level.as_deref());

    let overrides =
        RheologyOverrides::parse(&args.rheology).context("Failed to parse rheology overrides")?;
    let reference_time = NaiveDateTime::parse_from_str(&args.reference_time, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("Failed to parse reference time: {}", args.reference_time))?;

    let lake_area = match &args.hypsometry {
        Some(path) => {
            let table = load_series(path)
                .with_context(|| format!("Failed to load hypsometry: {:?}", path))?;
            LakeArea::hypsometry(move |h| table.at(h))
        }
        None => LakeArea::Constant(args.lake_area),
    };

    let drainage = match &args.hydrograph {
        Some(path) => {
            let table = load_series(path)
                .with_context(|| format!("Failed to load hydrograph: {:?}", path))?;
            Drainage::prescribed(move |t| table.at(t))
        }
        None => Drainage::PressureCoupled,
    };

    // linear profile from the lake pressure to zero one cell past the outlet
    let n = args.cells;
    let p_lake = lake_pressure(args.lake_height);
    let initial = InitialConditions {
        area: vec![args.initial_area; n],
        pressure: (0..n)
            .map(|i| p_lake * (1.0 - (i + 1) as f64 / (n + 1) as f64))
            .collect(),
        lake_height: args.lake_height,
    };

    let policy = if args.strict_convergence {
        ConvergencePolicy::Fail
    } else {
        ConvergencePolicy::Warn
    };

    let mut grid = Grid::uniform(n, args.dx);
    if let Some(path) = &args.bed {
        let table =
            load_series(path).with_context(|| format!("Failed to load bed profile: {:?}", path))?;
        let zb = grid.x.iter().map(|&x| table.at(x)).collect();
        grid = grid.with_bed(zb);
    }

    let experiment = Experiment::new(
        grid,
        RHO_I * G * args.ice_thickness,
        lake_area,
        initial,
        TimeParams::regular(args.dt, args.steps),
    )
    .with_drainage(drainage)
    .with_overrides(&overrides)
    .with_convergence_policy(policy);
    experiment.validate().context("Invalid experiment")?;

    let scheme = match args.solver {
        SolverKind::Compressible => Scheme::Compressible,
        SolverKind::Incompressible => Scheme::Incompressible,
    };

    println!("\nSimulation Configuration:");
    println!("  Solver: {:?}", scheme);
    println!(
        "  Conduit: {} cells, {} m long",
        n, experiment.grid.length
    );
    println!("  Lake: {} m, drainage {:?}", args.lake_height, experiment.drainage);
    println!("  Output times: {} every {} s", args.steps, args.dt);
    println!("  Rheology: {:?}", experiment.rheology);

    let pb = ProgressBar::new(args.steps as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} steps ({eta})")?
            .progress_chars("#>-"),
    );

    let solution = solve(&experiment, scheme, &pb).context("Solve failed")?;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", args.output_dir))?;

    if args.format.csv() {
        let path = args.output_dir.join("conduit_results.csv");
        write_solution_csv(&path, &experiment.grid, &solution)
            .with_context(|| format!("Failed to write CSV output: {:?}", path))?;
        println!("CSV results saved to {}", path.display());
    }

    if args.format.netcdf() {
        write_netcdf(&args.output_dir, &experiment, &solution, &reference_time)?;
    }

    let last = solution.state_at(solution.samples() - 1);
    println!("\nRun complete in {:.3} s", solution.diagnostics.elapsed.as_secs_f64());
    println!("  Final lake height: {:.4} m", last.lake_height);
    println!(
        "  Final channel area: {:.4} to {:.4} m2",
        last.area.min(),
        last.area.max()
    );
    println!(
        "  Peak outlet discharge: {:.4} m3/s",
        solution.discharge.row(n - 1).max()
    );
    if let Some(stats) = &solution.diagnostics.integrator {
        println!(
            "  Integrator: {} BDF steps, {} error test failures",
            stats.steps, stats.error_test_failures
        );
    }
    if !solution.diagnostics.fixed_point.is_empty() && !solution.all_converged() {
        println!("  Warning: pressure iteration did not converge at every step");
    }
    Ok(())
}

#[cfg(feature = "netcdf")]
fn write_netcdf(
    output_dir: &std::path::Path,
    experiment: &Experiment,
    solution: &conduit_rs::Solution,
    reference_time: &NaiveDateTime,
) -> Result<()> {
    let filename = format!("conduit_output_{}.nc", reference_time.format("%Y%m%d%H%M"));
    let path = output_dir.join(filename);
    conduit_rs::io::netcdf::write_netcdf_output(&path, &experiment.grid, solution, reference_time)
        .with_context(|| format!("Failed to write NetCDF output: {:?}", path))?;
    println!("NetCDF results saved to {}", path.display());
    Ok(())
}

#[cfg(not(feature = "netcdf"))]
fn write_netcdf(
    _output_dir: &std::path::Path,
    _experiment: &Experiment,
    _solution: &conduit_rs::Solution,
    _reference_time: &NaiveDateTime,
) -> Result<()> {
    anyhow::bail!("NetCDF output requested but conduit_rs was built without the `netcdf` feature")
}
