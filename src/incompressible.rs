use crate::config::{ConvergencePolicy, Experiment, LakeAreaModel};
use crate::constants::{GAMMA, LF, RHO_I, RHO_W};
use crate::discharge::{creep_closure_field, lake_discharge, melt_rate_field, quasi_steady_gradient};
use crate::error::{SolverError, SolverResult};
use crate::operators::{DiffOperators, LinearSolver, LuSolver};
use crate::solution::{FixedPointReport, SolveDiagnostics, Solution};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use std::time::Instant;

// Melt-driven feedback of the pressure gradient on the discharge balance
const MELT_FEEDBACK: f64 = (1.0 / RHO_I - 1.0 / RHO_W) / LF * (GAMMA - 1.0);

// Converged (or last) iterate of the quasi-steady pressure problem.
#[derive(Debug, Clone)]
pub struct FixedPoint {
    pub pressure: DVector<f64>,
    pub gradient: DVector<f64>,
    pub report: FixedPointReport,
}

struct QuasiSteady<'a, L: LinearSolver> {
    experiment: &'a Experiment,
    ops: DiffOperators,
    solver: &'a L,
}

impl<L: LinearSolver> QuasiSteady<'_, L> {
    // Discharge balancing creep closure along the conduit, with the lake
    // discharge entering as a flux into the first cell.
    fn discharge(
        &self,
        area: &DVector<f64>,
        pressure: &DVector<f64>,
        gradient: &DVector<f64>,
        q_lake: f64,
    ) -> SolverResult<DVector<f64>> {
        let exp = self.experiment;
        let operator =
            &self.ops.upwind + DMatrix::from_diagonal(&gradient.map(|g| MELT_FEEDBACK * g));
        let mut rhs = creep_closure_field(area, pressure, exp.ice_pressure, &exp.rheology);
        rhs[0] += q_lake / exp.grid.dx;
        self.solver.solve_dense(&operator, &rhs)
    }

    fn iterate(
        &self,
        area: &DVector<f64>,
        mut pressure: DVector<f64>,
        mut gradient: DVector<f64>,
        q_lake: f64,
    ) -> SolverResult<FixedPoint> {
        let options = self.experiment.fixed_point;
        let f_r = self.experiment.rheology.f_r;
        let mut residual = f64::INFINITY;
        let mut iterations = 0;

        while residual > options.tolerance && iterations < options.max_iterations {
            let q = self.discharge(area, &pressure, &gradient, q_lake)?;
            gradient = q.zip_map(area, |q, s| quasi_steady_gradient(q, s, f_r));
            let updated = self.solver.solve_dense(&self.ops.downwind, &gradient)?;
            residual = (&pressure - &updated).amax();
            pressure = updated;
            iterations += 1;
        }

        Ok(FixedPoint {
            pressure,
            gradient,
            report: FixedPointReport {
                iterations,
                converged: residual <= options.tolerance,
                residual,
            },
        })
    }
}

pub fn solve_incompressible(experiment: &Experiment) -> SolverResult<Solution> {
    solve_incompressible_with_progress(experiment, &ProgressBar::hidden())
}

pub fn solve_incompressible_with_progress(
    experiment: &Experiment,
    pb: &ProgressBar,
) -> SolverResult<Solution> {
    solve_incompressible_with_solver(experiment, &LuSolver, pb)
}

// Quasi-steady solve with a caller-chosen dense linear solver.
pub fn solve_incompressible_with_solver<L: LinearSolver>(
    experiment: &Experiment,
    solver: &L,
    pb: &ProgressBar,
) -> SolverResult<Solution> {
    let start = Instant::now();
    experiment.validate()?;

    let n = experiment.grid.n;
    let dt = experiment.time.dt;
    let t_eval = &experiment.time.t_eval;
    let m = t_eval.len();

    let model = QuasiSteady {
        experiment,
        ops: DiffOperators::new(n, experiment.grid.dx),
        solver,
    };

    let mut area = DVector::from_column_slice(&experiment.initial.area);
    let mut pressure = DVector::from_column_slice(&experiment.initial.pressure);
    let mut gradient = model.ops.gradient(&pressure);
    let mut lake_height = experiment.initial.lake_height;

    let mut area_out = DMatrix::zeros(n, m);
    let mut pressure_out = DMatrix::zeros(n, m);
    let mut discharge_out = DMatrix::zeros(n, m);
    let mut lake_height_out = DVector::zeros(m);
    let mut reports = Vec::with_capacity(m);

    pb.set_length(m as u64);

    for (step, &t) in t_eval.iter().enumerate() {
        let q_lake = lake_discharge(t, area[0], pressure[0], lake_height, experiment);

        let fixed_point = model.iterate(&area, pressure, gradient, q_lake)?;
        let report = fixed_point.report;
        debug!(
            "step {}: {} iterations, residual {:.3e} Pa",
            step, report.iterations, report.residual
        );
        if !report.converged {
            match experiment.convergence {
                ConvergencePolicy::Warn => warn!(
                    "Pressure iteration did not converge at t={} s after {} iterations (residual {:.3e} Pa)",
                    t, report.iterations, report.residual
                ),
                ConvergencePolicy::Fail => {
                    return Err(SolverError::NonConvergence {
                        step,
                        time: t,
                        iterations: report.iterations,
                        residual: report.residual,
                    });
                }
            }
        }
        reports.push(report);
        pressure = fixed_point.pressure;
        gradient = fixed_point.gradient;

        let discharge = model.discharge(&area, &pressure, &gradient, q_lake)?;
        let melt = melt_rate_field(&discharge, &gradient);
        let creep = creep_closure_field(
            &area,
            &pressure,
            experiment.ice_pressure,
            &experiment.rheology,
        );
        let d_area = melt.map(|mi| mi / RHO_W) - creep;

        if q_lake != 0.0 {
            let lake_area = experiment.lake_area.area(lake_height);
            lake_height = (lake_height - dt * q_lake / lake_area).max(0.0);
        }

        area_out.set_column(step, &area);
        discharge_out.set_column(step, &discharge);
        pressure_out.set_column(step, &pressure);
        lake_height_out[step] = lake_height;

        area += d_area * dt;
        pb.inc(1);
    }

    let elapsed = start.elapsed();
    info!("Incompressible solve took {:.3} seconds", elapsed.as_secs_f64());
    pb.finish();

    Ok(Solution {
        times: t_eval.clone(),
        area: area_out,
        pressure: pressure_out,
        discharge: discharge_out,
        lake_height: lake_height_out,
        diagnostics: SolveDiagnostics {
            elapsed,
            fixed_point: reports,
            integrator: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Drainage, FixedPointOptions, Grid, InitialConditions, LakeArea, TimeParams};
    use crate::constants::G;
    use crate::discharge::lake_pressure;
    use crate::operators::solve_dense;
    use std::cell::Cell;

    fn experiment(drainage: Drainage, lake_height: f64) -> Experiment {
        let n = 5;
        let p_lake = lake_pressure(5.0);
        let initial = InitialConditions {
            area: vec![1.0; n],
            pressure: (0..n)
                .map(|i| p_lake * (1.0 - (i + 1) as f64 / (n + 1) as f64))
                .collect(),
            lake_height,
        };
        Experiment::new(
            Grid::uniform(n, 10.0),
            RHO_I * G * 100.0,
            LakeArea::Constant(1.0e4),
            initial,
            TimeParams::regular(60.0, 10),
        )
        .with_drainage(drainage)
    }

    struct CountingSolver {
        calls: Cell<usize>,
    }

    impl LinearSolver for CountingSolver {
        fn solve_dense(&self, a: &DMatrix<f64>, b: &DVector<f64>) -> SolverResult<DVector<f64>> {
            self.calls.set(self.calls.get() + 1);
            solve_dense(a, b)
        }
    }

    #[test]
    fn test_lake_drains_monotonically() {
        let solution = solve_incompressible(&experiment(Drainage::PressureCoupled, 5.0)).unwrap();
        assert_eq!(solution.area.shape(), (5, 10));
        assert!(solution.lake_height.as_slice().windows(2).all(|w| w[1] <= w[0]));
        assert!(solution.lake_height[0] < 5.0);
        assert!(solution.discharge.iter().all(|&q| q >= 0.0));
        assert!(solution.all_converged());
        assert_eq!(solution.diagnostics.fixed_point.len(), 10);
    }

    #[test]
    fn test_empty_lake_with_vanishing_area() {
        let mut exp = experiment(Drainage::PressureCoupled, 0.0);
        exp.lake_area = LakeArea::hypsometry(|h| 100.0 * h * h);
        let solution = solve_incompressible(&exp).unwrap();
        assert!(solution.lake_height.iter().all(|&h| h == 0.0));
        assert!(solution.area.iter().all(|v| v.is_finite()));
        assert!(solution.pressure.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_initial_area_recorded_first() {
        let exp = experiment(Drainage::PressureCoupled, 5.0);
        let solution = solve_incompressible(&exp).unwrap();
        for i in 0..5 {
            assert_eq!(solution.area[(i, 0)], 1.0);
        }
        // melt opens the channel from the second record on
        assert!(solution.area[(0, 1)] > 1.0);
    }

    #[test]
    fn test_prescribed_discharge_drains_lake() {
        let exp = experiment(Drainage::prescribed(|_| 2.0), 5.0);
        let solution = solve_incompressible(&exp).unwrap();
        // 60 s at 2 m^3/s over 1e4 m^2 lowers the lake by 0.012 m per step
        approx::assert_relative_eq!(solution.lake_height[0], 4.988, max_relative = 1e-12);
        approx::assert_relative_eq!(solution.lake_height[9], 4.88, max_relative = 1e-9);
        approx::assert_relative_eq!(solution.discharge[(0, 0)], 2.0, max_relative = 1e-3);
    }

    #[test]
    fn test_lake_height_never_negative() {
        let exp = experiment(Drainage::prescribed(|_| 500.0), 5.0);
        let solution = solve_incompressible(&exp).unwrap();
        assert!(solution.lake_height.iter().all(|&h| h >= 0.0));
        assert_eq!(solution.lake_height[9], 0.0);
    }

    #[test]
    fn test_empty_lake_stays_empty() {
        for drainage in [Drainage::PressureCoupled, Drainage::prescribed(|_| 3.0)] {
            let solution = solve_incompressible(&experiment(drainage, 0.0)).unwrap();
            assert!(solution.lake_height.iter().all(|&h| h == 0.0));
        }
    }

    #[test]
    fn test_non_convergence_is_reported() {
        let options = FixedPointOptions {
            max_iterations: 1,
            tolerance: 1e-12,
        };
        let exp = experiment(Drainage::prescribed(|_| 2.0), 5.0).with_fixed_point(options);
        let solution = solve_incompressible(&exp).unwrap();
        assert!(!solution.all_converged());
        let first = solution.diagnostics.fixed_point[0];
        assert_eq!(first.iterations, 1);
        assert!(first.residual > 1e-12);
    }

    #[test]
    fn test_non_convergence_can_fail_the_solve() {
        let options = FixedPointOptions {
            max_iterations: 1,
            tolerance: 1e-12,
        };
        let exp = experiment(Drainage::prescribed(|_| 2.0), 5.0)
            .with_fixed_point(options)
            .with_convergence_policy(ConvergencePolicy::Fail);
        match solve_incompressible(&exp) {
            Err(SolverError::NonConvergence {
                step, iterations, ..
            }) => {
                assert_eq!(step, 0);
                assert_eq!(iterations, 1);
            }
            other => panic!("expected NonConvergence, got {:?}", other),
        }
    }

    #[test]
    fn test_pluggable_linear_solver() {
        let exp = experiment(Drainage::PressureCoupled, 5.0);
        let solver = CountingSolver { calls: Cell::new(0) };
        let solution =
            solve_incompressible_with_solver(&exp, &solver, &ProgressBar::hidden()).unwrap();
        let iterations: usize = solution
            .diagnostics
            .fixed_point
            .iter()
            .map(|r| r.iterations)
            .sum();
        // two solves per iteration plus the final discharge solve of each step
        assert_eq!(solver.calls.get(), 2 * iterations + 10);
    }
}
