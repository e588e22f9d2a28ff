use crate::config::{Experiment, LakeAreaModel};
use crate::constants::{RHO_I, RHO_W};
use crate::discharge::{
    conduit_discharge_field, creep_closure_field, lake_discharge, melt_rate_field,
};
use crate::error::SolverResult;
use crate::integrator::{OdeSystem, integrate_stiff};
use crate::operators::DiffOperators;
use crate::solution::{SolveDiagnostics, Solution};
use crate::state::{self, ConduitState};
use indicatif::ProgressBar;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use std::time::Instant;

// Time derivatives of the conduit state together with the intermediate
// rates they were built from.
#[derive(Debug, Clone)]
pub struct Derivatives {
    pub area: DVector<f64>,
    pub pressure: DVector<f64>,
    pub lake_height: f64,
    pub discharge: DVector<f64>,
    pub lake_discharge: f64,
    pub melt: DVector<f64>,
    pub creep: DVector<f64>,
}

impl Derivatives {
    pub fn wrap(&self) -> DVector<f64> {
        state::wrap(&self.area, &self.pressure, self.lake_height)
    }
}

pub fn evaluate(
    t: f64,
    state: &ConduitState,
    experiment: &Experiment,
    ops: &DiffOperators,
) -> Derivatives {
    let n = state.cells();
    let dx = experiment.grid.dx;
    let rheology = &experiment.rheology;
    let area = &state.area;

    let q_lake = lake_discharge(t, area[0], state.pressure[0], state.lake_height, experiment);

    let gradient = ops.gradient(&state.pressure);
    let discharge = conduit_discharge_field(area, &gradient, rheology.f_r);

    // first cell draws exactly the lake discharge
    let mut divergence = ops.divergence(&discharge);
    divergence[0] = (discharge[0] - q_lake) / dx;

    let melt = melt_rate_field(&discharge, &gradient);
    let creep = creep_closure_field(area, &state.pressure, experiment.ice_pressure, rheology);

    let d_area = melt.map(|m| m / RHO_I) - &creep;
    let d_pressure = DVector::from_fn(n, |i, _| {
        -(d_area[i] + divergence[i] - melt[i] / RHO_W) / (rheology.beta * area[i])
    });
    // an empty lake may have zero area, but it has no outflow either
    let d_lake = if q_lake == 0.0 {
        0.0
    } else {
        -q_lake / experiment.lake_area.area(state.lake_height)
    };

    Derivatives {
        area: d_area,
        pressure: d_pressure,
        lake_height: d_lake,
        discharge,
        lake_discharge: q_lake,
        melt,
        creep,
    }
}

// Packed right-hand side: (t, [S, pw, h]) -> [dS/dt, dpw/dt, dh/dt].
pub fn rhs_compressible(
    t: f64,
    v: &DVector<f64>,
    experiment: &Experiment,
    ops: &DiffOperators,
) -> DVector<f64> {
    evaluate(t, &ConduitState::unwrap(v), experiment, ops).wrap()
}

pub struct CompressibleSystem<'a> {
    experiment: &'a Experiment,
    ops: DiffOperators,
}

impl<'a> CompressibleSystem<'a> {
    pub fn new(experiment: &'a Experiment) -> Self {
        let ops = DiffOperators::new(experiment.grid.n, experiment.grid.dx);
        CompressibleSystem { experiment, ops }
    }
}

impl OdeSystem for CompressibleSystem<'_> {
    fn ndim(&self) -> usize {
        2 * self.ops.n + 1
    }

    fn rhs(&self, t: f64, y: &DVector<f64>) -> DVector<f64> {
        rhs_compressible(t, y, self.experiment, &self.ops)
    }
}

pub fn solve_compressible(experiment: &Experiment) -> SolverResult<Solution> {
    solve_compressible_with_progress(experiment, &ProgressBar::hidden())
}

pub fn solve_compressible_with_progress(
    experiment: &Experiment,
    pb: &ProgressBar,
) -> SolverResult<Solution> {
    let start = Instant::now();
    experiment.validate()?;

    let n = experiment.grid.n;
    let f_r = experiment.rheology.f_r;
    let system = CompressibleSystem::new(experiment);

    let initial = ConduitState::from_slices(
        &experiment.initial.area,
        &experiment.initial.pressure,
        experiment.initial.lake_height,
    );
    let t_eval = &experiment.time.t_eval;
    pb.set_length(t_eval.len() as u64);

    let trajectory = integrate_stiff(
        &system,
        &initial.wrap(),
        experiment.time.t_span,
        t_eval,
        &experiment.integration,
        |_| pb.inc(1),
    )?;

    let m = trajectory.y.len();
    let mut area = DMatrix::zeros(n, m);
    let mut pressure = DMatrix::zeros(n, m);
    let mut discharge = DMatrix::zeros(n, m);
    let mut lake_height = DVector::zeros(m);

    // discharge is not part of the integrated state, rebuild it from pressure
    for (j, v) in trajectory.y.iter().enumerate() {
        let sample = ConduitState::unwrap(v);
        let gradient = system.ops.gradient(&sample.pressure);
        discharge.set_column(j, &conduit_discharge_field(&sample.area, &gradient, f_r));
        area.set_column(j, &sample.area);
        pressure.set_column(j, &sample.pressure);
        lake_height[j] = sample.lake_height;
    }

    let elapsed = start.elapsed();
    let stats = trajectory.stats;
    debug!(
        "BDF: {} steps, {} error test failures, {} Newton iterations, {} Jacobian setups, {} rhs evaluations",
        stats.steps,
        stats.error_test_failures,
        stats.newton_iterations,
        stats.jacobian_setups,
        stats.rhs_evals
    );
    info!("Compressible solve took {:.3} seconds", elapsed.as_secs_f64());
    pb.finish();

    Ok(Solution {
        times: trajectory.t,
        area,
        pressure,
        discharge,
        lake_height,
        diagnostics: SolveDiagnostics {
            elapsed,
            fixed_point: Vec::new(),
            integrator: Some(stats),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Drainage, Grid, InitialConditions, LakeArea, RheologyOverrides, TimeParams};
    use crate::constants::{G, RHO_I};
    use crate::discharge::{conduit_discharge, lake_pressure};
    use approx::assert_relative_eq;

    fn experiment(drainage: Drainage, lake_height: f64) -> Experiment {
        let n = 5;
        let p_lake = lake_pressure(lake_height.max(5.0));
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
            LakeArea::Constant(1.0e5),
            initial,
            TimeParams::regular(60.0, 10),
        )
        .with_drainage(drainage)
    }

    fn derivatives_at_start(experiment: &Experiment) -> Derivatives {
        let ops = DiffOperators::new(experiment.grid.n, experiment.grid.dx);
        let state = ConduitState::from_slices(
            &experiment.initial.area,
            &experiment.initial.pressure,
            experiment.initial.lake_height,
        );
        evaluate(0.0, &state, experiment, &ops)
    }

    #[test]
    fn test_rates_are_non_negative() {
        for drainage in [Drainage::PressureCoupled, Drainage::prescribed(|_| 3.0)] {
            let d = derivatives_at_start(&experiment(drainage, 5.0));
            assert!(d.melt.iter().all(|&m| m >= 0.0));
            assert!(d.creep.iter().all(|&c| c >= 0.0));
        }
    }

    #[test]
    fn test_rates_non_negative_with_overpressure() {
        // water pressure above overburden and an adverse gradient
        let mut exp = experiment(Drainage::PressureCoupled, 5.0);
        exp.ice_pressure = 1.0e4;
        exp.initial.pressure = vec![1.0e4, 3.0e4, 2.0e4, 5.0e4, 4.0e4];
        let d = derivatives_at_start(&exp);
        assert!(d.melt.iter().all(|&m| m >= 0.0));
        assert!(d.creep.iter().all(|&c| c >= 0.0));
    }

    #[test]
    fn test_area_rate_is_pure_melt_without_creep() {
        let overrides = RheologyOverrides::from_pairs([("A", 0.0)]).unwrap();
        let exp = experiment(Drainage::prescribed(|_| 2.5), 5.0).with_overrides(&overrides);
        let d = derivatives_at_start(&exp);
        assert_eq!(d.lake_discharge, 2.5);
        for i in 0..exp.grid.n {
            assert_eq!(d.creep[i], 0.0);
            assert_eq!(d.area[i], d.melt[i] / RHO_I);
        }
    }

    #[test]
    fn test_uniform_profile_discharge() {
        // linear profile down to zero beyond the outlet: same gradient in every cell
        let d = derivatives_at_start(&experiment(Drainage::PressureCoupled, 5.0));
        let gradient = -lake_pressure(5.0) / 6.0 / 10.0;
        let expected = conduit_discharge(1.0, gradient, 0.15);
        for i in 0..5 {
            assert_relative_eq!(d.discharge[i], expected, max_relative = 1e-9);
        }
        assert_relative_eq!(d.lake_discharge, expected, max_relative = 1e-9);
        assert_relative_eq!(d.lake_height, -expected / 1.0e5, max_relative = 1e-9);
    }

    #[test]
    fn test_empty_lake_stops_draining() {
        for drainage in [Drainage::PressureCoupled, Drainage::prescribed(|_| 3.0)] {
            let d = derivatives_at_start(&experiment(drainage, 0.0));
            assert_eq!(d.lake_discharge, 0.0);
            assert_eq!(d.lake_height, 0.0);
        }
    }

    #[test]
    fn test_empty_lake_with_vanishing_area() {
        let mut exp = experiment(Drainage::PressureCoupled, 0.0);
        exp.lake_area = LakeArea::hypsometry(|h| 100.0 * h * h);
        let d = derivatives_at_start(&exp);
        assert_eq!(d.lake_height, 0.0);
        assert!(d.wrap().iter().all(|v| v.is_finite()));

        let solution = solve_compressible(&exp).unwrap();
        assert!(solution.area.iter().all(|v| v.is_finite()));
        assert!(solution.pressure.iter().all(|v| v.is_finite()));
        assert!(solution.lake_height.iter().all(|h| h.is_finite() && h.abs() < 1e-3));
    }

    #[test]
    fn test_flat_inlet_pressure_gives_zero_discharge() {
        let mut exp = experiment(Drainage::PressureCoupled, 5.0);
        let p = exp.initial.pressure[0];
        exp.initial.pressure[1] = p;
        let d = derivatives_at_start(&exp);
        assert_eq!(d.discharge[0], 0.0);
        assert!(d.discharge.iter().all(|q| q.is_finite()));
        assert!(d.wrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_lake_area_function_used() {
        let mut exp = experiment(Drainage::prescribed(|_| 2.0), 4.0);
        exp.lake_area = LakeArea::hypsometry(|h| 500.0 * h);
        let d = derivatives_at_start(&exp);
        assert_relative_eq!(d.lake_height, -2.0 / 2000.0, max_relative = 1e-12);
    }

    #[test]
    fn test_packed_rhs_layout() {
        let exp = experiment(Drainage::PressureCoupled, 5.0);
        let ops = DiffOperators::new(5, 10.0);
        let state = ConduitState::from_slices(
            &exp.initial.area,
            &exp.initial.pressure,
            exp.initial.lake_height,
        );
        let packed = rhs_compressible(0.0, &state.wrap(), &exp, &ops);
        let d = evaluate(0.0, &state, &exp, &ops);
        assert_eq!(packed.len(), 11);
        assert_eq!(packed, d.wrap());
        assert_eq!(packed[10], d.lake_height);
    }

    #[test]
    fn test_solution_starts_at_initial_conditions() {
        let exp = experiment(Drainage::PressureCoupled, 5.0);
        let solution = solve_compressible(&exp).unwrap();
        assert_eq!(solution.area.shape(), (5, 10));
        assert_eq!(solution.pressure.shape(), (5, 10));
        assert_eq!(solution.discharge.shape(), (5, 10));
        assert_eq!(solution.lake_height.len(), 10);
        for i in 0..5 {
            assert_eq!(solution.area[(i, 0)], exp.initial.area[i]);
            assert_eq!(solution.pressure[(i, 0)], exp.initial.pressure[i]);
        }
        assert_eq!(solution.lake_height[0], 5.0);
        assert!(solution.diagnostics.integrator.is_some());
    }
}
