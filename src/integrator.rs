use crate::error::{SolverError, SolverResult};
use diffsol::{
    NalgebraLU, NalgebraMat, OdeBuilder, OdeSolverMethod, Vector, VectorCommon,
    error::DiffsolError,
};
use nalgebra::DVector;
use std::cell::Cell;

// Right-hand side of dy/dt = f(t, y)
pub trait OdeSystem {
    fn ndim(&self) -> usize;

    fn rhs(&self, t: f64, y: &DVector<f64>) -> DVector<f64>;

    // Forward-difference approximation of `J(t, y) v`. The step is scaled
    // per direction, so unit vectors perturb each entry relative to its size.
    fn jacobian_mul(&self, t: f64, y: &DVector<f64>, v: &DVector<f64>) -> DVector<f64> {
        let v_norm = v.amax();
        if v_norm == 0.0 {
            return DVector::zeros(y.len());
        }
        let weight = y.abs().dot(&v.abs()) / v.abs().sum();
        let eps = f64::EPSILON.sqrt() * (1.0 + weight) / v_norm;
        (self.rhs(t, &(y + v * eps)) - self.rhs(t, y)) / eps
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StiffOptions {
    pub rtol: f64,
    pub atol: f64,
    // first trial step (s), BDF adapts it from there
    pub h0: f64,
    pub h_min: f64,
    pub max_steps: usize,
}

impl Default for StiffOptions {
    fn default() -> Self {
        StiffOptions {
            rtol: 1e-3,
            atol: 1e-6,
            h0: 1.0,
            h_min: 1e-10,
            max_steps: 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegratorStats {
    pub steps: usize,
    pub error_test_failures: usize,
    pub newton_iterations: usize,
    pub jacobian_setups: usize,
    pub rhs_evals: usize,
}

#[derive(Debug, Clone)]
pub struct Trajectory {
    pub t: Vec<f64>,
    pub y: Vec<DVector<f64>>,
    pub stats: IntegratorStats,
}

fn failed(t: f64) -> impl Fn(DiffsolError) -> SolverError {
    move |e| SolverError::IntegrationFailed {
        t,
        reason: e.to_string(),
    }
}

// Integrate `sys` from `y0` at `t_span.0` with a variable-order BDF method,
// returning the state at each of `t_eval` (sorted, inside the span).
// `on_sample` is called with the index of every sample as it is reached.
pub fn integrate_stiff<S, F>(
    sys: &S,
    y0: &DVector<f64>,
    t_span: (f64, f64),
    t_eval: &[f64],
    opts: &StiffOptions,
    mut on_sample: F,
) -> SolverResult<Trajectory>
where
    S: OdeSystem,
    F: FnMut(usize),
{
    let t0 = t_span.0;
    let n = sys.ndim();
    if y0.len() != n {
        return Err(SolverError::IntegrationFailed {
            t: t0,
            reason: format!("initial state has {} entries, expected {}", y0.len(), n),
        });
    }

    let rhs_evals = Cell::new(0usize);
    let problem = OdeBuilder::<NalgebraMat<f64>>::new()
        .t0(t0)
        .h0(opts.h0)
        .rtol(opts.rtol)
        .atol([opts.atol])
        .rhs_implicit(
            |x, _p, t, y| {
                rhs_evals.set(rhs_evals.get() + 1);
                y.inner_mut().copy_from(&sys.rhs(t, x.inner()));
            },
            |x, _p, t, v, y| {
                rhs_evals.set(rhs_evals.get() + 2);
                y.inner_mut()
                    .copy_from(&sys.jacobian_mul(t, x.inner(), v.inner()));
            },
        )
        .init(|_p, _t, y| y.inner_mut().copy_from(y0), n)
        .build()
        .map_err(failed(t0))?;

    let mut solver = problem.bdf::<NalgebraLU<f64>>().map_err(failed(t0))?;
    solver.config_mut().minimum_timestep = opts.h_min;

    let mut out_t = Vec::with_capacity(t_eval.len());
    let mut out_y = Vec::with_capacity(t_eval.len());

    let t_end = t_eval.last().copied().unwrap_or(t0);
    if t_end > t0 {
        solver.set_stop_time(t_end).map_err(failed(t0))?;
    }

    let mut steps = 0;
    for (i, &t) in t_eval.iter().enumerate() {
        while solver.state().t < t {
            if steps >= opts.max_steps {
                return Err(SolverError::IntegrationFailed {
                    t: solver.state().t,
                    reason: format!("exceeded {} steps", opts.max_steps),
                });
            }
            let t_now = solver.state().t;
            solver.step().map_err(failed(t_now))?;
            steps += 1;
        }

        let y = if solver.state().t == t {
            solver.state().y.inner().clone()
        } else {
            solver.interpolate(t).map_err(failed(t))?.inner().clone()
        };
        out_t.push(t);
        out_y.push(y);
        on_sample(i);
    }

    let bdf = solver.get_statistics();
    let stats = IntegratorStats {
        steps: bdf.number_of_steps,
        error_test_failures: bdf.number_of_error_test_failures,
        newton_iterations: bdf.number_of_nonlinear_solver_iterations,
        jacobian_setups: bdf.number_of_linear_solver_setups,
        rhs_evals: rhs_evals.get(),
    };

    Ok(Trajectory {
        t: out_t,
        y: out_y,
        stats,
    })
}
