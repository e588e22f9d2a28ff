use crate::error::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone, PartialEq)]
pub struct DiffOperators {
    pub n: usize,
    pub dx: f64,
    // d/ds from the upstream neighbour (left boundary condition)
    pub upwind: DMatrix<f64>,
    // d/ds from the downstream neighbour (right boundary condition)
    pub downwind: DMatrix<f64>,
}

impl DiffOperators {
    pub fn new(n: usize, dx: f64) -> Self {
        DiffOperators {
            n,
            dx,
            upwind: upwind_operator(n, dx),
            downwind: downwind_operator(n, dx),
        }
    }

    pub fn gradient(&self, field: &DVector<f64>) -> DVector<f64> {
        &self.downwind * field
    }

    pub fn divergence(&self, field: &DVector<f64>) -> DVector<f64> {
        &self.upwind * field
    }
}

pub fn upwind_operator(n: usize, dx: f64) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            1.0 / dx
        } else if j + 1 == i {
            -1.0 / dx
        } else {
            0.0
        }
    })
}

pub fn downwind_operator(n: usize, dx: f64) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            -1.0 / dx
        } else if i + 1 == j {
            1.0 / dx
        } else {
            0.0
        }
    })
}

// Backend for dense `A x = b` solves.
pub trait LinearSolver {
    fn solve_dense(&self, a: &DMatrix<f64>, b: &DVector<f64>) -> SolverResult<DVector<f64>>;
}

// LU decomposition with partial pivoting (nalgebra).
#[derive(Debug, Clone, Copy, Default)]
pub struct LuSolver;

impl LinearSolver for LuSolver {
    fn solve_dense(&self, a: &DMatrix<f64>, b: &DVector<f64>) -> SolverResult<DVector<f64>> {
        let x = a
            .clone()
            .lu()
            .solve(b)
            .ok_or(SolverError::SingularSystem { rows: a.nrows() })?;
        if x.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::NonFiniteSolution);
        }
        Ok(x)
    }
}

pub fn solve_dense(a: &DMatrix<f64>, b: &DVector<f64>) -> SolverResult<DVector<f64>> {
    LuSolver.solve_dense(a, b)
}
