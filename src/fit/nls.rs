//! Bounded nonlinear least squares (Levenberg–Marquardt).
//!
//! Given a residual function `r(θ) = y − f(θ)` and the model Jacobian
//! `J = ∂f/∂θ`, each iteration solves the damped normal equations
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀ r
//! ```
//!
//! and projects `θ + δ` onto the box bounds. Accepted steps shrink `λ`,
//! rejected steps grow it.
//!
//! Termination:
//! - converged: SSE at or below the absolute floor, a relative SSE reduction
//!   below `ftol`, a projected step below `xtol`, or no descent possible at
//!   maximal damping
//! - non-convergence: iteration or evaluation budget exhausted
//! - singular gradient: the Jacobian at the solution is rank deficient
//!
//! The covariance of the estimates is `σ²·(JᵀJ)⁺` with `σ² = SSE / (n − p)`,
//! computed from the SVD of `J`.

use nalgebra::{DMatrix, DVector};

use crate::domain::NlsControl;
use crate::math::solve_least_squares;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
const DIAG_FLOOR: f64 = 1e-12;

/// A nonlinear least squares problem.
pub trait LeastSquaresProblem {
    fn n_obs(&self) -> usize;

    fn n_params(&self) -> usize;

    /// Residuals `y − f(θ)`.
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;

    /// Model Jacobian `∂f/∂θ` (`n_obs × n_params`).
    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64>;
}

/// A converged solution.
#[derive(Debug, Clone)]
pub struct NlsSolution {
    pub params: DVector<f64>,
    pub residuals: DVector<f64>,
    pub sse: f64,
    pub covariance: DMatrix<f64>,
    pub iterations: usize,
    pub evaluations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NlsError {
    /// Iteration or evaluation budget exhausted.
    NonConvergence { iterations: usize, evaluations: usize },
    /// The Jacobian at the solution is rank deficient.
    SingularGradient { iterations: usize, evaluations: usize },
    /// Residuals are not finite at the starting values.
    NonFinite,
}

/// Minimise `‖r(θ)‖²` subject to `lower ≤ θ ≤ upper`.
///
/// `start` is projected onto the bounds before the first evaluation.
pub fn solve_bounded<P: LeastSquaresProblem>(
    problem: &P,
    start: &[f64],
    bounds: &[(f64, f64)],
    control: &NlsControl,
) -> Result<NlsSolution, NlsError> {
    let p = problem.n_params();
    debug_assert_eq!(start.len(), p);
    debug_assert_eq!(bounds.len(), p);

    let mut params = project(&DVector::from_column_slice(start), bounds);
    let mut residuals = problem.residuals(&params);
    let mut evaluations = 1usize;
    let mut sse = residuals.norm_squared();
    if !sse.is_finite() {
        return Err(NlsError::NonFinite);
    }

    let mut lambda = LAMBDA_INIT;
    let mut iterations = 0usize;
    let mut converged = sse <= control.sse_floor;

    while !converged {
        if iterations >= control.max_iterations {
            return Err(NlsError::NonConvergence {
                iterations,
                evaluations,
            });
        }
        iterations += 1;

        let jac = problem.jacobian(&params);
        let jtj = jac.transpose() * &jac;
        let jtr = jac.transpose() * &residuals;

        loop {
            if lambda > LAMBDA_MAX {
                // No damping yields a decrease: the current point is stationary.
                converged = true;
                break;
            }

            let mut damped = jtj.clone();
            for j in 0..p {
                damped[(j, j)] += lambda * jtj[(j, j)].max(DIAG_FLOOR);
            }
            let Some(delta) = solve_damped(damped, &jtr) else {
                lambda *= 10.0;
                continue;
            };

            let trial = project(&(&params + &delta), bounds);
            let step = (&trial - &params).norm();
            if step <= control.xtol * (params.norm() + control.xtol) {
                converged = true;
                break;
            }

            if evaluations >= control.max_evaluations {
                return Err(NlsError::NonConvergence {
                    iterations,
                    evaluations,
                });
            }
            let trial_residuals = problem.residuals(&trial);
            evaluations += 1;
            let trial_sse = trial_residuals.norm_squared();

            if trial_sse.is_finite() && trial_sse < sse {
                let reduction = sse - trial_sse;
                params = trial;
                residuals = trial_residuals;
                let prev_sse = sse;
                sse = trial_sse;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);

                if sse <= control.sse_floor || reduction <= control.ftol * prev_sse {
                    converged = true;
                }
                break;
            }

            lambda *= 10.0;
        }
    }

    let jac = problem.jacobian(&params);
    let n = problem.n_obs();
    let Some(covariance) = covariance(&jac, sse, n, control.singular_rtol) else {
        return Err(NlsError::SingularGradient {
            iterations,
            evaluations,
        });
    };

    Ok(NlsSolution {
        params,
        residuals,
        sse,
        covariance,
        iterations,
        evaluations,
    })
}

fn project(params: &DVector<f64>, bounds: &[(f64, f64)]) -> DVector<f64> {
    DVector::from_iterator(
        params.len(),
        params
            .iter()
            .zip(bounds.iter())
            .map(|(&v, &(lo, hi))| v.clamp(lo, hi)),
    )
}

fn solve_damped(m: DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = m.clone().cholesky() {
        let delta = chol.solve(rhs);
        if delta.iter().all(|v| v.is_finite()) {
            return Some(delta);
        }
    }
    solve_least_squares(&m, rhs)
}

/// `σ²·(JᵀJ)⁻¹`, or `None` when `J` is rank deficient.
///
/// When `n <= p` the residual variance is undefined and the matrix is NaN.
fn covariance(jac: &DMatrix<f64>, sse: f64, n: usize, rtol: f64) -> Option<DMatrix<f64>> {
    let p = jac.ncols();
    if n < p || jac.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let svd = jac.clone().svd(false, true);
    let sv = &svd.singular_values;
    let s_max = sv.max();
    let s_min = sv.min();
    if !(s_max > 0.0) || s_min <= rtol * s_max {
        return None;
    }
    let v_t = svd.v_t.as_ref()?;

    let sigma2 = if n > p { sse / (n - p) as f64 } else { f64::NAN };
    let inv_sq = DMatrix::from_diagonal(&sv.map(|s| 1.0 / (s * s)));
    Some(v_t.transpose() * inv_sq * v_t * sigma2)
}
