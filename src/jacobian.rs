//! Derivatives of constraint functions with respect to the robot state and input.
//!
//! The Jacobian is computed with forward-mode dual numbers: the state and input
//! directions are split into chunks of [`CHUNK`] and every chunk is propagated in its
//! own pass. Passes are independent and run in parallel. Second derivatives are
//! obtained by central differences of this exact Jacobian.

extern crate nalgebra as na;

use na::{DMatrix, DVector};
use rayon::prelude::*;

use crate::dual::{Dual, CHUNK};
use crate::scalar::Scalar;

/// Relative step of the central differences used for the Hessians.
const HESSIAN_STEP: f64 = 1e-5;

/// Vector function of the robot state and input, written once for any scalar type.
/// Implementations must be pure: equal arguments give equal results.
pub trait DifferentiableConstraint: Sync {
    fn evaluate<T: Scalar>(&self, state: &[T], input: &[T]) -> Vec<T>;
}

/// Value and first derivatives of a constraint function.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearApproximation {
    pub f: DVector<f64>,
    /// Derivative with respect to the state, `f.len() x state.len()`
    pub dfdx: DMatrix<f64>,
    /// Derivative with respect to the input, `f.len() x input.len()`
    pub dfdu: DMatrix<f64>,
}

impl LinearApproximation {
    /// Linear approximation of a function without outputs
    pub fn empty(state_dim: usize, input_dim: usize) -> Self {
        LinearApproximation {
            f: DVector::zeros(0),
            dfdx: DMatrix::zeros(0, state_dim),
            dfdu: DMatrix::zeros(0, input_dim),
        }
    }
}

/// Value, first and second derivatives of a constraint function. Second derivatives
/// are given per residual.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticApproximation {
    pub f: DVector<f64>,
    pub dfdx: DMatrix<f64>,
    pub dfdu: DMatrix<f64>,
    /// `state x state`, one per residual
    pub dfdxx: Vec<DMatrix<f64>>,
    /// `input x state`, one per residual
    pub dfdux: Vec<DMatrix<f64>>,
    /// `input x input`, one per residual
    pub dfduu: Vec<DMatrix<f64>>,
}

/// Values of the function, plain `f64` evaluation.
pub fn value<F: DifferentiableConstraint>(function: &F, state: &[f64], input: &[f64]) -> DVector<f64> {
    DVector::from_vec(function.evaluate::<f64>(state, input))
}

/// Value and Jacobian of the function.
pub fn linear_approximation<F: DifferentiableConstraint>(function: &F, state: &[f64], input: &[f64])
                                                         -> LinearApproximation {
    let f = value(function, state, input);
    let jacobian = full_jacobian(function, state, input, f.len());
    LinearApproximation {
        dfdx: jacobian.columns(0, state.len()).into_owned(),
        dfdu: jacobian.columns(state.len(), input.len()).into_owned(),
        f,
    }
}

/// Value, Jacobian and per-residual Hessians. The Hessians are symmetric.
pub fn quadratic_approximation<F: DifferentiableConstraint>(function: &F, state: &[f64], input: &[f64])
                                                            -> QuadraticApproximation {
    let nx = state.len();
    let n = nx + input.len();
    let linear = linear_approximation(function, state, input);
    let m = linear.f.len();

    // Column k of every Hessian: derivative of the Jacobian along variable k
    let columns: Vec<DMatrix<f64>> = (0..n).into_par_iter().map(|k| {
        let mut z: Vec<f64> = state.iter().chain(input.iter()).copied().collect();
        let original = z[k];
        let h = HESSIAN_STEP * (1.0 + original.abs());

        z[k] = original + h;
        let plus = full_jacobian(function, &z[..nx], &z[nx..], m);
        z[k] = original - h;
        let minus = full_jacobian(function, &z[..nx], &z[nx..], m);

        (plus - minus) / (2.0 * h)
    }).collect();

    let mut dfdxx = Vec::with_capacity(m);
    let mut dfdux = Vec::with_capacity(m);
    let mut dfduu = Vec::with_capacity(m);
    for r in 0..m {
        let hessian = DMatrix::from_fn(n, n, |i, k| columns[k][(r, i)]);
        let hessian = (&hessian + hessian.transpose()) * 0.5;
        dfdxx.push(hessian.view((0, 0), (nx, nx)).into_owned());
        dfdux.push(hessian.view((nx, 0), (n - nx, nx)).into_owned());
        dfduu.push(hessian.view((nx, nx), (n - nx, n - nx)).into_owned());
    }

    QuadraticApproximation {
        f: linear.f,
        dfdx: linear.dfdx,
        dfdu: linear.dfdu,
        dfdxx,
        dfdux,
        dfduu,
    }
}

/// Jacobian with respect to `[state, input]` by central finite differences.
/// Slow and approximate; meant for cross-checking.
pub fn finite_difference_jacobian<F: DifferentiableConstraint>(function: &F, state: &[f64], input: &[f64],
                                                               epsilon: f64) -> DMatrix<f64> {
    let nx = state.len();
    let n = nx + input.len();
    let m = function.evaluate::<f64>(state, input).len();

    let jacobian_columns: Vec<Vec<f64>> = (0..n).into_par_iter().map(|k| {
        let mut z: Vec<f64> = state.iter().chain(input.iter()).copied().collect();
        z[k] += epsilon;
        let plus = function.evaluate::<f64>(&z[..nx], &z[nx..]);
        z[k] -= 2.0 * epsilon;
        let minus = function.evaluate::<f64>(&z[..nx], &z[nx..]);
        plus.iter().zip(&minus).map(|(p, q)| (p - q) / (2.0 * epsilon)).collect()
    }).collect();

    DMatrix::from_fn(m, n, |r, k| jacobian_columns[k][r])
}

/// Exact Jacobian with respect to `[state, input]`, `m x (nx + nu)`.
fn full_jacobian<F: DifferentiableConstraint>(function: &F, state: &[f64], input: &[f64], m: usize) -> DMatrix<f64> {
    let n = state.len() + input.len();

    let passes: Vec<(usize, Vec<Dual<CHUNK>>)> = (0..n.div_ceil(CHUNK)).into_par_iter().map(|chunk| {
        let start = chunk * CHUNK;
        // Variables outside this chunk get an out-of-range direction, making them constant
        let seed = |offset: usize, values: &[f64]| -> Vec<Dual<CHUNK>> {
            values.iter().enumerate()
                .map(|(i, &v)| {
                    let k = offset + i;
                    Dual::variable(v, if k >= start { k - start } else { CHUNK })
                })
                .collect()
        };
        let x = seed(0, state);
        let u = seed(state.len(), input);
        (start, function.evaluate(&x, &u))
    }).collect();

    let mut jacobian = DMatrix::zeros(m, n);
    for (start, outputs) in passes {
        for (r, output) in outputs.iter().enumerate() {
            for (d, derivative) in output.eps.iter().enumerate() {
                if start + d < n {
                    jacobian[(r, start + d)] = *derivative;
                }
            }
        }
    }
    jacobian
}
