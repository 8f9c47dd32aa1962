//! Linear limits on the robot state and input, as a penalty-ready value (soft) or as
//! double-sided inequality constraints (hard).

extern crate nalgebra as na;

use na::{DMatrix, DVector};

use crate::balancing_error::BalancingError;
use crate::jacobian::{DifferentiableConstraint, LinearApproximation};
use crate::kinematic_traits::RobotDimensions;
use crate::scalar::Scalar;

/// The limited part of state and input, `f = [x_r, u_r]`, where `x_r` and `u_r` are the
/// leading robot entries of the (possibly larger) optimization state and input.
/// Bounds are applied by the penalty that consumes the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointStateInputLimits {
    dims: RobotDimensions,
}

impl JointStateInputLimits {
    pub fn new(dims: RobotDimensions) -> Self {
        JointStateInputLimits { dims }
    }

    pub fn num_constraints(&self) -> usize {
        self.dims.x() + self.dims.u()
    }

    pub fn value(&self, state: &DVector<f64>, input: &DVector<f64>) -> Result<DVector<f64>, BalancingError> {
        self.check(state, input)?;
        Ok(DVector::from_vec(self.evaluate(state.as_slice(), input.as_slice())))
    }

    /// Exact: `dfdx = [I 0; 0 0]`, `dfdu = [0 0; I 0]`.
    pub fn linear_approximation(&self, state: &DVector<f64>, input: &DVector<f64>)
                                -> Result<LinearApproximation, BalancingError> {
        let f = self.value(state, input)?;
        let (rx, ru) = (self.dims.x(), self.dims.u());
        let mut dfdx = DMatrix::zeros(rx + ru, state.len());
        dfdx.view_mut((0, 0), (rx, rx)).fill_with_identity();
        let mut dfdu = DMatrix::zeros(rx + ru, input.len());
        dfdu.view_mut((rx, 0), (ru, ru)).fill_with_identity();
        Ok(LinearApproximation { f, dfdx, dfdu })
    }

    fn check(&self, state: &DVector<f64>, input: &DVector<f64>) -> Result<(), BalancingError> {
        if state.len() < self.dims.x() {
            return Err(BalancingError::DimensionMismatch { what: "state", expected: self.dims.x(), found: state.len() });
        }
        if input.len() < self.dims.u() {
            return Err(BalancingError::DimensionMismatch { what: "input", expected: self.dims.u(), found: input.len() });
        }
        Ok(())
    }
}

impl DifferentiableConstraint for JointStateInputLimits {
    fn evaluate<T: Scalar>(&self, state: &[T], input: &[T]) -> Vec<T> {
        state[..self.dims.x()].iter().chain(&input[..self.dims.u()]).copied().collect()
    }
}

/// Double-sided limits as inequalities `C x + D u + e >= 0`, rows ordered
/// `x - x_lower`, `x_upper - x`, `u - u_lower`, `u_upper - u`.
#[derive(Debug, Clone, PartialEq)]
pub struct JointStateInputConstraint {
    c: DMatrix<f64>,
    d: DMatrix<f64>,
    e: DVector<f64>,
}

impl JointStateInputConstraint {
    /// `state_dim` and `input_dim` are the full optimization sizes; limits cover the
    /// leading robot entries described by `dims`.
    pub fn new(dims: RobotDimensions, state_dim: usize, input_dim: usize,
               state_lower: &DVector<f64>, state_upper: &DVector<f64>,
               input_lower: &DVector<f64>, input_upper: &DVector<f64>) -> Result<Self, BalancingError> {
        let (rx, ru) = (dims.x(), dims.u());
        for (what, limit, expected) in [
            ("state lower limit", state_lower, rx),
            ("state upper limit", state_upper, rx),
            ("input lower limit", input_lower, ru),
            ("input upper limit", input_upper, ru),
        ] {
            if limit.len() != expected {
                return Err(BalancingError::DimensionMismatch { what, expected, found: limit.len() });
            }
        }
        if state_dim < rx {
            return Err(BalancingError::DimensionMismatch { what: "state", expected: rx, found: state_dim });
        }
        if input_dim < ru {
            return Err(BalancingError::DimensionMismatch { what: "input", expected: ru, found: input_dim });
        }

        let n = 2 * (rx + ru);
        let mut c = DMatrix::zeros(n, state_dim);
        c.view_mut((0, 0), (rx, rx)).fill_with_identity();
        c.view_mut((rx, 0), (rx, rx)).copy_from(&-DMatrix::<f64>::identity(rx, rx));

        let mut d = DMatrix::zeros(n, input_dim);
        d.view_mut((2 * rx, 0), (ru, ru)).fill_with_identity();
        d.view_mut((2 * rx + ru, 0), (ru, ru)).copy_from(&-DMatrix::<f64>::identity(ru, ru));

        let mut e = DVector::zeros(n);
        e.rows_mut(0, rx).copy_from(&-state_lower);
        e.rows_mut(rx, rx).copy_from(state_upper);
        e.rows_mut(2 * rx, ru).copy_from(&-input_lower);
        e.rows_mut(2 * rx + ru, ru).copy_from(input_upper);

        Ok(JointStateInputConstraint { c, d, e })
    }

    /// Limits are double-sided, two rows per limited entry.
    pub fn num_constraints(&self) -> usize {
        self.e.len()
    }

    pub fn value(&self, state: &DVector<f64>, input: &DVector<f64>) -> Result<DVector<f64>, BalancingError> {
        self.check(state, input)?;
        Ok(&self.e + &self.c * state + &self.d * input)
    }

    pub fn linear_approximation(&self, state: &DVector<f64>, input: &DVector<f64>)
                                -> Result<LinearApproximation, BalancingError> {
        Ok(LinearApproximation {
            f: self.value(state, input)?,
            dfdx: self.c.clone(),
            dfdu: self.d.clone(),
        })
    }

    fn check(&self, state: &DVector<f64>, input: &DVector<f64>) -> Result<(), BalancingError> {
        if state.len() != self.c.ncols() {
            return Err(BalancingError::DimensionMismatch { what: "state", expected: self.c.ncols(), found: state.len() });
        }
        if input.len() != self.d.ncols() {
            return Err(BalancingError::DimensionMismatch { what: "input", expected: self.d.ncols(), found: input.len() });
        }
        Ok(())
    }
}
