//! Penalties turning inequality residuals `h >= 0` into a cost, and the choice between
//! handing the balancing residuals to the solver as constraints or as such a cost.

extern crate nalgebra as na;

use na::{DMatrix, DVector};

use crate::balancing_constraints::BoundedBalancingConstraints;
use crate::balancing_error::BalancingError;
use crate::kinematic_traits::EndEffectorKinematics;
use crate::settings::ConstraintType;

/// Scalar penalty of one residual `h`, where `h >= 0` is feasible.
pub trait Penalty {
    fn value(&self, h: f64) -> f64;
    fn derivative(&self, h: f64) -> f64;
    fn second_derivative(&self, h: f64) -> f64;
}

/// Log barrier `-mu ln(h)`, continued by a quadratic below `delta` so it stays finite
/// (and twice differentiable) for infeasible residuals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxedBarrierPenalty {
    pub mu: f64,
    pub delta: f64,
}

impl RelaxedBarrierPenalty {
    pub fn new(mu: f64, delta: f64) -> Self {
        RelaxedBarrierPenalty { mu, delta }
    }
}

impl Penalty for RelaxedBarrierPenalty {
    fn value(&self, h: f64) -> f64 {
        if h > self.delta {
            -self.mu * h.ln()
        } else {
            let z = (h - 2.0 * self.delta) / self.delta;
            self.mu * (-self.delta.ln() + 0.5 * z * z - 0.5)
        }
    }

    fn derivative(&self, h: f64) -> f64 {
        if h > self.delta {
            -self.mu / h
        } else {
            self.mu * (h - 2.0 * self.delta) / (self.delta * self.delta)
        }
    }

    fn second_derivative(&self, h: f64) -> f64 {
        if h > self.delta {
            self.mu / (h * h)
        } else {
            self.mu / (self.delta * self.delta)
        }
    }
}

/// `mu / 2 (h - delta)²` below `delta`, zero above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquaredHingePenalty {
    pub mu: f64,
    pub delta: f64,
}

impl SquaredHingePenalty {
    pub fn new(mu: f64, delta: f64) -> Self {
        SquaredHingePenalty { mu, delta }
    }
}

impl Penalty for SquaredHingePenalty {
    fn value(&self, h: f64) -> f64 {
        if h < self.delta {
            0.5 * self.mu * (h - self.delta) * (h - self.delta)
        } else {
            0.0
        }
    }

    fn derivative(&self, h: f64) -> f64 {
        if h < self.delta { self.mu * (h - self.delta) } else { 0.0 }
    }

    fn second_derivative(&self, h: f64) -> f64 {
        if h < self.delta { self.mu } else { 0.0 }
    }
}

/// Penalty configured for a soft balancing term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PenaltyKind {
    RelaxedBarrier(RelaxedBarrierPenalty),
    SquaredHinge(SquaredHingePenalty),
}

impl Penalty for PenaltyKind {
    fn value(&self, h: f64) -> f64 {
        match self {
            PenaltyKind::RelaxedBarrier(p) => p.value(h),
            PenaltyKind::SquaredHinge(p) => p.value(h),
        }
    }

    fn derivative(&self, h: f64) -> f64 {
        match self {
            PenaltyKind::RelaxedBarrier(p) => p.derivative(h),
            PenaltyKind::SquaredHinge(p) => p.derivative(h),
        }
    }

    fn second_derivative(&self, h: f64) -> f64 {
        match self {
            PenaltyKind::RelaxedBarrier(p) => p.second_derivative(h),
            PenaltyKind::SquaredHinge(p) => p.second_derivative(h),
        }
    }
}

/// Cost and its derivatives with respect to state and input. The Hessian is the
/// Gauss-Newton approximation `Jᵀ diag(p'') J`.
#[derive(Debug, Clone, PartialEq)]
pub struct CostApproximation {
    pub value: f64,
    pub dfdx: DVector<f64>,
    pub dfdu: DVector<f64>,
    pub dfdxx: DMatrix<f64>,
    pub dfdux: DMatrix<f64>,
    pub dfduu: DMatrix<f64>,
}

/// Balancing residuals entering the cost through a penalty.
#[derive(Debug, Clone)]
pub struct SoftBalancing<K: EndEffectorKinematics> {
    pub constraints: BoundedBalancingConstraints<K>,
    pub penalty: PenaltyKind,
}

impl<K: EndEffectorKinematics> SoftBalancing<K> {
    pub fn cost(&self, time: f64, state: &DVector<f64>, input: &DVector<f64>) -> Result<f64, BalancingError> {
        let h = self.constraints.value(time, state, input)?;
        Ok(h.iter().map(|h| self.penalty.value(*h)).sum())
    }

    pub fn cost_approximation(&self, time: f64, state: &DVector<f64>, input: &DVector<f64>)
                              -> Result<CostApproximation, BalancingError> {
        let la = self.constraints.linear_approximation(time, state, input)?;
        let first = la.f.map(|h| self.penalty.derivative(h));
        let second = la.f.map(|h| self.penalty.second_derivative(h));

        let weighted_x = DMatrix::from_diagonal(&second) * &la.dfdx;
        let weighted_u = DMatrix::from_diagonal(&second) * &la.dfdu;
        Ok(CostApproximation {
            value: la.f.iter().map(|h| self.penalty.value(*h)).sum(),
            dfdx: la.dfdx.transpose() * &first,
            dfdu: la.dfdu.transpose() * &first,
            dfdxx: la.dfdx.transpose() * &weighted_x,
            dfdux: la.dfdu.transpose() * &weighted_x,
            dfduu: la.dfdu.transpose() * &weighted_u,
        })
    }
}

/// How the solver receives the balancing residuals, fixed at setup.
#[derive(Debug, Clone)]
pub enum BalancingTerm<K: EndEffectorKinematics> {
    /// Inequality constraints `h >= 0`
    Hard(BoundedBalancingConstraints<K>),
    /// Penalty cost
    Soft(SoftBalancing<K>),
}

impl<K: EndEffectorKinematics> BalancingTerm<K> {
    /// Selects the term from the constraint type in the settings. Soft terms use a
    /// relaxed barrier weighted by the settings `mu` and relaxed at `delta`.
    pub fn from_settings(constraints: BoundedBalancingConstraints<K>) -> Self {
        let settings = constraints.settings();
        let penalty = PenaltyKind::RelaxedBarrier(RelaxedBarrierPenalty::new(settings.mu, settings.delta));
        Self::with_penalty(constraints, penalty)
    }

    /// As [`Self::from_settings`] but with an explicit penalty for the soft case.
    pub fn with_penalty(constraints: BoundedBalancingConstraints<K>, penalty: PenaltyKind) -> Self {
        match constraints.settings().constraint_type {
            ConstraintType::Hard => BalancingTerm::Hard(constraints),
            ConstraintType::Soft => BalancingTerm::Soft(SoftBalancing { constraints, penalty }),
        }
    }

    pub fn constraints(&self) -> &BoundedBalancingConstraints<K> {
        match self {
            BalancingTerm::Hard(constraints) => constraints,
            BalancingTerm::Soft(soft) => &soft.constraints,
        }
    }

    pub fn is_soft(&self) -> bool {
        matches!(self, BalancingTerm::Soft(_))
    }
}
