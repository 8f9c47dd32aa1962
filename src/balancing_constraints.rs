//! Robust balancing constraints as seen by a trajectory optimizer.

extern crate nalgebra as na;

use std::sync::Arc;

use na::{DVector, Vector3};
use tracing::{debug, info};

use crate::balancing_error::BalancingError;
use crate::compiled::CompiledBalancing;
use crate::jacobian::{self, DifferentiableConstraint, LinearApproximation, QuadraticApproximation};
use crate::kinematic_traits::{EndEffectorKinematics, RobotDimensions};
use crate::scalar::Scalar;
use crate::settings::BalancingSettings;

/// Residuals that keep every object on the end effector balanced, worst case over the
/// bounds of the object parameters. Every entry must be non-negative.
///
/// Construction validates the settings and compiles the constraint structure once.
/// Cloning is cheap: the clone gets its own copy of the kinematics and settings and
/// shares the compiled structure. Only [`BoundedBalancingConstraints::recompile`]
/// rebuilds it.
#[derive(Debug, Clone)]
pub struct BoundedBalancingConstraints<K: EndEffectorKinematics> {
    kinematics: K,
    settings: BalancingSettings,
    gravity: Vector3<f64>,
    dims: RobotDimensions,
    compiled: Arc<CompiledBalancing>,
}

impl<K: EndEffectorKinematics> BoundedBalancingConstraints<K> {
    /// Validates the settings and compiles the constraints.
    pub fn new(kinematics: K, settings: BalancingSettings, gravity: Vector3<f64>) -> Result<Self, BalancingError> {
        let compiled = Arc::new(CompiledBalancing::build(&settings, &gravity)?);
        let dims = kinematics.dimensions();
        info!("Balancing constraints: {} residuals, {} mode, state {} input {}",
              compiled.num_constraints(), settings.constraint_type, dims.x(), dims.u());
        Ok(BoundedBalancingConstraints {
            kinematics,
            settings,
            gravity,
            dims,
            compiled,
        })
    }

    /// Evaluator over an existing build, which is reused as is: settings and gravity
    /// are taken from it and nothing is recompiled.
    pub fn from_compiled(kinematics: K, compiled: Arc<CompiledBalancing>) -> Self {
        let dims = kinematics.dimensions();
        debug!("Reusing balancing build {}: {} residuals, state {} input {}",
               compiled.build_id(), compiled.num_constraints(), dims.x(), dims.u());
        BoundedBalancingConstraints {
            settings: compiled.settings().clone(),
            gravity: compiled.gravity(),
            kinematics,
            dims,
            compiled,
        }
    }

    /// Evaluator for the given settings. With `recompile` the structure is always built
    /// anew; without it, `cached` is reused when it was built from the same settings
    /// and gravity.
    pub fn with_cache(kinematics: K, settings: BalancingSettings, gravity: Vector3<f64>,
                      cached: Option<&Arc<CompiledBalancing>>, recompile: bool) -> Result<Self, BalancingError> {
        match cached {
            Some(compiled) if !recompile && compiled.settings() == &settings && compiled.gravity() == gravity =>
                Ok(Self::from_compiled(kinematics, Arc::clone(compiled))),
            _ => Self::new(kinematics, settings, gravity),
        }
    }

    /// Rebuilds the compiled structure. This evaluator gets its own copy; clones made
    /// earlier keep the previous one.
    pub fn recompile(&mut self) -> Result<(), BalancingError> {
        self.compiled = Arc::new(CompiledBalancing::build(&self.settings, &self.gravity)?);
        Ok(())
    }

    pub fn compiled(&self) -> &Arc<CompiledBalancing> {
        &self.compiled
    }

    pub fn settings(&self) -> &BalancingSettings {
        &self.settings
    }

    pub fn kinematics(&self) -> &K {
        &self.kinematics
    }

    pub fn dimensions(&self) -> RobotDimensions {
        self.dims
    }

    pub fn gravity(&self) -> Vector3<f64> {
        self.gravity
    }

    pub fn num_constraints(&self) -> usize {
        self.compiled.num_constraints()
    }

    /// Same as [`Self::num_constraints`]; the count does not depend on time.
    pub fn num_constraints_at(&self, _time: f64) -> usize {
        self.num_constraints()
    }

    /// The constraints take no runtime parameters; always empty.
    pub fn parameters(&self, _time: f64) -> DVector<f64> {
        DVector::zeros(0)
    }

    /// Residuals over any scalar type. Arguments must already have the right sizes.
    pub fn constraint_function<T: Scalar>(&self, _time: f64, state: &[T], input: &[T], _parameters: &[f64]) -> Vec<T> {
        let motion = self.kinematics.motion(state, input);
        self.compiled.evaluate(&motion)
    }

    /// Residual values.
    pub fn value(&self, time: f64, state: &DVector<f64>, input: &DVector<f64>) -> Result<DVector<f64>, BalancingError> {
        self.check_dimensions(state, input)?;
        let parameters = self.parameters(time);
        Ok(DVector::from_vec(self.constraint_function(time, state.as_slice(), input.as_slice(),
                                                      parameters.as_slice())))
    }

    /// Residual values and their Jacobians with respect to state and input.
    pub fn linear_approximation(&self, _time: f64, state: &DVector<f64>, input: &DVector<f64>)
                                -> Result<LinearApproximation, BalancingError> {
        self.check_dimensions(state, input)?;
        Ok(jacobian::linear_approximation(self, state.as_slice(), input.as_slice()))
    }

    /// Residual values, Jacobians and one Hessian per residual.
    pub fn quadratic_approximation(&self, _time: f64, state: &DVector<f64>, input: &DVector<f64>)
                                   -> Result<QuadraticApproximation, BalancingError> {
        self.check_dimensions(state, input)?;
        Ok(jacobian::quadratic_approximation(self, state.as_slice(), input.as_slice()))
    }

    fn check_dimensions(&self, state: &DVector<f64>, input: &DVector<f64>) -> Result<(), BalancingError> {
        if state.len() != self.dims.x() {
            return Err(BalancingError::DimensionMismatch {
                what: "state",
                expected: self.dims.x(),
                found: state.len(),
            });
        }
        if input.len() != self.dims.u() {
            return Err(BalancingError::DimensionMismatch {
                what: "input",
                expected: self.dims.u(),
                found: input.len(),
            });
        }
        Ok(())
    }
}

impl<K: EndEffectorKinematics> DifferentiableConstraint for BoundedBalancingConstraints<K> {
    fn evaluate<T: Scalar>(&self, state: &[T], input: &[T]) -> Vec<T> {
        self.constraint_function(0.0, state, input, &[])
    }
}
