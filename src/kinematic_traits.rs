extern crate nalgebra as na;

use na::{Matrix3, Vector3};

use crate::scalar::Scalar;

/// How the robot input enters the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drivetrain {
    /// State `[q, v]`, input is the acceleration
    DoubleIntegrator,
    /// State `[q, v, a]`, input is the jerk
    TripleIntegrator,
}

/// State and input sizes of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobotDimensions {
    /// Generalized coordinates
    pub q: usize,
    /// Generalized velocities
    pub v: usize,
    pub drivetrain: Drivetrain,
}

impl RobotDimensions {
    pub fn new(q: usize, v: usize, drivetrain: Drivetrain) -> Self {
        RobotDimensions { q, v, drivetrain }
    }

    /// State dimension
    pub fn x(&self) -> usize {
        match self.drivetrain {
            Drivetrain::DoubleIntegrator => self.q + self.v,
            Drivetrain::TripleIntegrator => self.q + 2 * self.v,
        }
    }

    /// Input dimension
    pub fn u(&self) -> usize {
        self.v
    }

    /// Generalized acceleration: taken from the input or from the tail of the state
    /// depending on the drivetrain.
    pub fn acceleration<'a, T>(&self, state: &'a [T], input: &'a [T]) -> &'a [T] {
        match self.drivetrain {
            Drivetrain::DoubleIntegrator => &input[..self.v],
            Drivetrain::TripleIntegrator => &state[self.q + self.v..self.q + 2 * self.v],
        }
    }
}

/// Motion of the end effector at one instant. Vectors are world-frame unless noted.
#[derive(Debug, Clone, PartialEq)]
pub struct EndEffectorMotion<T: Scalar> {
    pub position: Vector3<T>,
    /// Rotation from the end-effector frame to the world frame (`C_we`)
    pub orientation: Matrix3<T>,
    pub linear_velocity: Vector3<T>,
    pub angular_velocity: Vector3<T>,
    /// Acceleration of the end-effector origin
    pub linear_acceleration: Vector3<T>,
    pub angular_acceleration: Vector3<T>,
}

impl<T: Scalar> EndEffectorMotion<T> {
    /// End effector at the origin, aligned with the world and not moving
    pub fn at_rest() -> Self {
        EndEffectorMotion {
            position: Vector3::zeros(),
            orientation: Matrix3::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            linear_acceleration: Vector3::zeros(),
            angular_acceleration: Vector3::zeros(),
        }
    }
}

/// End-effector kinematics as a function of the robot state and input. Implementations
/// must be generic over the scalar so derivatives can be propagated, and must not
/// branch on scalar values.
///
/// Each evaluator (and each of its clones) owns its own copy of the kinematics.
pub trait EndEffectorKinematics: Clone + Send + Sync {
    fn dimensions(&self) -> RobotDimensions;

    fn motion<T: Scalar>(&self, state: &[T], input: &[T]) -> EndEffectorMotion<T>;
}
