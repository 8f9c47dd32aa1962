//! End effector moved directly in task space: the generalized coordinates are its position
//! and roll/pitch/yaw angles, the generalized velocity is the world-frame twist
//! `[v, ω]` and the generalized acceleration the twist derivative `[a, α]`.
//!
//! This is the simplest kinematics that exercises every term of the balancing
//! constraints (orientation, angular velocity and acceleration), and a convenient stand-in
//! for a full manipulator model.

use nalgebra::{Matrix3, Vector3};

use crate::kinematic_traits::{Drivetrain, EndEffectorKinematics, EndEffectorMotion, RobotDimensions};
use crate::scalar::Scalar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatingEndEffector {
    dims: RobotDimensions,
}

impl FloatingEndEffector {
    pub fn new(drivetrain: Drivetrain) -> Self {
        FloatingEndEffector {
            dims: RobotDimensions::new(6, 6, drivetrain),
        }
    }

    /// State with the end effector at `position`, level, at rest.
    pub fn state_at_rest(&self, position: Vector3<f64>) -> Vec<f64> {
        let mut state = vec![0.0; self.dims.x()];
        state[..3].copy_from_slice(position.as_slice());
        state
    }

    /// Writes the linear acceleration into the state or input, depending on the drivetrain.
    pub fn set_linear_acceleration(&self, state: &mut [f64], input: &mut [f64], acceleration: &Vector3<f64>) {
        let target = match self.dims.drivetrain {
            Drivetrain::DoubleIntegrator => &mut input[..3],
            Drivetrain::TripleIntegrator => &mut state[12..15],
        };
        target.copy_from_slice(acceleration.as_slice());
    }
}

/// `C = Rz(yaw) Ry(pitch) Rx(roll)`
pub fn rotation_from_rpy<T: Scalar>(roll: T, pitch: T, yaw: T) -> Matrix3<T> {
    let (sr, cr) = (roll.sin(), roll.cos());
    let (sp, cp) = (pitch.sin(), pitch.cos());
    let (sy, cy) = (yaw.sin(), yaw.cos());

    Matrix3::new(
        cy * cp, cy * sp * sr - sy * cr, cy * sp * cr + sy * sr,
        sy * cp, sy * sp * sr + cy * cr, sy * sp * cr - cy * sr,
        -sp, cp * sr, cp * cr,
    )
}

impl EndEffectorKinematics for FloatingEndEffector {
    fn dimensions(&self) -> RobotDimensions {
        self.dims
    }

    fn motion<T: Scalar>(&self, state: &[T], input: &[T]) -> EndEffectorMotion<T> {
        let q = &state[..6];
        let v = &state[6..12];
        let a = self.dims.acceleration(state, input);

        EndEffectorMotion {
            position: Vector3::new(q[0], q[1], q[2]),
            orientation: rotation_from_rpy(q[3], q[4], q[5]),
            linear_velocity: Vector3::new(v[0], v[1], v[2]),
            angular_velocity: Vector3::new(v[3], v[4], v[5]),
            linear_acceleration: Vector3::new(a[0], a[1], a[2]),
            angular_acceleration: Vector3::new(a[3], a[4], a[5]),
        }
    }
}
