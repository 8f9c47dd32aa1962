//! Robust balancing constraints for objects carried on a robot end effector.
//!
//! A robot moving a tray, a glass or a stack of boxes on its end effector must not drop
//! them: every object must keep pressing on its support (no separation), stay inside
//! its friction cone (no slip), and keep its center of pressure inside its footprint
//! (no tipping). This crate turns these conditions into a vector of residuals, each of
//! which must be non-negative, as a function of the robot state and input. A trajectory
//! optimizer can then enforce "do not drop the object" as a constraint (or a penalty
//! cost) rather than as a heuristic.
//!
//! # Features
//!
//! - Mass and center of mass of every object are only known within bounds; every
//!   residual is the worst case over the bound box (vertex enumeration combined with a
//!   smooth minimum so the result stays differentiable).
//! - Objects may rest directly on the end effector or be stacked on each other.
//! - Polygonal footprints (one tipping residual per edge) and discs with an uncertain
//!   radius.
//! - Residuals are written once over a generic scalar. Jacobians come from forward-mode
//!   dual numbers, evaluated in parallel chunks; Hessians from differences of the exact
//!   Jacobian.
//! - The constraint structure is compiled once and shared between clones of the
//!   evaluator.
//! - Soft variant through relaxed barrier or squared hinge penalties, and linear
//!   state/input limits.
//! - Configuration from YAML (feature `allow_filesystem`, on by default).
//!
//! # Example
//!
//! ```
//! use nalgebra::{DVector, Vector3};
//! use upright_balance::balancing_constraints::BoundedBalancingConstraints;
//! use upright_balance::bounded::{BoundedBalancedObject, SupportArea};
//! use upright_balance::contact::ContactPoint;
//! use upright_balance::floating_end_effector::FloatingEndEffector;
//! use upright_balance::kinematic_traits::Drivetrain;
//! use upright_balance::settings::BalancingSettings;
//!
//! let cup = BoundedBalancedObject::new(0.3, Vector3::new(0.0, 0.0, 0.05), SupportArea::circle(0.03))
//!     .with_mass_bounds(0.25, 0.35);
//! let settings = BalancingSettings::single_object(
//!     "cup", cup, ContactPoint::on_end_effector("cup", 0.4, Vector3::zeros()));
//! let constraints = BoundedBalancingConstraints::new(
//!     FloatingEndEffector::new(Drivetrain::DoubleIntegrator), settings, Vector3::new(0.0, 0.0, -9.81))?;
//!
//! let residuals = constraints.value(0.0, &DVector::zeros(12), &DVector::zeros(6))?;
//! assert_eq!(residuals.len(), 3); // normal force, friction, tipping (disc)
//! assert!(residuals.iter().all(|r| *r >= 0.0));
//! # Ok::<(), upright_balance::balancing_error::BalancingError>(())
//! ```

pub mod scalar;
pub mod dual;

pub mod balancing_error;

pub mod bounded;
pub mod contact;
pub mod settings;

#[cfg(feature = "allow_filesystem")]
pub mod settings_from_file;

#[path = "utils/utils.rs"]
pub mod utils;
pub mod kinematic_traits;
pub mod floating_end_effector;

pub mod compiled;
pub mod balancing_constraints;

pub mod jacobian;

pub mod penalty;
pub mod joint_limits;

#[cfg(test)]
mod tests;
