//! Contact between a supporting body (end effector or object) and a supported object.

use std::fmt;

use nalgebra::Vector3;

/// Body on the supporting side of a contact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContactBody {
    EndEffector,
    Object(String),
}

impl ContactBody {
    pub fn object_name(&self) -> Option<&str> {
        match self {
            ContactBody::EndEffector => None,
            ContactBody::Object(name) => Some(name),
        }
    }
}

impl fmt::Display for ContactBody {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ContactBody::EndEffector => write!(f, "end_effector"),
            ContactBody::Object(name) => write!(f, "{}", name),
        }
    }
}

/// Planar contact through which `supporting` carries `supported`.
///
/// Normal and position are expressed in the end-effector frame. The normal points out of
/// the supporting body into the supported one.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactPoint {
    pub supporting: ContactBody,
    pub supported: String,

    /// Coulomb friction coefficient
    pub mu: f64,

    pub normal: Vector3<f64>,
    pub position: Vector3<f64>,
}

impl ContactPoint {
    pub fn new(supporting: ContactBody, supported: &str, mu: f64,
               normal: Vector3<f64>, position: Vector3<f64>) -> Self {
        ContactPoint {
            supporting,
            supported: supported.to_string(),
            mu,
            normal,
            position,
        }
    }

    /// Object resting flat on the end effector (normal along +z) at the given position.
    pub fn on_end_effector(supported: &str, mu: f64, position: Vector3<f64>) -> Self {
        ContactPoint::new(ContactBody::EndEffector, supported, mu, Vector3::z(), position)
    }

    pub fn has_valid_normal(&self) -> bool {
        let norm = self.normal.norm();
        norm.is_finite() && norm > 0.0
    }

    pub fn unit_normal(&self) -> Vector3<f64> {
        self.normal.normalize()
    }

    /// Orthonormal tangent directions `(t1, t2)` of the contact plane with
    /// `t1 × t2 = n`. Deterministic: `t1` is the end-effector x axis projected into the
    /// plane (y axis if the normal is nearly parallel to x).
    pub fn tangent_basis(&self) -> (Vector3<f64>, Vector3<f64>) {
        let n = self.unit_normal();
        let axis = if n.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
        let t1 = (axis - n * axis.dot(&n)).normalize();
        let t2 = n.cross(&t1);
        (t1, t2)
    }
}
