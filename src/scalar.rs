//! Differentiable scalar abstraction.
//!
//! Every balancing residual is written once, generically over [`Scalar`], and evaluated
//! either with plain `f64` (values only) or with [`crate::dual::Dual`] (values together
//! with derivatives). Implementations must never branch on the value of the scalar:
//! case splits are expressed through smooth functions such as [`smooth_norm`] and
//! [`smooth_min`].

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use nalgebra::Vector3;
use num_traits::{One, Zero};

/// Scalar type the constraint function is generic over.
pub trait Scalar:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Zero
    + One
{
    /// Constant (derivative-free) scalar
    fn from_f64(value: f64) -> Self;

    /// Plain value, dropping any derivative information
    fn value(&self) -> f64;

    fn sqrt(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
}

impl Scalar for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }

    #[inline]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    #[inline]
    fn exp(self) -> Self {
        f64::exp(self)
    }

    #[inline]
    fn ln(self) -> Self {
        f64::ln(self)
    }

    #[inline]
    fn sin(self) -> Self {
        f64::sin(self)
    }

    #[inline]
    fn cos(self) -> Self {
        f64::cos(self)
    }
}

/// Lifts a constant vector into the scalar type.
#[inline]
pub fn lift<T: Scalar>(v: &Vector3<f64>) -> Vector3<T> {
    v.map(T::from_f64)
}

/// `sqrt(|v|² + margin²)`: a norm that stays differentiable at `v = 0`.
#[inline]
pub fn smooth_norm<T: Scalar>(v: &Vector3<T>, margin: f64) -> T {
    (v.dot(v) + T::from_f64(margin * margin)).sqrt()
}

/// Soft minimum of the given values with the given temperature:
/// `m - t * ln(sum(exp(-(v_i - m) / t)))`.
///
/// The shift `m` is the smallest plain value. It only keeps the exponentials in range;
/// the result and its derivatives do not depend on it. The result never exceeds the
/// true minimum and undershoots it by at most `t * ln(n)`. A single value is returned
/// unchanged.
pub fn smooth_min<T: Scalar>(values: &[T], temperature: f64) -> T {
    if values.len() == 1 {
        return values[0];
    }
    let shift = values
        .iter()
        .map(|v| v.value())
        .fold(f64::INFINITY, f64::min);
    let shift_t = T::from_f64(shift);
    let inv_temperature = T::from_f64(1.0 / temperature);
    let sum = values.iter().fold(T::zero(), |acc, v| {
        acc + (-(*v - shift_t) * inv_temperature).exp()
    });
    shift_t - T::from_f64(temperature) * sum.ln()
}
