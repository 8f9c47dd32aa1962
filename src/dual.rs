//! Forward-mode dual numbers carrying `N` directional derivatives at once.
//!
//! A Jacobian with more than `N` columns is assembled from several passes, each seeding
//! a different chunk of input directions (see [`crate::jacobian`]).

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_traits::{One, Zero};

use crate::scalar::Scalar;

/// Number of directions propagated per pass by the Jacobian routines.
pub const CHUNK: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dual<const N: usize> {
    /// Value
    pub re: f64,
    /// Derivatives along the seeded directions
    pub eps: [f64; N],
}

impl<const N: usize> Dual<N> {
    pub fn constant(re: f64) -> Self {
        Dual { re, eps: [0.0; N] }
    }

    /// Independent variable with unit derivative along `direction`.
    /// Directions outside `0..N` produce a constant.
    pub fn variable(re: f64, direction: usize) -> Self {
        let mut eps = [0.0; N];
        if direction < N {
            eps[direction] = 1.0;
        }
        Dual { re, eps }
    }

    /// Applies a scalar function given its value and derivative at `self.re` (chain rule).
    #[inline]
    fn chain(self, value: f64, derivative: f64) -> Self {
        Dual {
            re: value,
            eps: self.eps.map(|e| e * derivative),
        }
    }
}

impl<const N: usize> Add for Dual<N> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Dual {
            re: self.re + rhs.re,
            eps: std::array::from_fn(|i| self.eps[i] + rhs.eps[i]),
        }
    }
}

impl<const N: usize> Sub for Dual<N> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Dual {
            re: self.re - rhs.re,
            eps: std::array::from_fn(|i| self.eps[i] - rhs.eps[i]),
        }
    }
}

impl<const N: usize> Mul for Dual<N> {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Dual {
            re: self.re * rhs.re,
            eps: std::array::from_fn(|i| self.eps[i] * rhs.re + self.re * rhs.eps[i]),
        }
    }
}

impl<const N: usize> Div for Dual<N> {
    type Output = Self;

    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.re;
        let re = self.re * inv;
        Dual {
            re,
            eps: std::array::from_fn(|i| (self.eps[i] - re * rhs.eps[i]) * inv),
        }
    }
}

impl<const N: usize> Neg for Dual<N> {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Dual {
            re: -self.re,
            eps: self.eps.map(|e| -e),
        }
    }
}

impl<const N: usize> AddAssign for Dual<N> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const N: usize> SubAssign for Dual<N> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<const N: usize> MulAssign for Dual<N> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<const N: usize> DivAssign for Dual<N> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl<const N: usize> Zero for Dual<N> {
    fn zero() -> Self {
        Dual::constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.re == 0.0 && self.eps.iter().all(|e| *e == 0.0)
    }
}

impl<const N: usize> One for Dual<N> {
    fn one() -> Self {
        Dual::constant(1.0)
    }
}

impl<const N: usize> Scalar for Dual<N> {
    #[inline]
    fn from_f64(value: f64) -> Self {
        Dual::constant(value)
    }

    #[inline]
    fn value(&self) -> f64 {
        self.re
    }

    #[inline]
    fn sqrt(self) -> Self {
        let s = self.re.sqrt();
        self.chain(s, 0.5 / s)
    }

    #[inline]
    fn exp(self) -> Self {
        let e = self.re.exp();
        self.chain(e, e)
    }

    #[inline]
    fn ln(self) -> Self {
        self.chain(self.re.ln(), 1.0 / self.re)
    }

    #[inline]
    fn sin(self) -> Self {
        self.chain(self.re.sin(), self.re.cos())
    }

    #[inline]
    fn cos(self) -> Self {
        self.chain(self.re.cos(), -self.re.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    type D2 = Dual<2>;

    #[test]
    fn test_product_and_quotient_rules() {
        let x = D2::variable(3.0, 0);
        let y = D2::variable(2.0, 1);

        let p = x * y;
        assert_eq!(p.re, 6.0);
        assert_eq!(p.eps, [2.0, 3.0]);

        let q = x / y;
        assert_eq!(q.re, 1.5);
        assert!((q.eps[0] - 0.5).abs() < 1e-15);
        assert!((q.eps[1] + 0.75).abs() < 1e-15);
    }

    #[test]
    fn test_elementary_functions() {
        let x = D2::variable(0.7, 0);
        let checks = [
            (x.sqrt(), 0.7f64.sqrt(), 0.5 / 0.7f64.sqrt()),
            (x.exp(), 0.7f64.exp(), 0.7f64.exp()),
            (x.ln(), 0.7f64.ln(), 1.0 / 0.7),
            (x.sin(), 0.7f64.sin(), 0.7f64.cos()),
            (x.cos(), 0.7f64.cos(), -0.7f64.sin()),
        ];
        for (d, value, derivative) in checks {
            assert!((d.re - value).abs() < 1e-14);
            assert!((d.eps[0] - derivative).abs() < 1e-14);
            assert_eq!(d.eps[1], 0.0);
        }
    }

    #[test]
    fn test_works_inside_nalgebra_vectors() {
        let x = D2::variable(1.0, 0);
        let y = D2::variable(2.0, 1);
        let a = Vector3::new(x, y, D2::constant(0.0));
        let b = Vector3::new(D2::constant(0.0), x, y);

        // a · b = x*y + y*0 ... = x * y
        let dot = a.dot(&b);
        assert_eq!(dot.re, 2.0);
        assert_eq!(dot.eps, [2.0, 1.0]);

        // z component of a × b is x * x
        let cross = a.cross(&b);
        assert_eq!(cross.z.re, 1.0);
        assert_eq!(cross.z.eps, [2.0, 0.0]);
    }

    #[test]
    fn test_out_of_range_direction_is_constant() {
        let c = D2::variable(5.0, 7);
        assert!(c.eps.iter().all(|e| *e == 0.0));
    }
}
