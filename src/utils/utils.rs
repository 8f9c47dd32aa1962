//! Helper functions

use nalgebra::{DMatrix, DVector, Vector3};

/// Checks if all elements are finite
pub fn is_valid(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// formatting for YAML output
pub(crate) fn fmt_vector3(v: &Vector3<f64>) -> String {
    format!("[{}, {}, {}]", v.x, v.y, v.z)
}

/// Print residuals, one per line, marking violated ones.
pub fn dump_residuals(residuals: &DVector<f64>) {
    if residuals.is_empty() {
        println!("No constraints");
    }
    for (i, r) in residuals.iter().enumerate() {
        let mark = if *r < 0.0 { "  VIOLATED" } else { "" };
        println!("{:3}: {:10.5}{}", i, r, mark);
    }
}

/// Print a matrix row by row
pub fn dump_matrix(name: &str, m: &DMatrix<f64>) {
    println!("{} ({} x {}):", name, m.nrows(), m.ncols());
    for row in m.row_iter() {
        let mut row_str = String::new();
        for value in row.iter() {
            row_str.push_str(&format!("{:9.4} ", value));
        }
        println!("[{}]", row_str.trim_end());
    }
}

/// Largest absolute difference between two matrices of the same shape,
/// infinity if the shapes differ.
pub fn max_abs_difference(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    if a.shape() != b.shape() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .fold(0.0, |acc, (x, y)| acc.max((x - y).abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_with_all_finite() {
        assert!(is_valid(&[0.0, 1.0, -1.0, 0.5]));
    }

    #[test]
    fn test_is_valid_with_nan() {
        assert!(!is_valid(&[0.0, f64::NAN, 1.0]));
    }

    #[test]
    fn test_is_valid_with_infinity() {
        assert!(!is_valid(&[0.0, f64::INFINITY]));
    }

    #[test]
    fn test_fmt_vector3() {
        assert_eq!(fmt_vector3(&Vector3::new(0.0, -1.5, 2.0)), "[0, -1.5, 2]");
    }

    #[test]
    fn test_max_abs_difference() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = DMatrix::from_row_slice(2, 2, &[1.0, 2.5, 3.0, 3.0]);
        assert_eq!(max_abs_difference(&a, &b), 1.0);
        assert_eq!(max_abs_difference(&a, &DMatrix::zeros(1, 2)), f64::INFINITY);
    }
}
