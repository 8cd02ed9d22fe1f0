//! Linear system solvers built on the same dispatch and scheduling layers
//! as GEMM.
//!
//! Numerical trouble that still leaves an answer (near-zero pivots, lack of
//! diagonal dominance) is reported with `log::warn!`. Only systems that
//! cannot be solved at all are errors.

pub mod gauss;
pub mod jacobi;
pub mod thomas;

pub use gauss::Gauss;
pub use jacobi::{Jacobi, JacobiArgs};
pub use thomas::{Thomas, TridiagonalArgs};

use crate::error::{parameter_error, Result};
use crate::matrix::Matrix;
use crate::precision::Scalar;

/// A dense square system `A x = b`.
#[derive(Debug, Clone)]
pub struct DenseSystemArgs {
    pub matrix: Matrix<f64>,
    pub rhs: Vec<f64>,
}

impl DenseSystemArgs {
    pub fn new(matrix: Matrix<f64>, rhs: Vec<f64>) -> Self {
        DenseSystemArgs { matrix, rhs }
    }

    /// The system converted to `T`.
    pub(crate) fn cast<T: Scalar>(&self) -> Result<(Matrix<T>, Vec<T>)> {
        Ok((self.matrix.cast::<T>()?, cast_vec(&self.rhs)))
    }
}

pub(crate) fn cast_vec<T: Scalar>(values: &[f64]) -> Vec<T> {
    values.iter().map(|&v| T::from_f64(v)).collect()
}

pub(crate) fn to_f64_vec<T: Scalar>(values: &[T]) -> Vec<f64> {
    values.iter().map(T::to_f64).collect()
}

/// Checks that `a` is square and `b` matches it.
pub(crate) fn check_square<T>(a: &Matrix<T>, b: &[T]) -> Result<usize> {
    if !a.is_square() {
        return Err(parameter_error(format!(
            "system matrix must be square, got {}x{}",
            a.rows(),
            a.cols()
        )));
    }
    if b.len() != a.rows() {
        return Err(parameter_error(format!(
            "right-hand side has {} entries, system has {} rows",
            b.len(),
            a.rows()
        )));
    }
    Ok(a.rows())
}

/// Whether `|a_ii| > sum of |a_ij|, j != i` holds for every row.
pub(crate) fn strictly_diagonally_dominant<T: Scalar>(a: &Matrix<T>) -> bool {
    (0..a.rows()).all(|i| {
        let mut off = T::zero();
        for j in (0..a.cols()).filter(|&j| j != i) {
            off += a[(i, j)].abs();
        }
        a[(i, i)].abs() > off
    })
}

/// Pivots at or below this magnitude are treated as numerically zero.
///
/// Zero for exact representations, so only true zeros are flagged.
pub(crate) fn pivot_threshold<T: Scalar>(scale: f64, n: usize) -> f64 {
    T::epsilon().to_f64() * scale * n.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::StorageOrder;

    #[test]
    fn test_check_square() {
        let a = Matrix::<f64>::zeros(2, 3, StorageOrder::RowMajor).unwrap();
        assert!(check_square(&a, &[0.0, 0.0]).is_err());
        let a = Matrix::<f64>::zeros(2, 2, StorageOrder::RowMajor).unwrap();
        assert!(check_square(&a, &[0.0]).is_err());
        assert_eq!(check_square(&a, &[0.0, 0.0]).unwrap(), 2);
    }

    #[test]
    fn test_diagonal_dominance() {
        let dominant =
            Matrix::from_slice(2, 2, StorageOrder::RowMajor, &[3.0, -1.0, 1.0, 2.5]).unwrap();
        assert!(strictly_diagonally_dominant(&dominant));
        let weak = Matrix::from_slice(2, 2, StorageOrder::RowMajor, &[1.0, 1.0, 1.0, 2.0]).unwrap();
        assert!(!strictly_diagonally_dominant(&weak));
    }

    #[test]
    fn test_pivot_threshold() {
        assert_eq!(pivot_threshold::<f64>(2.0, 3), f64::EPSILON * 6.0);
        assert!(pivot_threshold::<f32>(1.0, 1) > pivot_threshold::<f64>(1.0, 1));
    }
}
