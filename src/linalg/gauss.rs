//! Gaussian elimination with partial pivoting.

use std::cmp::Ordering;

use crate::dispatch::Algorithm;
use crate::error::{parameter_error, Result};
use crate::linalg::{check_square, pivot_threshold, to_f64_vec, DenseSystemArgs};
use crate::matrix::Matrix;
use crate::precision::Scalar;
use crate::scheduler::Scheduler;

/// Dense direct solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gauss;

impl Algorithm for Gauss {
    type Args = DenseSystemArgs;
    type Output = Vec<f64>;

    fn name(&self) -> &'static str {
        "gauss"
    }

    fn perform<T: Scalar>(&self, args: &DenseSystemArgs, scheduler: &Scheduler) -> Result<Vec<f64>> {
        let (a, b) = args.cast::<T>()?;
        let x = solve(scheduler, &a, &b)?;
        Ok(to_f64_vec(&x))
    }
}

/// Solves `A x = b`.
///
/// Rows below each pivot are eliminated in parallel. A near-zero pivot is
/// logged and elimination continues.
///
/// # Errors
///
/// [`ParameterError`](crate::KernelError::ParameterError) if the shapes do
/// not match or A is singular.
pub fn solve<T: Scalar>(scheduler: &Scheduler, a: &Matrix<T>, b: &[T]) -> Result<Vec<T>> {
    let n = check_square(a, b)?;
    let width = n + 1;

    // Augmented matrix [A | b], row-major.
    let mut aug: Vec<T> = Vec::with_capacity(n * width);
    for (i, b_i) in b.iter().enumerate() {
        aug.extend((0..n).map(|j| a[(i, j)].clone()));
        aug.push(b_i.clone());
    }

    let scale = aug.iter().map(|v| v.abs().to_f64()).fold(0.0, f64::max);
    let threshold = pivot_threshold::<T>(scale, n);

    for p in 0..n {
        let pivot_row = (p..n)
            .max_by(|&r, &s| {
                let lhs = aug[r * width + p].abs();
                let rhs = aug[s * width + p].abs();
                lhs.partial_cmp(&rhs).unwrap_or(Ordering::Equal)
            })
            .unwrap_or(p);
        if pivot_row != p {
            for j in 0..width {
                aug.swap(p * width + j, pivot_row * width + j);
            }
        }

        let pivot = aug[p * width + p].clone();
        if pivot.is_zero() {
            return Err(parameter_error(format!(
                "matrix is singular: no non-zero pivot in column {p}"
            )));
        }
        let magnitude = pivot.abs().to_f64();
        if magnitude <= threshold {
            log::warn!("gauss: near-singular pivot {magnitude:e} in column {p}");
        }

        let (upper, lower) = aug.split_at_mut((p + 1) * width);
        let pivot_eqn = &upper[p * width..];
        scheduler.parallel_chunks_mut(lower, width, |_, row| {
            let factor = row[p].clone() / pivot.clone();
            if !factor.is_zero() {
                for (x, y) in row[p..].iter_mut().zip(&pivot_eqn[p..]) {
                    *x -= factor.clone() * y.clone();
                }
            }
            Ok(())
        })?;
    }

    let mut x = vec![T::zero(); n];
    for i in (0..n).rev() {
        let row = &aug[i * width..(i + 1) * width];
        let mut sum = row[n].clone();
        for j in i + 1..n {
            sum -= row[j].clone() * x[j].clone();
        }
        x[i] = sum / row[i].clone();
    }
    Ok(x)
}
