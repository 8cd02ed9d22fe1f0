//! Jacobi iteration with a Gaussian-elimination fallback.

use crate::dispatch::Algorithm;
use crate::error::Result;
use crate::linalg::{check_square, gauss, strictly_diagonally_dominant, to_f64_vec, DenseSystemArgs};
use crate::matrix::Matrix;
use crate::precision::Scalar;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, Default)]
pub struct Jacobi;

/// A dense system plus the stopping rule.
#[derive(Debug, Clone)]
pub struct JacobiArgs {
    pub system: DenseSystemArgs,
    /// Stop once no unknown moves by more than this between sweeps.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl JacobiArgs {
    pub fn new(system: DenseSystemArgs) -> Self {
        JacobiArgs {
            system,
            tolerance: 1e-10,
            max_iterations: 500,
        }
    }
}

impl Algorithm for Jacobi {
    type Args = JacobiArgs;
    type Output = Vec<f64>;

    fn name(&self) -> &'static str {
        "jacobi"
    }

    fn perform<T: Scalar>(&self, args: &JacobiArgs, scheduler: &Scheduler) -> Result<Vec<f64>> {
        let (a, b) = args.system.cast::<T>()?;
        let x = solve(scheduler, &a, &b, args.tolerance, args.max_iterations)?;
        Ok(to_f64_vec(&x))
    }
}

/// Iterates `x ← D⁻¹ (b − (A − D) x)` from zero.
///
/// Systems that are not strictly diagonally dominant, or that do not settle
/// within `max_iterations` sweeps, are logged and handed to
/// [`gauss::solve`].
pub fn solve<T: Scalar>(
    scheduler: &Scheduler,
    a: &Matrix<T>,
    b: &[T],
    tolerance: f64,
    max_iterations: usize,
) -> Result<Vec<T>> {
    let n = check_square(a, b)?;
    if !strictly_diagonally_dominant(a) {
        log::warn!("jacobi: matrix is not strictly diagonally dominant, using gauss instead");
        return gauss::solve(scheduler, a, b);
    }

    let chunk = scheduler.partition_len(n);
    let mut x = vec![T::zero(); n];
    let mut next = vec![T::zero(); n];

    for sweep in 1..=max_iterations {
        scheduler.parallel_chunks_mut(&mut next, chunk, |block, out| {
            for (offset, x_i) in out.iter_mut().enumerate() {
                let i = block * chunk + offset;
                let mut sum = b[i].clone();
                for (j, x_j) in x.iter().enumerate() {
                    if j != i {
                        sum -= a[(i, j)].clone() * x_j.clone();
                    }
                }
                *x_i = sum / a[(i, i)].clone();
            }
            Ok(())
        })?;

        let change = scheduler.parallel_reduce(
            0..n,
            0.0f64,
            |rows| {
                rows.map(|i| (next[i].clone() - x[i].clone()).abs().to_f64())
                    .fold(0.0, f64::max)
            },
            f64::max,
        );
        std::mem::swap(&mut x, &mut next);

        if change <= tolerance {
            log::debug!("jacobi: converged after {sweep} sweeps (change {change:e})");
            return Ok(x);
        }
    }

    log::warn!("jacobi: no convergence within {max_iterations} sweeps, using gauss instead");
    gauss::solve(scheduler, a, b)
}
