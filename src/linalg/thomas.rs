//! Thomas algorithm for tridiagonal systems.
//!
//! Row `i` of the system reads
//! `lower[i - 1] * x[i - 1] + diag[i] * x[i] + upper[i] * x[i + 1] = rhs[i]`.
//! The factorisation is computed once; several right-hand sides stored one
//! after another in `rhs` are then solved in parallel.

use crate::dispatch::Algorithm;
use crate::error::{parameter_error, Result};
use crate::linalg::{cast_vec, to_f64_vec};
use crate::precision::Scalar;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, Default)]
pub struct Thomas;

/// A tridiagonal system with one or more right-hand sides.
#[derive(Debug, Clone)]
pub struct TridiagonalArgs {
    /// Sub-diagonal, `n - 1` entries.
    pub lower: Vec<f64>,
    /// Main diagonal, `n` entries.
    pub diag: Vec<f64>,
    /// Super-diagonal, `n - 1` entries.
    pub upper: Vec<f64>,
    /// `n * k` entries for `k` right-hand sides.
    pub rhs: Vec<f64>,
}

impl Algorithm for Thomas {
    type Args = TridiagonalArgs;
    type Output = Vec<f64>;

    fn name(&self) -> &'static str {
        "thomas"
    }

    fn perform<T: Scalar>(&self, args: &TridiagonalArgs, scheduler: &Scheduler) -> Result<Vec<f64>> {
        let x = solve::<T>(
            scheduler,
            &cast_vec(&args.lower),
            &cast_vec(&args.diag),
            &cast_vec(&args.upper),
            &cast_vec(&args.rhs),
        )?;
        Ok(to_f64_vec(&x))
    }
}

/// Forward-elimination coefficients shared by every right-hand side.
struct Factorisation<T> {
    /// Modified super-diagonal `c'`.
    upper: Vec<T>,
    /// Pivots `diag[i] - lower[i - 1] * c'[i - 1]`.
    pivots: Vec<T>,
}

fn factorise<T: Scalar>(lower: &[T], diag: &[T], upper: &[T]) -> Result<Factorisation<T>> {
    let n = diag.len();
    let scale = diag
        .iter()
        .chain(lower)
        .chain(upper)
        .map(|v| v.abs().to_f64())
        .fold(0.0, f64::max);
    let threshold = T::epsilon().to_f64() * scale;

    let mut modified: Vec<T> = Vec::with_capacity(n.saturating_sub(1));
    let mut pivots = Vec::with_capacity(n);
    for i in 0..n {
        let pivot = if i == 0 {
            diag[0].clone()
        } else {
            diag[i].clone() - lower[i - 1].clone() * modified[i - 1].clone()
        };
        if pivot.is_zero() {
            return Err(parameter_error(format!(
                "tridiagonal system is singular: zero pivot in row {i}"
            )));
        }
        let magnitude = pivot.abs().to_f64();
        if magnitude <= threshold {
            log::warn!("thomas: near-zero pivot {magnitude:e} in row {i}");
        }
        if i + 1 < n {
            modified.push(upper[i].clone() / pivot.clone());
        }
        pivots.push(pivot);
    }
    Ok(Factorisation {
        upper: modified,
        pivots,
    })
}

fn substitute<T: Scalar>(f: &Factorisation<T>, lower: &[T], x: &mut [T]) {
    let n = x.len();
    x[0] = x[0].clone() / f.pivots[0].clone();
    for i in 1..n {
        let carried = lower[i - 1].clone() * x[i - 1].clone();
        x[i] = (x[i].clone() - carried) / f.pivots[i].clone();
    }
    for i in (0..n - 1).rev() {
        let carried = f.upper[i].clone() * x[i + 1].clone();
        x[i] -= carried;
    }
}

/// Solves the system for every right-hand side in `rhs`.
///
/// # Errors
///
/// [`ParameterError`](crate::KernelError::ParameterError) if the diagonal
/// lengths are inconsistent, `rhs` is not a multiple of `n` long, or a pivot
/// is exactly zero.
pub fn solve<T: Scalar>(
    scheduler: &Scheduler,
    lower: &[T],
    diag: &[T],
    upper: &[T],
    rhs: &[T],
) -> Result<Vec<T>> {
    let n = diag.len();
    if n == 0 {
        if lower.is_empty() && upper.is_empty() && rhs.is_empty() {
            return Ok(Vec::new());
        }
        return Err(parameter_error("empty diagonal with non-empty bands"));
    }
    if lower.len() + 1 != n || upper.len() + 1 != n {
        return Err(parameter_error(format!(
            "band lengths {} and {} do not fit a diagonal of {n}",
            lower.len(),
            upper.len()
        )));
    }
    if rhs.is_empty() || rhs.len() % n != 0 {
        return Err(parameter_error(format!(
            "right-hand side length {} is not a positive multiple of {n}",
            rhs.len()
        )));
    }

    let dominant = (0..n).all(|i| {
        let mut off = T::zero();
        if i > 0 {
            off += lower[i - 1].abs();
        }
        if i + 1 < n {
            off += upper[i].abs();
        }
        diag[i].abs() >= off
    });
    if !dominant {
        log::warn!("thomas: system is not diagonally dominant; the solution may be unstable");
    }

    let factors = factorise(lower, diag, upper)?;
    let mut x = rhs.to_vec();
    scheduler.parallel_chunks_mut(&mut x, n, |_, column| {
        substitute(&factors, lower, column);
        Ok(())
    })?;
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;
    use crate::scheduler::{test_lock, Backend};

    #[test]
    fn test_solves_poisson_system() {
        let _guard = test_lock();
        let scheduler = Scheduler::new(Backend::Serial, 1).unwrap();
        // -x[i-1] + 2 x[i] - x[i+1] with x = [1, 2, 3, 4]
        let lower = [-1.0; 3];
        let diag = [2.0; 4];
        let upper = [-1.0; 3];
        let rhs = [0.0, 0.0, 0.0, 5.0];
        let x: Vec<f64> = solve(&scheduler, &lower, &diag, &upper, &rhs).unwrap();
        for (got, want) in x.iter().zip([1.0f64, 2.0, 3.0, 4.0]) {
            assert!((got - want).abs() < 1e-12, "{got} vs {want}");
        }
    }

    #[test]
    fn test_multiple_right_hand_sides() {
        let _guard = test_lock();
        let scheduler = Scheduler::new(Backend::Threads, 2).unwrap();
        let lower = [1.0; 2];
        let diag = [4.0; 3];
        let upper = [1.0; 2];
        // x = [1, 1, 1] and x = [1, 0, -1]
        let rhs = [5.0, 6.0, 5.0, 4.0, 0.0, -4.0];
        let x: Vec<f64> = solve(&scheduler, &lower, &diag, &upper, &rhs).unwrap();
        for (got, want) in x.iter().zip([1.0f64, 1.0, 1.0, 1.0, 0.0, -1.0]) {
            assert!((got - want).abs() < 1e-12, "{got} vs {want}");
        }
    }

    #[test]
    fn test_single_unknown() {
        let _guard = test_lock();
        let scheduler = Scheduler::new(Backend::Serial, 1).unwrap();
        let x = solve::<f64>(&scheduler, &[], &[4.0], &[], &[2.0]).unwrap();
        assert_eq!(x, vec![0.5]);
    }

    #[test]
    fn test_shape_errors() {
        let _guard = test_lock();
        let scheduler = Scheduler::new(Backend::Serial, 1).unwrap();
        let err = solve::<f64>(&scheduler, &[1.0], &[1.0, 2.0, 3.0], &[1.0, 1.0], &[1.0; 3])
            .unwrap_err();
        assert!(matches!(err, KernelError::ParameterError { .. }));
        let err = solve::<f64>(&scheduler, &[1.0], &[2.0, 2.0], &[1.0], &[1.0; 3]).unwrap_err();
        assert!(matches!(err, KernelError::ParameterError { .. }));
    }

    #[test]
    fn test_zero_pivot_is_error() {
        let _guard = test_lock();
        let scheduler = Scheduler::new(Backend::Serial, 1).unwrap();
        let err = solve::<f64>(&scheduler, &[1.0], &[0.0, 1.0], &[1.0], &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, KernelError::ParameterError { .. }));
    }
}
