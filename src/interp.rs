//! Polynomial interpolation in barycentric Lagrange form.

use crate::dispatch::Algorithm;
use crate::error::{parameter_error, Result};
use crate::linalg::{cast_vec, to_f64_vec};
use crate::precision::Scalar;
use crate::scheduler::Scheduler;

/// Interpolating polynomial through `(nodes[i], values[i])`, evaluated at
/// `points`.
#[derive(Debug, Clone)]
pub struct InterpolationArgs {
    pub nodes: Vec<f64>,
    pub values: Vec<f64>,
    pub points: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Lagrange;

impl Algorithm for Lagrange {
    type Args = InterpolationArgs;
    type Output = Vec<f64>;

    fn name(&self) -> &'static str {
        "lagrange"
    }

    fn perform<T: Scalar>(&self, args: &InterpolationArgs, scheduler: &Scheduler) -> Result<Vec<f64>> {
        let y = interpolate::<T>(
            scheduler,
            &cast_vec(&args.nodes),
            &cast_vec(&args.values),
            &cast_vec(&args.points),
        )?;
        Ok(to_f64_vec(&y))
    }
}

/// Weights `w_j = 1 / prod over k != j of (x_j - x_k)`.
///
/// # Errors
///
/// [`ParameterError`](crate::KernelError::ParameterError) if two nodes
/// coincide.
pub fn barycentric_weights<T: Scalar>(scheduler: &Scheduler, nodes: &[T]) -> Result<Vec<T>> {
    let chunk = scheduler.partition_len(nodes.len());
    let mut weights = vec![T::one(); nodes.len()];
    scheduler.parallel_chunks_mut(&mut weights, chunk, |block, out| {
        for (offset, w) in out.iter_mut().enumerate() {
            let j = block * chunk + offset;
            let mut product = T::one();
            for (k, x_k) in nodes.iter().enumerate().filter(|&(k, _)| k != j) {
                let gap = nodes[j].clone() - x_k.clone();
                if gap.is_zero() {
                    return Err(parameter_error(format!(
                        "interpolation nodes {j} and {k} coincide"
                    )));
                }
                product *= gap;
            }
            *w = T::one() / product;
        }
        Ok(())
    })?;
    Ok(weights)
}

fn evaluate<T: Scalar>(nodes: &[T], values: &[T], weights: &[T], x: &T) -> T {
    let mut numerator = T::zero();
    let mut denominator = T::zero();
    for ((x_j, y_j), w_j) in nodes.iter().zip(values).zip(weights) {
        let gap = x.clone() - x_j.clone();
        if gap.is_zero() {
            return y_j.clone();
        }
        let term = w_j.clone() / gap;
        numerator += term.clone() * y_j.clone();
        denominator += term;
    }
    numerator / denominator
}

/// Evaluates the interpolating polynomial at every point.
///
/// # Errors
///
/// [`ParameterError`](crate::KernelError::ParameterError) if there are no
/// nodes, `nodes` and `values` differ in length, or two nodes coincide.
pub fn interpolate<T: Scalar>(
    scheduler: &Scheduler,
    nodes: &[T],
    values: &[T],
    points: &[T],
) -> Result<Vec<T>> {
    if nodes.is_empty() {
        return Err(parameter_error("interpolation needs at least one node"));
    }
    if nodes.len() != values.len() {
        return Err(parameter_error(format!(
            "{} nodes but {} values",
            nodes.len(),
            values.len()
        )));
    }

    let weights = barycentric_weights(scheduler, nodes)?;
    let chunk = scheduler.partition_len(points.len());
    let mut out = vec![T::zero(); points.len()];
    scheduler.parallel_chunks_mut(&mut out, chunk, |block, ys| {
        for (offset, y) in ys.iter_mut().enumerate() {
            *y = evaluate(nodes, values, &weights, &points[block * chunk + offset]);
        }
        Ok(())
    })?;
    Ok(out)
}
