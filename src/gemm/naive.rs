//! Reference triple-loop GEMM, parallel over rows of C.

use crate::error::Result;
use crate::matrix::MatRef;
use crate::precision::Scalar;
use crate::scheduler::Scheduler;

/// `C += A · B` for row-major, contiguous `c` of `a.rows() × b.cols()`.
///
/// Each entry is summed in full before it is added to C.
pub fn gemm_naive<T: Scalar>(
    scheduler: &Scheduler,
    a: MatRef<'_, T>,
    b: MatRef<'_, T>,
    c: &mut [T],
) -> Result<()> {
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    if m == 0 || n == 0 {
        return Ok(());
    }

    scheduler.parallel_chunks_mut(&mut c[..m * n], n, |i, c_row| {
        for (j, c_ij) in c_row.iter_mut().enumerate() {
            let mut sum = T::zero();
            for p in 0..k {
                sum += a.at(i, p).clone() * b.at(p, j).clone();
            }
            *c_ij += sum;
        }
        Ok(())
    })
}
