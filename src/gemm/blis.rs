//! Cache-blocked GEMM in the Goto/BLIS loop order.
//!
//! ```text
//! jc: nc-column blocks of B and C     (L3)
//!  pc: kc-deep blocks of A and B      (B packed here, once)
//!   ic: mc-row slabs of C             (one task per slab, A packed here)
//!    jr: nr-column panels of packed B
//!     ir: mr-row panels of packed A   (one tile kernel call each)
//! ```
//!
//! Every slab task reads the same packed B block and owns a disjoint range
//! of C rows, so slabs run concurrently without synchronisation. Each tile
//! is computed in a zeroed accumulator and only its valid corner is added
//! to C, which handles remainder tiles.

use std::cmp::min;
use std::mem;

use crate::error::Result;
use crate::gemm::panels::{pack_a, pack_b, PackedBlock};
use crate::matrix::MatRef;
use crate::precision::Scalar;
use crate::scheduler::Scheduler;
use crate::simd::TileKernel;
use crate::utils::{alignment_for, vector_lanes, AlignedVec};
use crate::{KC, MC, MR, NC};

const L1_CACHE: usize = 32 * 1024;
const L2_CACHE: usize = 256 * 1024;
const L3_CACHE: usize = 8 * 1024 * 1024;

/// Tile shape and cache block sizes for one GEMM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSizes {
    pub mr: usize,
    pub nr: usize,
    pub kc: usize,
    pub mc: usize,
    pub nc: usize,
}

impl BlockSizes {
    /// Explicit sizes; zeros are raised to one.
    pub fn new(mr: usize, nr: usize, kc: usize, mc: usize, nc: usize) -> Self {
        BlockSizes {
            mr: mr.max(1),
            nr: nr.max(1),
            kc: kc.max(1),
            mc: mc.max(1),
            nc: nc.max(1),
        }
    }

    /// Analytical sizes for an `mr × nr` tile of `elem_size`-byte scalars:
    /// an A and a B panel share L1, an `mc × kc` A block fits in L2 next to
    /// one B panel, and a `kc × nc` B block fits in L3.
    pub fn analytical(mr: usize, nr: usize, elem_size: usize) -> Self {
        let mr = mr.max(1);
        let nr = nr.max(1);
        let elem_size = elem_size.max(1);

        let kc = ((L1_CACHE / elem_size) / (mr + nr)).clamp(1, KC);

        let mc_raw = (L2_CACHE / elem_size).saturating_sub(kc * nr) / kc;
        let mc = ((mc_raw / mr) * mr).clamp(mr, MC.max(mr));

        let nc_raw = (L3_CACHE / elem_size) / kc;
        let nc = ((nc_raw / nr) * nr).clamp(nr, NC.max(nr));

        BlockSizes { mr, nr, kc, mc, nc }
    }

    /// Sizes for `T` on this host, matched to the best available kernel.
    pub fn for_scalar<T: Scalar>() -> Self {
        let (mr, nr) = match T::tile_kernel() {
            Some(kernel) => (kernel.mr, kernel.nr),
            None => (MR, vector_lanes::<T>()),
        };
        Self::analytical(mr, nr, mem::size_of::<T>())
    }
}

/// `C += A · B` for row-major, contiguous `c` of `a.rows() × b.cols()`.
///
/// Dimensions are not validated here; callers go through
/// [`matmul_into`](crate::gemm::matmul_into).
pub fn gemm_blocked<T: Scalar>(
    scheduler: &Scheduler,
    sizes: &BlockSizes,
    a: MatRef<'_, T>,
    b: MatRef<'_, T>,
    c: &mut [T],
) -> Result<()> {
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    if m == 0 || n == 0 || k == 0 {
        return Ok(());
    }
    debug_assert_eq!(b.rows(), k);

    let kernel = TileKernel::<T>::select(sizes.mr, sizes.nr);
    log::trace!("gemm {m}x{k}x{n} with {kernel:?}, {sizes:?}");
    let BlockSizes { kc, mc, nc, .. } = *sizes;

    for jc in (0..n).step_by(nc) {
        let nc_eff = min(nc, n - jc);

        for pc in (0..k).step_by(kc) {
            let kc_eff = min(kc, k - pc);
            let b_block = pack_b(b, pc, jc, kc_eff, nc_eff, sizes.nr)?;

            scheduler.parallel_chunks_mut(&mut c[..m * n], mc * n, |slab, c_slab| {
                let step = BlockStep {
                    ic: slab * mc,
                    jc,
                    pc,
                    kc: kc_eff,
                    nc: nc_eff,
                    n,
                };
                multiply_slab(&kernel, sizes, a, &b_block, step, c_slab)
            })?;
        }
    }
    Ok(())
}

/// Position of one slab task inside the outer loops.
#[derive(Debug, Clone, Copy)]
struct BlockStep {
    ic: usize,
    jc: usize,
    pc: usize,
    kc: usize,
    nc: usize,
    /// Columns of the whole C.
    n: usize,
}

/// Adds the contribution of one packed B block to the C rows
/// `ic .. ic + c_slab.len() / n`.
fn multiply_slab<T: Scalar>(
    kernel: &TileKernel<T>,
    sizes: &BlockSizes,
    a: MatRef<'_, T>,
    b_block: &PackedBlock<T>,
    step: BlockStep,
    c_slab: &mut [T],
) -> Result<()> {
    let n = step.n;
    let mc = c_slab.len() / n;
    let BlockSizes { mr, nr, .. } = *sizes;

    let a_block = pack_a(a, step.ic, step.pc, mc, step.kc, mr)?;
    let mut acc = AlignedVec::filled(mr * nr, alignment_for::<T>(), T::zero())?;

    for (jr, b_panel) in b_block.panels().enumerate() {
        let col0 = step.jc + jr * nr;
        let nr_eff = min(nr, step.nc - jr * nr);

        for (ir, a_panel) in a_block.panels().enumerate() {
            let row0 = ir * mr;
            let mr_eff = min(mr, mc - row0);

            acc.fill(T::zero());
            kernel.run(step.kc, a_panel, b_panel, &mut acc);

            for (i, acc_row) in acc.chunks_exact(nr).take(mr_eff).enumerate() {
                let start = (row0 + i) * n + col0;
                let c_row = &mut c_slab[start..start + nr_eff];
                for (c_ij, value) in c_row.iter_mut().zip(acc_row) {
                    *c_ij += value.clone();
                }
            }
        }
    }
    Ok(())
}
