//! Packing of A and B blocks into tile-sized panels.
//!
//! A packed A block holds `ceil(mc / mr)` panels. Panel `ir` stores rows
//! `ir * mr .. ir * mr + mr` of the block one column at a time, so the tile
//! kernel reads `a[p * mr + i]`. A packed B block holds `ceil(nc / nr)`
//! panels, each storing `nr` columns one row at a time (`b[p * nr + j]`).
//! Rows and columns past the edge of the block are zero, so the kernel always
//! computes a full tile.

use std::cmp::min;

use crate::error::Result;
use crate::matrix::MatRef;
use crate::precision::Scalar;
use crate::utils::{alignment_for, AlignedVec};

/// A packed block of equally sized panels in aligned scratch storage.
///
/// The block owns its storage, so packing scratch is released when the block
/// goes out of scope.
pub struct PackedBlock<T> {
    data: AlignedVec<T>,
    panel_len: usize,
}

impl<T: Scalar> PackedBlock<T> {
    fn empty() -> Result<Self> {
        Ok(PackedBlock {
            data: AlignedVec::filled(0, alignment_for::<T>(), T::zero())?,
            panel_len: 1,
        })
    }
}

impl<T> PackedBlock<T> {
    /// Number of elements per panel.
    pub fn panel_len(&self) -> usize {
        self.panel_len
    }

    pub fn panel_count(&self) -> usize {
        self.data.len() / self.panel_len
    }

    pub fn panels(&self) -> std::slice::ChunksExact<'_, T> {
        self.data.chunks_exact(self.panel_len)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

/// Packs `A(ic .. ic + mc, pc .. pc + kc)` into `mr`-row panels.
pub fn pack_a<T: Scalar>(
    a: MatRef<'_, T>,
    ic: usize,
    pc: usize,
    mc: usize,
    kc: usize,
    mr: usize,
) -> Result<PackedBlock<T>> {
    let panel_len = kc * mr;
    if panel_len == 0 || mc == 0 {
        return PackedBlock::empty();
    }
    let panels = mc.div_ceil(mr);
    let mut data = AlignedVec::filled(panels * panel_len, alignment_for::<T>(), T::zero())?;

    for (ir, dest) in data.chunks_exact_mut(panel_len).enumerate() {
        let row0 = ir * mr;
        let rows = min(mr, mc - row0);
        for (p, dest_col) in dest.chunks_exact_mut(mr).enumerate() {
            for (i, slot) in dest_col[..rows].iter_mut().enumerate() {
                *slot = a.at(ic + row0 + i, pc + p).clone();
            }
        }
    }

    Ok(PackedBlock { data, panel_len })
}

/// Packs `B(pc .. pc + kc, jc .. jc + nc)` into `nr`-column panels.
pub fn pack_b<T: Scalar>(
    b: MatRef<'_, T>,
    pc: usize,
    jc: usize,
    kc: usize,
    nc: usize,
    nr: usize,
) -> Result<PackedBlock<T>> {
    let panel_len = kc * nr;
    if panel_len == 0 || nc == 0 {
        return PackedBlock::empty();
    }
    let panels = nc.div_ceil(nr);
    let mut data = AlignedVec::filled(panels * panel_len, alignment_for::<T>(), T::zero())?;

    for (jr, dest) in data.chunks_exact_mut(panel_len).enumerate() {
        let col0 = jr * nr;
        let cols = min(nr, nc - col0);
        for (p, dest_row) in dest.chunks_exact_mut(nr).enumerate() {
            for (j, slot) in dest_row[..cols].iter_mut().enumerate() {
                *slot = b.at(pc + p, jc + col0 + j).clone();
            }
        }
    }

    Ok(PackedBlock { data, panel_len })
}
