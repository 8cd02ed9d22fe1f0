//! Register-tile micro-kernels.
//!
//! A tile kernel multiplies one packed `mr × kc` panel of A by one packed
//! `kc × nr` panel of B and accumulates into an `mr × nr` row-major tile:
//!
//! ```text
//! acc[i * nr + j] += sum over p of a[p * mr + i] * b[p * nr + j]
//! ```
//!
//! [`tile_generic`] works for every [`Scalar`]. Hand-vectorised kernels for
//! specific types are selected at run time through [`Scalar::tile_kernel`].

#[cfg(target_arch = "x86_64")]
pub mod avx;

use std::fmt;

use crate::precision::Scalar;

/// Signature shared by every tile kernel: `(mr, nr, kc, a, b, acc)`.
pub type TileFn<T> = fn(usize, usize, usize, &[T], &[T], &mut [T]);

/// A tile kernel together with the tile shape it computes.
pub struct TileKernel<T> {
    pub mr: usize,
    pub nr: usize,
    name: &'static str,
    run: TileFn<T>,
}

impl<T> Clone for TileKernel<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TileKernel<T> {}

impl<T> fmt::Debug for TileKernel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TileKernel({} {}x{})", self.name, self.mr, self.nr)
    }
}

impl<T: Scalar> TileKernel<T> {
    /// The portable kernel for an `mr × nr` tile.
    pub fn generic(mr: usize, nr: usize) -> Self {
        TileKernel {
            mr: mr.max(1),
            nr: nr.max(1),
            name: "generic",
            run: tile_generic::<T>,
        }
    }

    /// The best kernel for an `mr × nr` tile on this host.
    pub fn select(mr: usize, nr: usize) -> Self {
        T::tile_kernel()
            .filter(|kernel| kernel.mr == mr && kernel.nr == nr)
            .unwrap_or_else(|| Self::generic(mr, nr))
    }
}

impl<T> TileKernel<T> {
    pub(crate) const fn new(mr: usize, nr: usize, name: &'static str, run: TileFn<T>) -> Self {
        TileKernel { mr, nr, name, run }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Accumulates one `kc`-deep panel product into `acc`.
    ///
    /// # Panics
    ///
    /// If `a`, `b` or `acc` are shorter than `kc * mr`, `kc * nr` and
    /// `mr * nr` elements.
    #[inline]
    pub fn run(&self, kc: usize, a: &[T], b: &[T], acc: &mut [T]) {
        (self.run)(self.mr, self.nr, kc, a, b, acc)
    }
}

/// Portable tile kernel for any scalar and tile shape.
pub fn tile_generic<T: Scalar>(mr: usize, nr: usize, kc: usize, a: &[T], b: &[T], acc: &mut [T]) {
    let a = &a[..kc * mr];
    let b = &b[..kc * nr];
    let acc = &mut acc[..mr * nr];

    for (a_col, b_row) in a.chunks_exact(mr).zip(b.chunks_exact(nr)) {
        for (a_ip, acc_row) in a_col.iter().zip(acc.chunks_exact_mut(nr)) {
            for (c, b_pj) in acc_row.iter_mut().zip(b_row) {
                *c += a_ip.clone() * b_pj.clone();
            }
        }
    }
}

/// The vectorised f64 kernel, if the host supports one.
pub(crate) fn f64_tile_kernel() -> Option<TileKernel<f64>> {
    #[cfg(target_arch = "x86_64")]
    {
        avx::kernels::tile_kernel_f64()
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        None
    }
}
