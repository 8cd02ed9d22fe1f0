//! 4×4 double-precision tile kernel using 256-bit AVX registers.
//!
//! Each of the four accumulator registers holds one row of the tile. Every
//! step of the `kc` loop loads one packed B row and broadcasts the four A
//! entries of that step against it. Products and sums are rounded separately
//! (no fused multiply-add), so the result is bit-identical to the portable
//! kernel.

use std::arch::x86_64::*;

use crate::simd::TileKernel;

/// Tile rows.
pub const MR: usize = 4;
/// Tile columns, one f64 lane each.
pub const NR: usize = 4;

/// The AVX kernel, or `None` if the running CPU lacks AVX.
pub fn tile_kernel_f64() -> Option<TileKernel<f64>> {
    if is_x86_feature_detected!("avx") {
        Some(TileKernel::new(MR, NR, "avx-4x4", tile_4x4_f64))
    } else {
        None
    }
}

/// Safe entry point matching [`TileFn`](crate::simd::TileFn).
///
/// Only handed out by [`tile_kernel_f64`] once AVX has been detected.
fn tile_4x4_f64(mr: usize, nr: usize, kc: usize, a: &[f64], b: &[f64], acc: &mut [f64]) {
    assert!(mr == MR && nr == NR, "avx kernel computes 4x4 tiles, got {mr}x{nr}");
    assert!(a.len() >= kc * MR && b.len() >= kc * NR && acc.len() >= MR * NR);
    // SAFETY: bounds checked above; AVX presence checked in tile_kernel_f64.
    unsafe { kernel_4x4(kc, a.as_ptr(), b.as_ptr(), acc.as_mut_ptr()) }
}

/// # Safety
///
/// The CPU must support AVX. `a` and `b` must be readable for `4 * kc`
/// elements and `acc` readable and writable for 16 elements.
#[target_feature(enable = "avx")]
unsafe fn kernel_4x4(kc: usize, a: *const f64, b: *const f64, acc: *mut f64) {
    let mut c0 = _mm256_loadu_pd(acc);
    let mut c1 = _mm256_loadu_pd(acc.add(NR));
    let mut c2 = _mm256_loadu_pd(acc.add(2 * NR));
    let mut c3 = _mm256_loadu_pd(acc.add(3 * NR));

    for p in 0..kc {
        // Packed panels are cache-line aligned, but a caller may hand in any
        // slice, so use the unaligned load.
        let b_row = _mm256_loadu_pd(b.add(p * NR));
        let a_col = a.add(p * MR);

        let a0 = _mm256_broadcast_sd(&*a_col);
        c0 = _mm256_add_pd(c0, _mm256_mul_pd(a0, b_row));
        let a1 = _mm256_broadcast_sd(&*a_col.add(1));
        c1 = _mm256_add_pd(c1, _mm256_mul_pd(a1, b_row));
        let a2 = _mm256_broadcast_sd(&*a_col.add(2));
        c2 = _mm256_add_pd(c2, _mm256_mul_pd(a2, b_row));
        let a3 = _mm256_broadcast_sd(&*a_col.add(3));
        c3 = _mm256_add_pd(c3, _mm256_mul_pd(a3, b_row));
    }

    _mm256_storeu_pd(acc, c0);
    _mm256_storeu_pd(acc.add(NR), c1);
    _mm256_storeu_pd(acc.add(2 * NR), c2);
    _mm256_storeu_pd(acc.add(3 * NR), c3);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::tile_generic;

    fn sample(len: usize, seed: f64) -> Vec<f64> {
        (0..len).map(|i| ((i as f64 + seed) * 0.37).sin() * 3.0).collect()
    }

    #[test]
    fn test_matches_generic_kernel_bitwise() {
        let Some(kernel) = tile_kernel_f64() else {
            return;
        };
        for kc in [1usize, 3, 64, 257] {
            let a = sample(kc * MR, 0.5);
            let b = sample(kc * NR, 1.25);
            let mut expected = sample(MR * NR, 2.0);
            let mut actual = expected.clone();

            tile_generic(MR, NR, kc, &a, &b, &mut expected);
            kernel.run(kc, &a, &b, &mut actual);
            assert_eq!(actual, expected, "kc = {kc}");
        }
    }

    #[test]
    fn test_selected_for_f64_when_available() {
        if is_x86_feature_detected!("avx") {
            let kernel = TileKernel::<f64>::select(MR, NR);
            assert_eq!(kernel.name(), "avx-4x4");
        }
    }

    #[test]
    #[should_panic]
    fn test_rejects_short_panels() {
        tile_4x4_f64(MR, NR, 4, &[0.0; 8], &[0.0; 16], &mut [0.0; 16]);
    }
}
