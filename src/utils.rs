//! Alignment and cache facility.
//!
//! Host cache-line size and SIMD vector width, plus [`AlignedVec`], the
//! aligned owning buffer every matrix and packing scratch block is built on.

use std::alloc::{alloc, dealloc, Layout};
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::sync::OnceLock;

use crate::error::{allocation_error, layout_error, Result};
use crate::MAX_NR;

/// Cache line size used when the build-time probe produced nothing usable.
pub const DEFAULT_CACHE_LINE: usize = 64;

/// Host cache-line size in bytes, as probed by the build script.
pub fn cache_line_size() -> usize {
    static LINE: OnceLock<usize> = OnceLock::new();
    *LINE.get_or_init(|| {
        env!("NUMKERN_CACHE_LINE")
            .parse::<usize>()
            .ok()
            .filter(|size| size.is_power_of_two())
            .unwrap_or(DEFAULT_CACHE_LINE)
    })
}

/// Width in bytes of the widest SIMD register the host supports.
///
/// x86 hosts are probed at run time so a binary built on one machine does not
/// over-report on another; other targets use the build-time probe.
pub fn vector_width() -> usize {
    static WIDTH: OnceLock<usize> = OnceLock::new();
    *WIDTH.get_or_init(detect_vector_width)
}

fn detect_vector_width() -> usize {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        if is_x86_feature_detected!("avx512f") {
            return 64;
        }
        if is_x86_feature_detected!("avx") {
            return 32;
        }
        if is_x86_feature_detected!("sse2") {
            return 16;
        }
    }
    build_vector_width()
}

fn build_vector_width() -> usize {
    if cfg!(avx512) {
        64
    } else if cfg!(avx2) {
        32
    } else if cfg!(any(sse, neon)) {
        16
    } else {
        mem::size_of::<f64>()
    }
}

/// Number of `T` lanes in one host vector register, clamped to `1..=MAX_NR`.
pub fn vector_lanes<T>() -> usize {
    let size = mem::size_of::<T>().max(1);
    (vector_width() / size).clamp(1, MAX_NR)
}

/// Buffer alignment for `T`: `max(cache line, natural alignment of T)`.
pub fn alignment_for<T>() -> usize {
    cache_line_size().max(mem::align_of::<T>())
}

/// A heap buffer of `len` initialised `T`s whose base address is a multiple
/// of a caller-chosen alignment.
///
/// The buffer is allocated and freed through `std::alloc` with the same
/// [`Layout`], so it never crosses allocators the way a `Vec` built from raw
/// parts could. Elements are dropped before the memory is released, which
/// makes it safe for heap-backed scalars such as big rationals.
pub struct AlignedVec<T> {
    ptr: NonNull<T>,
    len: usize,
    layout: Layout,
}

// SAFETY: AlignedVec uniquely owns its elements, like Vec<T>.
unsafe impl<T: Send> Send for AlignedVec<T> {}
// SAFETY: shared access only hands out &T.
unsafe impl<T: Sync> Sync for AlignedVec<T> {}

/// Tracks a partially initialised allocation so a panicking initialiser
/// drops what was written and releases the memory.
struct PartialInit<T> {
    ptr: NonNull<T>,
    initialised: usize,
    layout: Layout,
}

impl<T> Drop for PartialInit<T> {
    fn drop(&mut self) {
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.ptr.as_ptr(),
                self.initialised,
            ));
            if self.layout.size() > 0 {
                dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout);
            }
        }
    }
}

impl<T> AlignedVec<T> {
    /// Allocates `len` elements aligned to `align` bytes and initialises
    /// element `i` with `init(i)`.
    ///
    /// # Errors
    ///
    /// * [`LayoutError`](crate::KernelError::LayoutError) if `align` is not a
    ///   power of two, is smaller than `align_of::<T>()`, or the total size
    ///   overflows.
    /// * [`AllocationError`](crate::KernelError::AllocationError) if the
    ///   allocator returns null.
    pub fn from_fn(len: usize, align: usize, mut init: impl FnMut(usize) -> T) -> Result<Self> {
        let layout = Self::layout(len, align)?;

        let ptr = if layout.size() == 0 {
            NonNull::dangling()
        } else {
            // SAFETY: layout has a non-zero size.
            let raw = unsafe { alloc(layout) };
            NonNull::new(raw.cast::<T>()).ok_or_else(|| {
                allocation_error(layout.size(), layout.align(), "allocator returned null")
            })?
        };

        let mut guard = PartialInit {
            ptr,
            initialised: 0,
            layout,
        };
        for i in 0..len {
            // SAFETY: i < len and the allocation holds len elements.
            unsafe { ptr.as_ptr().add(i).write(init(i)) };
            guard.initialised += 1;
        }
        mem::forget(guard);

        Ok(AlignedVec { ptr, len, layout })
    }

    /// Allocates `len` clones of `value` aligned to `align` bytes.
    pub fn filled(len: usize, align: usize, value: T) -> Result<Self>
    where
        T: Clone,
    {
        Self::from_fn(len, align, |_| value.clone())
    }

    /// Copies `src` into a new buffer aligned to `align` bytes.
    pub fn from_slice(src: &[T], align: usize) -> Result<Self>
    where
        T: Clone,
    {
        Self::from_fn(src.len(), align, |i| src[i].clone())
    }

    fn layout(len: usize, align: usize) -> Result<Layout> {
        let elem = mem::size_of::<T>();
        if !align.is_power_of_two() {
            return Err(layout_error(
                len.saturating_mul(elem),
                align,
                "alignment must be power of two",
            ));
        }
        if align < mem::align_of::<T>() {
            return Err(layout_error(
                len.saturating_mul(elem),
                align,
                "alignment is smaller than the natural alignment of the element type",
            ));
        }
        Layout::array::<T>(len)
            .and_then(|layout| layout.align_to(align))
            .map_err(|e| layout_error(len.saturating_mul(elem), align, e.to_string()))
    }

    /// Alignment the buffer was allocated with, in bytes.
    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    pub fn as_slice(&self) -> &[T] {
        self
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }
}

impl<T> Drop for AlignedVec<T> {
    fn drop(&mut self) {
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len));
            if self.layout.size() > 0 {
                dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout);
            }
        }
    }
}

impl<T> Deref for AlignedVec<T> {
    type Target = [T];
    fn deref(&self) -> &Self::Target {
        // SAFETY: ptr is valid (or dangling with len 0) and all len elements are initialised.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> DerefMut for AlignedVec<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: as in Deref, and &mut self guarantees uniqueness.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Clone> Clone for AlignedVec<T> {
    fn clone(&self) -> Self {
        let src: &[T] = self;
        match Self::from_fn(self.len, self.layout.align(), |i| src[i].clone()) {
            Ok(copy) => copy,
            Err(_) => std::alloc::handle_alloc_error(self.layout),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for AlignedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for AlignedVec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_cache_line_is_power_of_two() {
        assert!(cache_line_size().is_power_of_two());
        assert!(cache_line_size() >= 16);
    }

    #[test]
    fn test_vector_width_and_lanes() {
        let width = vector_width();
        assert!(width >= mem::size_of::<f64>());
        assert!((1..=MAX_NR).contains(&vector_lanes::<f64>()));
        assert!(vector_lanes::<f32>() >= vector_lanes::<f64>());
    }

    #[test]
    fn test_aligned_vec_alignment() {
        for len in [1usize, 3, 17, 1000] {
            let align = alignment_for::<f64>();
            let buf = AlignedVec::filled(len, align, 0.0f64).unwrap();
            assert_eq!(buf.len(), len);
            assert_eq!(buf.as_ptr() as usize % align, 0);
            assert!(buf.iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn test_aligned_vec_from_fn_and_clone() {
        let buf = AlignedVec::from_fn(5, 64, |i| i as f32 * 2.0).unwrap();
        assert_eq!(buf.as_slice(), &[0.0, 2.0, 4.0, 6.0, 8.0]);

        let copy = buf.clone();
        assert_eq!(copy, buf);
        assert_eq!(copy.alignment(), 64);
        assert_ne!(copy.as_ptr(), buf.as_ptr());
    }

    #[test]
    fn test_aligned_vec_empty() {
        let buf: AlignedVec<f64> = AlignedVec::filled(0, 64, 1.0).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_aligned_vec_rejects_bad_alignment() {
        let err = AlignedVec::filled(4, 48, 0.0f64).unwrap_err();
        assert!(matches!(err, crate::KernelError::LayoutError { alignment: 48, .. }));

        let err = AlignedVec::filled(4, 2, 0.0f64).unwrap_err();
        assert!(matches!(err, crate::KernelError::LayoutError { .. }));
    }

    #[test]
    fn test_aligned_vec_drops_elements_once() {
        let tracker = Rc::new(());
        {
            let buf = AlignedVec::filled(8, 64, Rc::clone(&tracker)).unwrap();
            assert_eq!(Rc::strong_count(&tracker), 9);
            drop(buf);
        }
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn test_aligned_vec_panicking_initialiser_releases_elements() {
        let tracker = Rc::new(());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            AlignedVec::from_fn(8, 64, |i| {
                if i == 5 {
                    panic!("boom");
                }
                Rc::clone(&tracker)
            })
        }));
        assert!(result.is_err());
        assert_eq!(Rc::strong_count(&tracker), 1);
    }
}
