//! Engine-aligned buffer allocation.
//!
//! Buffers handed to the engine must satisfy [`ALIGNMENT`](crate::ALIGNMENT)
//! so the engine can use its widest SIMD loads. [`AlignedVec`] owns such an
//! allocation; dropping it is the free operation and always releases through
//! the allocation's first address, which is also the rule the
//! dimension-reducing wrappers in [`view`](crate::view) follow.
//!
//! Allocation policy: try once; on failure run the engine reclamation pass
//! (dropping all cached planner state) and retry exactly once; if that also
//! fails, abort the process with a descriptive message. There is no partial
//! or degraded mode.

use std::alloc::Layout;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use num_complex::Complex64;
use num_traits::Zero;

use crate::view::AlignedArray;
use crate::{engine, registry, ALIGNMENT};

/// Element kinds the engine understands.
///
/// Implemented for [`f64`] (real samples) and [`Complex64`] (complex
/// samples); the transform table in [`Plan`](crate::Plan) is defined over
/// exactly these two kinds.
pub trait Element: Copy + Zero + 'static {}

impl Element for f64 {}
impl Element for Complex64 {}

/// An owned, contiguous, engine-aligned buffer of `len` elements.
///
/// Always created zero-initialized — explicitly, element by element, rather
/// than trusting the underlying allocator. Dereferences to `[T]` for
/// element access and iteration.
///
/// The buffer is exclusively owned: it is freed when dropped, and no plan
/// bound to it may be executed afterwards (debug builds detect this, see
/// [`PlanError::BufferFreed`](crate::PlanError::BufferFreed)).
#[derive(Debug)]
pub struct AlignedVec<T: Element> {
    ptr: NonNull<T>,
    len: usize,
}

// The buffer is an exclusively owned heap region, so thread transfer and
// shared reads follow the element type.
unsafe impl<T: Element + Send> Send for AlignedVec<T> {}
unsafe impl<T: Element + Sync> Sync for AlignedVec<T> {}

fn fatal_alloc(len: usize, bytes: usize) -> ! {
    eprintln!(
        "planfft: allocation of {len} elements ({bytes} bytes, alignment {ALIGNMENT}) \
         failed after planner-cache reclamation"
    );
    std::process::abort();
}

impl<T: Element> AlignedVec<T> {
    /// Allocate a zero-initialized buffer of `len` elements.
    ///
    /// Applies the reclaim-and-retry policy described at module level; the
    /// only failure mode is a process abort.
    pub fn zeroed(len: usize) -> Self {
        if len == 0 {
            return Self {
                ptr: NonNull::dangling(),
                len: 0,
            };
        }
        let Some(bytes) = len.checked_mul(mem::size_of::<T>()) else {
            fatal_alloc(len, usize::MAX)
        };
        let Ok(layout) = Layout::from_size_align(bytes, ALIGNMENT) else {
            fatal_alloc(len, bytes)
        };

        // SAFETY: layout has non-zero size.
        let mut raw = unsafe { engine::engine_alloc(layout) };
        if raw.is_null() {
            engine::reclaim_planner_cache();
            // SAFETY: as above.
            raw = unsafe { engine::engine_alloc(layout) };
        }
        let Some(ptr) = NonNull::new(raw as *mut T) else {
            fatal_alloc(len, bytes)
        };

        // Zero every element explicitly instead of assuming the allocator
        // hands back cleared memory.
        for i in 0..len {
            // SAFETY: i < len elements were just allocated at ptr.
            unsafe { ptr.as_ptr().add(i).write(T::zero()) };
        }

        registry::register(ptr.as_ptr() as usize);
        Self { ptr, len }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base pointer of the allocation (its first element).
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Mutable base pointer of the allocation.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T: Element> Deref for AlignedVec<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        // SAFETY: ptr covers len initialized elements (or is dangling with
        // len 0, which from_raw_parts permits).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Element> DerefMut for AlignedVec<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as in Deref, and we hold &mut self.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Element> Drop for AlignedVec<T> {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        registry::deregister(self.ptr.as_ptr() as usize);
        // SAFETY: this layout succeeded in zeroed() for the same len.
        let layout = unsafe {
            Layout::from_size_align_unchecked(self.len * mem::size_of::<T>(), ALIGNMENT)
        };
        // SAFETY: ptr came from engine_alloc with this layout.
        unsafe { engine::engine_free(self.ptr.as_ptr() as *mut u8, layout) };
    }
}

// ============================================================================
// Allocation entry points
// ============================================================================

/// Allocate a zero-initialized complex buffer of `n` elements.
pub fn alloc_1d(n: usize) -> AlignedVec<Complex64> {
    AlignedVec::zeroed(n)
}

/// Allocate a zero-initialized real buffer of `n` elements.
pub fn alloc_real_1d(n: usize) -> AlignedVec<f64> {
    AlignedVec::zeroed(n)
}

/// Allocate an `n0 x n1` complex array backed by a single flat allocation.
pub fn alloc_2d(n0: usize, n1: usize) -> AlignedArray<Complex64, 2> {
    AlignedArray::zeroed([n0, n1])
}

/// Allocate an `n0 x n1 x n2` complex array backed by a single flat
/// allocation.
pub fn alloc_3d(n0: usize, n1: usize, n2: usize) -> AlignedArray<Complex64, 3> {
    AlignedArray::zeroed([n0, n1, n2])
}

#[cfg(test)]
mod tests {
    use super::{alloc_1d, alloc_real_1d, AlignedVec};
    use crate::{registry, ALIGNMENT};
    use num_complex::Complex64;

    #[test]
    fn alloc_1d_is_zeroed_with_requested_length() {
        let buf = alloc_1d(37);
        assert_eq!(buf.len(), 37);
        for x in buf.iter() {
            assert_eq!(*x, Complex64::new(0.0, 0.0));
        }
    }

    #[test]
    fn base_pointer_is_engine_aligned() {
        for n in [1usize, 3, 64, 1000] {
            let buf = alloc_1d(n);
            assert_eq!(buf.as_ptr() as usize % ALIGNMENT, 0);
            let real = alloc_real_1d(n);
            assert_eq!(real.as_ptr() as usize % ALIGNMENT, 0);
        }
    }

    #[test]
    fn zero_length_allocation_is_usable() {
        let buf = alloc_1d(0);
        assert!(buf.is_empty());
        assert_eq!(buf.iter().count(), 0);
    }

    #[test]
    fn deref_allows_element_access() {
        let mut buf = alloc_real_1d(8);
        buf[3] = 2.5;
        assert_eq!(buf[3], 2.5);
        assert_eq!(buf.iter().sum::<f64>(), 2.5);
    }

    #[test]
    fn drop_deregisters_the_buffer() {
        let buf = alloc_1d(16);
        let addr = buf.as_ptr() as usize;
        let generation = registry::generation_of(addr);
        assert!(generation.is_some());
        drop(buf);
        // The address may be handed out again to a concurrent allocation,
        // but never under the generation this buffer was registered with.
        assert_ne!(registry::generation_of(addr), generation);
    }

    #[test]
    fn send_buffer_across_threads() {
        let mut buf: AlignedVec<f64> = AlignedVec::zeroed(4);
        let handle = std::thread::spawn(move || {
            buf[0] = 1.0;
            buf[0] + buf[1]
        });
        assert_eq!(handle.join().unwrap(), 1.0);
    }
}
