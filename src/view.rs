//! Multi-dimensional views over flat aligned buffers.
//!
//! A 2-D or 3-D allocation is a single flat [`AlignedVec`] plus stride
//! metadata — no per-row storage exists. [`AlignedArray`] owns that pairing;
//! [`StridedView`] / [`StridedViewMut`] are the non-owning decompositions,
//! validated at construction so that `dims` exactly covers the backing
//! buffer. Every dimension-reduced accessor bottoms out at the flat buffer's
//! first element, which is the address the free operation resolves through.

use crate::alloc::{AlignedVec, Element};
use crate::{PlanError, Result};

/// Compute row-major strides (last index varies fastest).
pub fn row_major_strides<const N: usize>(dims: [usize; N]) -> [usize; N] {
    let mut strides = [1usize; N];
    for i in (0..N.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

fn flat_index<const N: usize>(dims: &[usize; N], strides: &[usize; N], idx: [usize; N]) -> usize {
    let mut flat = 0;
    for d in 0..N {
        assert!(
            idx[d] < dims[d],
            "index {} out of bounds for dim {} of extent {}",
            idx[d],
            d,
            dims[d]
        );
        flat += idx[d] * strides[d];
    }
    flat
}

fn validate_cover<const N: usize>(dims: [usize; N], len: usize) -> Result<()> {
    let total: usize = dims.iter().product();
    if total != len {
        return Err(PlanError::ViewMismatch {
            dims: dims.to_vec(),
            len,
        });
    }
    Ok(())
}

// ============================================================================
// StridedView
// ============================================================================

/// An immutable N-dimensional view over a flat buffer.
///
/// Carries dimension sizes and row-major strides; construction validates
/// that the dimensions exactly cover the backing slice.
#[derive(Debug, Clone, Copy)]
pub struct StridedView<'a, T, const N: usize> {
    data: &'a [T],
    dims: [usize; N],
    strides: [usize; N],
}

impl<'a, T, const N: usize> StridedView<'a, T, N> {
    /// Create a view with row-major strides over `data`.
    ///
    /// # Errors
    /// Returns [`PlanError::ViewMismatch`] unless `dims` multiplies out to
    /// exactly `data.len()`.
    pub fn new(data: &'a [T], dims: [usize; N]) -> Result<Self> {
        validate_cover(dims, data.len())?;
        Ok(Self {
            data,
            dims,
            strides: row_major_strides(dims),
        })
    }

    /// Size of each dimension.
    #[inline]
    pub fn dims(&self) -> &[usize; N] {
        &self.dims
    }

    /// Stride of each dimension, in elements.
    #[inline]
    pub fn strides(&self) -> &[usize; N] {
        &self.strides
    }

    /// Total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the view covers no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The backing buffer in flat row-major order.
    #[inline]
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Pointer to the backing buffer's first element.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }
}

impl<'a, T: Copy, const N: usize> StridedView<'a, T, N> {
    /// Element at a multi-dimensional index. Panics on out-of-bounds.
    #[inline]
    pub fn get(&self, idx: [usize; N]) -> T {
        self.data[flat_index(&self.dims, &self.strides, idx)]
    }
}

impl<'a, T> StridedView<'a, T, 2> {
    /// The `i`-th row as a contiguous slice.
    #[inline]
    pub fn row(&self, i: usize) -> &'a [T] {
        assert!(i < self.dims[0], "row {} out of bounds", i);
        &self.data[i * self.strides[0]..(i + 1) * self.strides[0]]
    }
}

// ============================================================================
// StridedViewMut
// ============================================================================

/// A mutable N-dimensional view over a flat buffer.
#[derive(Debug)]
pub struct StridedViewMut<'a, T, const N: usize> {
    data: &'a mut [T],
    dims: [usize; N],
    strides: [usize; N],
}

impl<'a, T, const N: usize> StridedViewMut<'a, T, N> {
    /// Create a mutable view with row-major strides over `data`.
    ///
    /// # Errors
    /// Returns [`PlanError::ViewMismatch`] unless `dims` multiplies out to
    /// exactly `data.len()`.
    pub fn new(data: &'a mut [T], dims: [usize; N]) -> Result<Self> {
        validate_cover(dims, data.len())?;
        Ok(Self {
            data,
            dims,
            strides: row_major_strides(dims),
        })
    }

    /// Size of each dimension.
    #[inline]
    pub fn dims(&self) -> &[usize; N] {
        &self.dims
    }

    /// Stride of each dimension, in elements.
    #[inline]
    pub fn strides(&self) -> &[usize; N] {
        &self.strides
    }

    /// The backing buffer in flat row-major order.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.data
    }

    /// Mutable flat access to the backing buffer.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data
    }

    /// Mutable pointer to the backing buffer's first element.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr()
    }

    /// The `i`-th outermost row as a mutable contiguous slice.
    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        assert!(i < self.dims[0], "row {} out of bounds", i);
        let span = self.strides[0];
        &mut self.data[i * span..(i + 1) * span]
    }
}

impl<'a, T: Copy, const N: usize> StridedViewMut<'a, T, N> {
    /// Element at a multi-dimensional index. Panics on out-of-bounds.
    #[inline]
    pub fn get(&self, idx: [usize; N]) -> T {
        self.data[flat_index(&self.dims, &self.strides, idx)]
    }

    /// Store `value` at a multi-dimensional index. Panics on out-of-bounds.
    #[inline]
    pub fn set(&mut self, idx: [usize; N], value: T) {
        let flat = flat_index(&self.dims, &self.strides, idx);
        self.data[flat] = value;
    }
}

// ============================================================================
// AlignedArray
// ============================================================================

/// An owned N-dimensional row-major array over one flat aligned allocation.
///
/// Constructed by [`alloc_2d`](crate::alloc_2d) / [`alloc_3d`](crate::alloc_3d)
/// (or [`AlignedArray::zeroed`] directly). The flattened element order is
/// identical to the equivalent 1-D allocation of `dims.product()` elements;
/// dropping the array frees that single allocation.
#[derive(Debug)]
pub struct AlignedArray<T: Element, const N: usize> {
    data: AlignedVec<T>,
    dims: [usize; N],
    strides: [usize; N],
}

impl<T: Element, const N: usize> AlignedArray<T, N> {
    /// Allocate a zero-initialized array. One flat allocation, no per-row
    /// storage. Inherits the reclaim-and-retry allocation policy.
    pub fn zeroed(dims: [usize; N]) -> Self {
        let total: usize = dims.iter().product();
        Self {
            data: AlignedVec::zeroed(total),
            dims,
            strides: row_major_strides(dims),
        }
    }

    /// Size of each dimension.
    #[inline]
    pub fn dims(&self) -> &[usize; N] {
        &self.dims
    }

    /// Stride of each dimension, in elements.
    #[inline]
    pub fn strides(&self) -> &[usize; N] {
        &self.strides
    }

    /// Total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the array covers no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat row-major element access.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable flat row-major element access.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Base pointer of the single backing allocation.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    /// Mutable base pointer of the single backing allocation.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr()
    }

    /// Element at a multi-dimensional index. Panics on out-of-bounds.
    #[inline]
    pub fn get(&self, idx: [usize; N]) -> T {
        self.data[flat_index(&self.dims, &self.strides, idx)]
    }

    /// Store `value` at a multi-dimensional index. Panics on out-of-bounds.
    #[inline]
    pub fn set(&mut self, idx: [usize; N], value: T) {
        let flat = flat_index(&self.dims, &self.strides, idx);
        self.data[flat] = value;
    }

    /// Non-owning view of the whole array.
    pub fn view(&self) -> StridedView<'_, T, N> {
        StridedView {
            data: &self.data[..],
            dims: self.dims,
            strides: self.strides,
        }
    }

    /// Mutable non-owning view of the whole array.
    pub fn view_mut(&mut self) -> StridedViewMut<'_, T, N> {
        StridedViewMut {
            data: &mut self.data[..],
            dims: self.dims,
            strides: self.strides,
        }
    }
}
