//! The boundary to the external transform engine.
//!
//! This is the only module that talks to the engine crates. It exposes the
//! narrow surface the rest of the crate is built on: aligned raw allocation,
//! a planner-cache reclamation pass, plan creation for each transform kind,
//! synchronous execution, and release (dropping the [`EnginePlan`]).
//!
//! Multi-dimensional complex transforms are realized by applying the
//! engine's 1-D transforms along each axis of the row-major layout; the
//! factorization of each 1-D length stays entirely engine-side.

use std::alloc::Layout;
use std::ptr;
use std::slice;
use std::sync::{Arc, Mutex, OnceLock};

use num_complex::Complex64;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftDirection, FftPlanner};

use crate::plan::Direction;
use crate::{PlanError, Result};

// ============================================================================
// Raw allocation
// ============================================================================

/// Allocate uninitialized memory with the engine alignment baked into
/// `layout`. Returns null on failure; callers own the retry policy.
///
/// # Safety
/// `layout` must have non-zero size.
pub(crate) unsafe fn engine_alloc(layout: Layout) -> *mut u8 {
    std::alloc::alloc(layout)
}

/// Release memory obtained from [`engine_alloc`].
///
/// # Safety
/// `ptr` must come from [`engine_alloc`] with this exact `layout`.
pub(crate) unsafe fn engine_free(ptr: *mut u8, layout: Layout) {
    std::alloc::dealloc(ptr, layout);
}

// ============================================================================
// Planner cache and reclamation
// ============================================================================

/// Engine planning state shared by all plan creations: factorization choices
/// and twiddle tables are cached per transform length.
struct PlannerCache {
    complex: FftPlanner<f64>,
    real: RealFftPlanner<f64>,
}

impl PlannerCache {
    fn new() -> Self {
        Self {
            complex: FftPlanner::new(),
            real: RealFftPlanner::new(),
        }
    }
}

static PLANNERS: OnceLock<Mutex<PlannerCache>> = OnceLock::new();

fn with_planners<R>(f: impl FnOnce(&mut PlannerCache) -> R) -> R {
    let mut cache = PLANNERS
        .get_or_init(|| Mutex::new(PlannerCache::new()))
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    f(&mut cache)
}

/// Drop all cached engine planning state.
///
/// This is the reclamation pass run between the two allocation attempts:
/// cached twiddle tables and factorization strategies are the only memory
/// this layer holds onto that can be given back. Plans created afterwards
/// rebuild their state from scratch.
pub(crate) fn reclaim_planner_cache() {
    if let Some(cache) = PLANNERS.get() {
        *cache.lock().unwrap_or_else(|e| e.into_inner()) = PlannerCache::new();
    }
}

fn to_fft_direction(direction: Direction) -> FftDirection {
    match direction {
        Direction::Forward => FftDirection::Forward,
        Direction::Backward => FftDirection::Inverse,
    }
}

// ============================================================================
// Engine plans
// ============================================================================

/// Engine-side transform state bound to raw buffer addresses.
///
/// Dropping an `EnginePlan` releases the engine resources it holds.
pub(crate) enum EnginePlan {
    /// Complex-to-complex over an arbitrary-rank row-major array.
    C2c {
        dims: Vec<usize>,
        /// One engine transform per axis, parallel to `dims`.
        ffts: Vec<Arc<dyn Fft<f64>>>,
        input: *const Complex64,
        output: *mut Complex64,
        scratch: Vec<Complex64>,
        /// Gather buffer for axes whose elements are not contiguous.
        line: Vec<Complex64>,
    },
    /// Real-to-complex half-spectrum transform (forward only).
    R2c {
        r2c: Arc<dyn RealToComplex<f64>>,
        input: *const f64,
        output: *mut Complex64,
        /// The engine consumes its real input, so every execution stages the
        /// caller's buffer through this copy to keep the input intact.
        staging: Vec<f64>,
        scratch: Vec<Complex64>,
    },
    /// Complex-to-real transform. Executing it destroys the input spectrum:
    /// the caller's buffer is handed to the engine as workspace.
    C2r {
        c2r: Arc<dyn ComplexToReal<f64>>,
        input: *mut Complex64,
        output: *mut f64,
        /// Spectrum copy used only by measurement trials, so that plan
        /// creation alone does not consume the caller's input.
        staging: Vec<Complex64>,
        scratch: Vec<Complex64>,
    },
}

impl std::fmt::Debug for EnginePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            EnginePlan::C2c { .. } => "C2c",
            EnginePlan::R2c { .. } => "R2c",
            EnginePlan::C2r { .. } => "C2r",
        };
        f.debug_tuple("EnginePlan").field(&kind).finish()
    }
}

pub(crate) fn plan_c2c(
    dims: Vec<usize>,
    input: *const Complex64,
    output: *mut Complex64,
    direction: Direction,
) -> EnginePlan {
    let fft_direction = to_fft_direction(direction);
    let ffts: Vec<Arc<dyn Fft<f64>>> = with_planners(|cache| {
        dims.iter()
            .map(|&n| cache.complex.plan_fft(n, fft_direction))
            .collect()
    });
    let scratch_len = ffts
        .iter()
        .map(|fft| fft.get_inplace_scratch_len())
        .max()
        .unwrap_or(0);
    // Rank 1 transforms operate on contiguous chunks and never gather.
    let line_len = if dims.len() > 1 {
        dims.iter().copied().max().unwrap_or(0)
    } else {
        0
    };
    EnginePlan::C2c {
        dims,
        ffts,
        input,
        output,
        scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
        line: vec![Complex64::new(0.0, 0.0); line_len],
    }
}

pub(crate) fn plan_r2c(n: usize, input: *const f64, output: *mut Complex64) -> EnginePlan {
    let r2c = with_planners(|cache| cache.real.plan_fft_forward(n));
    let scratch_len = r2c.get_scratch_len();
    EnginePlan::R2c {
        r2c,
        input,
        output,
        staging: vec![0.0; n],
        scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
    }
}

pub(crate) fn plan_c2r(n: usize, input: *mut Complex64, output: *mut f64) -> EnginePlan {
    let c2r = with_planners(|cache| cache.real.plan_fft_inverse(n));
    let scratch_len = c2r.get_scratch_len();
    EnginePlan::C2r {
        c2r,
        input,
        output,
        staging: vec![Complex64::new(0.0, 0.0); n / 2 + 1],
        scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
    }
}

impl EnginePlan {
    /// Bytes of engine workspace held by this plan beyond the bound buffers.
    pub(crate) fn scratch_bytes(&self) -> usize {
        match self {
            EnginePlan::C2c { scratch, line, .. } => {
                (scratch.len() + line.len()) * std::mem::size_of::<Complex64>()
            }
            EnginePlan::R2c {
                staging, scratch, ..
            } => {
                staging.len() * std::mem::size_of::<f64>()
                    + scratch.len() * std::mem::size_of::<Complex64>()
            }
            EnginePlan::C2r {
                staging, scratch, ..
            } => (staging.len() + scratch.len()) * std::mem::size_of::<Complex64>(),
        }
    }

    /// Run the bound transform once.
    ///
    /// Re-reads the input address and re-writes the output address on every
    /// call. The complex-to-real variant additionally overwrites the input
    /// spectrum (the engine uses it as workspace).
    ///
    /// # Safety
    /// The bound input and output addresses must still refer to live
    /// allocations of the lengths they were planned with.
    pub(crate) unsafe fn execute(&mut self) -> Result<()> {
        match self {
            EnginePlan::C2c {
                dims,
                ffts,
                input,
                output,
                scratch,
                line,
            } => {
                run_c2c(dims, ffts, *input, *output, scratch, line);
                Ok(())
            }
            EnginePlan::R2c {
                r2c,
                input,
                output,
                staging,
                scratch,
            } => {
                let n = staging.len();
                staging.copy_from_slice(slice::from_raw_parts(*input, n));
                let spectrum = slice::from_raw_parts_mut(*output, n / 2 + 1);
                r2c.process_with_scratch(staging, spectrum, scratch)
                    .map_err(|e| PlanError::Engine(e.to_string()))
            }
            EnginePlan::C2r {
                c2r,
                input,
                output,
                staging,
                scratch,
            } => {
                let spectrum = slice::from_raw_parts_mut(*input, staging.len());
                let signal = slice::from_raw_parts_mut(*output, c2r.len());
                c2r.process_with_scratch(spectrum, signal, scratch)
                    .map_err(|e| PlanError::Engine(e.to_string()))
            }
        }
    }

    /// Trial execution used while measuring a plan.
    ///
    /// Identical to [`execute`](Self::execute) except that the
    /// complex-to-real variant reads its spectrum through the staging copy,
    /// so measurement does not consume the caller's input.
    ///
    /// # Safety
    /// Same contract as [`execute`](Self::execute).
    pub(crate) unsafe fn execute_trial(&mut self) -> Result<()> {
        match self {
            EnginePlan::C2r {
                c2r,
                input,
                output,
                staging,
                scratch,
            } => {
                let m = staging.len();
                staging.copy_from_slice(slice::from_raw_parts(*input, m));
                let signal = slice::from_raw_parts_mut(*output, c2r.len());
                c2r.process_with_scratch(staging, signal, scratch)
                    .map_err(|e| PlanError::Engine(e.to_string()))
            }
            _ => self.execute(),
        }
    }
}

/// Row-column pass: copy input to output, then transform the output along
/// each axis in turn with the engine's 1-D transforms.
///
/// # Safety
/// `input` and `output` must point to `dims.product()` live elements each;
/// they may alias exactly (in-place) or not at all.
unsafe fn run_c2c(
    dims: &[usize],
    ffts: &[Arc<dyn Fft<f64>>],
    input: *const Complex64,
    output: *mut Complex64,
    scratch: &mut [Complex64],
    line: &mut [Complex64],
) {
    let total: usize = dims.iter().product();
    ptr::copy(input, output, total);
    let out = slice::from_raw_parts_mut(output, total);

    for (axis, (&n, fft)) in dims.iter().zip(ffts.iter()).enumerate() {
        let inner: usize = dims[axis + 1..].iter().product();
        if inner == 1 {
            // Contiguous lines: transform chunks in place.
            for chunk in out.chunks_exact_mut(n) {
                fft.process_with_scratch(chunk, scratch);
            }
        } else {
            // Strided lines: gather into `line`, transform, scatter back.
            let span = n * inner;
            for base in (0..total).step_by(span) {
                for lane in 0..inner {
                    for k in 0..n {
                        line[k] = out[base + lane + k * inner];
                    }
                    fft.process_with_scratch(&mut line[..n], scratch);
                    for k in 0..n {
                        out[base + lane + k * inner] = line[k];
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{plan_c2c, reclaim_planner_cache};
    use crate::plan::Direction;
    use num_complex::Complex64;

    #[test]
    fn replanning_works_after_reclamation() {
        let mut input = vec![Complex64::new(0.0, 0.0); 8];
        let mut output = vec![Complex64::new(0.0, 0.0); 8];
        input[0] = Complex64::new(1.0, 0.0);

        reclaim_planner_cache();
        let mut plan = plan_c2c(
            vec![8],
            input.as_ptr(),
            output.as_mut_ptr(),
            Direction::Forward,
        );
        // SAFETY: both vecs outlive the plan.
        unsafe { plan.execute() }.unwrap();
        for bin in &output {
            assert!((bin.re - 1.0).abs() < 1e-12);
            assert!(bin.im.abs() < 1e-12);
        }
    }

    #[test]
    fn c2c_rereads_input_on_every_execution() {
        let mut input = vec![Complex64::new(0.0, 0.0); 4];
        let mut output = vec![Complex64::new(0.0, 0.0); 4];
        let mut plan = plan_c2c(
            vec![4],
            input.as_ptr(),
            output.as_mut_ptr(),
            Direction::Forward,
        );

        input[0] = Complex64::new(1.0, 0.0);
        // SAFETY: both vecs outlive the plan.
        unsafe { plan.execute() }.unwrap();
        let first = output.clone();

        input[0] = Complex64::new(2.0, 0.0);
        unsafe { plan.execute() }.unwrap();
        for (a, b) in first.iter().zip(output.iter()) {
            assert!((b.re - 2.0 * a.re).abs() < 1e-12);
        }
    }
}
