//! Memory management and plan lifecycle binding for an external FFT engine.
//!
//! This crate does not compute Fourier transforms itself. It owns the
//! contracts *around* an external transform engine: buffers that satisfy the
//! engine's SIMD alignment requirement, multi-dimensional views over those
//! buffers without extra copies, and opaque transform [`Plan`]s that bind
//! buffer addresses at creation time and can be executed any number of times
//! before they are released.
//!
//! # Core Types
//!
//! - [`AlignedVec`]: Owned, zero-initialized, engine-aligned flat buffer
//! - [`AlignedArray`]: An N-dimensional row-major array backed by one flat
//!   [`AlignedVec`] allocation
//! - [`StridedView`] / [`StridedViewMut`]: Non-owning dimensional
//!   decompositions of a flat buffer
//! - [`Plan`]: Opaque handle to engine-resident transform state, bound to
//!   specific input/output buffers
//! - [`Direction`] / [`Flag`]: Planning configuration mirrored 1:1 onto the
//!   engine's own constants
//!
//! # One-shot transforms
//!
//! ```
//! use planfft::{alloc_1d, dft_1d, Complex64, Direction, Flag};
//!
//! let mut input = alloc_1d(4);
//! let mut output = alloc_1d(4);
//! input[0] = Complex64::new(1.0, 0.0);
//!
//! dft_1d(&mut input, &mut output, Direction::Forward, Flag::Estimate).unwrap();
//!
//! // The spectrum of a unit impulse is flat.
//! for bin in output.iter() {
//!     assert!((bin.re - 1.0).abs() < 1e-12 && bin.im.abs() < 1e-12);
//! }
//! ```
//!
//! # Plan reuse
//!
//! Creating a plan is where the engine selects its strategy; executing it is
//! cheap and repeatable. Callers that transform many signals of the same
//! shape should create one plan and call [`Plan::execute`] per signal:
//!
//! ```
//! use planfft::{alloc_1d, Complex64, Direction, Flag, Plan};
//!
//! let mut input = alloc_1d(8);
//! let mut output = alloc_1d(8);
//! // SAFETY: `input` and `output` live until the end of this scope, which
//! // outlives `plan`.
//! let mut plan =
//!     unsafe { Plan::dft_1d(&mut input, &mut output, Direction::Forward, Flag::Estimate) }
//!         .unwrap();
//! for run in 0..3 {
//!     input[0] = Complex64::new(run as f64, 0.0);
//!     plan.execute().unwrap();
//! }
//! ```
//!
//! # Ownership rules
//!
//! A buffer is owned by whoever allocated it and freed by dropping it. A plan
//! *borrows* the buffers bound into it without holding Rust borrows — the
//! caller promises, via the `unsafe` plan constructors, that every bound
//! buffer outlives the plan. Debug builds verify this promise at execution
//! time through a buffer liveness registry and reject violations with
//! [`PlanError::BufferFreed`].

mod alloc;
mod engine;
mod plan;
mod registry;
mod transform;
pub mod view;

// ============================================================================
// Allocation
// ============================================================================
pub use alloc::{alloc_1d, alloc_2d, alloc_3d, alloc_real_1d, AlignedVec, Element};

// ============================================================================
// Views
// ============================================================================
pub use view::{row_major_strides, AlignedArray, StridedView, StridedViewMut};

// ============================================================================
// Plans and configuration
// ============================================================================
pub use plan::{Direction, Flag, Plan, PlanFingerprint};

// ============================================================================
// One-shot transforms
// ============================================================================
pub use transform::{dft_1d, dft_2d, dft_3d, dft_c2r_1d, dft_r2c_1d};

pub use num_complex::Complex64;

// ============================================================================
// Constants
// ============================================================================

/// Alignment, in bytes, of every buffer handed to the engine.
///
/// Covers the widest SIMD lanes the engine may select (one full cache line),
/// so the engine never has to fall back to unaligned loads.
pub const ALIGNMENT: usize = 64;

// ============================================================================
// Error types
// ============================================================================

/// Errors surfaced by plan creation, execution, and view construction.
///
/// Allocation failure is deliberately absent: by policy it is fatal after one
/// reclaim-and-retry cycle and aborts the process instead of returning.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Input and output dimensions disagree for the requested transform kind.
    #[error("shape mismatch: input {input:?} vs output {output:?}")]
    ShapeMismatch {
        input: Vec<usize>,
        output: Vec<usize>,
    },

    /// A dimension of length zero was passed to plan creation.
    #[error("zero-length dimension {dim}")]
    ZeroDim { dim: usize },

    /// View dimensions do not cover the backing buffer exactly.
    #[error("view dims {dims:?} do not match backing buffer of {len} elements")]
    ViewMismatch { dims: Vec<usize>, len: usize },

    /// The plan was already destroyed.
    #[error("plan has already been destroyed")]
    PlanDestroyed,

    /// A buffer bound to the plan was freed while the plan was still
    /// executable (detected in debug builds only).
    #[error("buffer at {addr:#x} was freed while still bound to a plan")]
    BufferFreed { addr: usize },

    /// The engine reported a failure while executing the bound transform.
    #[error("engine execution failed: {0}")]
    Engine(String),
}

/// Result type for plan and view operations.
pub type Result<T> = std::result::Result<T, PlanError>;
