//! Transform plans and planning configuration.
//!
//! A [`Plan`] is an opaque handle to engine-resident transform state. It is
//! created by binding the addresses of one input and one output buffer plus
//! a [`Direction`] (complex transforms) and a planning [`Flag`]; it can then
//! be executed any number of times and is released exactly once, either by
//! [`Plan::destroy`] or by dropping the handle.
//!
//! All shapes are validated here, before anything reaches the engine:
//! degenerate or mismatched dimensions fail with a typed error instead of
//! being forwarded as undefined behavior.

use std::time::Instant;

use num_complex::Complex64;

use crate::alloc::AlignedVec;
use crate::view::AlignedArray;
use crate::{engine, registry, PlanError, Result};

// ============================================================================
// Configuration values
// ============================================================================

/// Transform direction for complex-to-complex plans.
///
/// Mapped 1:1 onto the engine's own constants via
/// [`engine_value`](Direction::engine_value); the mapping is fixed at compile
/// time rather than read from the engine at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// The engine's integer encoding of this direction.
    ///
    /// | variant | engine value |
    /// |---|---|
    /// | `Forward` | `-1` |
    /// | `Backward` | `1` |
    #[must_use]
    pub fn engine_value(self) -> i32 {
        match self {
            Direction::Forward => -1,
            Direction::Backward => 1,
        }
    }
}

/// Planning-effort policy.
///
/// `Estimate` picks a strategy from static heuristics: creation is cheap and
/// the bound buffers are left untouched. `Measure` additionally runs timed
/// trial executions while the plan is created; creation is slower, and the
/// bound buffers must not be assumed unchanged afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Flag {
    #[default]
    Estimate,
    Measure,
}

impl Flag {
    /// The engine's integer encoding of this flag.
    ///
    /// | variant | engine value |
    /// |---|---|
    /// | `Estimate` | `1 << 6` |
    /// | `Measure` | `0` |
    #[must_use]
    pub fn engine_value(self) -> u32 {
        match self {
            Flag::Estimate => 1 << 6,
            Flag::Measure => 0,
        }
    }
}

// ============================================================================
// Plan fingerprint
// ============================================================================

/// How a plan's strategy was selected, and what it costs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanFingerprint {
    /// Planning policy the plan was created under.
    pub flag: Flag,
    /// Logical dimensions of the transform.
    pub dims: Vec<usize>,
    /// Analytic cost estimate (5·n·log2 n for n total elements).
    pub estimated_flops: u64,
    /// Engine workspace held beyond the bound buffers, in bytes.
    pub scratch_bytes: usize,
    /// Best trial-execution wall time observed during creation.
    /// `None` unless the plan was created with [`Flag::Measure`].
    pub measured_ns: Option<u64>,
}

fn estimate_flops(dims: &[usize]) -> u64 {
    let n: usize = dims.iter().product();
    if n < 2 {
        return 0;
    }
    (5.0 * n as f64 * (n as f64).log2()).round() as u64
}

// ============================================================================
// Plan
// ============================================================================

/// Number of trial executions a `Measure` plan runs during creation.
const MEASURE_TRIALS: u32 = 3;

/// An opaque, exclusively owned handle to engine-resident transform state.
///
/// The plan borrows its buffers without holding Rust borrows: creation
/// captures raw base addresses, and every [`execute`](Plan::execute) re-reads
/// the input address and re-writes the output address. The caller keeps the
/// **buffer-outlives-plan** invariant — freeing a bound buffer while the plan
/// is still executable is a contract violation (debug builds detect it).
///
/// Dropping a plan that was never destroyed releases the engine resources as
/// a leak guard; explicit [`destroy`](Plan::destroy) remains the primary
/// release path.
#[derive(Debug)]
pub struct Plan {
    engine: Option<engine::EnginePlan>,
    fingerprint: PlanFingerprint,
    /// (base address, liveness generation) of each bound buffer.
    bound: [(usize, u64); 2],
}

fn check_c2c_dims(input: &[usize], output: &[usize]) -> Result<()> {
    if input != output {
        return Err(PlanError::ShapeMismatch {
            input: input.to_vec(),
            output: output.to_vec(),
        });
    }
    if let Some(dim) = input.iter().position(|&n| n == 0) {
        return Err(PlanError::ZeroDim { dim });
    }
    Ok(())
}

impl Plan {
    /// 1-D complex-to-complex plan over `input.len()` elements.
    ///
    /// # Errors
    /// [`PlanError::ShapeMismatch`] if the buffer lengths differ;
    /// [`PlanError::ZeroDim`] on empty buffers.
    ///
    /// # Safety
    /// `input` and `output` must stay allocated for the plan's entire
    /// executable lifetime (buffer-outlives-plan).
    pub unsafe fn dft_1d(
        input: &mut AlignedVec<Complex64>,
        output: &mut AlignedVec<Complex64>,
        direction: Direction,
        flag: Flag,
    ) -> Result<Self> {
        check_c2c_dims(&[input.len()], &[output.len()])?;
        let dims = vec![input.len()];
        let engine = engine::plan_c2c(dims.clone(), input.as_ptr(), output.as_mut_ptr(), direction);
        Self::finish(
            engine,
            dims,
            flag,
            input.as_ptr() as usize,
            output.as_ptr() as usize,
        )
    }

    /// 2-D complex-to-complex plan; input and output dims must match.
    ///
    /// # Errors
    /// [`PlanError::ShapeMismatch`] on differing dims;
    /// [`PlanError::ZeroDim`] on any zero-length dimension.
    ///
    /// # Safety
    /// `input` and `output` must stay allocated for the plan's entire
    /// executable lifetime (buffer-outlives-plan).
    pub unsafe fn dft_2d(
        input: &mut AlignedArray<Complex64, 2>,
        output: &mut AlignedArray<Complex64, 2>,
        direction: Direction,
        flag: Flag,
    ) -> Result<Self> {
        check_c2c_dims(input.dims(), output.dims())?;
        let dims = input.dims().to_vec();
        let engine = engine::plan_c2c(dims.clone(), input.as_ptr(), output.as_mut_ptr(), direction);
        Self::finish(
            engine,
            dims,
            flag,
            input.as_ptr() as usize,
            output.as_ptr() as usize,
        )
    }

    /// 3-D complex-to-complex plan; input and output dims must match.
    ///
    /// # Errors
    /// [`PlanError::ShapeMismatch`] on differing dims;
    /// [`PlanError::ZeroDim`] on any zero-length dimension.
    ///
    /// # Safety
    /// `input` and `output` must stay allocated for the plan's entire
    /// executable lifetime (buffer-outlives-plan).
    pub unsafe fn dft_3d(
        input: &mut AlignedArray<Complex64, 3>,
        output: &mut AlignedArray<Complex64, 3>,
        direction: Direction,
        flag: Flag,
    ) -> Result<Self> {
        check_c2c_dims(input.dims(), output.dims())?;
        let dims = input.dims().to_vec();
        let engine = engine::plan_c2c(dims.clone(), input.as_ptr(), output.as_mut_ptr(), direction);
        Self::finish(
            engine,
            dims,
            flag,
            input.as_ptr() as usize,
            output.as_ptr() as usize,
        )
    }

    /// 1-D real-to-complex plan: `n` real samples in, `n/2 + 1` complex bins
    /// out (the non-redundant half-spectrum; the full spectrum is Hermitian
    /// and reconstructible from it). Forward only.
    ///
    /// # Errors
    /// [`PlanError::ZeroDim`] on an empty input;
    /// [`PlanError::ShapeMismatch`] unless `output.len() == input.len()/2 + 1`.
    ///
    /// # Safety
    /// `input` and `output` must stay allocated for the plan's entire
    /// executable lifetime (buffer-outlives-plan).
    pub unsafe fn dft_r2c_1d(
        input: &mut AlignedVec<f64>,
        output: &mut AlignedVec<Complex64>,
        flag: Flag,
    ) -> Result<Self> {
        let n = input.len();
        if n == 0 {
            return Err(PlanError::ZeroDim { dim: 0 });
        }
        if output.len() != n / 2 + 1 {
            return Err(PlanError::ShapeMismatch {
                input: vec![n],
                output: vec![output.len()],
            });
        }
        let engine = engine::plan_r2c(n, input.as_ptr(), output.as_mut_ptr());
        Self::finish(
            engine,
            vec![n],
            flag,
            input.as_ptr() as usize,
            output.as_ptr() as usize,
        )
    }

    /// 1-D complex-to-real plan: `n/2 + 1` complex bins in, `n` real samples
    /// out.
    ///
    /// **Destructive**: executing this plan overwrites the input spectrum —
    /// the engine uses the input buffer as workspace.
    ///
    /// # Errors
    /// [`PlanError::ZeroDim`] on an empty output;
    /// [`PlanError::ShapeMismatch`] unless `input.len() == output.len()/2 + 1`.
    ///
    /// # Safety
    /// `input` and `output` must stay allocated for the plan's entire
    /// executable lifetime (buffer-outlives-plan).
    pub unsafe fn dft_c2r_1d(
        input: &mut AlignedVec<Complex64>,
        output: &mut AlignedVec<f64>,
        flag: Flag,
    ) -> Result<Self> {
        let n = output.len();
        if n == 0 {
            return Err(PlanError::ZeroDim { dim: 0 });
        }
        if input.len() != n / 2 + 1 {
            return Err(PlanError::ShapeMismatch {
                input: vec![input.len()],
                output: vec![n],
            });
        }
        let engine = engine::plan_c2r(n, input.as_mut_ptr(), output.as_mut_ptr());
        Self::finish(
            engine,
            vec![n],
            flag,
            input.as_ptr() as usize,
            output.as_ptr() as usize,
        )
    }

    fn finish(
        engine: engine::EnginePlan,
        dims: Vec<usize>,
        flag: Flag,
        input_addr: usize,
        output_addr: usize,
    ) -> Result<Self> {
        let fingerprint = PlanFingerprint {
            flag,
            estimated_flops: estimate_flops(&dims),
            scratch_bytes: engine.scratch_bytes(),
            dims,
            measured_ns: None,
        };
        let mut plan = Self {
            engine: Some(engine),
            fingerprint,
            bound: [
                (input_addr, registry::generation_of(input_addr).unwrap_or(0)),
                (
                    output_addr,
                    registry::generation_of(output_addr).unwrap_or(0),
                ),
            ],
        };
        if flag == Flag::Measure {
            plan.measure()?;
        }
        Ok(plan)
    }

    /// Time trial executions and record the best observed run.
    fn measure(&mut self) -> Result<()> {
        let Some(engine) = self.engine.as_mut() else {
            return Err(PlanError::PlanDestroyed);
        };
        let mut best = u64::MAX;
        for _ in 0..MEASURE_TRIALS {
            let start = Instant::now();
            // SAFETY: measurement runs inside plan creation, while the
            // constructor's borrows of both buffers are still in force.
            unsafe { engine.execute_trial()? };
            best = best.min(start.elapsed().as_nanos() as u64);
        }
        self.fingerprint.measured_ns = Some(best);
        Ok(())
    }

    /// Run the bound transform once, synchronously.
    ///
    /// Each call re-reads the bound input and re-writes the bound output; no
    /// buffers are passed at execution time.
    ///
    /// # Errors
    /// [`PlanError::PlanDestroyed`] if the plan was destroyed;
    /// [`PlanError::BufferFreed`] (debug builds) if a bound buffer no longer
    /// exists; [`PlanError::Engine`] if the engine rejects the execution.
    pub fn execute(&mut self) -> Result<()> {
        let Some(engine) = self.engine.as_mut() else {
            return Err(PlanError::PlanDestroyed);
        };
        if cfg!(debug_assertions) {
            for &(addr, generation) in &self.bound {
                if !registry::is_live(addr, generation) {
                    return Err(PlanError::BufferFreed { addr });
                }
            }
        }
        // SAFETY: the constructor's contract obliges the caller to keep every
        // bound buffer allocated while the plan exists.
        unsafe { engine.execute() }
    }

    /// Release the engine resources. Further calls to [`execute`](Plan::execute)
    /// or `destroy` return [`PlanError::PlanDestroyed`].
    pub fn destroy(&mut self) -> Result<()> {
        match self.engine.take() {
            Some(_) => Ok(()),
            None => Err(PlanError::PlanDestroyed),
        }
    }

    /// Whether the engine resources have been released.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.engine.is_none()
    }

    /// Strategy-selection record for this plan.
    #[must_use]
    pub fn fingerprint(&self) -> &PlanFingerprint {
        &self.fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, Flag, Plan};
    use crate::{alloc_1d, alloc_2d, alloc_real_1d, PlanError};
    use num_complex::Complex64;

    #[test]
    fn engine_value_mapping_is_fixed() {
        assert_eq!(Direction::Forward.engine_value(), -1);
        assert_eq!(Direction::Backward.engine_value(), 1);
        assert_eq!(Flag::Estimate.engine_value(), 64);
        assert_eq!(Flag::Measure.engine_value(), 0);
    }

    #[test]
    fn mismatched_lengths_fail_before_the_engine() {
        let mut input = alloc_1d(8);
        let mut output = alloc_1d(9);
        let err = unsafe { Plan::dft_1d(&mut input, &mut output, Direction::Forward, Flag::Estimate) }
            .unwrap_err();
        assert!(matches!(err, PlanError::ShapeMismatch { .. }));
    }

    #[test]
    fn zero_dims_fail_before_the_engine() {
        let mut input = alloc_1d(0);
        let mut output = alloc_1d(0);
        let err = unsafe { Plan::dft_1d(&mut input, &mut output, Direction::Forward, Flag::Estimate) }
            .unwrap_err();
        assert!(matches!(err, PlanError::ZeroDim { dim: 0 }));

        let mut input = alloc_2d(4, 0);
        let mut output = alloc_2d(4, 0);
        let err = unsafe { Plan::dft_2d(&mut input, &mut output, Direction::Forward, Flag::Estimate) }
            .unwrap_err();
        assert!(matches!(err, PlanError::ZeroDim { dim: 1 }));
    }

    #[test]
    fn r2c_requires_half_spectrum_output() {
        let mut input = alloc_real_1d(8);
        let mut output = alloc_1d(8);
        let err = unsafe { Plan::dft_r2c_1d(&mut input, &mut output, Flag::Estimate) }.unwrap_err();
        assert!(matches!(err, PlanError::ShapeMismatch { .. }));

        let mut output = alloc_1d(5);
        assert!(unsafe { Plan::dft_r2c_1d(&mut input, &mut output, Flag::Estimate) }.is_ok());
    }

    #[test]
    fn c2r_requires_half_spectrum_input() {
        let mut input = alloc_1d(8);
        let mut output = alloc_real_1d(8);
        let err = unsafe { Plan::dft_c2r_1d(&mut input, &mut output, Flag::Estimate) }.unwrap_err();
        assert!(matches!(err, PlanError::ShapeMismatch { .. }));
    }

    #[test]
    fn execute_after_destroy_is_an_error() {
        let mut input = alloc_1d(4);
        let mut output = alloc_1d(4);
        let mut plan =
            unsafe { Plan::dft_1d(&mut input, &mut output, Direction::Forward, Flag::Estimate) }
                .unwrap();
        plan.execute().unwrap();
        plan.destroy().unwrap();
        assert!(plan.is_destroyed());
        assert!(matches!(plan.execute(), Err(PlanError::PlanDestroyed)));
        assert!(matches!(plan.destroy(), Err(PlanError::PlanDestroyed)));
    }

    #[test]
    fn repeated_execution_is_deterministic() {
        let mut input = alloc_1d(16);
        let mut output = alloc_1d(16);
        for (i, x) in input.iter_mut().enumerate() {
            *x = Complex64::new(i as f64, -(i as f64) / 3.0);
        }
        let mut plan =
            unsafe { Plan::dft_1d(&mut input, &mut output, Direction::Forward, Flag::Estimate) }
                .unwrap();
        plan.execute().unwrap();
        let first: Vec<Complex64> = output.to_vec();
        plan.execute().unwrap();
        assert_eq!(&first[..], &output[..]);
    }

    #[test]
    fn estimate_fingerprint_is_analytic() {
        let mut input = alloc_1d(64);
        let mut output = alloc_1d(64);
        let plan =
            unsafe { Plan::dft_1d(&mut input, &mut output, Direction::Forward, Flag::Estimate) }
                .unwrap();
        let fp = plan.fingerprint();
        assert_eq!(fp.flag, Flag::Estimate);
        assert_eq!(fp.dims, vec![64]);
        assert_eq!(fp.estimated_flops, 5 * 64 * 6);
        assert_eq!(fp.measured_ns, None);
    }

    #[test]
    fn measure_fingerprint_records_a_trial_time() {
        let mut input = alloc_1d(64);
        let mut output = alloc_1d(64);
        let plan =
            unsafe { Plan::dft_1d(&mut input, &mut output, Direction::Forward, Flag::Measure) }
                .unwrap();
        assert!(plan.fingerprint().measured_ns.is_some());
    }

    #[test]
    fn estimate_creation_leaves_input_untouched() {
        let mut input = alloc_1d(32);
        let mut output = alloc_1d(32);
        for (i, x) in input.iter_mut().enumerate() {
            *x = Complex64::new(i as f64, 0.0);
        }
        let snapshot: Vec<Complex64> = input.to_vec();
        let _plan =
            unsafe { Plan::dft_1d(&mut input, &mut output, Direction::Forward, Flag::Estimate) }
                .unwrap();
        assert_eq!(&snapshot[..], &input[..]);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn freeing_a_bound_buffer_is_detected() {
        let mut input = alloc_1d(8);
        let mut output = alloc_1d(8);
        let mut plan =
            unsafe { Plan::dft_1d(&mut input, &mut output, Direction::Forward, Flag::Estimate) }
                .unwrap();
        plan.execute().unwrap();
        drop(input);
        let err = plan.execute().unwrap_err();
        assert!(matches!(err, PlanError::BufferFreed { .. }));
    }
}
