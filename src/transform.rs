//! One-shot transform conveniences.
//!
//! Each function composes "create plan, execute once"; the plan is released
//! deterministically when it goes out of scope at the end of the call, so a
//! tight loop of one-shots never holds more than one engine plan alive.
//! Callers transforming many same-shaped signals should create a [`Plan`]
//! once and reuse it instead: planning cost dominates these helpers.

use num_complex::Complex64;

use crate::alloc::AlignedVec;
use crate::plan::{Direction, Flag, Plan};
use crate::view::AlignedArray;
use crate::Result;

/// Transform `input` into `output` once (1-D complex-to-complex).
pub fn dft_1d(
    input: &mut AlignedVec<Complex64>,
    output: &mut AlignedVec<Complex64>,
    direction: Direction,
    flag: Flag,
) -> Result<()> {
    // SAFETY: both buffers are borrowed for the whole call, and the plan is
    // dropped before the borrows end.
    let mut plan = unsafe { Plan::dft_1d(input, output, direction, flag) }?;
    plan.execute()
}

/// Transform `input` into `output` once (2-D complex-to-complex).
pub fn dft_2d(
    input: &mut AlignedArray<Complex64, 2>,
    output: &mut AlignedArray<Complex64, 2>,
    direction: Direction,
    flag: Flag,
) -> Result<()> {
    // SAFETY: as in dft_1d.
    let mut plan = unsafe { Plan::dft_2d(input, output, direction, flag) }?;
    plan.execute()
}

/// Transform `input` into `output` once (3-D complex-to-complex).
pub fn dft_3d(
    input: &mut AlignedArray<Complex64, 3>,
    output: &mut AlignedArray<Complex64, 3>,
    direction: Direction,
    flag: Flag,
) -> Result<()> {
    // SAFETY: as in dft_1d.
    let mut plan = unsafe { Plan::dft_3d(input, output, direction, flag) }?;
    plan.execute()
}

/// Forward-transform `n` real samples into the `n/2 + 1` half-spectrum.
pub fn dft_r2c_1d(
    input: &mut AlignedVec<f64>,
    output: &mut AlignedVec<Complex64>,
    flag: Flag,
) -> Result<()> {
    // SAFETY: as in dft_1d.
    let mut plan = unsafe { Plan::dft_r2c_1d(input, output, flag) }?;
    plan.execute()
}

/// Transform a `n/2 + 1` half-spectrum into `n` real samples.
///
/// Destructive: `input` is overwritten during execution.
pub fn dft_c2r_1d(
    input: &mut AlignedVec<Complex64>,
    output: &mut AlignedVec<f64>,
    flag: Flag,
) -> Result<()> {
    // SAFETY: as in dft_1d.
    let mut plan = unsafe { Plan::dft_c2r_1d(input, output, flag) }?;
    plan.execute()
}

#[cfg(test)]
mod tests {
    use super::{dft_1d, dft_c2r_1d, dft_r2c_1d};
    use crate::{alloc_1d, alloc_real_1d, Direction, Flag};
    use num_complex::Complex64;

    #[test]
    fn impulse_has_a_flat_spectrum() {
        let mut input = alloc_1d(4);
        let mut output = alloc_1d(4);
        input[0] = Complex64::new(1.0, 0.0);

        dft_1d(&mut input, &mut output, Direction::Forward, Flag::Estimate).unwrap();

        for bin in output.iter() {
            assert!((bin.re - 1.0).abs() < 1e-12);
            assert!(bin.im.abs() < 1e-12);
        }
    }

    #[test]
    fn half_spectrum_round_trip_scales_by_n() {
        let n = 8;
        let mut signal = alloc_real_1d(n);
        let mut spectrum = alloc_1d(n / 2 + 1);
        let mut restored = alloc_real_1d(n);
        for (i, x) in signal.iter_mut().enumerate() {
            *x = (i as f64).sin() + 0.5;
        }
        let original: Vec<f64> = signal.to_vec();

        dft_r2c_1d(&mut signal, &mut spectrum, Flag::Estimate).unwrap();
        dft_c2r_1d(&mut spectrum, &mut restored, Flag::Estimate).unwrap();

        for (x, y) in original.iter().zip(restored.iter()) {
            assert!((y / n as f64 - x).abs() < 1e-12);
        }
    }
}
