//! FFT peak detection
//!
//! After dechirping, a symbol is a complex tone and detection reduces to
//! `argmax |FFT(input)|`. This module runs the transform and scans the
//! spectrum, reporting the winning bin together with power figures and a
//! sub-bin refinement:
//!
//! - **power / power_avg**: fundamental and residual-noise levels in dB,
//!   both referred to the FFT gain (`20·log10 N`), so a full-scale tone
//!   detects near 0 dB regardless of spreading factor.
//! - **f_index**: parabolic interpolation over the cyclic neighbours of the
//!   peak, `0.5·(R-L)/(2F-R-L)`, giving the peak position to a fraction of
//!   a bin. Used by the preamble estimator for fine CFO.
//!
//! Tie-break is contractual: when several bins share the maximum squared
//! magnitude, the lowest index wins (the scan updates on strictly greater
//! values only). Downstream synchronization depends on this determinism.

use crate::fft::FftPlan;
use crate::types::{IQSample, Scalar};

/// Result of one detection pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detection {
    /// Bin with the greatest squared magnitude; lowest index on ties.
    pub index: usize,
    /// Fundamental power in dB relative to FFT gain.
    pub power: Scalar,
    /// Residual (all bins minus the peak) power in dB relative to FFT gain.
    pub power_avg: Scalar,
    /// Sub-bin peak offset from parabolic interpolation, in bins.
    pub f_index: Scalar,
}

/// Transform `fft_in` through `plan` into `fft_out` and locate the peak bin.
///
/// Both buffers must hold at least `plan.nfft()` samples. On return
/// `fft_out` holds the spectrum, so callers may read the winning bin's
/// complex value at `fft_out[detection.index]`.
pub fn detect(plan: &FftPlan, fft_in: &[IQSample], fft_out: &mut [IQSample]) -> Detection {
    plan.transform(fft_in, fft_out);
    let n = plan.nfft();

    let mut max_index = 0usize;
    let mut max_value: Scalar = 0.0;
    let mut total: f64 = 0.0;
    for (i, bin) in fft_out[..n].iter().enumerate() {
        let mag2 = bin.re * bin.re + bin.im * bin.im;
        total += f64::from(mag2);
        if mag2 > max_value {
            max_index = i;
            max_value = mag2;
        }
    }

    let fundamental = max_value.sqrt();
    let noise = ((total - f64::from(max_value)) as Scalar).sqrt();
    let power_scale = 20.0 * (n as Scalar).log10();
    let power = 20.0 * fundamental.log10() - power_scale;
    let power_avg = 20.0 * noise.log10() - power_scale;

    let left = fft_out[if max_index > 0 { max_index - 1 } else { n - 1 }].norm();
    let right = fft_out[if max_index < n - 1 { max_index + 1 } else { 0 }].norm();

    let denom = 2.0 * f64::from(fundamental) - f64::from(right) - f64::from(left);
    let f_index = if denom == 0.0 {
        0.0
    } else {
        (0.5 * (f64::from(right) - f64::from(left)) / denom) as Scalar
    };

    Detection {
        index: max_index,
        power,
        power_avg,
        f_index,
    }
}
