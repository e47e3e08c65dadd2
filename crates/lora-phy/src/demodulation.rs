//! Burst demodulation
//!
//! The receive side runs four strictly sequential phases per call, with no
//! state retained between calls beyond the metrics snapshot:
//!
//! ```text
//! I/Q burst
//!    │
//!    ▼
//! ┌───────────────┐  peak |re|/|im| > 1? rescale into caller scratch
//! │  Normalize    │  (fails OutOfRange when scratch is absent/short)
//! └───────────────┘
//!    │
//!    ▼
//! ┌───────────────┐  two preamble symbols × osr timing offsets:
//! │  Estimate     │  dechirp, detect, keep the strongest window;
//! │  CFO / TO     │  coarse CFO from the mean peak bin, fine CFO from
//! └───────────────┘  the peak's phase advance between the two symbols
//!    │
//!    ▼
//! ┌───────────────┐  per symbol: fresh reference downchirp × input ×
//! │  Compensate   │  e^{j(start + rate·i)} with the estimated offsets,
//! │  + Detect     │  then FFT argmax
//! └───────────────┘
//!    │
//!    ▼
//! sync word + symbol indices
//! ```
//!
//! ## Estimator notes
//!
//! The preamble window is the burst's two sync chirps. Dechirped, each is a
//! tone whose bin is the sync nibble on the symbol grid; the detected bin
//! average therefore mixes the (known) sync position with any real carrier
//! offset. Bins in the upper half of the spectrum are negative frequency
//! aliases, so the coarse term wraps to the signed range before scaling -
//! otherwise a high sync nibble would be "compensated" by over half a bin
//! and drag every later detection off its grid point.
//!
//! The timing estimate combines the winning oversample offset with the
//! fractional-bin correction scaled by `N·osr`. Exactly this arithmetic
//! (including its sign convention) is what the round-trip suite validates;
//! resist the urge to simplify it.

use std::f32::consts::PI;

use crate::chirp::{ChirpDirection, ChirpGenerator};
use crate::detector::detect;
use crate::fft::FftPlan;
use crate::types::{IQSample, PhyError, PhyResult, Scalar, Symbol};
use crate::workspace::Metrics;

/// Joint carrier-frequency / timing estimate from a preamble span.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetEstimate {
    /// Carrier frequency offset, normalized (bins of the N-point grid / N).
    pub cfo: Scalar,
    /// Timing offset in fractional samples.
    pub time_offset: Scalar,
}

/// Wrap a phase difference into (-π, π].
fn wrap_phase(mut d: Scalar) -> Scalar {
    while d > PI {
        d -= 2.0 * PI;
    }
    while d < -PI {
        d += 2.0 * PI;
    }
    d
}

/// Run the joint estimator over `symbols` whole symbols of `input`.
///
/// For every symbol and every oversample offset the window is detected and
/// the strongest `(t, index)` kept - lower index on power ties, which keeps
/// the estimate deterministic when bins tie exactly. When `dechirp_bw_scale`
/// is set, each window is first multiplied by a freshly generated unit
/// downchirp (the demodulator's internal dechirp); `None` expects the caller
/// to have dechirped already.
#[allow(clippy::too_many_arguments)]
pub fn estimate_span(
    plan: &FftPlan,
    fft_in: &mut [IQSample],
    fft_out: &mut [IQSample],
    window: Option<&[Scalar]>,
    input: &[IQSample],
    n: usize,
    osr: usize,
    symbols: usize,
    dechirp_bw_scale: Option<Scalar>,
) -> OffsetEstimate {
    let step = n * osr;

    let mut sum_index: Scalar = 0.0;
    let mut phase_diff: Scalar = 0.0;
    let mut prev_phase: Scalar = 0.0;
    let mut have_prev = false;
    let mut sum_t: usize = 0;

    for s in 0..symbols {
        let sym = &input[s * step..];
        let mut best_power: Scalar = -1e30;
        let mut best_index = 0usize;
        let mut best_f_index: Scalar = 0.0;
        let mut best_t = 0usize;
        let mut best_bin = IQSample::new(0.0, 0.0);

        for t in 0..osr {
            if let Some(bw_scale) = dechirp_bw_scale {
                let mut gen = ChirpGenerator::new(n, 1, bw_scale);
                gen.generate(&mut fft_out[..n], 0.0, ChirpDirection::Down, 1.0);
            }
            for i in 0..n {
                let mut samp = sym[t + i * osr];
                if dechirp_bw_scale.is_some() {
                    samp *= fft_out[i];
                }
                if let Some(w) = window {
                    samp *= w[i];
                }
                fft_in[i] = samp;
            }

            let det = detect(plan, fft_in, fft_out);
            if det.power > best_power || (det.power == best_power && det.index < best_index) {
                best_power = det.power;
                best_index = det.index;
                best_f_index = det.f_index;
                best_t = t;
                best_bin = fft_out[det.index];
            }
        }

        sum_t += best_t;
        sum_index += best_index as Scalar + best_f_index;
        let phase = best_bin.arg();
        if have_prev {
            phase_diff += wrap_phase(phase - prev_phase);
        }
        prev_phase = phase;
        have_prev = true;
    }

    let avg_index = sum_index / symbols as Scalar;
    // Upper-half bins are negative-frequency aliases.
    let signed_index = if avg_index > n as Scalar / 2.0 {
        avg_index - n as Scalar
    } else {
        avg_index
    };
    let cfo_coarse = signed_index / n as Scalar;
    let cfo_fine = if symbols > 1 {
        (phase_diff / (symbols - 1) as Scalar) / (2.0 * PI * n as Scalar)
    } else {
        0.0
    };

    let frac = avg_index - (avg_index + 0.5).floor();
    let avg_t = sum_t as Scalar / symbols as Scalar;

    OffsetEstimate {
        cfo: cfo_coarse + cfo_fine,
        time_offset: avg_t - frac * n as Scalar * osr as Scalar,
    }
}

/// Buffers a demodulation call borrows from the workspace.
pub struct DemodBuffers<'w> {
    pub plan: &'w FftPlan,
    pub fft_in: &'w mut [IQSample],
    pub fft_out: &'w mut [IQSample],
    pub window: Option<&'w [Scalar]>,
    pub scratch: Option<&'w mut [IQSample]>,
}

/// Demodulate a burst of `input` into `out` symbols.
///
/// Returns the emitted symbol count and the recovered sync word. See the
/// module docs for phase structure; error contract:
/// `InvalidArg` when the sample count is not a whole number of symbols,
/// `OutOfRange` when there are fewer than two symbols, when `out` is too
/// small, or when normalization is needed and no adequate scratch exists.
pub fn demodulate_burst(
    bufs: DemodBuffers<'_>,
    input: &[IQSample],
    out: &mut [Symbol],
    n: usize,
    osr: usize,
    bw_scale: Scalar,
    metrics: &mut Metrics,
) -> PhyResult<(usize, u8)> {
    let step = n * osr;
    if step == 0 || input.len() % step != 0 {
        return Err(PhyError::InvalidArg);
    }
    let total = input.len() / step;
    if total < 2 {
        return Err(PhyError::OutOfRange);
    }
    let emitted = total - 2;
    if emitted > out.len() {
        return Err(PhyError::OutOfRange);
    }

    let DemodBuffers {
        plan,
        fft_in,
        fft_out,
        window,
        scratch,
    } = bufs;

    // Phase 1: bring inputs into the canonical [-1, 1] range.
    let mut max_amp: Scalar = 0.0;
    for samp in input {
        let m = samp.re.abs().max(samp.im.abs());
        if m > max_amp {
            max_amp = m;
        }
    }
    let effective: &[IQSample] = if max_amp > 1.0 {
        let scratch = match scratch {
            Some(s) if s.len() >= input.len() => s,
            _ => return Err(PhyError::OutOfRange),
        };
        let scale = 1.0 / max_amp;
        for (dst, src) in scratch.iter_mut().zip(input.iter()) {
            *dst = src * scale;
        }
        // Release the unique borrow; the rest of the call only reads.
        let scratch: &[IQSample] = scratch;
        &scratch[..input.len()]
    } else {
        input
    };

    // Phase 2: joint CFO/TO estimate over the two sync symbols.
    let est = estimate_span(
        plan,
        fft_in,
        fft_out,
        window,
        &effective[..2 * step],
        n,
        osr,
        2,
        Some(bw_scale),
    );
    metrics.cfo = est.cfo;
    metrics.time_offset = est.time_offset;

    // Phase 3: compensated per-symbol detection.
    let t_off = est.time_offset.round() as i32;
    let rate = -2.0 * PI * est.cfo / n as Scalar;

    let mut sw0: Symbol = 0;
    let mut sw1: Symbol = 0;
    let mut out_idx = 0usize;

    for s in 0..total {
        let mut gen = ChirpGenerator::new(n, 1, bw_scale);
        gen.generate(&mut fft_out[..n], 0.0, ChirpDirection::Down, 1.0);

        let mut base = s * step;
        if t_off > 0 {
            let off = t_off as usize;
            if base + off + step <= effective.len() {
                base += off;
            }
        } else if t_off < 0 {
            let off = (-t_off) as usize;
            if off <= base {
                base -= off;
            }
        }

        let sym = &effective[base..];
        let start = rate * ((s * n) as Scalar + t_off as Scalar / osr as Scalar);
        for i in 0..n {
            let ph = start + rate * i as Scalar;
            let mut samp = sym[i * osr] * fft_out[i] * IQSample::new(ph.cos(), ph.sin());
            if let Some(w) = window {
                samp *= w[i];
            }
            fft_in[i] = samp;
        }

        let det = detect(plan, fft_in, fft_out);
        match s {
            0 => sw0 = det.index as Symbol,
            1 => sw1 = det.index as Symbol,
            _ => {
                out[out_idx] = det.index as Symbol;
                out_idx += 1;
            }
        }
    }

    let sf = n.trailing_zeros() as usize;
    let shift = sf.saturating_sub(4);
    let sync = (((sw0 >> shift) & 0x0F) << 4 | ((sw1 >> shift) & 0x0F)) as u8;

    Ok((out_idx, sync))
}

/// Rotate `samples` by the estimated CFO and shift them by the estimated
/// timing offset, in place, zero-filling the vacated edge.
pub fn compensate_span(
    samples: &mut [IQSample],
    n: usize,
    osr: usize,
    metrics: &Metrics,
) {
    if samples.is_empty() {
        return;
    }

    let rate = -2.0 * PI * metrics.cfo / (n as Scalar * osr as Scalar);
    for (i, samp) in samples.iter_mut().enumerate() {
        let ph = rate * i as Scalar;
        *samp *= IQSample::new(ph.cos(), ph.sin());
    }

    let offset = metrics.time_offset.round() as i64;
    let len = samples.len();
    if offset > 0 && (offset as usize) < len {
        let off = offset as usize;
        for i in (off..len).rev() {
            samples[i] = samples[i - off];
        }
        for samp in samples[..off].iter_mut() {
            *samp = IQSample::new(0.0, 0.0);
        }
    } else if offset < 0 && ((-offset) as usize) < len {
        let off = (-offset) as usize;
        for i in 0..len - off {
            samples[i] = samples[i + off];
        }
        for samp in samples[len - off..].iter_mut() {
            *samp = IQSample::new(0.0, 0.0);
        }
    }
}
