//! Chirp signal generation
//!
//! This module implements the chirp synthesis at the heart of the Chirp
//! Spread Spectrum modulation.
//!
//! ## What is a chirp?
//!
//! A signal whose instantaneous frequency sweeps linearly through the
//! passband once per symbol:
//!
//! ```text
//! Frequency
//!     ^
//! fmax|        ___/
//!     |     __/
//!     |  __/
//! fmin|_/
//!     +----------> Time
//!       Upchirp
//!
//! Frequency
//!     ^
//! fmax|\_
//!     |  \__
//!     |     \__
//! fmin|        \___
//!     +----------> Time
//!       Downchirp
//! ```
//!
//! A symbol value offsets the sweep's starting frequency; when the sweep
//! runs past the top of the passband it wraps back to the bottom, so every
//! symbol occupies the full bandwidth.
//!
//! ## Incremental phase accumulation
//!
//! Rather than evaluating the quadratic phase polynomial at each sample,
//! the generator integrates the instantaneous frequency into a running
//! phase accumulator:
//!
//! ```text
//! f += fStep;  wrap f into [fMin, fMax];  phase ± f;  emit ampl·e^(j·phase)
//! ```
//!
//! The accumulator lives inside the generator, so consecutive chirps in a
//! burst are phase-continuous - preamble, sync and data symbols join with
//! no discontinuity however long the burst runs. After every chirp the
//! phase is reduced modulo 2π with a floor so the accumulator never drifts
//! more than one cycle from the representable range.
//!
//! Frequency and phase accumulate in `f64`: at SF12 a symbol integrates
//! 4096 frequency steps, and single-precision accumulation drifts by
//! whole sample magnitudes over a split burst. Emitted samples are `f32`
//! like everything else in the modem.

use std::f64::consts::PI;

use crate::types::{IQSample, Scalar};

/// Sweep direction of a generated chirp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChirpDirection {
    /// Frequency rises through the passband.
    Up,
    /// Frequency falls; the conjugate reference used for dechirping.
    Down,
}

/// Incremental-phase chirp generator.
///
/// One generator per burst: every call to [`generate`](Self::generate)
/// continues from the phase where the previous call stopped.
#[derive(Debug, Clone)]
pub struct ChirpGenerator {
    n: usize,
    osr: usize,
    bw_scale: f64,
    phase: f64,
}

impl ChirpGenerator {
    /// Create a generator for symbols of `n` chips at oversampling ratio
    /// `osr`, with the sweep-rate scale of the configured bandwidth
    /// (1.0 for 125 kHz).
    pub fn new(n: usize, osr: usize, bw_scale: Scalar) -> Self {
        Self {
            n,
            osr,
            bw_scale: f64::from(bw_scale),
            phase: 0.0,
        }
    }

    /// Current value of the phase accumulator, in radians.
    pub fn phase(&self) -> Scalar {
        self.phase as Scalar
    }

    /// Zero the phase accumulator, starting a new burst.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Generate `out.len()` chirp samples into `out`.
    ///
    /// `f0` is the starting frequency offset in radians per sample (zero for
    /// a base chirp; `2π·s/(N·osr)` places symbol `s` on the detector's bin
    /// grid). The amplitude is applied as given; negative values invert the
    /// phase. Returns the number of samples written.
    pub fn generate(
        &mut self,
        out: &mut [IQSample],
        f0: Scalar,
        direction: ChirpDirection,
        ampl: Scalar,
    ) -> usize {
        let f_min = -PI * self.bw_scale / self.osr as f64;
        let f_max = PI * self.bw_scale / self.osr as f64;
        let f_step = (2.0 * PI * self.bw_scale) / (self.n * self.osr * self.osr) as f64;
        let ampl = f64::from(ampl);

        let mut f = f_min + f64::from(f0);
        match direction {
            ChirpDirection::Down => {
                for samp in out.iter_mut() {
                    f += f_step;
                    if f > f_max {
                        f -= f_max - f_min;
                    }
                    self.phase -= f;
                    *samp = IQSample::new(
                        (ampl * self.phase.cos()) as Scalar,
                        (ampl * self.phase.sin()) as Scalar,
                    );
                }
            }
            ChirpDirection::Up => {
                for samp in out.iter_mut() {
                    f += f_step;
                    if f > f_max {
                        f -= f_max - f_min;
                    }
                    self.phase += f;
                    *samp = IQSample::new(
                        (ampl * self.phase.cos()) as Scalar,
                        (ampl * self.phase.sin()) as Scalar,
                    );
                }
            }
        }

        // Keep the accumulator within one cycle so long bursts never lose
        // precision to a growing phase magnitude.
        self.phase -= (self.phase / (2.0 * PI)).floor() * (2.0 * PI);
        out.len()
    }
}
