//! Caller-owned workspace and the public modem API
//!
//! The modem never allocates: every buffer a call touches is either borrowed
//! from the caller at initialisation or embedded in the workspace by value.
//! The [`Workspace`] therefore looks like this:
//!
//! ```text
//!            caller owns                      workspace owns (by value)
//!  ┌──────────────────────────────┐    ┌───────────────────────────────┐
//!  │ fft_in:  [IQSample; N]       │    │ forward + inverse FftPlan     │
//!  │ fft_out: [IQSample; N]       │◄───│ Metrics                       │
//!  │ window:  [f32; N]  (optional)│    │ osr, bw, sync word, window    │
//!  │ scratch: [IQSample] (opt.)   │    │ kind                          │
//!  └──────────────────────────────┘    └───────────────────────────────┘
//! ```
//!
//! All referenced buffers must outlive the workspace (the lifetime
//! parameter enforces it). A workspace is exclusively borrowed for the
//! duration of each call; distinct workspaces over distinct buffers may run
//! in parallel with no coordination. Plans and the filled window table are
//! read-only after `init`.
//!
//! The `scratch` buffer is only consulted when a demodulation input exceeds
//! the canonical [-1, 1] amplitude range and must be renormalised; sized
//! at least as large as the largest burst you intend to demodulate.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::coding;
use crate::crc::Sx1272Crc;
use crate::demodulation::{compensate_span, demodulate_burst, estimate_span, DemodBuffers};
use crate::fft::{FftDirection, FftPlan};
use crate::modulation::modulate_burst;
use crate::params::{Bandwidth, LoraParams, WindowKind};
use crate::types::{IQSample, PhyError, PhyResult, Scalar, Symbol};

/// Measurements collected by the most recent demodulate / estimate / decode
/// call. Overwritten wholesale by each of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Whether the last decoded block passed its CRC.
    pub crc_ok: bool,
    /// Estimated carrier frequency offset, normalized to the symbol grid.
    pub cfo: Scalar,
    /// Estimated timing offset in fractional samples.
    pub time_offset: Scalar,
}

/// Caller-owned buffers handed to [`Workspace::init`].
pub struct WorkspaceBuffers<'a> {
    /// Detector FFT input, at least `N` entries.
    pub fft_in: &'a mut [IQSample],
    /// Detector FFT output / downchirp scratch, at least `N` entries.
    pub fft_out: &'a mut [IQSample],
    /// Analysis window coefficients, at least `N` entries. Required when
    /// the configured window kind is not [`WindowKind::None`].
    pub window: Option<&'a mut [Scalar]>,
    /// Renormalisation scratch for demodulation inputs outside [-1, 1].
    pub scratch: Option<&'a mut [IQSample]>,
}

/// The modem workspace: borrowed buffers, embedded plans, configuration
/// copied at init.
pub struct Workspace<'a> {
    fft_in: &'a mut [IQSample],
    fft_out: &'a mut [IQSample],
    window: Option<&'a mut [Scalar]>,
    scratch: Option<&'a mut [IQSample]>,
    window_kind: WindowKind,
    plan_fwd: FftPlan,
    plan_inv: FftPlan,
    metrics: Metrics,
    n: usize,
    osr: usize,
    bw: Bandwidth,
    sync_word: u8,
}

impl<'a> Workspace<'a> {
    /// Validate `params`, fill the window table, build both FFT plans and
    /// return a ready workspace.
    ///
    /// Fails with `NoMemory` when a required buffer is absent or shorter
    /// than `N = 2^sf` (the window buffer is required only for a
    /// non-trivial window kind). Parameter validity is enforced by the
    /// types in [`LoraParams`]; plan construction reports `InvalidArg` for
    /// unsupported lengths.
    pub fn init(buffers: WorkspaceBuffers<'a>, params: &LoraParams) -> PhyResult<Self> {
        let n = params.sf.chips_per_symbol();
        let osr = params.osr.max(1);

        if buffers.fft_in.len() < n || buffers.fft_out.len() < n {
            return Err(PhyError::NoMemory);
        }

        let window = match (params.window, buffers.window) {
            (WindowKind::None, w) => w,
            (WindowKind::Hann, None) => return Err(PhyError::NoMemory),
            (WindowKind::Hann, Some(w)) => {
                if w.len() < n {
                    return Err(PhyError::NoMemory);
                }
                Some(w)
            }
        };

        let plan_fwd = FftPlan::new(n, FftDirection::Forward)?;
        let plan_inv = FftPlan::new(n, FftDirection::Inverse)?;

        let mut ws = Workspace {
            fft_in: buffers.fft_in,
            fft_out: buffers.fft_out,
            window,
            scratch: buffers.scratch,
            window_kind: params.window,
            plan_fwd,
            plan_inv,
            metrics: Metrics::default(),
            n,
            osr,
            bw: params.bw,
            sync_word: params.sync_word,
        };

        if let Some(w) = ws.window.as_deref_mut() {
            let len = n.min(w.len());
            match ws.window_kind {
                WindowKind::Hann => {
                    for (i, coeff) in w[..len].iter_mut().enumerate() {
                        *coeff =
                            0.5 - 0.5 * (2.0 * PI * i as Scalar / (n as Scalar - 1.0)).cos();
                    }
                }
                WindowKind::None => {
                    for coeff in w[..len].iter_mut() {
                        *coeff = 1.0;
                    }
                }
            }
        }

        tracing::debug!(
            sf = ws.n.trailing_zeros(),
            bw_hz = ws.bw.hz(),
            osr = ws.osr,
            sync_word = ws.sync_word,
            "workspace initialised"
        );

        Ok(ws)
    }

    /// Clear runtime metrics without touching buffers or plans.
    pub fn reset(&mut self) {
        self.metrics = Metrics::default();
    }

    /// Metrics from the last demodulate / estimate / decode call. The
    /// reference stays valid until the next call that updates them.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The configured sync word, replaced by the recovered one after each
    /// demodulate call.
    pub fn sync_word(&self) -> u8 {
        self.sync_word
    }

    /// Chips per symbol (`2^sf`), the detector FFT length.
    pub fn chips_per_symbol(&self) -> usize {
        self.n
    }

    /// Samples per symbol including oversampling.
    pub fn samples_per_symbol(&self) -> usize {
        self.n * self.osr
    }

    /// The forward detection plan (shareable, read-only).
    pub fn plan_forward(&self) -> &FftPlan {
        &self.plan_fwd
    }

    /// The inverse plan, for callers synthesizing time-domain references
    /// from spectra.
    pub fn plan_inverse(&self) -> &FftPlan {
        &self.plan_inv
    }

    /// Hamming-encode `payload` into `symbols` (two per byte).
    ///
    /// Fails with `OutOfRange` when `symbols` cannot hold `2 * len`
    /// entries; returns the symbol count.
    pub fn encode(&mut self, payload: &[u8], symbols: &mut [Symbol]) -> PhyResult<usize> {
        let needed = payload.len() * 2;
        if needed > symbols.len() {
            return Err(PhyError::OutOfRange);
        }
        Ok(coding::encode_symbols(payload, symbols))
    }

    /// Hamming-decode symbol pairs into `payload` and record the CRC
    /// verdict in the metrics.
    ///
    /// Odd symbol counts fail `InvalidArg`; insufficient payload capacity
    /// fails `OutOfRange`. When at least four bytes are produced, the last
    /// two are read as a little-endian CRC-16 over bytes `[2, len-2)` (the
    /// leading pair is assumed to be a MAC header and is excluded); the
    /// result lands in `metrics().crc_ok`, never in the return value.
    /// Shorter outputs leave `crc_ok` false.
    pub fn decode(&mut self, symbols: &[Symbol], payload: &mut [u8]) -> PhyResult<usize> {
        if symbols.len() % 2 != 0 {
            return Err(PhyError::InvalidArg);
        }
        let produced = symbols.len() / 2;
        if produced > payload.len() {
            return Err(PhyError::OutOfRange);
        }

        coding::decode_symbols(symbols, payload);

        if produced >= 4 {
            let data_len = produced - 4;
            let provided =
                u16::from(payload[produced - 2]) | (u16::from(payload[produced - 1]) << 8);
            let computed = Sx1272Crc::compute(&payload[2..2 + data_len]);
            self.metrics.crc_ok = provided == computed;
        } else {
            self.metrics.crc_ok = false;
        }

        Ok(produced)
    }

    /// Modulate `symbols` into `iq` at unit amplitude, prefixed by the two
    /// sync-word chirps.
    ///
    /// Fails with `OutOfRange` when `iq` cannot hold
    /// `(symbols.len() + 2) * N * osr` samples; returns the sample count.
    pub fn modulate(&mut self, symbols: &[Symbol], iq: &mut [IQSample]) -> PhyResult<usize> {
        modulate_burst(
            symbols,
            iq,
            self.n,
            self.osr,
            self.bw.scale(),
            1.0,
            self.sync_word,
        )
    }

    /// Demodulate an `iq` burst into `symbols`.
    ///
    /// The input length must be a whole number of oversampled symbols
    /// (`InvalidArg` otherwise) and at least two symbols long
    /// (`OutOfRange`). The first two symbols are consumed as the sync word,
    /// which replaces the workspace's configured word; the remaining
    /// detections are written to `symbols`. Inputs louder than the
    /// canonical [-1, 1] range are renormalised through the scratch buffer
    /// (`OutOfRange` when it is absent or too small). CFO and timing
    /// estimates land in the metrics. Returns the symbol count.
    pub fn demodulate(&mut self, iq: &[IQSample], symbols: &mut [Symbol]) -> PhyResult<usize> {
        let bufs = DemodBuffers {
            plan: &self.plan_fwd,
            fft_in: &mut *self.fft_in,
            fft_out: &mut *self.fft_out,
            window: match self.window_kind {
                WindowKind::None => None,
                WindowKind::Hann => self.window.as_deref(),
            },
            scratch: self.scratch.as_deref_mut(),
        };

        let (count, sync) = demodulate_burst(
            bufs,
            iq,
            symbols,
            self.n,
            self.osr,
            self.bw.scale(),
            &mut self.metrics,
        )?;
        self.sync_word = sync;
        Ok(count)
    }

    /// Estimate carrier-frequency and timing offsets from a span of
    /// already-dechirped preamble symbols, updating the metrics.
    ///
    /// The input must contain a whole number of symbols and typically
    /// points at preamble upchirps after reference-downchirp mixing;
    /// partial trailing symbols are ignored and an empty span leaves the
    /// metrics untouched. (Demodulation performs its own dechirp; this
    /// entry point serves callers running their own receive chain.)
    pub fn estimate_offsets(&mut self, samples: &[IQSample]) {
        let step = self.n * self.osr;
        let symbols = samples.len() / step;
        if symbols == 0 {
            return;
        }

        let est = estimate_span(
            &self.plan_fwd,
            self.fft_in,
            self.fft_out,
            match self.window_kind {
                WindowKind::None => None,
                WindowKind::Hann => self.window.as_deref(),
            },
            &samples[..symbols * step],
            self.n,
            self.osr,
            symbols,
            None,
        );
        self.metrics.cfo = est.cfo;
        self.metrics.time_offset = est.time_offset;
    }

    /// Apply the offsets currently held in the metrics to `samples` in
    /// place: rotate out the CFO, then shift by the rounded timing offset
    /// with zero fill.
    pub fn compensate_offsets(&self, samples: &mut [IQSample]) {
        compensate_span(samples, self.n, self.osr, &self.metrics);
    }
}
