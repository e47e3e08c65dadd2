//! Mixed-radix FFT over preallocated plans
//!
//! The detector's FFT is the inner loop of demodulation, so this engine is
//! built around two constraints:
//!
//! 1. **No allocation on the hot path.** A [`FftPlan`] carries every buffer a
//!    transform needs - twiddles and the factorization table - in fixed-size
//!    arrays sized for the largest supported symbol (SF12, 4096 bins). Plans
//!    are built once at workspace init and never touched again.
//! 2. **Arbitrary symbol lengths.** Spreading factors give power-of-two
//!    lengths, but the engine factorizes any `nfft` into radices
//!    {4, 2, 3, 5, ...}, with dedicated butterflies for the common radices
//!    and a generic fallback for the rest.
//!
//! ## Why FFT-based detection works
//!
//! Multiplying a received chirp by a reference downchirp collapses it into a
//! tone whose frequency encodes the transmitted symbol:
//!
//! ```text
//!     │ Received     │ Reference      │ Result:
//!     │   Chirp      │  Downchirp     │  Single Tone
//! f   │      /       │  \             │     |
//!     │    /         │    \           │     |
//!     │  /           │      \    =    │     |
//!     │/             │        \       │     |
//!     └──────────    └──────────      └─────┴───── f
//!                                          ^
//!                                     symbol bin
//! ```
//!
//! The transform here finds that tone. It computes the standard DFT for the
//! forward direction and the unnormalized inverse for [`FftDirection::Inverse`]
//! (callers scale by `1/N` if they need a true inverse).

use std::f32::consts::PI;

use crate::types::{IQSample, PhyError, PhyResult};

/// Largest supported transform length. Covers SF12 symbols.
pub const MAX_NFFT: usize = 4096;

/// Maximum factorization depth a plan can hold.
pub const MAX_STAGES: usize = 32;

/// Largest radix the generic butterfly can recombine.
pub const MAX_RADIX: usize = 32;

/// Transform direction baked into a plan at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftDirection {
    Forward,
    Inverse,
}

/// A fully precomputed transform plan.
///
/// The plan owns its twiddle and factor tables by value so it can live
/// inside a caller-owned workspace without pointing anywhere. Once built it
/// is immutable; any number of transforms (and workspaces) may share one
/// plan by reference.
pub struct FftPlan {
    nfft: usize,
    direction: FftDirection,
    stages: usize,
    stage_radix: [usize; MAX_STAGES],
    stage_remainder: [usize; MAX_STAGES],
    twiddles: [IQSample; MAX_NFFT],
}

impl std::fmt::Debug for FftPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftPlan")
            .field("nfft", &self.nfft)
            .field("direction", &self.direction)
            .field("stages", &self.stages)
            .finish()
    }
}

impl FftPlan {
    /// Build a plan for a transform of length `nfft`.
    ///
    /// Factorizes `nfft` by trial division in the order 4, 2, 3, 5, 7, 9, ...
    /// and fills the twiddle table `W_k = exp(±2πik/nfft)`. Fails with
    /// `InvalidArg` when the length is zero, exceeds [`MAX_NFFT`], or leaves
    /// a prime factor larger than [`MAX_RADIX`].
    pub fn new(nfft: usize, direction: FftDirection) -> PhyResult<Self> {
        if nfft == 0 || nfft > MAX_NFFT {
            return Err(PhyError::InvalidArg);
        }

        let mut plan = FftPlan {
            nfft,
            direction,
            stages: 0,
            stage_radix: [0; MAX_STAGES],
            stage_remainder: [0; MAX_STAGES],
            twiddles: [IQSample::new(0.0, 0.0); MAX_NFFT],
        };

        let phinc = match direction {
            FftDirection::Forward => -2.0,
            FftDirection::Inverse => 2.0,
        } * PI
            / nfft as f32;
        for k in 0..nfft {
            plan.twiddles[k] = IQSample::from_polar(1.0, k as f32 * phinc);
        }

        let mut n = nfft;
        let mut p = 4usize;
        loop {
            while n % p != 0 {
                p = match p {
                    4 => 2,
                    2 => 3,
                    _ => p + 2,
                };
                if p * p > n {
                    p = n; // no more factors
                }
            }
            n /= p;
            if p > MAX_RADIX || plan.stages == MAX_STAGES {
                return Err(PhyError::InvalidArg);
            }
            plan.stage_radix[plan.stages] = p;
            plan.stage_remainder[plan.stages] = n;
            plan.stages += 1;
            if n <= 1 {
                break;
            }
        }

        Ok(plan)
    }

    /// Transform length this plan was built for.
    pub fn nfft(&self) -> usize {
        self.nfft
    }

    /// Direction this plan was built for.
    pub fn direction(&self) -> FftDirection {
        self.direction
    }

    /// Run the transform of `src` into `dst`.
    ///
    /// Both slices must hold at least `nfft` samples and must not alias
    /// (which the borrow checker enforces). Never fails: every size check
    /// happened at plan construction.
    pub fn transform(&self, src: &[IQSample], dst: &mut [IQSample]) {
        assert!(src.len() >= self.nfft && dst.len() >= self.nfft);
        self.work(0, &mut dst[..self.nfft], src, 0, 1, 1);
    }

    /// One decimation-in-time stage: `p` sub-transforms of length `m` over a
    /// decimated input, recombined by a radix-`p` butterfly.
    fn work(
        &self,
        stage: usize,
        out: &mut [IQSample],
        src: &[IQSample],
        src_off: usize,
        fstride: usize,
        in_stride: usize,
    ) {
        let p = self.stage_radix[stage];
        let m = self.stage_remainder[stage];

        if m == 1 {
            for q in 0..p {
                out[q] = src[src_off + q * fstride * in_stride];
            }
        } else {
            for q in 0..p {
                self.work(
                    stage + 1,
                    &mut out[q * m..(q + 1) * m],
                    src,
                    src_off + q * fstride * in_stride,
                    fstride * p,
                    in_stride,
                );
            }
        }

        match p {
            2 => self.bfly2(out, fstride, m),
            3 => self.bfly3(out, fstride, m),
            4 => self.bfly4(out, fstride, m),
            5 => self.bfly5(out, fstride, m),
            _ => self.bfly_generic(out, fstride, m, p),
        }
    }

    fn bfly2(&self, out: &mut [IQSample], fstride: usize, m: usize) {
        for k in 0..m {
            let t = out[m + k] * self.twiddles[k * fstride];
            out[m + k] = out[k] - t;
            out[k] += t;
        }
    }

    fn bfly4(&self, out: &mut [IQSample], fstride: usize, m: usize) {
        // The inverse transform flips the sign of the rotated difference term.
        let neg_if_inverse: f32 = match self.direction {
            FftDirection::Forward => 1.0,
            FftDirection::Inverse => -1.0,
        };
        for k in 0..m {
            let s0 = out[k + m] * self.twiddles[k * fstride];
            let s1 = out[k + 2 * m] * self.twiddles[k * fstride * 2];
            let s2 = out[k + 3 * m] * self.twiddles[k * fstride * 3];
            let s5 = out[k] - s1;

            out[k] += s1;
            let s3 = s0 + s2;
            let s4 = s0 - s2;
            let s4 = IQSample::new(s4.im * neg_if_inverse, -s4.re * neg_if_inverse);

            out[k + 2 * m] = out[k] - s3;
            out[k] += s3;
            out[k + m] = s5 + s4;
            out[k + 3 * m] = s5 - s4;
        }
    }

    fn bfly3(&self, out: &mut [IQSample], fstride: usize, m: usize) {
        let m2 = 2 * m;
        let epi3 = self.twiddles[fstride * m];
        let mut tw1 = 0usize;
        let mut tw2 = 0usize;

        for k in 0..m {
            let s1 = out[m + k] * self.twiddles[tw1];
            let s2 = out[m2 + k] * self.twiddles[tw2];

            let s3 = s1 + s2;
            let mut s0 = s1 - s2;
            tw1 += fstride;
            tw2 += fstride * 2;

            out[m + k] = IQSample::new(out[k].re - 0.5 * s3.re, out[k].im - 0.5 * s3.im);

            s0 *= epi3.im;

            out[k] += s3;

            out[m2 + k] = IQSample::new(out[m + k].re + s0.im, out[m + k].im - s0.re);
            out[m + k] += IQSample::new(-s0.im, s0.re);
        }
    }

    fn bfly5(&self, out: &mut [IQSample], fstride: usize, m: usize) {
        let ya = self.twiddles[fstride * m];
        let yb = self.twiddles[fstride * 2 * m];

        for u in 0..m {
            let s0 = out[u];

            let s1 = out[m + u] * self.twiddles[u * fstride];
            let s2 = out[2 * m + u] * self.twiddles[2 * u * fstride];
            let s3 = out[3 * m + u] * self.twiddles[3 * u * fstride];
            let s4 = out[4 * m + u] * self.twiddles[4 * u * fstride];

            let s7 = s1 + s4;
            let s10 = s1 - s4;
            let s8 = s2 + s3;
            let s9 = s2 - s3;

            out[u] += s7;
            out[u] += s8;

            let s5 = s0
                + IQSample::new(
                    s7.re * ya.re + s8.re * yb.re,
                    s7.im * ya.re + s8.im * yb.re,
                );
            let s6 = IQSample::new(
                s10.im * ya.im + s9.im * yb.im,
                -s10.re * ya.im - s9.re * yb.im,
            );

            out[m + u] = s5 - s6;
            out[4 * m + u] = s5 + s6;

            let s11 = s0
                + IQSample::new(
                    s7.re * yb.re + s8.re * ya.re,
                    s7.im * yb.re + s8.im * ya.re,
                );
            let s12 = IQSample::new(
                -s10.im * yb.im + s9.im * ya.im,
                s10.re * yb.im - s9.re * ya.im,
            );

            out[2 * m + u] = s11 + s12;
            out[3 * m + u] = s11 - s12;
        }
    }

    /// Butterfly for any radix not covered by the specializations. Walks the
    /// twiddle table with an index kept modulo `nfft`.
    fn bfly_generic(&self, out: &mut [IQSample], fstride: usize, m: usize, p: usize) {
        let norig = self.nfft;
        let mut scratch = [IQSample::new(0.0, 0.0); MAX_RADIX];

        for u in 0..m {
            let mut k = u;
            for q1 in 0..p {
                scratch[q1] = out[k];
                k += m;
            }

            k = u;
            for _q1 in 0..p {
                let mut twidx = 0usize;
                out[k] = scratch[0];
                for q in 1..p {
                    twidx += fstride * k;
                    if twidx >= norig {
                        twidx -= norig;
                    }
                    out[k] += scratch[q] * self.twiddles[twidx];
                }
                k += m;
            }
        }
    }
}
