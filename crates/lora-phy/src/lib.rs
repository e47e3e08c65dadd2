//! # LoRa PHY core
//!
//! A software-defined LoRa physical layer: the algorithms that turn
//! application bytes into a chirp-spread-spectrum complex baseband waveform
//! and recover them back out, built for callers that own all their memory.
//!
//! ## Signal flow
//!
//! ```text
//! TX: bytes → Hamming(8,4) symbols → sync + data upchirps → I/Q samples
//! RX: I/Q → normalize → CFO/TO estimate → dechirp + FFT argmax → symbols
//!          → Hamming decode → bytes + CRC verdict
//! ```
//!
//! Three subsystems carry the weight:
//!
//! - a **mixed-radix FFT engine** ([`fft`]) with statically sized plans, so
//!   nothing on the processing path ever allocates;
//! - an **incremental-phase chirp generator** ([`chirp`]) whose running
//!   phase accumulator keeps arbitrarily long bursts phase-continuous;
//! - an **FFT argmax demodulator** ([`demodulation`]) with oversampling
//!   timing search, parabolic sub-bin interpolation and joint CFO/timing
//!   estimation over the two-symbol sync preamble.
//!
//! Around them sit the observable coding contracts: Hamming(8,4) byte ↔
//! symbol mapping, diagonal interleaving, SX1272 whitening and the SX1272
//! data checksum.
//!
//! ## Memory model
//!
//! The caller owns every buffer. A [`Workspace`](workspace::Workspace)
//! borrows FFT scratch (and optionally window/renormalisation buffers) at
//! init and embeds its FFT plans by value; after init, no operation
//! allocates or frees. Operations either return a count or one of three
//! errno-style errors ([`PhyError`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use lora_phy::prelude::*;
//!
//! let params = LoraParams::builder()
//!     .spreading_factor(7)
//!     .bandwidth(125_000)
//!     .build();
//!
//! let n = params.chips_per_symbol();
//! let mut fft_in = vec![IQSample::new(0.0, 0.0); n];
//! let mut fft_out = vec![IQSample::new(0.0, 0.0); n];
//!
//! let mut ws = Workspace::init(
//!     WorkspaceBuffers {
//!         fft_in: &mut fft_in,
//!         fft_out: &mut fft_out,
//!         window: None,
//!         scratch: None,
//!     },
//!     &params,
//! )?;
//!
//! let payload = [0xDE, 0xAD, 0xBE, 0xEF];
//! let mut symbols = [0u16; 8];
//! let count = ws.encode(&payload, &mut symbols)?;
//!
//! let mut iq = vec![IQSample::new(0.0, 0.0); (count + 2) * n];
//! ws.modulate(&symbols[..count], &mut iq)?;
//!
//! let mut recovered = [0u16; 8];
//! let produced = ws.demodulate(&iq, &mut recovered)?;
//!
//! let mut bytes = [0u8; 4];
//! ws.decode(&recovered[..produced], &mut bytes)?;
//! assert_eq!(bytes, payload);
//! # Ok::<(), lora_phy::PhyError>(())
//! ```

pub mod chirp;
pub mod coding;
pub mod crc;
pub mod demodulation;
pub mod detector;
pub mod fft;
pub mod io;
pub mod modulation;
pub mod params;
pub mod types;
pub mod vectors;
pub mod whitening;
pub mod workspace;

pub use chirp::{ChirpDirection, ChirpGenerator};
pub use crc::Sx1272Crc;
pub use detector::{detect, Detection};
pub use fft::{FftDirection, FftPlan};
pub use params::{Bandwidth, CodingRate, LoraParams, SpreadingFactor, WindowKind};
pub use types::{IQSample, PhyError, PhyResult, Scalar, Symbol};
pub use whitening::Whitening;
pub use workspace::{Metrics, Workspace, WorkspaceBuffers};

/// Convenient glob import for the common modem surface.
pub mod prelude {
    pub use crate::params::{Bandwidth, CodingRate, LoraParams, SpreadingFactor, WindowKind};
    pub use crate::types::{IQSample, PhyError, PhyResult, Symbol};
    pub use crate::workspace::{Metrics, Workspace, WorkspaceBuffers};
}
