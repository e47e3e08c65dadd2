//! Modem parameters and configuration
//!
//! Everything the modem needs to know before a burst can be synthesized or
//! recovered: spreading factor, bandwidth, coding rate, oversampling ratio,
//! analysis window and the two-nibble network sync word.
//!
//! ## Spreading Factor (SF)
//!
//! The spreading factor sets how many chips encode each symbol. Higher SF
//! values trade data rate for sensitivity:
//!
//! | SF | Chips/Symbol | Bits/Symbol |
//! |----|--------------|-------------|
//! | 7  | 128          | 7           |
//! | 8  | 256          | 8           |
//! | 9  | 512          | 9           |
//! | 10 | 1024         | 10          |
//! | 11 | 2048         | 11          |
//! | 12 | 4096         | 12          |
//!
//! ## Bandwidth (BW)
//!
//! The occupied channel width. 125 kHz is the reference; 250 and 500 kHz
//! sweep proportionally faster, which the chirp generator expresses through
//! a bandwidth scale factor relative to 125 kHz.
//!
//! ## Coding Rate (CR)
//!
//! Forward error correction overhead, expressed as 4/(4+CR). The modem core
//! treats it as informational; the interleaver and whitening mask consume
//! the raw redundancy count.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{PhyError, PhyResult, Scalar};

/// Spreading factor. Determines the chips per symbol (`2^SF`) and the FFT
/// length used for detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpreadingFactor {
    SF7 = 7,
    SF8 = 8,
    SF9 = 9,
    SF10 = 10,
    SF11 = 11,
    SF12 = 12,
}

impl SpreadingFactor {
    /// Create a spreading factor from a raw value.
    pub fn from_u8(value: u8) -> PhyResult<Self> {
        match value {
            7 => Ok(Self::SF7),
            8 => Ok(Self::SF8),
            9 => Ok(Self::SF9),
            10 => Ok(Self::SF10),
            11 => Ok(Self::SF11),
            12 => Ok(Self::SF12),
            _ => Err(PhyError::InvalidArg),
        }
    }

    /// Get the raw value.
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Number of chips per symbol, `2^SF`. This is also the detector FFT
    /// length `N`.
    pub fn chips_per_symbol(&self) -> usize {
        1 << self.value()
    }
}

impl fmt::Display for SpreadingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SF{}", self.value())
    }
}

impl Default for SpreadingFactor {
    fn default() -> Self {
        Self::SF7
    }
}

/// Channel bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bandwidth {
    /// 125 kHz, the reference bandwidth.
    Bw125kHz = 125_000,
    /// 250 kHz.
    Bw250kHz = 250_000,
    /// 500 kHz.
    Bw500kHz = 500_000,
}

impl Bandwidth {
    /// Create from a value in hertz. Anything outside the three supported
    /// bandwidths is rejected.
    pub fn from_hz(hz: u32) -> PhyResult<Self> {
        match hz {
            125_000 => Ok(Self::Bw125kHz),
            250_000 => Ok(Self::Bw250kHz),
            500_000 => Ok(Self::Bw500kHz),
            _ => Err(PhyError::InvalidArg),
        }
    }

    /// Bandwidth in hertz.
    pub fn hz(&self) -> u32 {
        *self as u32
    }

    /// Sweep-rate scale relative to the 125 kHz reference.
    pub fn scale(&self) -> Scalar {
        self.hz() as Scalar / 125_000.0
    }
}

impl Default for Bandwidth {
    fn default() -> Self {
        Self::Bw125kHz
    }
}

/// Coding rate for the Hamming FEC stage, 4/(4+CR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodingRate {
    /// 4/5, one redundant bit per nibble.
    CR4_5 = 1,
    /// 4/6.
    CR4_6 = 2,
    /// 4/7.
    CR4_7 = 3,
    /// 4/8, full Hamming(8,4).
    CR4_8 = 4,
}

impl CodingRate {
    /// Create from the redundancy count (1..=4).
    pub fn from_u8(value: u8) -> PhyResult<Self> {
        match value {
            1 => Ok(Self::CR4_5),
            2 => Ok(Self::CR4_6),
            3 => Ok(Self::CR4_7),
            4 => Ok(Self::CR4_8),
            _ => Err(PhyError::InvalidArg),
        }
    }

    /// Parse the textual form used by profile descriptions, e.g. `"4/7"`.
    pub fn from_label(label: &str) -> PhyResult<Self> {
        match label {
            "4/5" => Ok(Self::CR4_5),
            "4/6" => Ok(Self::CR4_6),
            "4/7" => Ok(Self::CR4_7),
            "4/8" => Ok(Self::CR4_8),
            _ => Err(PhyError::InvalidArg),
        }
    }

    /// Number of redundant bits per nibble.
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Bits per codeword, `4 + CR`.
    pub fn output_bits(&self) -> u8 {
        4 + self.value()
    }
}

impl fmt::Display for CodingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "4/{}", 4 + self.value())
    }
}

impl Default for CodingRate {
    fn default() -> Self {
        Self::CR4_5
    }
}

/// Analysis window applied to detector input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowKind {
    /// Rectangular, i.e. no windowing.
    None,
    /// Hann window, `0.5 - 0.5·cos(2πi/(N-1))`.
    Hann,
}

impl Default for WindowKind {
    fn default() -> Self {
        Self::None
    }
}

/// Complete modem configuration.
///
/// The workspace copies these values at initialisation; the caller keeps
/// ownership of the structure itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraParams {
    /// Spreading factor (7-12).
    pub sf: SpreadingFactor,
    /// Channel bandwidth.
    pub bw: Bandwidth,
    /// Coding rate.
    pub cr: CodingRate,
    /// Oversampling ratio above the chip rate (>= 1).
    pub osr: usize,
    /// Detector analysis window.
    pub window: WindowKind,
    /// Two-nibble network sync word. 0x12 for private networks.
    pub sync_word: u8,
}

impl Default for LoraParams {
    fn default() -> Self {
        Self {
            sf: SpreadingFactor::default(),
            bw: Bandwidth::default(),
            cr: CodingRate::default(),
            osr: 1,
            window: WindowKind::None,
            sync_word: 0x12,
        }
    }
}

impl LoraParams {
    /// Create a new builder.
    pub fn builder() -> LoraParamsBuilder {
        LoraParamsBuilder::default()
    }

    /// Chips per symbol, `2^SF`.
    pub fn chips_per_symbol(&self) -> usize {
        self.sf.chips_per_symbol()
    }

    /// Samples per symbol at the configured oversampling ratio.
    pub fn samples_per_symbol(&self) -> usize {
        self.chips_per_symbol() * self.osr
    }
}

/// Builder for [`LoraParams`].
#[derive(Default)]
pub struct LoraParamsBuilder {
    params: LoraParams,
}

impl LoraParamsBuilder {
    pub fn spreading_factor(mut self, sf: u8) -> Self {
        self.params.sf = SpreadingFactor::from_u8(sf).unwrap_or_default();
        self
    }

    pub fn bandwidth(mut self, bw_hz: u32) -> Self {
        self.params.bw = Bandwidth::from_hz(bw_hz).unwrap_or_default();
        self
    }

    pub fn coding_rate(mut self, cr: u8) -> Self {
        self.params.cr = CodingRate::from_u8(cr).unwrap_or_default();
        self
    }

    pub fn oversample(mut self, osr: usize) -> Self {
        self.params.osr = osr.max(1);
        self
    }

    pub fn window(mut self, window: WindowKind) -> Self {
        self.params.window = window;
        self
    }

    pub fn sync_word(mut self, word: u8) -> Self {
        self.params.sync_word = word;
        self
    }

    pub fn build(self) -> LoraParams {
        self.params
    }
}
