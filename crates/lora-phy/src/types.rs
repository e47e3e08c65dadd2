//! Core types for the LoRa PHY
//!
//! This module defines the fundamental types used throughout the modem,
//! particularly the complex I/Q (In-phase/Quadrature) sample representation.
//!
//! ## Understanding I/Q Samples
//!
//! Software-defined radios represent baseband signals as complex numbers:
//! - **I (In-phase)**: the real component, aligned with the reference carrier
//! - **Q (Quadrature)**: the imaginary component, 90° out of phase
//!
//! Together they capture both amplitude and phase, which is what lets a
//! chirp's instantaneous frequency be synthesized and recovered digitally.
//!
//! ```text
//!            Q (Imaginary)
//!            ^
//!            |     * (I=0.7, Q=0.7)
//!            |    /
//!            |   / magnitude = 1.0
//!            |  /  phase = 45°
//!            | /
//!   ---------+---------> I (Real)
//!            |
//! ```
//!
//! The modem works in `f32` throughout: the canonical interchange format is
//! interleaved little-endian float32 pairs in the range [-1.0, 1.0], and all
//! detection thresholds are calibrated for single precision.

use num_complex::Complex;

/// Scalar sample type used by the whole PHY.
pub type Scalar = f32;

/// A single complex baseband I/Q sample.
pub type IQSample = Complex<f32>;

/// A modulation symbol.
///
/// Symbols are integers in `[0, 2^SF)` where SF is the spreading factor.
/// The Hamming(8,4) encoder emits full 8-bit codewords as symbols; at SF7
/// the top parity bit aliases away on air and is recovered by the decoder's
/// single-error correction.
pub type Symbol = u16;

/// Result type for PHY operations.
///
/// Successful calls return a count (symbols, samples or bytes produced).
pub type PhyResult<T> = Result<T, PhyError>;

/// Errors shared by every public entry point.
///
/// The taxonomy is deliberately small: a call either succeeds with a count
/// or fails with one of these three conditions. Each variant carries a
/// stable POSIX-style numeric code for FFI and logging surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PhyError {
    /// A parameter or input shape is invalid (sample count misaligned,
    /// odd symbol count, unsupported FFT length).
    #[error("invalid argument")]
    InvalidArg,
    /// A caller supplied buffer is too small for the requested operation,
    /// or the input does not contain enough symbols.
    #[error("result out of range")]
    OutOfRange,
    /// A buffer that this configuration requires was not supplied.
    #[error("required buffer missing")]
    NoMemory,
}

impl PhyError {
    /// Numeric code, matching the errno conventions external callers expect.
    pub const fn code(&self) -> i32 {
        match self {
            PhyError::InvalidArg => -22,
            PhyError::OutOfRange => -34,
            PhyError::NoMemory => -12,
        }
    }
}

impl From<PhyError> for i32 {
    fn from(err: PhyError) -> i32 {
        err.code()
    }
}
