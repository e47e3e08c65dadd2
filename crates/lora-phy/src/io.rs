//! IQ sample I/O
//!
//! The canonical interchange format for this modem is **cf32**: interleaved
//! little-endian float32 pairs, one complex sample per eight bytes, with
//! amplitudes in [-1.0, 1.0]. This is the USRP / GNU Radio wire format, so
//! captures and generated bursts round-trip through standard SDR tooling
//! unchanged.
//!
//! ```text
//! byte:   0    4    8    12   16   20
//!         ├────┼────┼────┼────┼────┼────┤
//!         │ I0 │ Q0 │ I1 │ Q1 │ I2 │ Q2 │ ...
//! ```
//!
//! These helpers are test-harness plumbing, not part of the zero-allocation
//! core path; the reader allocates its result vector.

use std::io::{self, Read, Write};

use crate::types::IQSample;

/// Bytes per cf32 sample (4-byte I + 4-byte Q).
pub const CF32_BYTES_PER_SAMPLE: usize = 8;

/// Write samples as interleaved little-endian float32 pairs.
pub fn write_samples_cf32<W: Write>(writer: &mut W, samples: &[IQSample]) -> io::Result<()> {
    for samp in samples {
        writer.write_all(&samp.re.to_le_bytes())?;
        writer.write_all(&samp.im.to_le_bytes())?;
    }
    Ok(())
}

/// Read interleaved little-endian float32 pairs until end of stream.
///
/// Fails with `InvalidData` when the stream does not divide into whole
/// samples.
pub fn read_samples_cf32<R: Read>(reader: &mut R) -> io::Result<Vec<IQSample>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    if bytes.len() % CF32_BYTES_PER_SAMPLE != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "byte count is not a whole number of cf32 samples",
        ));
    }

    let mut samples = Vec::with_capacity(bytes.len() / CF32_BYTES_PER_SAMPLE);
    for chunk in bytes.chunks_exact(CF32_BYTES_PER_SAMPLE) {
        let re = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let im = f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
        samples.push(IQSample::new(re, im));
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let samples = vec![
            IQSample::new(0.5, -0.5),
            IQSample::new(-1.0, 1.0),
            IQSample::new(0.0, 0.25),
        ];

        let mut buffer = Vec::new();
        write_samples_cf32(&mut buffer, &samples).unwrap();
        assert_eq!(buffer.len(), samples.len() * CF32_BYTES_PER_SAMPLE);

        let read = read_samples_cf32(&mut buffer.as_slice()).unwrap();
        assert_eq!(read, samples);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut buffer = Vec::new();
        write_samples_cf32(&mut buffer, &[IQSample::new(1.0, -2.0)]).unwrap();
        assert_eq!(&buffer[..4], &1.0f32.to_le_bytes());
        assert_eq!(&buffer[4..], &(-2.0f32).to_le_bytes());
    }

    #[test]
    fn test_truncated_stream_rejected() {
        let bytes = [0u8; 12]; // one and a half samples
        let err = read_samples_cf32(&mut &bytes[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
