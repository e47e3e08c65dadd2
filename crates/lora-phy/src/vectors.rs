//! Test-vector profiles and fixture container
//!
//! Bit-exact regression testing runs the modem against captured fixtures.
//! Two formats are involved:
//!
//! 1. **Profile descriptions** - a line-oriented, indentation-insensitive
//!    text format listing the parameter sets under test:
//!
//!    ```text
//!    # reference profiles
//!    - name: sf7_125k
//!      sf: 7
//!      bw: 125000
//!      cr: 4/5
//!      dir: vectors/sf7_125k
//!    - name: sf9_wide
//!      sf: 9
//!      bw: 500000
//!      cr: 4/8
//!    ```
//!
//!    A `-` begins a profile; `key: value` lines fill it; `#` lines and
//!    unknown keys are skipped.
//!
//! 2. **Binary vector container** - a little-endian record file:
//!
//!    ```text
//!    u32 record_count
//!    per record:
//!      u32 sf_raw, bw_raw, cr_raw, flags_raw, len_raw   (value = raw >> 8)
//!      u8  reserved
//!      u8  payload[len]
//!      u32 sample_count
//!      f64 iq[sample_count * 2]                         (re, im pairs)
//!    ```
//!
//!    The five header fields carry their value in the high 24 bits. A
//!    record applies to a profile when its `sf`, `bw_khz` and `cr_idx`
//!    match.
//!
//! Like [`crate::io`], this is harness plumbing and allocates freely.

use serde::{Deserialize, Serialize};
use std::io::{self, Read};

use crate::params::CodingRate;
use crate::types::IQSample;

/// One parameter set from a profile description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Human-readable label.
    pub name: String,
    /// Spreading factor.
    pub sf: u8,
    /// Bandwidth in hertz.
    pub bw: u32,
    /// Coding rate.
    pub cr: CodingRate,
    /// Optional vector directory for fixture lookup.
    pub dir: Option<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::new(),
            sf: 7,
            bw: 125_000,
            cr: CodingRate::CR4_5,
            dir: None,
        }
    }
}

/// Parse a profile description.
///
/// Tolerant by design: blank lines, comments, unknown keys and unparsable
/// values are ignored, leaving the affected field at its default.
pub fn parse_profiles(text: &str) -> Vec<Profile> {
    let mut profiles = Vec::new();
    let mut current: Option<Profile> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix('-') {
            if let Some(done) = current.take() {
                profiles.push(done);
            }
            current = Some(Profile::default());
            // A profile may open with a property on the same line.
            let rest = rest.trim();
            if !rest.is_empty() {
                if let Some(profile) = current.as_mut() {
                    apply_property(profile, rest);
                }
            }
            continue;
        }
        if let Some(profile) = current.as_mut() {
            apply_property(profile, line);
        }
    }

    if let Some(done) = current.take() {
        profiles.push(done);
    }
    profiles
}

fn apply_property(profile: &mut Profile, line: &str) {
    let Some((key, value)) = line.split_once(':') else {
        return;
    };
    let key = key.trim();
    let value = value.trim();
    match key {
        "name" => profile.name = value.to_string(),
        "sf" => {
            if let Ok(sf) = value.parse() {
                profile.sf = sf;
            }
        }
        "bw" => {
            if let Ok(bw) = value.parse() {
                profile.bw = bw;
            }
        }
        "cr" => {
            if let Ok(cr) = CodingRate::from_label(value) {
                profile.cr = cr;
            }
        }
        "dir" => profile.dir = Some(value.to_string()),
        _ => {}
    }
}

/// One record from a binary vector container.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Spreading factor.
    pub sf: u32,
    /// Bandwidth in kilohertz.
    pub bw_khz: u32,
    /// Coding-rate index (redundancy count).
    pub cr_idx: u32,
    /// Generator flags, uninterpreted here.
    pub flags: u32,
    /// Reference payload.
    pub payload: Vec<u8>,
    /// Captured IQ samples (stored as f64 pairs, narrowed to f32).
    pub iq: Vec<IQSample>,
}

impl VectorRecord {
    /// Whether this record was captured under `profile`'s parameters.
    pub fn matches(&self, profile: &Profile) -> bool {
        self.sf == u32::from(profile.sf)
            && self.bw_khz == profile.bw / 1000
            && self.cr_idx == u32::from(profile.cr.value())
    }
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f64<R: Read>(reader: &mut R) -> io::Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Read a whole vector container.
pub fn read_vector_records<R: Read>(reader: &mut R) -> io::Result<Vec<VectorRecord>> {
    let count = read_u32(reader)?;
    let mut records = Vec::with_capacity(count as usize);

    for _ in 0..count {
        // Header fields keep their value in the high 24 bits.
        let sf = read_u32(reader)? >> 8;
        let bw_khz = read_u32(reader)? >> 8;
        let cr_idx = read_u32(reader)? >> 8;
        let flags = read_u32(reader)? >> 8;
        let len = read_u32(reader)? >> 8;

        let mut reserved = [0u8; 1];
        reader.read_exact(&mut reserved)?;

        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload)?;

        let sample_count = read_u32(reader)?;
        let mut iq = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            let re = read_f64(reader)? as f32;
            let im = read_f64(reader)? as f32;
            iq.push(IQSample::new(re, im));
        }

        records.push(VectorRecord {
            sf,
            bw_khz,
            cr_idx,
            flags,
            payload,
            iq,
        });
    }

    Ok(records)
}
