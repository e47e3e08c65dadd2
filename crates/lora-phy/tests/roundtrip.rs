//! End-to-end modem scenarios: encode → modulate → demodulate → decode,
//! sync-word recovery, error contracts and CRC verdicts.

use lora_phy::prelude::*;
use lora_phy::Sx1272Crc;

/// Build a workspace over fresh buffers and run `f` with it.
fn with_workspace<R>(
    params: &LoraParams,
    scratch_len: usize,
    f: impl FnOnce(&mut Workspace<'_>) -> R,
) -> R {
    let n = params.chips_per_symbol();
    let mut fft_in = vec![IQSample::new(0.0, 0.0); n];
    let mut fft_out = vec![IQSample::new(0.0, 0.0); n];
    let mut window = vec![0.0f32; n];
    let mut scratch = vec![IQSample::new(0.0, 0.0); scratch_len];

    let mut ws = Workspace::init(
        WorkspaceBuffers {
            fft_in: &mut fft_in,
            fft_out: &mut fft_out,
            window: Some(&mut window),
            scratch: if scratch_len > 0 {
                Some(&mut scratch)
            } else {
                None
            },
        },
        params,
    )
    .expect("workspace init");

    f(&mut ws)
}

fn roundtrip(params: &LoraParams, payload: &[u8]) {
    let n = params.chips_per_symbol();
    let step = params.samples_per_symbol();

    with_workspace(params, 0, |ws| {
        let mut symbols = vec![0u16; payload.len() * 2];
        let count = ws.encode(payload, &mut symbols).expect("encode");
        assert_eq!(count, payload.len() * 2);

        let mut iq = vec![IQSample::new(0.0, 0.0); (count + 2) * step];
        let samples = ws.modulate(&symbols[..count], &mut iq).expect("modulate");
        assert_eq!(samples, (count + 2) * step);

        let mut recovered = vec![0u16; count];
        let produced = ws.demodulate(&iq, &mut recovered).expect("demodulate");
        assert_eq!(produced, count, "sf={} n={}", params.sf, n);
        assert_eq!(ws.sync_word(), 0x12, "sync word survives the round trip");

        let mut bytes = vec![0u8; payload.len()];
        let decoded = ws.decode(&recovered[..produced], &mut bytes).expect("decode");
        assert_eq!(decoded, payload.len());
        assert_eq!(bytes, payload, "sf={} bw={:?}", params.sf, params.bw);
    });
}

#[test]
fn roundtrip_reference_payload_every_sf_and_bw() {
    let payload = [0xDE, 0xAD, 0xBE, 0xEF];
    for sf in 7..=12u8 {
        for bw in [125_000, 250_000, 500_000] {
            let params = LoraParams::builder()
                .spreading_factor(sf)
                .bandwidth(bw)
                .coding_rate(1)
                .oversample(1)
                .build();
            roundtrip(&params, &payload);
        }
    }
}

#[test]
fn roundtrip_64_byte_payload() {
    // Deterministic payload with all nibble patterns represented.
    let payload: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(0x1F).wrapping_add(3)).collect();
    for sf in [7, 9] {
        let params = LoraParams::builder()
            .spreading_factor(sf)
            .bandwidth(125_000)
            .oversample(1)
            .build();
        roundtrip(&params, &payload);
    }
}

#[test]
fn reference_symbol_vector() {
    let params = LoraParams::builder().spreading_factor(7).build();
    with_workspace(&params, 0, |ws| {
        let mut symbols = [0u16; 8];
        ws.encode(&[0xDE, 0xAD, 0xBE, 0xEF], &mut symbols).unwrap();
        assert_eq!(symbols, [0x8D, 0x2E, 0x9A, 0x8D, 0x4B, 0x2E, 0x2E, 0xFF]);
    });
}

#[test]
fn sync_word_recovery_empty_payload() {
    for sync in [0xAB, 0x12, 0xFF, 0x00] {
        for bw in [125_000, 500_000] {
            let params = LoraParams::builder()
                .spreading_factor(7)
                .bandwidth(bw)
                .sync_word(sync)
                .build();
            let step = params.samples_per_symbol();

            with_workspace(&params, 0, |ws| {
                let mut iq = vec![IQSample::new(0.0, 0.0); 2 * step];
                ws.modulate(&[], &mut iq).expect("modulate");

                let mut out = [0u16; 1];
                let produced = ws.demodulate(&iq, &mut out).expect("demodulate");
                assert_eq!(produced, 0, "no payload symbols");
                assert_eq!(ws.sync_word(), sync, "sync {:#04x} bw {}", sync, bw);
            });
        }
    }
}

#[test]
fn misaligned_sample_count_is_invalid_arg() {
    let params = LoraParams::builder().spreading_factor(7).build();
    with_workspace(&params, 0, |ws| {
        let iq = vec![IQSample::new(0.0, 0.0); 3 * 128 + 5];
        let mut out = [0u16; 4];
        let err = ws.demodulate(&iq, &mut out).unwrap_err();
        assert_eq!(err, PhyError::InvalidArg);
        assert_eq!(err.code(), -22);
    });
}

#[test]
fn fewer_than_two_symbols_is_out_of_range() {
    let params = LoraParams::builder().spreading_factor(7).build();
    with_workspace(&params, 0, |ws| {
        let iq = vec![IQSample::new(0.0, 0.0); 128];
        let mut out = [0u16; 4];
        let err = ws.demodulate(&iq, &mut out).unwrap_err();
        assert_eq!(err, PhyError::OutOfRange);
        assert_eq!(err.code(), -34);
    });
}

#[test]
fn loud_samples_without_scratch_are_out_of_range() {
    let params = LoraParams::builder().spreading_factor(7).build();
    with_workspace(&params, 0, |ws| {
        let iq = vec![IQSample::new(2.0, 0.0); 2 * 128];
        let mut out = [0u16; 1];
        assert_eq!(ws.demodulate(&iq, &mut out), Err(PhyError::OutOfRange));
    });
}

#[test]
fn loud_samples_with_scratch_roundtrip() {
    let params = LoraParams::builder().spreading_factor(7).build();
    let payload = [0x55, 0xAA];
    let step = params.samples_per_symbol();

    with_workspace(&params, 6 * step, |ws| {
        let mut symbols = [0u16; 4];
        let count = ws.encode(&payload, &mut symbols).unwrap();

        let mut iq = vec![IQSample::new(0.0, 0.0); (count + 2) * step];
        ws.modulate(&symbols[..count], &mut iq).unwrap();
        for samp in iq.iter_mut() {
            *samp *= 3.0; // push outside the canonical range
        }

        let mut recovered = [0u16; 4];
        let produced = ws.demodulate(&iq, &mut recovered).unwrap();
        let mut bytes = [0u8; 2];
        ws.decode(&recovered[..produced], &mut bytes).unwrap();
        assert_eq!(bytes, payload);
    });
}

#[test]
fn demodulate_updates_offset_metrics() {
    let params = LoraParams::builder().spreading_factor(7).build();
    let step = params.samples_per_symbol();

    with_workspace(&params, 0, |ws| {
        let mut iq = vec![IQSample::new(0.0, 0.0); 2 * step];
        ws.modulate(&[], &mut iq).unwrap();
        let mut out = [0u16; 1];
        ws.demodulate(&iq, &mut out).unwrap();

        let metrics = ws.metrics();
        // Clean burst: sync tones sit exactly on their bins.
        assert!(metrics.time_offset.abs() < 1.0, "to = {}", metrics.time_offset);
        assert!(metrics.cfo.abs() < 0.2, "cfo = {}", metrics.cfo);
    });
}

/// Frame layout assumed by the decoder's CRC verdict: two header bytes,
/// data, little-endian checksum of the data.
fn framed(data: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x40, 0x01];
    frame.extend_from_slice(data);
    let crc = Sx1272Crc::compute(data);
    frame.push(crc as u8);
    frame.push((crc >> 8) as u8);
    frame
}

#[test]
fn decode_sets_crc_ok_for_valid_trailer() {
    let params = LoraParams::builder().spreading_factor(8).build();
    let frame = framed(&[0x10, 0x20, 0x30, 0x40, 0x50]);
    let step = params.samples_per_symbol();

    with_workspace(&params, 0, |ws| {
        let mut symbols = vec![0u16; frame.len() * 2];
        let count = ws.encode(&frame, &mut symbols).unwrap();

        let mut iq = vec![IQSample::new(0.0, 0.0); (count + 2) * step];
        ws.modulate(&symbols[..count], &mut iq).unwrap();

        let mut recovered = vec![0u16; count];
        let produced = ws.demodulate(&iq, &mut recovered).unwrap();

        let mut bytes = vec![0u8; frame.len()];
        ws.decode(&recovered[..produced], &mut bytes).unwrap();
        assert_eq!(bytes, frame);
        assert!(ws.metrics().crc_ok, "intact trailer must verify");
    });
}

#[test]
fn decode_clears_crc_ok_for_corrupt_trailer() {
    let params = LoraParams::builder().spreading_factor(8).build();
    let mut frame = framed(&[0x10, 0x20, 0x30]);
    let last = frame.len() - 1;
    frame[last] ^= 0xFF; // corrupt the checksum

    with_workspace(&params, 0, |ws| {
        let mut symbols = vec![0u16; frame.len() * 2];
        let count = ws.encode(&frame, &mut symbols).unwrap();
        let mut bytes = vec![0u8; frame.len()];
        ws.decode(&symbols[..count], &mut bytes).unwrap();
        assert!(!ws.metrics().crc_ok);

        // CRC verdict is a metric, not an error: the bytes still decode.
        assert_eq!(bytes, frame);
    });
}

#[test]
fn estimate_and_compensate_clean_preamble() {
    // Feed the standalone estimator a dechirped preamble (two tones) and
    // check the offsets stay near zero, then compensate a copy in place.
    let params = LoraParams::builder().spreading_factor(7).build();
    let step = params.samples_per_symbol();

    with_workspace(&params, 0, |ws| {
        let mut iq = vec![IQSample::new(0.0, 0.0); 2 * step];
        ws.modulate(&[], &mut iq).unwrap();

        // Dechirp externally with a unit reference downchirp.
        let mut down = vec![IQSample::new(0.0, 0.0); 128];
        lora_phy::ChirpGenerator::new(128, 1, 1.0).generate(
            &mut down,
            0.0,
            lora_phy::ChirpDirection::Down,
            1.0,
        );
        let dechirped: Vec<IQSample> = iq
            .iter()
            .enumerate()
            .map(|(i, s)| s * down[i % 128])
            .collect();

        ws.estimate_offsets(&dechirped);
        let metrics = *ws.metrics();
        assert!(metrics.time_offset.abs() < 1.0);

        let mut copy = dechirped.clone();
        ws.compensate_offsets(&mut copy);
        assert_eq!(copy.len(), dechirped.len());
        // A near-zero timing offset leaves sample order intact.
        assert!((copy[10].norm() - dechirped[10].norm()).abs() < 1e-4);
    });
}
