//! Procedural WAV fixtures for unit tests

use std::path::Path;

use crate::wave::WaveHeader;

/// 16-bit ramp samples; every frame is distinct so misaligned copies show up
pub(crate) fn tone_bytes(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames * channels as usize * 2);
    for n in 0..frames {
        for ch in 0..channels {
            let value = ((n as u32 * 7 + u32::from(ch) * 13) % sample_rate) as i16;
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, bits: u16, payload: &[u8]) -> Vec<u8> {
    wav_bytes_with_chunks(sample_rate, channels, bits, &[], payload)
}

/// WAV bytes with extra chunks between `fmt ` and `data`, padded to even length
pub(crate) fn wav_bytes_with_chunks(
    sample_rate: u32,
    channels: u16,
    bits: u16,
    chunks: &[(&[u8; 4], &[u8])],
    payload: &[u8],
) -> Vec<u8> {
    let mut header = WaveHeader::canonical(sample_rate, channels, bits, payload.len() as u32).unwrap();
    // odd bodies carry one pad byte
    let extra: usize = chunks
        .iter()
        .map(|(_, body)| 8 + body.len() + body.len() % 2)
        .sum();
    header.file_size += extra as u32;

    let canonical = header.to_bytes();
    let mut bytes = Vec::with_capacity(canonical.len() + extra + payload.len());
    bytes.extend_from_slice(&canonical[..36]);
    for (id, body) in chunks {
        bytes.extend_from_slice(*id);
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(body);
        if body.len() % 2 == 1 {
            bytes.push(0);
        }
    }
    bytes.extend_from_slice(&canonical[36..]);
    bytes.extend_from_slice(payload);
    bytes
}

/// Write a 16-bit mono test file and return its payload
pub(crate) fn write_mono_wav(path: &Path, sample_rate: u32, seconds: f64) -> Vec<u8> {
    let frames = (f64::from(sample_rate) * seconds).round() as usize;
    let payload = tone_bytes(sample_rate, 1, frames);
    std::fs::write(path, wav_bytes(sample_rate, 1, 16, &payload)).unwrap();
    payload
}
