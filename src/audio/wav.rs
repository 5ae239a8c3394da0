//! WAV encoding for captured clips and s16le PCM conversion for synthesized audio

use crate::{MurmurError, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// Encode mono or interleaved f32 samples as a 16-bit PCM WAV file in memory
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| MurmurError::Io(format!("Failed to create WAV writer: {}", e)))?;

        for &sample in samples {
            writer
                .write_sample(f32_to_i16(sample))
                .map_err(|e| MurmurError::Io(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| MurmurError::Io(format!("Failed to finalize WAV: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}

/// Pack f32 samples as little-endian signed 16-bit PCM
pub fn f32_to_pcm_s16le(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| f32_to_i16(s).to_le_bytes())
        .collect()
}

/// Reassembles s16le samples from a byte stream whose chunk boundaries may
/// split a sample in half.
#[derive(Debug, Default)]
pub struct Pcm16Reassembler {
    carry: Option<u8>,
}

impl Pcm16Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the next chunk and return every complete sample it finishes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<i16> {
        let mut out = Vec::with_capacity(chunk.len() / 2 + 1);
        let mut rest = chunk;

        if let Some(low) = self.carry.take() {
            match rest.split_first() {
                Some((&high, tail)) => {
                    out.push(i16::from_le_bytes([low, high]));
                    rest = tail;
                }
                None => {
                    self.carry = Some(low);
                    return out;
                }
            }
        }

        let mut pairs = rest.chunks_exact(2);
        out.extend(pairs.by_ref().map(|p| i16::from_le_bytes([p[0], p[1]])));
        self.carry = pairs.remainder().first().copied();
        out
    }

    /// Whether half a sample is waiting for its second byte
    pub fn has_partial(&self) -> bool {
        self.carry.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decode an in-memory WAV file into f32 samples, sample rate and channel count
    fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32, u16)> {
        let reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| MurmurError::Io(format!("Failed to read WAV: {}", e)))?;
        let spec = reader.spec();

        let samples = match spec.sample_format {
            SampleFormat::Int => reader
                .into_samples::<i16>()
                .map(|s| s.map(i16_to_f32))
                .collect::<std::result::Result<Vec<_>, _>>(),
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>(),
        }
        .map_err(|e| MurmurError::Io(format!("Failed to read samples: {}", e)))?;

        Ok((samples, spec.sample_rate, spec.channels))
    }

    #[test]
    fn test_wav_in_memory() {
        let tone: Vec<f32> = (0..1600)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin() * 0.5)
            .collect();

        let bytes = encode_wav(&tone, 16000, 1).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(bytes.len(), 44 + tone.len() * 2);

        let (samples, rate, channels) = decode_wav(&bytes).unwrap();
        assert_eq!(rate, 16000);
        assert_eq!(channels, 1);
        assert_eq!(samples.len(), tone.len());
        assert!((samples[100] - tone[100]).abs() < 1e-3);
    }

    #[test]
    fn test_empty_clip_is_header_only() {
        let bytes = encode_wav(&[], 16000, 1).unwrap();
        assert_eq!(bytes.len(), 44);
    }

    #[test]
    fn test_samples_are_clamped() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), -i16::MAX);
    }

    #[test]
    fn test_reassembler_joins_split_samples() {
        let pcm: Vec<u8> = [1000i16, -2000, 3000]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();

        let mut reassembler = Pcm16Reassembler::new();
        let mut samples = reassembler.push(&pcm[..3]);
        assert!(reassembler.has_partial());
        samples.extend(reassembler.push(&pcm[3..4]));
        samples.extend(reassembler.push(&[]));
        samples.extend(reassembler.push(&pcm[4..]));

        assert_eq!(samples, vec![1000, -2000, 3000]);
        assert!(!reassembler.has_partial());
    }
}
