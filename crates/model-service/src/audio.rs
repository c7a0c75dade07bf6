//! WAV decoding for ASR input.
//!
//! The ingestion pipeline extracts audio as mono 16 kHz 16-bit PCM WAV
//! before it ever reaches this service, so the service speaks exactly
//! that contract: RIFF/WAVE containers carrying 16-bit PCM or 32-bit
//! float samples. Other rates and channel layouts are still tolerated
//! (downmixed and linearly resampled) so ad-hoc callers need not match
//! the pipeline bit-for-bit, but anything that is not a WAV is rejected.

use anyhow::{bail, Context, Result};

/// Whisper's expected input sample rate.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// WAVE format tag for integer PCM.
const FORMAT_PCM: u16 = 1;

/// WAVE format tag for IEEE float.
const FORMAT_IEEE_FLOAT: u16 = 3;

/// Decoded `fmt ` chunk fields the service cares about.
struct WavFormat {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

/// Decode WAV bytes into mono samples at [`TARGET_SAMPLE_RATE`].
pub fn decode_wav_to_mono_16k(data: &[u8]) -> Result<Vec<f32>> {
    let (format, samples) = parse_wav(data)?;
    let mono = downmix(&samples, format.channels as usize);
    if format.sample_rate == TARGET_SAMPLE_RATE {
        Ok(mono)
    } else {
        Ok(resample_linear(&mono, format.sample_rate, TARGET_SAMPLE_RATE))
    }
}

/// Walk the RIFF chunk list, returning the format and interleaved samples.
fn parse_wav(data: &[u8]) -> Result<(WavFormat, Vec<f32>)> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        bail!("not a RIFF/WAVE file");
    }

    let mut format: Option<WavFormat> = None;
    let mut payload: Option<&[u8]> = None;

    let mut pos = 12;
    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size =
            u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
                as usize;
        let body_start = pos + 8;
        let body_end = body_start
            .checked_add(chunk_size)
            .filter(|end| *end <= data.len())
            .context("truncated WAV chunk")?;
        let body = &data[body_start..body_end];

        match chunk_id {
            b"fmt " => format = Some(parse_fmt_chunk(body)?),
            b"data" => payload = Some(body),
            // bext, LIST, fact and friends carry nothing we need.
            _ => {}
        }

        // Chunks are word-aligned; odd sizes are followed by a pad byte.
        pos = body_end + (chunk_size & 1);
    }

    let format = format.context("WAV has no fmt chunk")?;
    let payload = payload.context("WAV has no data chunk")?;
    let samples = decode_samples(&format, payload)?;
    Ok((format, samples))
}

fn parse_fmt_chunk(body: &[u8]) -> Result<WavFormat> {
    if body.len() < 16 {
        bail!("fmt chunk too short ({} bytes)", body.len());
    }
    let format = WavFormat {
        format_tag: u16::from_le_bytes([body[0], body[1]]),
        channels: u16::from_le_bytes([body[2], body[3]]),
        sample_rate: u32::from_le_bytes([body[4], body[5], body[6], body[7]]),
        bits_per_sample: u16::from_le_bytes([body[14], body[15]]),
    };
    if format.channels == 0 {
        bail!("WAV declares zero channels");
    }
    if format.sample_rate == 0 {
        bail!("WAV declares zero sample rate");
    }
    Ok(format)
}

/// Convert the raw data chunk into interleaved `[-1, 1]` samples.
fn decode_samples(format: &WavFormat, payload: &[u8]) -> Result<Vec<f32>> {
    match (format.format_tag, format.bits_per_sample) {
        (FORMAT_PCM, 16) => Ok(payload
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / i16::MAX as f32)
            .collect()),
        (FORMAT_IEEE_FLOAT, 32) => Ok(payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()),
        (tag, bits) => bail!(
            "unsupported WAV encoding (format tag {tag}, {bits}-bit); \
             expected 16-bit PCM or 32-bit float"
        ),
    }
}

/// Average interleaved channels down to mono.
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler.
///
/// Whisper's mel frontend is robust to interpolation artifacts, and the
/// normal case (pipeline-produced 16 kHz audio) never reaches this path.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let step = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / step).ceil() as usize;

    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * step;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let current = samples[idx.min(samples.len() - 1)];
        let next = samples[(idx + 1).min(samples.len() - 1)];
        out.push(current + (next - current) * frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assemble a minimal RIFF/WAVE file around the given samples.
    fn wav_bytes(channels: u16, sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let data_len = samples.len() * 2;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");

        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        let byte_rate = sample_rate * channels as u32 * 2;
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&(channels * 2).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());

        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data_len as u32).to_le_bytes());
        for sample in samples {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }

    #[test]
    fn decodes_mono_16k_pcm_unchanged() {
        let wav = wav_bytes(1, TARGET_SAMPLE_RATE, &[0, i16::MAX, i16::MIN + 1]);
        let samples = decode_wav_to_mono_16k(&wav).unwrap();
        assert_eq!(samples.len(), 3);
        assert!((samples[0]).abs() < 1e-6);
        assert!((samples[1] - 1.0).abs() < 1e-4);
        assert!((samples[2] + 1.0).abs() < 1e-4);
    }

    #[test]
    fn stereo_is_downmixed() {
        // Left/right pairs averaging to 0, then to a positive value.
        let wav = wav_bytes(2, TARGET_SAMPLE_RATE, &[1000, -1000, 2000, 2000]);
        let samples = decode_wav_to_mono_16k(&wav).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].abs() < 1e-6);
        assert!(samples[1] > 0.0);
    }

    #[test]
    fn non_16k_audio_is_resampled() {
        let input: Vec<i16> = vec![0; 32_000];
        let wav = wav_bytes(1, 32_000, &input);
        let samples = decode_wav_to_mono_16k(&wav).unwrap();
        // One second of audio at any input rate is ~16000 output samples.
        assert!((samples.len() as i64 - TARGET_SAMPLE_RATE as i64).abs() <= 1);
    }

    #[test]
    fn rejects_non_wav_bytes() {
        assert!(decode_wav_to_mono_16k(b"OggS\x00\x00\x00\x00").is_err());
        assert!(decode_wav_to_mono_16k(&[]).is_err());
    }

    #[test]
    fn rejects_truncated_chunks() {
        let mut wav = wav_bytes(1, TARGET_SAMPLE_RATE, &[1, 2, 3, 4]);
        wav.truncate(wav.len() - 3);
        assert!(decode_wav_to_mono_16k(&wav).is_err());
    }

    #[test]
    fn rejects_unsupported_encoding() {
        // 8-bit PCM: format tag 1, bits 8.
        let mut wav = wav_bytes(1, TARGET_SAMPLE_RATE, &[0, 0]);
        wav[34] = 8;
        wav[35] = 0;
        assert!(decode_wav_to_mono_16k(&wav).is_err());
    }

    #[test]
    fn resample_interpolates_between_samples() {
        // Halving the rate keeps every other sample exactly.
        let samples = vec![0.0, 1.0, 0.0, -1.0];
        let out = resample_linear(&samples, 32_000, 16_000);
        assert_eq!(out.len(), 2);
        assert!(out[0].abs() < 1e-6);
        assert!(out[1].abs() < 1e-6);
    }
}
