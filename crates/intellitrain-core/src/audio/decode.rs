//! In-memory audio decoding to mono f32 PCM.
//!
//! Uses symphonia for format-agnostic decoding (WAV, FLAC, MP3, OGG, ...)
//! and rubato for sample-rate conversion.

use std::io::Cursor;

use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::MlError;

/// Decoded audio result
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples (f32, range [-1.0, 1.0])
    pub samples: Vec<f32>,
    /// Sample rate of `samples` in Hz
    pub sample_rate: u32,
    /// Channel count of the source stream
    pub channels: usize,
}

/// Decode `bytes` to mono f32 samples at the source sample rate.
///
/// `extension` is a format hint (e.g. `"wav"`); probing works without it.
/// Decoding stops once `max_secs` of audio has been collected.
pub fn decode_mono(bytes: &[u8], extension: Option<&str>, max_secs: f32) -> Result<DecodedAudio, MlError> {
    if bytes.is_empty() {
        return Err(MlError::InvalidAudio("empty payload".into()));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MlError::InvalidAudio(format!("unrecognised format: {e}")))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| MlError::InvalidAudio("no audio track found".into()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| MlError::InvalidAudio("sample rate unknown".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| MlError::InvalidAudio(format!("unsupported codec: {e}")))?;

    let max_frames = (max_secs * sample_rate as f32).ceil() as usize;
    let mut mono: Vec<f32> = Vec::new();
    let mut channels = 1usize;

    while mono.len() < max_frames {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(MlError::InvalidAudio(format!("error reading packet: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt packets are skipped; the quality gate catches truncated clips.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(error = %e, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(MlError::InvalidAudio(format!("decode failed: {e}"))),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count().max(1);
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);

        mono.extend(
            buf.samples()
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }
    mono.truncate(max_frames);

    debug!(
        sample_rate,
        channels,
        frames = mono.len(),
        "decoded audio payload"
    );

    Ok(DecodedAudio { samples: mono, sample_rate, channels })
}

/// Resample mono `samples` from `source_rate` to `target_rate`.
pub fn resample(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> Result<Vec<f32>, MlError> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples);
    }

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / source_rate as f64;
    let num_frames = samples.len();

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, num_frames, 1)
        .map_err(|e| MlError::InvalidAudio(format!("cannot resample from {source_rate} Hz: {e}")))?;
    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| MlError::InvalidAudio(format!("resampling failed: {e}")))?;

    let resampled = output.pop().unwrap_or_default();
    debug!(
        from_frames = num_frames,
        to_frames = resampled.len(),
        source_rate,
        target_rate,
        "resampled audio"
    );
    Ok(resampled)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::test_support::wav_bytes;

    #[test]
    fn decodes_stereo_wav_to_mono() {
        let bytes = wav_bytes(440.0, 1.0, 16_000, 2, 0.3);
        let decoded = decode_mono(&bytes, Some("wav"), 10.0).unwrap();
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.samples.len(), 16_000);
    }

    #[test]
    fn stops_after_max_secs() {
        let bytes = wav_bytes(440.0, 3.0, 8_000, 1, 0.3);
        let decoded = decode_mono(&bytes, None, 1.5).unwrap();
        assert_eq!(decoded.samples.len(), 12_000);
    }

    #[test]
    fn garbage_is_invalid_audio() {
        let err = decode_mono(b"definitely not audio", None, 1.0).unwrap_err();
        assert!(matches!(err, MlError::InvalidAudio(_)));
    }

    #[test]
    fn resample_halves_length_when_halving_rate() {
        let bytes = wav_bytes(220.0, 1.0, 32_000, 1, 0.3);
        let decoded = decode_mono(&bytes, Some("wav"), 2.0).unwrap();
        let out = resample(decoded.samples, 32_000, 16_000).unwrap();
        let expected = 16_000i64;
        assert!((out.len() as i64 - expected).abs() < 200, "got {}", out.len());
    }

    #[test]
    fn resample_is_noop_for_equal_rates() {
        let out = resample(vec![0.1, 0.2, 0.3], 16_000, 16_000).unwrap();
        assert_eq!(out, vec![0.1, 0.2, 0.3]);
    }
}
