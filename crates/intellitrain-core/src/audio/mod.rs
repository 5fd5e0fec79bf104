//! Audio preprocessing: decode, resample, quality gate, fixed window.
//!
//! Every clip goes through the same path at upload, training and
//! prediction time:
//!
//! 1. decode to mono and resample to [`SAMPLE_RATE`];
//! 2. keep the first [`VALIDATION_SECS`] and run the [`QualityGate`];
//! 3. take the first [`WINDOW_SECS`] zero-padded to a fixed length, which is
//!    what the embedders consume.

pub mod decode;
pub mod quality;

pub use decode::{DecodedAudio, decode_mono, resample};
pub use quality::{QualityGate, mean_rms};

use crate::MlError;

/// Working sample rate of every embedder.
pub const SAMPLE_RATE: u32 = 16_000;
/// Portion of the clip inspected by the quality gate.
pub const VALIDATION_SECS: f32 = 1.5;
/// Portion of the clip fed to the embedder.
pub const WINDOW_SECS: f32 = 1.0;

/// A validated clip, mono at [`SAMPLE_RATE`].
#[derive(Debug, Clone)]
pub struct AudioClip {
    samples: Vec<f32>,
}

impl AudioClip {
    /// Decode, resample and validate an uploaded payload.
    pub fn from_bytes(bytes: &[u8], extension: Option<&str>, gate: &QualityGate) -> Result<Self, MlError> {
        let decoded = decode_mono(bytes, extension, VALIDATION_SECS)?;
        let mut samples = resample(decoded.samples, decoded.sample_rate, SAMPLE_RATE)?;
        samples.truncate((VALIDATION_SECS * SAMPLE_RATE as f32) as usize);
        gate.check(&samples, SAMPLE_RATE)?;
        Ok(Self { samples })
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / SAMPLE_RATE as f32
    }

    /// The fixed-length embedder input: first second, zero-padded.
    pub fn window(&self) -> Vec<f32> {
        let len = (WINDOW_SECS * SAMPLE_RATE as f32) as usize;
        let mut window: Vec<f32> = self.samples.iter().take(len).copied().collect();
        window.resize(len, 0.0);
        window
    }
}

/// File extension of `filename`, used as a decoder hint.
pub fn extension_hint(filename: &str) -> Option<&str> {
    std::path::Path::new(filename).extension().and_then(|e| e.to_str())
}
