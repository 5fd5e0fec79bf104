use thiserror::Error;

/// All failures surfaced by preprocessing, feature extraction and training.
#[derive(Error, Debug)]
pub enum MlError {
    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("Audio too short (minimum {min_secs} second, got {actual_secs:.2})")]
    AudioTooShort { min_secs: f32, actual_secs: f32 },

    #[error("Audio too quiet (mean RMS {rms:.4} below {threshold})")]
    AudioTooQuiet { rms: f32, threshold: f32 },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// The extractor ran but produced an unusable vector (all zeros, NaN, wrong size).
    #[error("Failed to extract features: {0}")]
    EmbeddingFailed(String),

    /// Training/prediction prerequisites are not met (too few classes, samples, ...).
    #[error("{0}")]
    Precondition(String),

    /// The stored model was produced by a different feature extractor.
    #[error("model artifact mismatch: {0}")]
    ArtifactMismatch(String),

    #[error("training cancelled")]
    Cancelled,

    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("onnx runtime error: {0}")]
    Onnx(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl MlError {
    /// `true` for errors caused by the submitted payload rather than the system.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MlError::InvalidAudio(_)
                | MlError::AudioTooShort { .. }
                | MlError::AudioTooQuiet { .. }
                | MlError::InvalidImage(_)
                | MlError::EmbeddingFailed(_)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validation_classification() {
        assert!(MlError::InvalidImage("x".into()).is_validation());
        assert!(MlError::AudioTooQuiet { rms: 0.0, threshold: 0.005 }.is_validation());
        assert!(!MlError::Precondition("x".into()).is_validation());
        assert!(!MlError::Cancelled.is_validation());
    }

    #[test]
    fn short_audio_message_mentions_minimum() {
        let e = MlError::AudioTooShort { min_secs: 0.5, actual_secs: 0.2 };
        assert!(e.to_string().starts_with("Audio too short (minimum 0.5 second"));
    }
}
