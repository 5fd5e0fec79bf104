//! Upload quality gate: minimum duration and loudness.

use crate::MlError;

/// Frame length used for RMS energy.
const RMS_FRAME: usize = 2048;
/// Hop between RMS frames.
const RMS_HOP: usize = 512;

/// Thresholds applied to an uploaded or submitted clip.
#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    pub min_secs: f32,
    pub min_rms: f32,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self { min_secs: 0.5, min_rms: 0.005 }
    }
}

impl QualityGate {
    /// Reject `samples` (mono, `sample_rate` Hz) that are too short or too quiet.
    pub fn check(&self, samples: &[f32], sample_rate: u32) -> Result<(), MlError> {
        let min_frames = (self.min_secs * sample_rate as f32) as usize;
        if samples.len() < min_frames {
            return Err(MlError::AudioTooShort {
                min_secs: self.min_secs,
                actual_secs: samples.len() as f32 / sample_rate as f32,
            });
        }

        let rms = mean_rms(samples);
        if rms < self.min_rms {
            return Err(MlError::AudioTooQuiet { rms, threshold: self.min_rms });
        }
        Ok(())
    }
}

/// Mean of centred, zero-padded frame RMS values.
pub fn mean_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let pad = RMS_FRAME / 2;
    let padded_len = samples.len() + 2 * pad;
    let n_frames = 1 + (padded_len - RMS_FRAME) / RMS_HOP;

    let at = |i: usize| -> f32 {
        if i < pad || i >= pad + samples.len() { 0.0 } else { samples[i - pad] }
    };

    let total: f32 = (0..n_frames)
        .map(|f| {
            let start = f * RMS_HOP;
            let energy: f32 = (start..start + RMS_FRAME).map(|i| at(i).powi(2)).sum();
            (energy / RMS_FRAME as f32).sqrt()
        })
        .sum();
    total / n_frames as f32
}

#[cfg(test)]
mod test {
    use super::*;

    fn tone(secs: f32, amplitude: f32) -> Vec<f32> {
        let n = (secs * 16_000.0) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin())
            .collect()
    }

    #[test]
    fn accepts_loud_enough_clip() {
        QualityGate::default().check(&tone(1.0, 0.3), 16_000).unwrap();
    }

    #[test]
    fn rejects_short_clip() {
        let err = QualityGate::default().check(&tone(0.3, 0.3), 16_000).unwrap_err();
        assert!(matches!(err, MlError::AudioTooShort { .. }));
    }

    #[test]
    fn rejects_silence() {
        let err = QualityGate::default().check(&vec![0.0; 16_000], 16_000).unwrap_err();
        assert!(matches!(err, MlError::AudioTooQuiet { .. }));
    }

    #[test]
    fn sine_rms_is_close_to_amplitude_over_sqrt2() {
        let rms = mean_rms(&tone(1.5, 0.5));
        // Edge frames are partially zero-padded, so the mean sits slightly below 0.354.
        assert!(rms > 0.30 && rms < 0.36, "rms = {rms}");
    }
}
