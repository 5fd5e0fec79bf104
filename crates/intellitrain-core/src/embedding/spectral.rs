//! Built-in log-mel embedder.
//!
//! Uses the YAMNet front-end parameters (25 ms window, 10 ms hop, 64 mel
//! bands between 125 Hz and 7.5 kHz, `ln(mel + 0.001)`) and summarises the
//! spectrogram as per-band mean and standard deviation.

use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};

use super::{AudioEmbedder, ensure_usable};
use crate::MlError;
use crate::audio::SAMPLE_RATE;

const FRAME_LEN: usize = 400;
const HOP: usize = 160;
const FFT_LEN: usize = 512;
const MEL_BANDS: usize = 64;
const MEL_MIN_HZ: f32 = 125.0;
const MEL_MAX_HZ: f32 = 7500.0;
const LOG_OFFSET: f32 = 0.001;

pub struct SpectralEmbedder {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    filterbank: Vec<Vec<f32>>,
}

impl Default for SpectralEmbedder {
    fn default() -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let window = (0..FRAME_LEN)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / FRAME_LEN as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();
        Self {
            fft: planner.plan_fft_forward(FFT_LEN),
            window,
            filterbank: mel_filterbank(MEL_BANDS, FFT_LEN, SAMPLE_RATE as f32),
        }
    }
}

impl SpectralEmbedder {
    /// Log-mel frames of `samples`, one `MEL_BANDS` row per hop.
    fn log_mel(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>, MlError> {
        if samples.len() < FRAME_LEN {
            return Err(MlError::EmbeddingFailed("window shorter than one frame".into()));
        }
        let n_frames = (samples.len() - FRAME_LEN) / HOP + 1;

        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        let mut scratch = self.fft.make_scratch_vec();
        let mut frames = Vec::with_capacity(n_frames);

        for f in 0..n_frames {
            let start = f * HOP;
            input.iter_mut().for_each(|v| *v = 0.0);
            for i in 0..FRAME_LEN {
                input[i] = samples[start + i] * self.window[i];
            }
            self.fft
                .process_with_scratch(&mut input, &mut spectrum, &mut scratch)
                .map_err(|e| MlError::EmbeddingFailed(format!("FFT failed: {e:?}")))?;

            let magnitude: Vec<f32> = spectrum.iter().map(|c| c.norm()).collect();
            let bands = self
                .filterbank
                .iter()
                .map(|filter| {
                    let energy: f32 = filter.iter().zip(&magnitude).map(|(w, m)| w * m).sum();
                    (energy + LOG_OFFSET).ln()
                })
                .collect();
            frames.push(bands);
        }
        Ok(frames)
    }
}

impl AudioEmbedder for SpectralEmbedder {
    fn name(&self) -> &str {
        "spectral-v1"
    }

    fn dim(&self) -> usize {
        2 * MEL_BANDS
    }

    fn embed(&self, window: &[f32]) -> Result<Vec<f32>, MlError> {
        let frames = self.log_mel(window)?;
        let n = frames.len() as f32;

        let mut mean = vec![0.0f32; MEL_BANDS];
        for frame in &frames {
            for (m, v) in mean.iter_mut().zip(frame) {
                *m += v / n;
            }
        }
        let mut std = vec![0.0f32; MEL_BANDS];
        for frame in &frames {
            for ((s, v), m) in std.iter_mut().zip(frame).zip(&mean) {
                *s += (v - m).powi(2) / n;
            }
        }
        std.iter_mut().for_each(|s| *s = s.sqrt());

        mean.extend(std);
        ensure_usable(mean, self.dim())
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filters over the `fft_len / 2 + 1` magnitude bins.
fn mel_filterbank(bands: usize, fft_len: usize, sample_rate: f32) -> Vec<Vec<f32>> {
    let n_bins = fft_len / 2 + 1;
    let bin_hz = sample_rate / fft_len as f32;
    let (lo, hi) = (hz_to_mel(MEL_MIN_HZ), hz_to_mel(MEL_MAX_HZ));
    let edges: Vec<f32> = (0..bands + 2)
        .map(|i| mel_to_hz(lo + (hi - lo) * i as f32 / (bands + 1) as f32))
        .collect();

    (0..bands)
        .map(|b| {
            let (left, centre, right) = (edges[b], edges[b + 1], edges[b + 2]);
            (0..n_bins)
                .map(|k| {
                    let hz = k as f32 * bin_hz;
                    if hz <= left || hz >= right {
                        0.0
                    } else if hz <= centre {
                        (hz - left) / (centre - left)
                    } else {
                        (right - hz) / (right - centre)
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn tone(freq: f32) -> Vec<f32> {
        (0..16_000)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * freq * i as f32 / 16_000.0).sin())
            .collect()
    }

    fn distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
    }

    #[test]
    fn embedding_has_declared_dim() {
        let embedder = SpectralEmbedder::default();
        let v = embedder.embed(&tone(440.0)).unwrap();
        assert_eq!(v.len(), embedder.dim());
    }

    #[test]
    fn embedding_is_deterministic() {
        let embedder = SpectralEmbedder::default();
        assert_eq!(embedder.embed(&tone(440.0)).unwrap(), embedder.embed(&tone(440.0)).unwrap());
    }

    #[test]
    fn different_pitches_are_far_apart() {
        let embedder = SpectralEmbedder::default();
        let low = embedder.embed(&tone(300.0)).unwrap();
        let low2 = embedder.embed(&tone(310.0)).unwrap();
        let high = embedder.embed(&tone(3000.0)).unwrap();
        assert!(distance(&low, &high) > distance(&low, &low2));
    }

    #[test]
    fn silence_still_yields_a_usable_vector() {
        // ln(0.001) is a valid, non-zero log energy.
        let embedder = SpectralEmbedder::default();
        assert!(embedder.embed(&vec![0.0; 16_000]).is_ok());
    }

    #[test]
    fn filterbank_rows_are_non_empty() {
        let fb = mel_filterbank(MEL_BANDS, FFT_LEN, 16_000.0);
        assert_eq!(fb.len(), MEL_BANDS);
        assert!(fb.iter().all(|row| row.iter().any(|w| *w > 0.0)));
    }
}
