//! Built-in frozen backbone: pooled colour statistics.
//!
//! Layout: 4×4 grid of mean RGB (48), 8-bin histogram per channel (24),
//! global mean and standard deviation per channel (6).

use super::ImageBackbone;
use crate::MlError;
use crate::embedding::ensure_usable;
use crate::image::ImageTensor;

const GRID: u32 = 4;
const BINS: usize = 8;
const DIM: usize = (GRID * GRID * 3) as usize + BINS * 3 + 6;

#[derive(Debug, Clone, Copy, Default)]
pub struct PooledBackbone;

impl ImageBackbone for PooledBackbone {
    fn name(&self) -> &str {
        "pooled-v1"
    }

    fn dim(&self) -> usize {
        DIM
    }

    fn features(&self, image: &ImageTensor) -> Result<Vec<f32>, MlError> {
        if image.width < GRID || image.height < GRID {
            return Err(MlError::InvalidImage(format!(
                "image {}x{} is smaller than the {GRID}x{GRID} pooling grid",
                image.width, image.height
            )));
        }
        let mut out = Vec::with_capacity(DIM);

        let (cell_w, cell_h) = (image.width / GRID, image.height / GRID);
        for gy in 0..GRID {
            for gx in 0..GRID {
                let mut sum = [0.0f32; 3];
                for y in gy * cell_h..(gy + 1) * cell_h {
                    for x in gx * cell_w..(gx + 1) * cell_w {
                        let px = image.pixel(x, y);
                        for c in 0..3 {
                            sum[c] += px[c];
                        }
                    }
                }
                let n = (cell_w * cell_h) as f32;
                out.extend(sum.iter().map(|s| s / n));
            }
        }

        let total = (image.width * image.height) as f32;
        let mut hist = [[0.0f32; BINS]; 3];
        let mut mean = [0.0f32; 3];
        for px in image.data.chunks_exact(3) {
            for c in 0..3 {
                let bin = ((px[c] * BINS as f32) as usize).min(BINS - 1);
                hist[c][bin] += 1.0 / total;
                mean[c] += px[c] / total;
            }
        }
        let mut var = [0.0f32; 3];
        for px in image.data.chunks_exact(3) {
            for c in 0..3 {
                var[c] += (px[c] - mean[c]).powi(2) / total;
            }
        }

        for channel in &hist {
            out.extend_from_slice(channel);
        }
        out.extend_from_slice(&mean);
        out.extend(var.iter().map(|v| v.sqrt()));

        // Histograms always sum to 1 per channel, so a valid image is never all zero.
        ensure_usable(out, DIM)
    }
}
