//! Randomised geometric/photometric augmentation.
//!
//! Each derived image is an affine warp of the original (rotation, shift,
//! shear, zoom) with nearest-edge fill, an optional horizontal flip and a
//! brightness factor. Sampling is bilinear.

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{decode_rgb, encode_png};
use crate::MlError;

/// Ranges of the random transforms.
#[derive(Debug, Clone)]
pub struct Augmenter {
    pub rotation_deg: f32,
    /// Fraction of width/height.
    pub shift: f32,
    /// Radians.
    pub shear: f32,
    pub zoom: (f32, f32),
    pub horizontal_flip: bool,
    pub brightness: (f32, f32),
}

impl Default for Augmenter {
    fn default() -> Self {
        Self {
            rotation_deg: 20.0,
            shift: 0.1,
            shear: 0.15,
            zoom: (0.85, 1.15),
            horizontal_flip: true,
            brightness: (0.8, 1.2),
        }
    }
}

impl Augmenter {
    pub fn apply<R: Rng>(&self, img: &RgbImage, rng: &mut R) -> RgbImage {
        let (w, h) = (img.width() as f32, img.height() as f32);
        let theta = rng.gen_range(-self.rotation_deg..=self.rotation_deg).to_radians();
        let tx = rng.gen_range(-self.shift..=self.shift) * w;
        let ty = rng.gen_range(-self.shift..=self.shift) * h;
        let shear = rng.gen_range(-self.shear..=self.shear);
        let zoom = rng.gen_range(self.zoom.0..=self.zoom.1);
        let flip = self.horizontal_flip && rng.gen_bool(0.5);
        let gain = rng.gen_range(self.brightness.0..=self.brightness.1);

        // Forward map A = R(theta) * Shear * Zoom; we need its inverse to pull pixels.
        let (sin, cos) = theta.sin_cos();
        let a = [
            [cos * zoom, (cos * shear.tan() - sin) * zoom],
            [sin * zoom, (sin * shear.tan() + cos) * zoom],
        ];
        let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
        let inv = [
            [a[1][1] / det, -a[0][1] / det],
            [-a[1][0] / det, a[0][0] / det],
        ];
        let (cx, cy) = (w / 2.0, h / 2.0);

        RgbImage::from_fn(img.width(), img.height(), |x, y| {
            let x_out = if flip { w - 1.0 - x as f32 } else { x as f32 };
            let dx = x_out - cx - tx;
            let dy = y as f32 - cy - ty;
            let sx = inv[0][0] * dx + inv[0][1] * dy + cx;
            let sy = inv[1][0] * dx + inv[1][1] * dy + cy;
            let [r, g, b] = bilinear(img, sx, sy);
            Rgb([scale(r, gain), scale(g, gain), scale(b, gain)])
        })
    }
}

fn scale(v: f32, gain: f32) -> u8 {
    (v * gain).round().clamp(0.0, 255.0) as u8
}

/// Bilinear sample with coordinates clamped to the image ("nearest" fill).
fn bilinear(img: &RgbImage, x: f32, y: f32) -> [f32; 3] {
    let max_x = (img.width() - 1) as f32;
    let max_y = (img.height() - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(img.width() - 1), (y0 + 1).min(img.height() - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let p = |px: u32, py: u32| img.get_pixel(px, py).0;
    let (p00, p10, p01, p11) = (p(x0, y0), p(x1, y0), p(x0, y1), p(x1, y1));
    let mut out = [0.0f32; 3];
    for c in 0..3 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = top * (1.0 - fy) + bottom * fy;
    }
    out
}

/// Decode `bytes` and produce `count` augmented PNG-encoded variants.
///
/// `seed` makes the output reproducible; `None` draws from OS entropy.
pub fn augment_payload(
    bytes: &[u8],
    count: usize,
    augmenter: &Augmenter,
    seed: Option<u64>,
) -> Result<Vec<Vec<u8>>, MlError> {
    let img = decode_rgb(bytes)?;
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let variants = (0..count)
        .map(|_| encode_png(&augmenter.apply(&img, &mut rng)))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(count, width = img.width(), height = img.height(), "generated augmented variants");
    Ok(variants)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::test_support::solid;

    #[test]
    fn identity_settings_reproduce_the_image() {
        let img = solid(16, 16, [40, 80, 120]);
        let identity = Augmenter {
            rotation_deg: 0.0,
            shift: 0.0,
            shear: 0.0,
            zoom: (1.0, 1.0),
            horizontal_flip: false,
            brightness: (1.0, 1.0),
        };
        let out = identity.apply(&img, &mut StdRng::seed_from_u64(1));
        assert_eq!(out, img);
    }

    #[test]
    fn augmentation_keeps_dimensions() {
        let img = solid(32, 20, [10, 200, 30]);
        let out = Augmenter::default().apply(&img, &mut StdRng::seed_from_u64(7));
        assert_eq!(out.dimensions(), (32, 20));
    }

    #[test]
    fn payload_variants_are_decodable_and_seeded() {
        let png = encode_png(&solid(24, 24, [90, 90, 200])).unwrap();
        let a = augment_payload(&png, 3, &Augmenter::default(), Some(42)).unwrap();
        let b = augment_payload(&png, 3, &Augmenter::default(), Some(42)).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(a, b);
        for variant in &a {
            assert!(decode_rgb(variant).is_ok());
        }
    }

    #[test]
    fn undecodable_payload_fails() {
        assert!(augment_payload(b"nope", 2, &Augmenter::default(), Some(1)).is_err());
    }
}
