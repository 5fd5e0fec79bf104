//! Image preprocessing: decode, force RGB, resize, scale to `[0, 1]`.

pub mod augment;

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

pub use augment::{Augmenter, augment_payload};

use crate::MlError;

/// Square input resolution of every backbone.
pub const IMAGE_SIZE: u32 = 224;

/// Normalised pixels in HWC order, RGB, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ImageTensor {
    pub fn from_rgb(img: &RgbImage) -> Self {
        let data = img.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        Self { width: img.width(), height: img.height(), data }
    }

    /// RGB value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let i = ((y * self.width + x) * 3) as usize;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Planar copy (CHW), the layout ONNX vision graphs expect.
    pub fn to_chw(&self) -> Vec<f32> {
        let plane = (self.width * self.height) as usize;
        let mut out = vec![0.0f32; plane * 3];
        for (p, px) in self.data.chunks_exact(3).enumerate() {
            for c in 0..3 {
                out[c * plane + p] = px[c];
            }
        }
        out
    }
}

/// Decode an uploaded payload into an RGB image.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, MlError> {
    if bytes.is_empty() {
        return Err(MlError::InvalidImage("empty payload".into()));
    }
    let img: DynamicImage =
        image::load_from_memory(bytes).map_err(|e| MlError::InvalidImage(e.to_string()))?;
    Ok(img.to_rgb8())
}

/// Full preprocessing used at training and prediction time.
pub fn preprocess(bytes: &[u8]) -> Result<ImageTensor, MlError> {
    let rgb = decode_rgb(bytes)?;
    Ok(preprocess_rgb(&rgb))
}

pub fn preprocess_rgb(rgb: &RgbImage) -> ImageTensor {
    let resized = image::imageops::resize(rgb, IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle);
    ImageTensor::from_rgb(&resized)
}

/// Encode `img` as PNG.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, MlError> {
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| MlError::InvalidImage(format!("PNG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{Rgb, RgbImage};

    /// A solid-colour image with a little horizontal gradient.
    pub fn solid(width: u32, height: u32, colour: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            let shade = (x * 16 / width.max(1)) as u8;
            Rgb([
                colour[0].saturating_add(shade),
                colour[1].saturating_add(shade),
                colour[2].saturating_add(shade),
            ])
        })
    }
}

#[cfg(test)]
mod test {
    use super::test_support::solid;
    use super::*;

    #[test]
    fn preprocess_resizes_and_normalises() {
        let png = encode_png(&solid(64, 48, [200, 10, 10])).unwrap();
        let t = preprocess(&png).unwrap();
        assert_eq!((t.width, t.height), (IMAGE_SIZE, IMAGE_SIZE));
        assert_eq!(t.data.len(), (IMAGE_SIZE * IMAGE_SIZE * 3) as usize);
        assert!(t.data.iter().all(|v| (0.0..=1.0).contains(v)));
        let [r, g, _] = t.pixel(0, 0);
        assert!(r > 0.7 && g < 0.2);
    }

    #[test]
    fn garbage_is_invalid_image() {
        let err = preprocess(b"not an image").unwrap_err();
        assert!(matches!(err, MlError::InvalidImage(_)));
    }

    #[test]
    fn grayscale_is_forced_to_rgb() {
        let gray = image::GrayImage::from_pixel(8, 8, image::Luma([128]));
        let mut buf = std::io::Cursor::new(Vec::new());
        gray.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        let t = preprocess(&buf.into_inner()).unwrap();
        let [r, g, b] = t.pixel(3, 3);
        assert!((r - g).abs() < 1e-6 && (g - b).abs() < 1e-6);
    }

    #[test]
    fn chw_layout_separates_planes() {
        let t = ImageTensor { width: 2, height: 1, data: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6] };
        assert_eq!(t.to_chw(), vec![0.1, 0.4, 0.2, 0.5, 0.3, 0.6]);
    }
}
