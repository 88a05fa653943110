use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;

use crate::error::FinderError;

pub const PNG_MIME: &str = "image/png";
pub const JPEG_MIME: &str = "image/jpeg";
pub const BMP_MIME: &str = "image/bmp";

/// Decoded upload plus the bytes it came from (kept for overlays).
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub image: DynamicImage,
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl LoadedImage {
    /// Bytes and mime type an SVG renderer can decode. PNG and JPEG uploads
    /// pass through; anything else is re-encoded as PNG.
    pub fn embeddable(&self) -> Result<(Cow<'_, [u8]>, &'static str), FinderError> {
        match self.mime {
            PNG_MIME | JPEG_MIME => Ok((Cow::Borrowed(self.bytes.as_slice()), self.mime)),
            _ => {
                let mut png = Cursor::new(Vec::new());
                self.image.write_to(&mut png, ImageFormat::Png)?;
                Ok((Cow::Owned(png.into_inner()), PNG_MIME))
            }
        }
    }
}

pub fn load_image(path: &Path) -> anyhow::Result<LoadedImage> {
    use anyhow::Context;
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read image: {}", path.display()))?;
    load_image_from_bytes(bytes)
        .with_context(|| format!("failed to load image: {}", path.display()))
}

pub fn load_image_from_bytes(bytes: Vec<u8>) -> Result<LoadedImage, FinderError> {
    let mime = sniff_image_mime(&bytes)?;
    let image = image::load_from_memory(&bytes)?;
    tracing::debug!(mime, width = image.width(), height = image.height(), "decoded image");
    Ok(LoadedImage { image, bytes, mime })
}

fn sniff_image_mime(bytes: &[u8]) -> Result<&'static str, FinderError> {
    let Some(kind) = infer::get(bytes) else {
        return Err(FinderError::UnsupportedImage {
            mime: "unknown".to_string(),
        });
    };
    match kind.mime_type() {
        PNG_MIME => Ok(PNG_MIME),
        JPEG_MIME => Ok(JPEG_MIME),
        BMP_MIME => Ok(BMP_MIME),
        other => Err(FinderError::UnsupportedImage {
            mime: other.to_string(),
        }),
    }
}

/// BT.601 luma, compositing transparent pixels over white.
pub fn to_luma(image: &DynamicImage) -> GrayImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut luma = GrayImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let r = r as f32 * alpha + 255.0 * (1.0 - alpha);
        let g = g as f32 * alpha + 255.0 * (1.0 - alpha);
        let b = b as f32 * alpha + 255.0 * (1.0 - alpha);
        let value = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
        luma.put_pixel(x, y, Luma([value]));
    }
    luma
}
