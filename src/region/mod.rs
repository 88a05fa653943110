//! Text region localisation.
//!
//! Finds the single most prominent concentration of dark pixels in an image:
//! grayscale, inverted Otsu threshold, rectangular dilation to merge letters
//! into lines, then the external contour with the largest enclosed area.

mod contour;
mod morph;
mod threshold;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::image_input::to_luma;

/// Axis-aligned box in pixel coordinates; `width` and `height` are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Structuring element and iteration count for the dilation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorConfig {
    pub kernel_width: u32,
    pub kernel_height: u32,
    pub iterations: u32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            kernel_width: 22,
            kernel_height: 6,
            iterations: 2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegionLocator {
    config: LocatorConfig,
}

impl RegionLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Bounding box of the largest text-like blob, or `None` when the image
    /// has no foreground at all (blank or single-colour input).
    ///
    /// Blobs with equal area resolve to the leftmost one, then the topmost.
    pub fn locate(&self, image: &DynamicImage) -> Option<BoundingBox> {
        let gray = to_luma(image);
        let Some(level) = threshold::otsu_level(&gray) else {
            tracing::debug!("uniform image, no threshold");
            return None;
        };
        let mask = threshold::binarize_inverted(&gray, level);
        let dilated = morph::dilate_rect(
            &mask,
            self.config.kernel_width,
            self.config.kernel_height,
            self.config.iterations,
        );
        let blobs = contour::external_blobs(&dilated);
        tracing::debug!(level, blobs = blobs.len(), "thresholded and dilated");
        contour::select_largest(blobs).map(|blob| blob.bbox)
    }
}

/// [`RegionLocator::locate`] with the default 22x6 kernel.
pub fn locate(image: &DynamicImage) -> Option<BoundingBox> {
    RegionLocator::default().locate(image)
}

pub fn crop(image: &DynamicImage, bbox: &BoundingBox) -> DynamicImage {
    image.crop_imm(bbox.x, bbox.y, bbox.width, bbox.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{canvas_with_blocks, white_canvas};
    use image::{Rgb, RgbImage};

    #[test]
    fn blank_and_uniform_images_have_no_region() {
        assert_eq!(locate(&white_canvas(120, 80)), None);
        let grey = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([90, 140, 200])));
        assert_eq!(locate(&grey), None);
    }

    #[test]
    fn exact_box_without_dilation() {
        let blob = BoundingBox {
            x: 30,
            y: 20,
            width: 50,
            height: 12,
        };
        let image = canvas_with_blocks(160, 80, &[blob]);
        let locator = RegionLocator::new(LocatorConfig {
            kernel_width: 1,
            kernel_height: 1,
            iterations: 0,
        });
        assert_eq!(locator.locate(&image), Some(blob));
    }

    #[test]
    fn default_kernel_contains_blob_and_stays_close() {
        let blob = BoundingBox {
            x: 60,
            y: 40,
            width: 80,
            height: 20,
        };
        let image = canvas_with_blocks(240, 120, &[blob]);
        let found = locate(&image).expect("region");
        assert!(found.contains(&blob), "{found:?} should contain {blob:?}");
        // Two passes of a 22x6 kernel grow each side by at most 22 and 6 px.
        assert!(found.width <= blob.width + 2 * 22);
        assert!(found.height <= blob.height + 2 * 6);
    }

    #[test]
    fn letters_on_one_line_merge_into_one_region() {
        let letters = (0..6)
            .map(|idx| BoundingBox {
                x: 20 + idx * 18,
                y: 30,
                width: 10,
                height: 16,
            })
            .collect::<Vec<_>>();
        let image = canvas_with_blocks(200, 80, &letters);
        let found = locate(&image).expect("region");
        assert!(found.x <= 20 && found.right() >= 20 + 5 * 18 + 10);
    }

    #[test]
    fn larger_block_wins() {
        let small = BoundingBox {
            x: 10,
            y: 10,
            width: 20,
            height: 10,
        };
        let large = BoundingBox {
            x: 10,
            y: 80,
            width: 120,
            height: 30,
        };
        let image = canvas_with_blocks(200, 150, &[small, large]);
        let found = locate(&image).expect("region");
        assert!(found.contains(&large));
        assert!(!found.contains(&small));
    }

    #[test]
    fn equal_blocks_resolve_to_leftmost() {
        // Documented tie-break for blocks of identical size.
        let right = BoundingBox {
            x: 150,
            y: 20,
            width: 40,
            height: 10,
        };
        let left = BoundingBox {
            x: 20,
            y: 60,
            width: 40,
            height: 10,
        };
        let image = canvas_with_blocks(240, 100, &[right, left]);
        let found = locate(&image).expect("region");
        assert!(found.contains(&left));
    }

    #[test]
    fn alternate_kernel_is_accepted() {
        let blob = BoundingBox {
            x: 40,
            y: 40,
            width: 60,
            height: 14,
        };
        let image = canvas_with_blocks(200, 100, &[blob]);
        let locator = RegionLocator::new(LocatorConfig {
            kernel_width: 25,
            kernel_height: 5,
            iterations: 2,
        });
        assert!(locator.locate(&image).expect("region").contains(&blob));
    }

    #[test]
    fn crop_matches_box() {
        let image = white_canvas(50, 40);
        let bbox = BoundingBox {
            x: 5,
            y: 6,
            width: 10,
            height: 7,
        };
        let region = crop(&image, &bbox);
        assert_eq!((region.width(), region.height()), (10, 7));
    }
}
