use image::GrayImage;
use imageproc::contrast::{self, ThresholdType};
use imageproc::stats::histogram;

/// Otsu level; pixels `<= level` form the dark class.
///
/// Returns `None` when fewer than two intensity levels are present, since no
/// split exists.
pub(super) fn otsu_level(image: &GrayImage) -> Option<u8> {
    let hist = histogram(image);
    let levels = hist.channels[0].iter().filter(|count| **count > 0).count();
    if levels < 2 {
        return None;
    }
    Some(contrast::otsu_level(image))
}

/// Inverted binarization: dark pixels become foreground (255).
pub(super) fn binarize_inverted(image: &GrayImage, level: u8) -> GrayImage {
    contrast::threshold(image, level, ThresholdType::BinaryInverted)
}
