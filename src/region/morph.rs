use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_dilate};

/// Largest side `Mask::from_image` accepts.
const MAX_KERNEL_SIDE: u32 = 511;

/// Dilation with a `kernel_w x kernel_h` rectangle anchored at its centre,
/// applied `iterations` times. Kernel sides are clamped to `1..=511`.
pub(super) fn dilate_rect(
    mask: &GrayImage,
    kernel_w: u32,
    kernel_h: u32,
    iterations: u32,
) -> GrayImage {
    let kernel = rect_mask(kernel_w, kernel_h);
    let mut current = mask.clone();
    for _ in 0..iterations {
        current = grayscale_dilate(&current, &kernel);
    }
    current
}

fn rect_mask(kernel_w: u32, kernel_h: u32) -> Mask {
    let w = kernel_w.clamp(1, MAX_KERNEL_SIDE);
    let h = kernel_h.clamp(1, MAX_KERNEL_SIDE);
    let rect = GrayImage::from_pixel(w, h, Luma([255]));
    // w / 2 <= 255, so the anchor always fits in a u8.
    Mask::from_image(&rect, (w / 2) as u8, (h / 2) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_kernel_bridges_nearby_pixels() {
        let mut mask = GrayImage::new(100, 1);
        mask.put_pixel(42, 0, Luma([255]));
        mask.put_pixel(47, 0, Luma([255]));
        let dilated = dilate_rect(&mask, 20, 1, 1);
        // Anchor at 10: each pixel spreads to [x - 9, x + 10].
        for x in 33..58 {
            assert_eq!(dilated.get_pixel(x, 0)[0], 255, "pixel {x} should be set");
        }
        assert_eq!(dilated.get_pixel(32, 0)[0], 0);
        assert_eq!(dilated.get_pixel(58, 0)[0], 0);
    }

    #[test]
    fn single_pixel_grows_to_kernel_rectangle() {
        let mut mask = GrayImage::new(40, 20);
        mask.put_pixel(20, 10, Luma([255]));
        let dilated = dilate_rect(&mask, 7, 3, 1);
        let set = dilated.pixels().filter(|p| p[0] == 255).count();
        assert_eq!(set, 21);
        assert_eq!(dilated.get_pixel(17, 9)[0], 255);
        assert_eq!(dilated.get_pixel(23, 11)[0], 255);
        assert_eq!(dilated.get_pixel(24, 10)[0], 0);
    }

    #[test]
    fn zero_iterations_leave_mask_untouched() {
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(2, 2, Luma([255]));
        assert_eq!(dilate_rect(&mask, 22, 6, 0), mask);
    }

    #[test]
    fn oversized_kernel_is_clamped() {
        let mut mask = GrayImage::new(8, 8);
        mask.put_pixel(4, 4, Luma([255]));
        let dilated = dilate_rect(&mask, 4_000, 0, 1);
        assert!((0..8).all(|x| dilated.get_pixel(x, 4)[0] == 255));
        assert_eq!(dilated.get_pixel(4, 3)[0], 0);
    }
}
