#[cfg(test)]
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: HOME is only touched by tests holding HOME_MUTEX.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

#[cfg(test)]
pub(crate) fn white_canvas(width: u32, height: u32) -> image::DynamicImage {
    image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([255, 255, 255]),
    ))
}

/// White canvas with solid black rectangles.
#[cfg(test)]
pub(crate) fn canvas_with_blocks(
    width: u32,
    height: u32,
    blocks: &[crate::region::BoundingBox],
) -> image::DynamicImage {
    let mut canvas = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    for block in blocks {
        for y in block.y..block.bottom() {
            for x in block.x..block.right() {
                canvas.put_pixel(x, y, image::Rgb([0, 0, 0]));
            }
        }
    }
    image::DynamicImage::ImageRgb8(canvas)
}
