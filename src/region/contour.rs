use image::GrayImage;
use imageproc::contours::{BorderType, Contour, find_contours};

use super::BoundingBox;

#[derive(Debug, Clone)]
pub(super) struct Blob {
    pub(super) area: f64,
    pub(super) bbox: BoundingBox,
}

/// Outer borders of top-level components only (holes and nested islands
/// are ignored).
pub(super) fn external_blobs(mask: &GrayImage) -> Vec<Blob> {
    find_contours::<u32>(mask)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(|contour| {
            let bbox = bounding_rect(&contour)?;
            Some(Blob {
                area: polygon_area(&contour),
                bbox,
            })
        })
        .collect()
}

/// Largest area; ties go to the leftmost box, then the topmost.
pub(super) fn select_largest(blobs: Vec<Blob>) -> Option<Blob> {
    blobs.into_iter().reduce(|best, blob| {
        let better = blob.area > best.area
            || (blob.area == best.area
                && (blob.bbox.x, blob.bbox.y) < (best.bbox.x, best.bbox.y));
        if better { blob } else { best }
    })
}

/// Shoelace area of the border polygon through pixel centres.
fn polygon_area(contour: &Contour<u32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0f64;
    for (idx, a) in points.iter().enumerate() {
        let b = &points[(idx + 1) % points.len()];
        twice += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    (twice / 2.0).abs()
}

fn bounding_rect(contour: &Contour<u32>) -> Option<BoundingBox> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in &contour.points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    Some(BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}
