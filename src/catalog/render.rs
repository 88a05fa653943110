use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use crate::ranking::RankedMatch;
use crate::region::BoundingBox;

/// Input image with the detected region outlined and the best match as a
/// caption above it.
pub fn region_overlay_svg(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    region: Option<&BoundingBox>,
    best: Option<&RankedMatch>,
) -> String {
    let encoded = BASE64.encode(image_bytes);
    let data_uri = format!("data:{};base64,{}", image_mime, encoded);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    if let Some(BoundingBox {
        x,
        y,
        width: w,
        height: h,
    }) = region.copied()
    {
        svg.push_str(&format!(
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="#00c853" stroke-width="2"/>"##
        ));
        if let Some(best) = best {
            let font_size = (h as f32 * 0.5).clamp(10.0, 28.0);
            let text_y = if y as f32 > font_size + 4.0 {
                y as f32 - 4.0
            } else {
                (y + h) as f32 + font_size + 2.0
            };
            svg.push_str(&format!(
                r##"<text x="{x}" y="{ty}" font-size="{size}" fill="#00c853" stroke="#ffffff" stroke-width="0.5">{label} ({score:.1}%)</text>"##,
                ty = text_y,
                size = font_size,
                label = escape_xml(&best.label),
                score = best.score * 100.0
            ));
        }
    }

    svg.push_str("</svg>");
    svg
}

/// Black sample text on a white canvas sized to fit it.
pub(super) fn sample_text_svg(
    text: &str,
    family: &str,
    font_size: f32,
    width: u32,
    height: u32,
) -> String {
    let baseline = height as f32 * 0.5 + font_size * 0.35;
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect x="0" y="0" width="{w}" height="{h}" fill="#ffffff"/><text x="{pad}" y="{baseline}" font-size="{size}" font-family="{family}" fill="#000000">{text}</text></svg>"##,
        w = width,
        h = height,
        pad = font_size * 0.5,
        baseline = baseline,
        size = font_size,
        family = escape_xml(family),
        text = escape_xml(text)
    )
}

pub fn rasterize_svg(svg: &str, font_data: Option<&[u8]>) -> Result<image::RgbaImage> {
    let mut db = fontdb::Database::new();
    match font_data {
        Some(data) => db.load_font_data(data.to_vec()),
        None => db.load_system_fonts(),
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
