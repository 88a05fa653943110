use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use std::path::{Path, PathBuf};

use super::font::{FontMetrics, load_font_metrics, load_system_font, measure_text_width_px};
use super::render::{rasterize_svg, sample_text_svg};
use super::{Catalog, CatalogEntry};
use crate::features::{FeatureExtractor, HogExtractor};
use crate::region::{RegionLocator, crop};

/// A font given either as a file or as an installed family name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    File(PathBuf),
    Family(String),
}

impl FontSource {
    /// Existing paths and anything with a font extension are files; the
    /// rest are family names.
    pub fn parse(value: &str) -> Self {
        let path = Path::new(value);
        let has_font_ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                matches!(
                    ext.to_ascii_lowercase().as_str(),
                    "ttf" | "otf" | "ttc" | "otc"
                )
            })
            .unwrap_or(false);
        if has_font_ext || path.exists() {
            Self::File(path.to_path_buf())
        } else {
            Self::Family(value.to_string())
        }
    }

    fn load(&self) -> Result<FontMetrics> {
        match self {
            Self::File(path) => load_font_metrics(path),
            Self::Family(family) => load_system_font(family),
        }
    }

    fn fallback_label(&self) -> String {
        match self {
            Self::File(path) => path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("font")
                .to_string(),
            Self::Family(family) => family.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogBuildOptions {
    pub sample_text: String,
    pub font_size: f32,
}

impl Default for CatalogBuildOptions {
    fn default() -> Self {
        Self {
            sample_text: "The quick brown fox 0123".to_string(),
            font_size: 48.0,
        }
    }
}

/// Renders the sample text in every font and stores the HOG descriptor of
/// the located text region. Fonts that cannot be loaded or rendered are
/// skipped with a warning.
pub fn build_font_catalog(
    fonts: &[FontSource],
    options: &CatalogBuildOptions,
    locator: &RegionLocator,
    extractor: &HogExtractor,
) -> Result<Catalog> {
    if options.sample_text.trim().is_empty() {
        return Err(anyhow!("sample text is empty"));
    }
    let mut entries = Vec::new();
    for source in fonts {
        match describe_font(source, options, locator, extractor) {
            Ok(entry) => {
                tracing::info!(label = %entry.label, "added font to catalog");
                entries.push(entry);
            }
            Err(err) => tracing::warn!(font = ?source, "skipping font: {:#}", err),
        }
    }
    if entries.is_empty() {
        return Err(anyhow!("no fonts could be rendered"));
    }
    Ok(Catalog::new(entries).with_descriptor(extractor.spec()))
}

fn describe_font(
    source: &FontSource,
    options: &CatalogBuildOptions,
    locator: &RegionLocator,
    extractor: &HogExtractor,
) -> Result<CatalogEntry> {
    let metrics = source.load()?;
    let label = metrics
        .family()
        .map(|family| family.to_string())
        .unwrap_or_else(|| source.fallback_label());
    let sample = render_sample(&metrics, &label, options)?;
    let region = locator
        .locate(&sample)
        .ok_or_else(|| anyhow!("rendered sample for '{}' has no visible text", label))?;
    let reference = extractor
        .extract(&crop(&sample, &region))
        .with_context(|| format!("failed to describe '{}'", label))?;
    Ok(CatalogEntry { label, reference })
}

fn render_sample(
    metrics: &FontMetrics,
    family: &str,
    options: &CatalogBuildOptions,
) -> Result<DynamicImage> {
    let text_width = measure_text_width_px(&options.sample_text, options.font_size, Some(metrics));
    let width = (text_width + options.font_size).ceil().max(1.0) as u32;
    let height = (options.font_size * 2.0).ceil().max(1.0) as u32;
    let svg = sample_text_svg(&options.sample_text, family, options.font_size, width, height);
    let pixels = rasterize_svg(&svg, Some(metrics.data()))?;
    Ok(DynamicImage::ImageRgba8(pixels))
}
