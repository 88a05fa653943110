use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub mod catalog;
pub mod error;
pub mod features;
mod finder;
pub mod image_input;
pub mod logging;
pub mod ranking;
pub mod region;
pub mod settings;
mod test_util;

pub use catalog::{Catalog, CatalogEntry};
pub use error::FinderError;
pub use features::{FeatureExtractor, FeatureVector};
pub use finder::{FontFinder, FontMatch};
pub use ranking::{RankedMatch, RankedResult, ScoreMode, rank};
pub use region::{BoundingBox, LocatorConfig, RegionLocator, locate};

use catalog::{CatalogBuildOptions, FontSource};
use features::{CommandClassifier, HogExtractor};
use image_input::LoadedImage;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub image: Option<String>,
    pub image_bytes: Option<Vec<u8>>,
    pub catalog: Option<String>,
    pub label_map: Option<String>,
    pub classifier: Option<String>,
    pub classifier_args: Vec<String>,
    pub top_k: Option<usize>,
    pub kernel_width: Option<u32>,
    pub kernel_height: Option<u32>,
    pub iterations: Option<u32>,
    pub locate_only: bool,
    pub save_crop: Option<String>,
    pub debug_overlay: Option<String>,
    pub build_catalog: Option<String>,
    pub fonts: Vec<String>,
    pub sample_text: Option<String>,
    pub settings_path: Option<String>,
    pub json: bool,
}

pub fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let locator = RegionLocator::new(locator_config(&config, &settings));

    if let Some(output) = config.build_catalog.as_deref() {
        return build_catalog(&config, &settings, &locator, Path::new(output));
    }

    let loaded = load_input(&config)?;

    if config.locate_only {
        let region = locator
            .locate(&loaded.image)
            .ok_or(FinderError::NoRegionFound)?;
        save_side_outputs(&config, &loaded, &region, None)?;
        return Ok(serde_json::to_string(&region)?);
    }

    let top_k = config.top_k.unwrap_or(settings.top_k);
    let (extractor, catalog) = resolve_extractor(&config, &settings)?;
    tracing::debug!(
        mode = ?extractor.mode(),
        entries = catalog.len(),
        top_k,
        "ranking setup"
    );
    let finder = FontFinder::new(locator, extractor, Arc::new(catalog), top_k)?;
    let found = finder.find(&loaded.image)?;
    save_side_outputs(&config, &loaded, &found.region, found.matches.first())?;

    if config.json {
        return Ok(serde_json::to_string_pretty(&found)?);
    }
    Ok(format_report(&found))
}

/// Plain report: the region, then one `rank. label  score%` line per match.
pub fn format_report(found: &FontMatch) -> String {
    let BoundingBox {
        x,
        y,
        width,
        height,
    } = found.region;
    let mut lines = vec![format!("region: x={x} y={y} width={width} height={height}")];
    if found.matches.is_empty() {
        lines.push("no catalog entries".to_string());
    }
    for (idx, item) in found.matches.iter().enumerate() {
        lines.push(format!(
            "{}. {}  {:.1}%",
            idx + 1,
            item.label,
            item.score * 100.0
        ));
    }
    lines.join("\n")
}

fn locator_config(config: &Config, settings: &settings::Settings) -> LocatorConfig {
    LocatorConfig {
        kernel_width: config
            .kernel_width
            .filter(|value| *value > 0)
            .unwrap_or(settings.kernel_width),
        kernel_height: config
            .kernel_height
            .filter(|value| *value > 0)
            .unwrap_or(settings.kernel_height),
        iterations: config.iterations.unwrap_or(settings.dilate_iterations),
    }
}

fn load_input(config: &Config) -> Result<LoadedImage> {
    if let Some(bytes) = config.image_bytes.clone() {
        return image_input::load_image_from_bytes(bytes)
            .with_context(|| "failed to load image from stdin");
    }
    let path = config
        .image
        .as_deref()
        .ok_or_else(|| anyhow!("no input image given"))?;
    image_input::load_image(Path::new(path))
}

/// Where ranking vectors come from. Command-line flags win over settings;
/// within each layer a classifier wins over a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ExtractorSource {
    Classifier(String),
    Catalog(String),
}

fn choose_extractor(config: &Config, settings: &settings::Settings) -> Option<ExtractorSource> {
    if let Some(program) = config.classifier.clone() {
        return Some(ExtractorSource::Classifier(program));
    }
    if let Some(path) = config.catalog.clone() {
        return Some(ExtractorSource::Catalog(path));
    }
    if let Some(program) = settings.classifier_program.clone() {
        return Some(ExtractorSource::Classifier(program));
    }
    settings.catalog_path.clone().map(ExtractorSource::Catalog)
}

fn resolve_extractor(
    config: &Config,
    settings: &settings::Settings,
) -> Result<(Box<dyn FeatureExtractor>, Catalog)> {
    match choose_extractor(config, settings) {
        Some(ExtractorSource::Classifier(program)) => {
            classifier_extractor(program, config, settings)
        }
        Some(ExtractorSource::Catalog(path)) => catalog_extractor(Path::new(&path), settings),
        None => Err(anyhow!(
            "no catalog configured (use --catalog, or --classifier with an optional --label-map)"
        )),
    }
}

/// Without a label map every class is named `Font_<idx>`; the finder sizes
/// the label catalog to the classifier output.
fn classifier_extractor(
    program: String,
    config: &Config,
    settings: &settings::Settings,
) -> Result<(Box<dyn FeatureExtractor>, Catalog)> {
    let catalog = match config.label_map.as_deref().or(settings.label_map.as_deref()) {
        Some(path) => Catalog::load_label_map(Path::new(path), None)?,
        None => Catalog::default(),
    };
    let args = if config.classifier_args.is_empty() {
        settings.classifier_args.clone()
    } else {
        config.classifier_args.clone()
    };
    let classifier = CommandClassifier::new(program)
        .args(args)
        .input_size(settings.classifier_input_size)
        .output(settings.classifier_output)
        .timeout(Duration::from_secs(settings.classifier_timeout_secs));
    Ok((Box::new(classifier), catalog))
}

fn catalog_extractor(
    path: &Path,
    settings: &settings::Settings,
) -> Result<(Box<dyn FeatureExtractor>, Catalog)> {
    let catalog = Catalog::load(path)?;
    let extractor = match catalog.descriptor() {
        Some(spec) => HogExtractor::from_spec(spec),
        None => HogExtractor::new(settings.hog_width, settings.hog_height),
    };
    if let Some(dimension) = catalog.dimension() {
        if dimension != extractor.dimension() {
            return Err(anyhow!(
                "catalog descriptors have {} values but the HOG geometry {}x{} yields {}",
                dimension,
                extractor.spec().width,
                extractor.spec().height,
                extractor.dimension()
            ));
        }
    }
    Ok((Box::new(extractor), catalog))
}

fn build_catalog(
    config: &Config,
    settings: &settings::Settings,
    locator: &RegionLocator,
    output: &Path,
) -> Result<String> {
    if config.fonts.is_empty() {
        return Err(anyhow!("--build-catalog requires at least one --font"));
    }
    let fonts = config
        .fonts
        .iter()
        .map(|value| FontSource::parse(value))
        .collect::<Vec<_>>();
    let options = CatalogBuildOptions {
        sample_text: config
            .sample_text
            .clone()
            .unwrap_or_else(|| settings.sample_text.clone()),
        font_size: settings.sample_font_size,
    };
    let extractor = HogExtractor::new(settings.hog_width, settings.hog_height);
    let catalog = catalog::build_font_catalog(&fonts, &options, locator, &extractor)?;
    catalog.save(output)?;
    Ok(format!(
        "saved {} of {} fonts to {}",
        catalog.len(),
        fonts.len(),
        output.display()
    ))
}

fn save_side_outputs(
    config: &Config,
    loaded: &LoadedImage,
    region: &BoundingBox,
    best: Option<&RankedMatch>,
) -> Result<()> {
    if let Some(path) = config.save_crop.as_deref() {
        region::crop(&loaded.image, region)
            .save(path)
            .with_context(|| format!("failed to write crop: {}", path))?;
    }
    if let Some(path) = config.debug_overlay.as_deref() {
        write_overlay(Path::new(path), loaded, region, best)?;
    }
    Ok(())
}

fn write_overlay(
    path: &Path,
    loaded: &LoadedImage,
    region: &BoundingBox,
    best: Option<&RankedMatch>,
) -> Result<()> {
    let (bytes, mime) = loaded.embeddable()?;
    let svg = catalog::region_overlay_svg(
        &bytes,
        mime,
        loaded.image.width(),
        loaded.image.height(),
        Some(region),
        best,
    );
    let is_svg = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false);
    if is_svg {
        return std::fs::write(path, svg)
            .with_context(|| format!("failed to write overlay: {}", path.display()));
    }
    let pixels = catalog::rasterize_svg(&svg, None)?;
    image::DynamicImage::ImageRgba8(pixels)
        .to_rgb8()
        .save(path)
        .with_context(|| format!("failed to write overlay: {}", path.display()))
}
