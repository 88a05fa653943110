use std::io::{self, Read};
use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::Parser;
use font_finder_rust::FinderError;

#[derive(Parser, Debug)]
#[command(
    name = "font-finder-rust",
    version,
    about = "Locate the text in an image and rank the fonts it resembles"
)]
struct Cli {
    /// Input image (png/jpeg/bmp). Use "-" to read from stdin
    #[arg(value_name = "IMAGE", required_unless_present = "build_catalog")]
    image: Option<String>,

    /// Descriptor catalog built with --build-catalog (cosine ranking); beats a
    /// classifier configured in settings
    #[arg(short = 'c', long = "catalog")]
    catalog: Option<String>,

    /// Classifier label map JSON ({"0": "Roboto", ...}); unnamed classes become Font_<idx>
    #[arg(long = "label-map")]
    label_map: Option<String>,

    /// Classifier command; receives the region PNG path as its last argument
    #[arg(long = "classifier")]
    classifier: Option<String>,

    /// Extra argument for the classifier command (repeatable)
    #[arg(long = "classifier-arg", allow_hyphen_values = true)]
    classifier_args: Vec<String>,

    /// Number of matches to report
    #[arg(short = 'k', long = "top-k")]
    top_k: Option<usize>,

    /// Dilation kernel width in pixels
    #[arg(long = "kernel-width")]
    kernel_width: Option<u32>,

    /// Dilation kernel height in pixels
    #[arg(long = "kernel-height")]
    kernel_height: Option<u32>,

    /// Dilation iterations
    #[arg(long = "iterations")]
    iterations: Option<u32>,

    /// Print the text bounding box as JSON and exit
    #[arg(long = "locate-only")]
    locate_only: bool,

    /// Write the cropped text region to this path
    #[arg(long = "save-crop")]
    save_crop: Option<String>,

    /// Write a region overlay (.svg, or any raster extension)
    #[arg(long = "debug-overlay")]
    debug_overlay: Option<String>,

    /// Build a descriptor catalog from --font entries and write it here
    #[arg(long = "build-catalog")]
    build_catalog: Option<String>,

    /// Font file or installed family name for --build-catalog (repeatable)
    #[arg(long = "font")]
    fonts: Vec<String>,

    /// Sample text rendered for each font by --build-catalog
    #[arg(long = "sample-text")]
    sample_text: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Print the result as JSON
    #[arg(long = "json")]
    json: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    font_finder_rust::logging::init(cli.verbose)?;

    let (image, image_bytes) = match cli.image {
        Some(path) if path == "-" => {
            let mut buffer = Vec::new();
            io::stdin().read_to_end(&mut buffer)?;
            if buffer.is_empty() {
                return Err(anyhow!("stdin is empty; expected image bytes"));
            }
            (None, Some(buffer))
        }
        other => (other, None),
    };

    let result = font_finder_rust::run(font_finder_rust::Config {
        image,
        image_bytes,
        catalog: cli.catalog,
        label_map: cli.label_map,
        classifier: cli.classifier,
        classifier_args: cli.classifier_args,
        top_k: cli.top_k,
        kernel_width: cli.kernel_width,
        kernel_height: cli.kernel_height,
        iterations: cli.iterations,
        locate_only: cli.locate_only,
        save_crop: cli.save_crop,
        debug_overlay: cli.debug_overlay,
        build_catalog: cli.build_catalog,
        fonts: cli.fonts,
        sample_text: cli.sample_text,
        settings_path: cli.read_settings,
        json: cli.json,
    });

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if matches!(err.downcast_ref(), Some(FinderError::NoRegionFound)) => {
            eprintln!("warning: {}", FinderError::NoRegionFound);
            Ok(ExitCode::from(2))
        }
        Err(err) => Err(err),
    }
}
