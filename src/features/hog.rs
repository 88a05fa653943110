use image::DynamicImage;
use image::imageops::{self, FilterType};
use imageproc::hog::{HogOptions, hog};

use super::{FeatureExtractor, FeatureVector};
use crate::catalog::DescriptorSpec;
use crate::error::FinderError;
use crate::image_input::to_luma;
use crate::ranking::ScoreMode;

const CELL_SIDE: u32 = 8;
const BLOCK_SIDE: usize = 2;
const ORIENTATIONS: usize = 9;
const MAX_SAMPLE_SIDE: u32 = 4096;

/// Histogram-of-oriented-gradients descriptor of a region resized to a fixed
/// sample geometry. Width and height are rounded up to whole 8 px cells and
/// capped at 4096 px.
#[derive(Debug, Clone)]
pub struct HogExtractor {
    width: u32,
    height: u32,
}

impl Default for HogExtractor {
    fn default() -> Self {
        Self::new(128, 32)
    }
}

impl HogExtractor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: round_to_cells(width),
            height: round_to_cells(height),
        }
    }

    pub fn from_spec(spec: DescriptorSpec) -> Self {
        Self::new(spec.width, spec.height)
    }

    pub fn spec(&self) -> DescriptorSpec {
        DescriptorSpec {
            width: self.width,
            height: self.height,
        }
    }

    /// Descriptor length for the configured geometry.
    pub fn dimension(&self) -> usize {
        let cells_wide = (self.width / CELL_SIDE) as usize;
        let cells_high = (self.height / CELL_SIDE) as usize;
        let blocks_wide = cells_wide + 1 - BLOCK_SIDE;
        let blocks_high = cells_high + 1 - BLOCK_SIDE;
        blocks_wide * blocks_high * BLOCK_SIDE * BLOCK_SIDE * ORIENTATIONS
    }
}

fn round_to_cells(value: u32) -> u32 {
    let cells = value
        .min(MAX_SAMPLE_SIDE)
        .div_ceil(CELL_SIDE)
        .max(BLOCK_SIDE as u32);
    cells * CELL_SIDE
}

impl FeatureExtractor for HogExtractor {
    fn mode(&self) -> ScoreMode {
        ScoreMode::Cosine
    }

    fn extract(&self, region: &DynamicImage) -> Result<FeatureVector, FinderError> {
        if region.width() == 0 || region.height() == 0 {
            return Err(FinderError::extraction("region is empty"));
        }
        let gray = to_luma(region);
        let sample = imageops::resize(&gray, self.width, self.height, FilterType::Triangle);
        let options = HogOptions {
            orientations: ORIENTATIONS,
            signed: false,
            cell_side: CELL_SIDE as usize,
            block_side: BLOCK_SIDE,
            block_stride: 1,
        };
        let mut descriptor = hog(&sample, options)
            .map_err(|err| FinderError::extraction(format!("hog descriptor: {}", err)))?;
        // Flat blocks normalise to NaN; they carry no gradient.
        for value in descriptor.iter_mut().filter(|value| !value.is_finite()) {
            *value = 0.0;
        }
        if descriptor.iter().all(|value| *value == 0.0) {
            return Err(FinderError::extraction("region has no gradient structure"));
        }
        Ok(descriptor)
    }
}
