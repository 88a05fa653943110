//! Feature extraction collaborators.
//!
//! A [`FeatureExtractor`] turns a cropped text region into a fixed-length
//! vector and declares which [`ScoreMode`] its output must be ranked with.

mod classifier;
mod hog;

use image::DynamicImage;

use crate::error::FinderError;
use crate::ranking::ScoreMode;

pub use classifier::{ClassifierOutput, CommandClassifier};
pub use hog::HogExtractor;

pub type FeatureVector = Vec<f32>;

pub trait FeatureExtractor: Send + Sync {
    fn mode(&self) -> ScoreMode;

    /// Must fail with [`FinderError::FeatureExtraction`] rather than return
    /// an empty or zero vector.
    fn extract(&self, region: &DynamicImage) -> Result<FeatureVector, FinderError>;
}
