//! Error types shared by the locator, the extractors and the ranker.

use thiserror::Error;

/// Errors surfaced by the font finding core.
///
/// `NoRegionFound` is the only variant a user can fix by supplying a
/// different image; the others point at a broken integration.
#[derive(Error, Debug)]
pub enum FinderError {
    /// The locator found no text-like blob in the image.
    #[error("no text region found; try a clearer image")]
    NoRegionFound,

    /// A query and a reference vector have different dimensionality.
    #[error("vector length mismatch for '{label}': expected {expected}, got {actual}")]
    VectorLengthMismatch {
        label: String,
        expected: usize,
        actual: usize,
    },

    /// The feature collaborator failed to produce a vector.
    #[error("feature extraction failed: {message}")]
    FeatureExtraction {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("top-k must be at least 1")]
    InvalidTopK,

    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    #[error("unsupported image type: {mime} (expected png, jpeg or bmp)")]
    UnsupportedImage { mime: String },
}

impl FinderError {
    pub(crate) fn extraction(message: impl Into<String>) -> Self {
        Self::FeatureExtraction {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn extraction_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::FeatureExtraction {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<image::ImageError> for FinderError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageLoad(err)
    }
}
