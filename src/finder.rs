use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::FinderError;
use crate::features::FeatureExtractor;
use crate::ranking::{RankedResult, ScoreMode, rank};
use crate::region::{BoundingBox, RegionLocator, crop};

/// Outcome of one image: where the text was and which fonts resemble it.
#[derive(Debug, Clone, Serialize)]
pub struct FontMatch {
    pub region: BoundingBox,
    pub matches: RankedResult,
}

/// Locate, extract and rank in one call.
///
/// The catalog and extractor are loaded once by the caller and shared; a
/// `FontFinder` holds no per-call state, so one instance may serve
/// concurrent requests.
pub struct FontFinder {
    locator: RegionLocator,
    extractor: Box<dyn FeatureExtractor>,
    catalog: Arc<Catalog>,
    top_k: usize,
}

impl FontFinder {
    pub fn new(
        locator: RegionLocator,
        extractor: Box<dyn FeatureExtractor>,
        catalog: Arc<Catalog>,
        top_k: usize,
    ) -> Result<Self, FinderError> {
        if top_k == 0 {
            return Err(FinderError::InvalidTopK);
        }
        Ok(Self {
            locator,
            extractor,
            catalog,
            top_k,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn locate(&self, image: &DynamicImage) -> Result<BoundingBox, FinderError> {
        self.locator
            .locate(image)
            .ok_or(FinderError::NoRegionFound)
    }

    pub fn find(&self, image: &DynamicImage) -> Result<FontMatch, FinderError> {
        let region = self.locate(image)?;
        tracing::debug!(?region, "located text region");
        let matches = self.rank_region(&crop(image, &region))?;
        Ok(FontMatch { region, matches })
    }

    /// Ranks an already cropped region.
    pub fn rank_region(&self, region: &DynamicImage) -> Result<RankedResult, FinderError> {
        let query = self.extractor.extract(region)?;
        let mode = self.extractor.mode();
        let matches = match self.sized_labels(mode, query.len()) {
            Some(labels) => rank(&query, &labels, self.top_k, mode)?,
            None => rank(&query, &self.catalog, self.top_k, mode)?,
        };
        if let Some(best) = matches.first() {
            tracing::info!(label = %best.label, score = best.score, "best match");
        }
        Ok(matches)
    }

    /// A label map may name fewer or more classes than the classifier emits;
    /// the classifier output decides the class count.
    fn sized_labels(&self, mode: ScoreMode, classes: usize) -> Option<Catalog> {
        if mode != ScoreMode::Probability
            || !self.catalog.is_label_only()
            || self.catalog.len() == classes
        {
            return None;
        }
        if self.catalog.len() > classes {
            tracing::warn!(
                labels = self.catalog.len(),
                classes,
                "label map names more classes than the classifier emits"
            );
        }
        Some(self.catalog.with_class_count(classes))
    }
}
