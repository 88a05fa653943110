//! Static catalogs of labelled reference vectors.
//!
//! Two on-disk shapes are supported: a classifier label map
//! (`{"0": "Roboto", ...}`) whose entries carry no reference vector, and a
//! descriptor catalog produced by [`build_font_catalog`].

mod build;
mod font;
mod render;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub use build::{CatalogBuildOptions, FontSource, build_font_catalog};
pub use font::{FontMetrics, load_font_metrics};
pub use render::{rasterize_svg, region_overlay_svg};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub label: String,
    #[serde(default)]
    pub reference: Vec<f32>,
}

/// Geometry the reference descriptors were computed with. Queries must be
/// extracted with the same geometry to be comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorSpec {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    descriptor: Option<DescriptorSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    descriptor: Option<DescriptorSpec>,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries,
            descriptor: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: DescriptorSpec) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Label-only catalog for probability scoring.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            labels
                .into_iter()
                .map(|label| CatalogEntry {
                    label: label.into(),
                    reference: Vec::new(),
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn descriptor(&self) -> Option<DescriptorSpec> {
        self.descriptor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when no entry carries a reference vector (a classifier label map).
    pub fn is_label_only(&self) -> bool {
        self.entries.iter().all(|entry| entry.reference.is_empty())
    }

    /// Label catalog spanning exactly `classes` indices. Missing labels are
    /// named `Font_<idx>`; labels past the last class are dropped.
    pub fn with_class_count(&self, classes: usize) -> Self {
        Self::from_labels((0..classes).map(|idx| {
            self.entries
                .get(idx)
                .map(|entry| entry.label.clone())
                .unwrap_or_else(|| class_label(idx))
        }))
    }

    /// Reference dimensionality, taken from the first entry.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|entry| entry.reference.len())
    }

    /// Loads a classifier label map. Indices absent from the map are named
    /// `Font_<idx>`; the catalog spans `num_classes` or the largest index + 1.
    pub fn load_label_map(path: &Path, num_classes: Option<usize>) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read label map: {}", path.display()))?;
        Self::parse_label_map(&content, num_classes)
            .with_context(|| format!("failed to parse label map: {}", path.display()))
    }

    pub fn parse_label_map(content: &str, num_classes: Option<usize>) -> Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_str(content)?;
        let mut by_index = BTreeMap::new();
        for (key, label) in raw {
            let idx = key
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow!("label map key '{}' is not a class index", key))?;
            by_index.insert(idx, label);
        }
        let size = match num_classes {
            Some(size) => size,
            None => by_index.keys().next_back().map(|idx| idx + 1).unwrap_or(0),
        };
        if let Some(idx) = by_index.keys().find(|idx| **idx >= size) {
            return Err(anyhow!(
                "label map index {} is outside {} classes",
                idx,
                size
            ));
        }
        Ok(Self::from_labels((0..size).map(|idx| {
            by_index
                .remove(&idx)
                .unwrap_or_else(|| class_label(idx))
        })))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog: {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse catalog: {}", path.display()))?;
        let catalog = Self {
            entries: file.entries,
            descriptor: file.descriptor,
        };
        if let Some(dimension) = catalog.dimension() {
            if let Some(entry) = catalog
                .entries
                .iter()
                .find(|entry| entry.reference.len() != dimension)
            {
                return Err(anyhow!(
                    "catalog entry '{}' has {} values, expected {}",
                    entry.label,
                    entry.reference.len(),
                    dimension
                ));
            }
        }
        tracing::info!(entries = catalog.len(), path = %path.display(), "loaded catalog");
        Ok(catalog)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = CatalogFile {
            descriptor: self.descriptor,
            entries: self.entries.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
        fs::write(path, content)
            .with_context(|| format!("failed to write catalog: {}", path.display()))
    }
}

fn class_label(idx: usize) -> String {
    format!("Font_{}", idx)
}
