use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::features::ClassifierOutput;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub kernel_width: u32,
    pub kernel_height: u32,
    pub dilate_iterations: u32,
    pub top_k: usize,
    pub hog_width: u32,
    pub hog_height: u32,
    pub classifier_program: Option<String>,
    pub classifier_args: Vec<String>,
    pub classifier_input_size: u32,
    pub classifier_output: ClassifierOutput,
    pub classifier_timeout_secs: u64,
    pub label_map: Option<String>,
    pub catalog_path: Option<String>,
    pub sample_text: String,
    pub sample_font_size: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            kernel_width: 22,
            kernel_height: 6,
            dilate_iterations: 2,
            top_k: 8,
            hog_width: 128,
            hog_height: 32,
            classifier_program: None,
            classifier_args: Vec::new(),
            classifier_input_size: 224,
            classifier_output: ClassifierOutput::Logits,
            classifier_timeout_secs: 30,
            label_map: None,
            catalog_path: None,
            sample_text: "The quick brown fox 0123".to_string(),
            sample_font_size: 48.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    locator: Option<LocatorSettings>,
    ranking: Option<RankingSettings>,
    hog: Option<HogSettings>,
    classifier: Option<ClassifierSettings>,
    catalog: Option<CatalogSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct LocatorSettings {
    kernel_width: Option<u32>,
    kernel_height: Option<u32>,
    iterations: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RankingSettings {
    top_k: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct HogSettings {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierSettings {
    program: Option<String>,
    args: Option<Vec<String>>,
    label_map: Option<String>,
    input_size: Option<u32>,
    output: Option<ClassifierOutput>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogSettings {
    path: Option<String>,
    sample_text: Option<String>,
    font_size: Option<f32>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "merged settings");
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(locator) = incoming.locator {
            if let Some(width) = locator.kernel_width.filter(|value| *value > 0) {
                self.kernel_width = width;
            }
            if let Some(height) = locator.kernel_height.filter(|value| *value > 0) {
                self.kernel_height = height;
            }
            if let Some(iterations) = locator.iterations {
                self.dilate_iterations = iterations;
            }
        }
        if let Some(ranking) = incoming.ranking {
            if let Some(top_k) = ranking.top_k.filter(|value| *value > 0) {
                self.top_k = top_k;
            }
        }
        if let Some(hog) = incoming.hog {
            if let Some(width) = hog.width.filter(|value| *value > 0) {
                self.hog_width = width;
            }
            if let Some(height) = hog.height.filter(|value| *value > 0) {
                self.hog_height = height;
            }
        }
        if let Some(classifier) = incoming.classifier {
            if let Some(program) = non_blank(classifier.program) {
                self.classifier_program = Some(program);
            }
            if let Some(args) = classifier.args {
                self.classifier_args = args;
            }
            if let Some(label_map) = non_blank(classifier.label_map) {
                self.label_map = Some(label_map);
            }
            if let Some(size) = classifier.input_size.filter(|value| *value > 0) {
                self.classifier_input_size = size;
            }
            if let Some(output) = classifier.output {
                self.classifier_output = output;
            }
            if let Some(timeout) = classifier.timeout_secs.filter(|value| *value > 0) {
                self.classifier_timeout_secs = timeout;
            }
        }
        if let Some(catalog) = incoming.catalog {
            if let Some(path) = non_blank(catalog.path) {
                self.catalog_path = Some(path);
            }
            if let Some(text) = non_blank(catalog.sample_text) {
                self.sample_text = text;
            }
            if let Some(size) = catalog.font_size.filter(|value| *value > 0.0) {
                self.sample_font_size = size;
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".font-finder-rust"))
        }
    })
}
