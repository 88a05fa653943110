use image::DynamicImage;
use image::imageops::FilterType;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::{runtime, time};

use super::{FeatureExtractor, FeatureVector};
use crate::error::FinderError;
use crate::ranking::{ScoreMode, softmax};

/// What a bare JSON array printed by the classifier means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierOutput {
    Logits,
    Probabilities,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifierReply {
    Bare(Vec<f32>),
    Logits { logits: Vec<f32> },
    Probabilities { probabilities: Vec<f32> },
}

/// Pretrained classifier run as an external program.
///
/// The crop is resized to `input_size x input_size` RGB, written to a
/// temporary PNG and passed as the last argument. The program prints its
/// class scores as JSON on stdout.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
    input_size: u32,
    output: ClassifierOutput,
    timeout: Duration,
}

impl CommandClassifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            input_size: 224,
            output: ClassifierOutput::Logits,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn input_size(mut self, size: u32) -> Self {
        self.input_size = size.max(1);
        self
    }

    pub fn output(mut self, output: ClassifierOutput) -> Self {
        self.output = output;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn write_input(&self, region: &DynamicImage) -> Result<tempfile::NamedTempFile, FinderError> {
        let resized = region
            .resize_exact(self.input_size, self.input_size, FilterType::Triangle)
            .to_rgb8();
        let mut tmp = tempfile::Builder::new()
            .prefix("font-finder-")
            .suffix(".png")
            .tempfile()
            .map_err(|err| FinderError::extraction_with("failed to create temp file", err))?;
        DynamicImage::ImageRgb8(resized)
            .write_to(&mut tmp, image::ImageFormat::Png)
            .map_err(|err| FinderError::extraction_with("failed to write classifier input", err))?;
        Ok(tmp)
    }

    fn run(&self, input: &Path) -> Result<String, FinderError> {
        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| {
                FinderError::extraction_with("failed to start classifier runtime", err)
            })?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(input)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        // Dropping the timed-out future drops the child, which kills it.
        let output = runtime
            .block_on(async { time::timeout(self.timeout, command.output()).await })
            .map_err(|_| {
                FinderError::extraction(format!("classifier timed out after {:?}", self.timeout))
            })?
            .map_err(|err| {
                FinderError::extraction_with(
                    format!("failed to run classifier '{}'", self.program),
                    err,
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FinderError::extraction(format!(
                "classifier failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn parse(&self, stdout: &str) -> Result<FeatureVector, FinderError> {
        let reply: ClassifierReply = serde_json::from_str(stdout.trim())
            .map_err(|err| FinderError::extraction_with("malformed classifier output", err))?;
        let (values, kind) = match reply {
            ClassifierReply::Bare(values) => (values, self.output),
            ClassifierReply::Logits { logits } => (logits, ClassifierOutput::Logits),
            ClassifierReply::Probabilities { probabilities } => {
                (probabilities, ClassifierOutput::Probabilities)
            }
        };
        if values.is_empty() {
            return Err(FinderError::extraction("classifier returned no scores"));
        }
        if values.iter().any(|value| !value.is_finite()) {
            return Err(FinderError::extraction("classifier returned non-finite scores"));
        }
        Ok(match kind {
            ClassifierOutput::Logits => softmax(&values),
            ClassifierOutput::Probabilities => values,
        })
    }
}

impl FeatureExtractor for CommandClassifier {
    fn mode(&self) -> ScoreMode {
        ScoreMode::Probability
    }

    fn extract(&self, region: &DynamicImage) -> Result<FeatureVector, FinderError> {
        let input = self.write_input(region)?;
        let started = Instant::now();
        let stdout = self.run(input.path())?;
        let scores = self.parse(&stdout)?;
        tracing::debug!(
            program = %self.program,
            classes = scores.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "classifier finished"
        );
        Ok(scores)
    }
}
