//! End-to-end runs of the binary. Each test gets its own HOME and working
//! directory so local settings never leak in.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use font_finder_rust::catalog::DescriptorSpec;
use font_finder_rust::features::HogExtractor;
use font_finder_rust::region::crop;
use font_finder_rust::{BoundingBox, Catalog, CatalogEntry, FeatureExtractor, locate};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_font-finder-rust"));
        command
            .args(args)
            .current_dir(self.dir.path())
            .env("HOME", self.dir.path());
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("run font-finder-rust")
    }

    /// Three dark "words" on one line, close enough to merge.
    fn text_line(&self, name: &str, format: ImageFormat) -> (PathBuf, DynamicImage) {
        let mut canvas = RgbImage::from_pixel(240, 90, Rgb([255, 255, 255]));
        for (start, end) in [(30, 70), (80, 130), (140, 200)] {
            for y in 35..55 {
                for x in start..end {
                    canvas.put_pixel(x, y, Rgb([20, 20, 20]));
                }
            }
        }
        let image = DynamicImage::ImageRgb8(canvas);
        let path = self.path(name);
        image.save_with_format(&path, format).expect("write image");
        (path, image)
    }

    /// Catalog whose "Blocky" entry is the descriptor of `image` itself.
    fn catalog_for(&self, image: &DynamicImage) -> PathBuf {
        let extractor = HogExtractor::default();
        let region = locate(image).expect("region");
        let reference = extractor.extract(&crop(image, &region)).expect("hog");
        let mut reversed = reference.clone();
        reversed.reverse();
        let path = self.path("catalog.json");
        Catalog::new(vec![
            CatalogEntry {
                label: "Reversed".to_string(),
                reference: reversed,
            },
            CatalogEntry {
                label: "Blocky".to_string(),
                reference,
            },
        ])
        .with_descriptor(DescriptorSpec {
            width: 128,
            height: 32,
        })
        .save(&path)
        .expect("save catalog");
        path
    }
}

fn arg(path: &Path) -> String {
    path.display().to_string()
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "status {:?}, stderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn json_labels(output: &Output) -> Vec<String> {
    let value: serde_json::Value = serde_json::from_str(&stdout(output)).expect("json");
    value["matches"]
        .as_array()
        .expect("matches")
        .iter()
        .map(|item| item["label"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn locate_only_prints_bounding_box_json() {
    let sandbox = Sandbox::new();
    let (input, _) = sandbox.text_line("line.png", ImageFormat::Png);
    let crop_path = sandbox.path("crop.png");

    let output = sandbox.run(&[
        &arg(&input),
        "--locate-only",
        "--save-crop",
        &arg(&crop_path),
    ]);
    let region: BoundingBox = serde_json::from_str(&stdout(&output)).expect("bbox json");
    assert!(region.contains(&BoundingBox {
        x: 30,
        y: 35,
        width: 170,
        height: 20,
    }));

    let saved = image::open(&crop_path).expect("crop");
    assert_eq!((saved.width(), saved.height()), (region.width, region.height));
}

#[test]
fn image_can_be_piped_through_stdin() {
    let sandbox = Sandbox::new();
    let (input, _) = sandbox.text_line("line.png", ImageFormat::Png);
    let bytes = std::fs::read(&input).expect("read png");

    let mut child = sandbox
        .command(&["-", "--locate-only"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(&bytes)
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");
    let region: BoundingBox = serde_json::from_str(&stdout(&output)).expect("bbox json");
    assert!(region.width >= 170);
}

#[test]
fn blank_image_warns_and_exits_non_zero() {
    let sandbox = Sandbox::new();
    let input = sandbox.path("blank.png");
    DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 60, Rgb([255, 255, 255])))
        .save(&input)
        .expect("write png");

    let output = sandbox.run(&[&arg(&input), "--locate-only"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no text region found; try a clearer image"), "{stderr}");
}

#[test]
fn descriptor_catalog_ranks_the_matching_sample_first() {
    let sandbox = Sandbox::new();
    let (input, image) = sandbox.text_line("line.png", ImageFormat::Png);
    let catalog = sandbox.catalog_for(&image);
    let overlay = sandbox.path("overlay.svg");

    let output = sandbox.run(&[
        &arg(&input),
        "--catalog",
        &arg(&catalog),
        "--top-k",
        "1",
        "--debug-overlay",
        &arg(&overlay),
    ]);
    let report = stdout(&output);
    let lines = report.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("region: "));
    assert_eq!(lines[1], "1. Blocky  100.0%");

    let svg = std::fs::read_to_string(&overlay).expect("overlay");
    assert!(svg.contains("Blocky (100.0%)"));
}

#[test]
fn command_line_catalog_wins_over_configured_classifier() {
    let sandbox = Sandbox::new();
    let (input, image) = sandbox.text_line("line.png", ImageFormat::Png);
    let catalog = sandbox.catalog_for(&image);
    let settings = sandbox.path("classifier.toml");
    std::fs::write(
        &settings,
        r#"
[classifier]
program = "/nonexistent/classify"
label_map = "/nonexistent/labels.json"
"#,
    )
    .expect("settings");

    let output = sandbox.run(&[
        &arg(&input),
        "--read-settings",
        &arg(&settings),
        "--catalog",
        &arg(&catalog),
        "--json",
    ]);
    assert_eq!(json_labels(&output)[0], "Blocky");
}

#[test]
fn raster_overlay_of_bmp_input_shows_the_image() {
    let sandbox = Sandbox::new();
    let (input, image) = sandbox.text_line("line.bmp", ImageFormat::Bmp);
    let catalog = sandbox.catalog_for(&image);
    let overlay = sandbox.path("overlay.png");

    let output = sandbox.run(&[
        &arg(&input),
        "--catalog",
        &arg(&catalog),
        "--debug-overlay",
        &arg(&overlay),
    ]);
    stdout(&output);

    let overlay = image::open(&overlay).expect("overlay").to_rgb8();
    assert_eq!(overlay.get_pixel(5, 5).0, [255, 255, 255]);
    let inside = overlay.get_pixel(100, 45).0;
    assert!(inside.iter().all(|channel| *channel < 60), "{inside:?}");
}

#[test]
fn missing_catalog_and_classifier_is_reported() {
    let sandbox = Sandbox::new();
    let (input, _) = sandbox.text_line("line.png", ImageFormat::Png);

    let output = sandbox.run(&[&arg(&input)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no catalog configured"), "{stderr}");
}

#[cfg(unix)]
#[test]
fn partial_label_map_names_the_remaining_classes() {
    let sandbox = Sandbox::new();
    let (input, _) = sandbox.text_line("line.png", ImageFormat::Png);
    let label_map = sandbox.path("labels.json");
    std::fs::write(&label_map, r#"{"0": "Roboto", "1": "Lato"}"#).expect("labels");

    let output = sandbox.run(&[
        &arg(&input),
        "--label-map",
        &arg(&label_map),
        "--classifier",
        "sh",
        "--classifier-arg=-c",
        r#"--classifier-arg=echo '{"probabilities": [0.1, 0.2, 0.6, 0.1]}'"#,
        "--top-k",
        "2",
        "--json",
    ]);
    assert_eq!(json_labels(&output), ["Font_2", "Lato"]);
}

#[cfg(unix)]
#[test]
fn classifier_runs_without_a_label_map() {
    let sandbox = Sandbox::new();
    let (input, _) = sandbox.text_line("line.png", ImageFormat::Png);

    let output = sandbox.run(&[
        &arg(&input),
        "--classifier",
        "sh",
        "--classifier-arg=-c",
        r#"--classifier-arg=echo '{"logits": [0.5, 3.0, 1.0]}'"#,
        "--json",
    ]);
    assert_eq!(json_labels(&output), ["Font_1", "Font_2", "Font_0"]);
}

#[test]
fn build_catalog_from_an_installed_family() {
    let sandbox = Sandbox::new();
    let catalog = sandbox.path("fonts.json");
    let family = ["DejaVu Sans", "Liberation Sans", "Noto Sans", "Arial"]
        .into_iter()
        .find(|&family| {
            sandbox
                .run(&["--build-catalog", &arg(&catalog), "--font", family])
                .status
                .success()
        });
    let Some(family) = family else {
        eprintln!("no candidate system font installed; skipping");
        return;
    };

    let loaded = Catalog::load(&catalog).expect("load catalog");
    assert_eq!(loaded.len(), 1);
    assert!(loaded.entries()[0].label.contains(family.split(' ').next().unwrap_or(family)));
    assert_eq!(
        loaded.descriptor(),
        Some(DescriptorSpec {
            width: 128,
            height: 32,
        })
    );
}
