use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};

fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200])))
        .save_with_format(&path, image::ImageFormat::Jpeg)
        .expect("fixture should be written");
    path
}

fn json_stdout(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should contain valid json")
}

#[test]
fn thumb_writes_canonical_rendition_by_default() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = write_jpeg(temp.path(), "cover.jpg", 600, 900);
    let output_path = temp.path().join("out/thumb.jpg");

    let output = cargo_bin_cmd!("nview")
        .arg("thumb")
        .arg(&source)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary = json_stdout(&output);
    assert_eq!(summary["fromCache"], false);
    assert_eq!(summary["mimeType"], "image/jpeg");
    assert_eq!(summary["metrics"]["requests"], 1);
    assert_eq!(summary["metrics"]["generatedCount"], 1);

    let image = image::open(&output_path).expect("thumbnail should be readable image");
    assert_eq!((image.width(), image.height()), (384, 512));
}

#[test]
fn thumb_honors_requested_size_and_format() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = write_jpeg(temp.path(), "cover.jpg", 800, 600);
    let output_path = temp.path().join("thumb.png");

    let output = cargo_bin_cmd!("nview")
        .arg("thumb")
        .arg(&source)
        .args(["--width", "200", "--height", "120", "--mime", "image/png"])
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let summary = json_stdout(&output);
    assert_eq!(summary["mimeType"], "image/png");
    assert_eq!(summary["metrics"]["outputTransforms"], 1);

    let image = image::open(&output_path).expect("thumbnail should be readable image");
    assert_eq!((image.width(), image.height()), (200, 120));
}

#[test]
fn thumb_fails_for_missing_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("nview")
        .arg("thumb")
        .arg(temp.path().join("missing.jpg"))
        .arg("--output")
        .arg(temp.path().join("thumb.jpg"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn zones_emits_clipped_windows() {
    let output = cargo_bin_cmd!("nview")
        .args(["zones", "--anchor", "0", "--pages", "10", "--hot", "2", "--warm", "4"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let zones = json_stdout(&output);
    assert_eq!(zones["hotIndices"], serde_json::json!([0, 1, 2]));
    assert_eq!(zones["warmIndices"], serde_json::json!([0, 1, 2, 3, 4]));
    assert_eq!(zones["warm"]["end"], 4);
}

#[test]
fn zones_reads_radii_from_config_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let config = temp.path().join("config.json");
    std::fs::write(&config, r#"{"residency":{"hotRadius":1,"warmRadius":2}}"#).expect("config should be written");

    let output = cargo_bin_cmd!("nview")
        .arg("--config")
        .arg(&config)
        .args(["zones", "--anchor", "5", "--pages", "20"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let zones = json_stdout(&output);
    assert_eq!(zones["hotIndices"], serde_json::json!([4, 5, 6]));
    assert_eq!(zones["warmIndices"], serde_json::json!([3, 4, 5, 6, 7]));
}

#[test]
fn zones_fails_for_malformed_config() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let config = temp.path().join("config.json");
    std::fs::write(&config, "{ not json").expect("config should be written");

    cargo_bin_cmd!("nview")
        .arg("--config")
        .arg(&config)
        .args(["zones", "--anchor", "0", "--pages", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn probe_reports_dimensions() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = write_jpeg(temp.path(), "page.jpg", 64, 48);

    let output = cargo_bin_cmd!("nview").arg("probe").arg(&source).assert().success().get_output().stdout.clone();

    let probe = json_stdout(&output);
    assert_eq!(probe["width"], 64);
    assert_eq!(probe["height"], 48);
    assert_eq!(probe["mimeType"], "image/jpeg");
    assert!(probe["bytes"].as_u64().unwrap_or(0) > 0);
}

#[test]
fn probe_fails_for_corrupt_image() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = temp.path().join("broken.jpg");
    std::fs::write(&source, b"definitely not an image").expect("fixture should be written");

    cargo_bin_cmd!("nview")
        .arg("probe")
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported or corrupt image"));
}
