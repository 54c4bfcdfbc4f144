//! CLI integration tests

use assert_cmd::Command;
use image::{DynamicImage, Rgba, RgbaImage};
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

fn utilkit(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("utilkit").unwrap();
    // keep tests away from the user's real config
    cmd.arg("--config").arg(config_dir.join("config.toml"));
    cmd
}

fn write_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
        .save(path)
        .unwrap();
}

#[test]
fn test_cli_info_command() {
    let dir = tempdir().unwrap();
    utilkit(dir.path())
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("Utilkit"))
        .stdout(predicate::str::contains("System Information"))
        .stdout(predicate::str::contains("CPU cores"));
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("utilkit").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Progress, logging and image watermark utilities"))
        .stdout(predicate::str::contains("progress-demo"))
        .stdout(predicate::str::contains("log-demo"))
        .stdout(predicate::str::contains("watermark"))
        .stdout(predicate::str::contains("thumbnail"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("utilkit").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("utilkit").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

#[test]
fn test_verbose_flag() {
    let dir = tempdir().unwrap();
    utilkit(dir.path()).args(["--verbose", "info"]).assert().success();
}

#[test]
fn test_config_file_is_honoured() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[image]\nquality = 42\n").unwrap();

    utilkit(dir.path())
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("Image quality: 42"));
}

#[test]
fn test_progress_demo_reports_summary() {
    let dir = tempdir().unwrap();
    utilkit(dir.path())
        .args(["progress-demo", "--total", "4", "--workers", "2", "--size", "2048", "--delay-ms", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains(">> Total   : 4"))
        .stdout(predicate::str::contains(">> Handled : 4"))
        .stdout(predicate::str::contains("100.0%"));
}

#[test]
fn test_progress_demo_copies_given_file() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("payload.bin");
    std::fs::write(&source, vec![7u8; 4096]).unwrap();

    utilkit(dir.path())
        .args(["progress-demo", "--items", "2", "--workers", "1", "--delay-ms", "0", "--file"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains(">> Handled : 2"));
}

#[test]
fn test_log_demo_writes_split_logs() {
    let dir = tempdir().unwrap();
    let logs = dir.path().join("logs");

    utilkit(dir.path()).arg("log-demo").arg("--dir").arg(&logs).assert().success();

    let access = std::fs::read_to_string(logs.join("access.log")).unwrap();
    let errors = std::fs::read_to_string(logs.join("error.log")).unwrap();
    assert!(access.contains("request served"));
    assert!(!access.contains("request failed"));
    assert!(errors.contains("slow request"));
    assert!(errors.contains("request failed"));
    assert!(!errors.contains("request served"));

    let plain = std::fs::read_to_string(logs.join("plain.log")).unwrap();
    assert!(!plain.contains("filtered out"));
    for line in plain.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("timestamp").is_some());
        assert!(value.get("filename").is_some());
    }

    let rotating = std::fs::read_dir(&logs)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_name().to_string_lossy().starts_with("rotating"));
    assert!(rotating);
}

#[test]
fn test_watermark_with_image() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("bg.png");
    let mark = dir.path().join("mark.png");
    let output = dir.path().join("out").join("marked.png");
    write_png(&input, 100, 80, [255, 255, 255, 255]);
    write_png(&mark, 10, 10, [255, 0, 0, 255]);

    utilkit(dir.path())
        .args(["watermark", "-p", "bottom-right", "--hpad", "5", "--vpad", "5", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--image")
        .arg(&mark)
        .assert()
        .success()
        .stdout(predicate::str::contains("Watermarked"));

    let out = image::open(&output).unwrap().to_rgba8();
    assert_eq!(*out.get_pixel(85, 65), Rgba([255, 0, 0, 255]));
    assert_eq!(*out.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
}

#[test]
fn test_watermark_text_without_font_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("bg.png");
    write_png(&input, 20, 20, [0, 0, 0, 255]);

    utilkit(dir.path())
        .args(["watermark", "--text", "hello", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(dir.path().join("out.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--font"));
}

#[test]
fn test_watermark_rejects_unknown_output_format() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("bg.png");
    let mark = dir.path().join("mark.png");
    write_png(&input, 20, 20, [0, 0, 0, 255]);
    write_png(&mark, 2, 2, [255, 0, 0, 255]);

    utilkit(dir.path())
        .args(["watermark", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(dir.path().join("out.gif"))
        .arg("--image")
        .arg(&mark)
        .assert()
        .failure();
}

#[test]
fn test_thumbnail_keeps_aspect_ratio() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("big.png");
    let output = dir.path().join("thumb.jpg");
    write_png(&input, 400, 300, [0, 128, 255, 255]);

    utilkit(dir.path())
        .args(["thumbnail", "-w", "100", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("100x75"));

    let thumb = image::open(&output).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (100, 75));
}

#[test]
fn test_thumbnail_crop() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("big.png");
    let output = dir.path().join("thumb.webp");
    write_png(&input, 400, 300, [0, 128, 255, 255]);

    utilkit(dir.path())
        .args(["thumbnail", "-w", "64", "--height", "64", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("64x64"));
}
