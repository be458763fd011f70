use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{NamedTempFile, TempDir};

fn write_slide(dir: &Path, width: u32, height: u32) -> PathBuf {
    let path = dir.join("slide.png");
    image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]))
        .save(&path)
        .expect("write slide");
    path
}

#[test]
fn summary_only_reports_slide_and_draws() {
    let dir = TempDir::new().expect("temp dir");
    let slide = write_slide(dir.path(), 4, 4);

    let mut cmd = Command::cargo_bin("slide-projector").expect("binary exists");
    cmd.arg("--image").arg(&slide).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded image slide 4x4 from"))
        .stdout(contains("Lights: 1 (switch on)"))
        .stdout(contains("Recorded 3 draw calls:"))
        .stdout(contains(" - wall (18 vertices, triangle-list)"))
        .stdout(contains(" - screen (6 vertices, triangle-list)"))
        .stdout(contains(" - projector-frustum"));
}

#[test]
fn config_file_supplies_the_slide() {
    let dir = TempDir::new().expect("temp dir");
    let slide = write_slide(dir.path(), 8, 2);
    let mut config = NamedTempFile::new().expect("temp config");
    writeln!(
        config,
        "[slides]\nimage = {:?}\n\n[bindings]\ntoggle_light = \"F1\"",
        slide.display().to_string()
    )
    .expect("write config");

    let mut cmd = Command::cargo_bin("slide-projector").expect("binary exists");
    cmd.arg("--config").arg(config.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded image slide 8x2 from"));
}

#[test]
fn missing_slide_is_fatal() {
    let dir = TempDir::new().expect("temp dir");
    let mut cmd = Command::cargo_bin("slide-projector").expect("binary exists");
    cmd.arg("--image")
        .arg(dir.path().join("absent.png"))
        .arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("failed to build the scene"));
}

#[test]
fn unknown_binding_in_config_is_rejected() {
    let mut config = NamedTempFile::new().expect("temp config");
    writeln!(config, "[bindings]\nteleport = \"T\"").expect("write config");

    let mut cmd = Command::cargo_bin("slide-projector").expect("binary exists");
    cmd.arg("--config").arg(config.path()).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("teleport"));
}

#[test]
fn unknown_arguments_print_usage() {
    let mut cmd = Command::cargo_bin("slide-projector").expect("binary exists");
    cmd.arg("--fullscreen");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --fullscreen"))
        .stderr(contains("Usage: slide-projector"));
}
