use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn gpufx(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gpufx"))
        .env_remove("GPUFX_CONFIG")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run gpufx")
}

fn write_frame(path: &Path, width: u32, height: u32, rgba: [u8; 4]) {
    image::RgbaImage::from_pixel(width, height, image::Rgba(rgba))
        .save(path)
        .unwrap();
}

fn write_chain(dir: &Path, json: &str) -> String {
    let path = dir.join("chain.json");
    fs::write(&path, json).unwrap();
    path.to_string_lossy().into_owned()
}

const VIGNETTE: &str = r#"[{"kind": "vignette", "uniforms": {"amount": 1.0, "size": 0.5, "softness": 0.1}}]"#;

#[test]
fn catalog_lists_every_kind() {
    let output = gpufx(&["catalog", "--json"]);
    assert!(output.status.success());
    let kinds: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let kinds = kinds.as_array().unwrap();
    assert_eq!(kinds.len(), 10);
    assert!(kinds.iter().any(|entry| entry["kind"] == "chromaKey"));
}

#[test]
fn probe_reports_capabilities_and_tier() {
    let output = gpufx(&["probe", "--json"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report["capabilities"]["available"].is_boolean());
    assert!(report["recommended"]["level"].is_string());
}

#[test]
fn renders_a_frame_with_the_software_backend() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.png");
    let output_path = dir.path().join("out.png");
    write_frame(&input, 8, 6, [128, 128, 128, 255]);
    let chain = write_chain(dir.path(), VIGNETTE);

    let output = gpufx(&[
        "render",
        "--input",
        input.to_str().unwrap(),
        "--chain",
        &chain,
        "--output",
        output_path.to_str().unwrap(),
        "--backend",
        "software",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let rendered = image::open(&output_path).unwrap().to_rgba8();
    assert_eq!(rendered.dimensions(), (8, 6));
    let center = rendered.get_pixel(4, 3)[0];
    let corner = rendered.get_pixel(0, 0)[0];
    assert!(center >= corner, "center {center} corner {corner}");
}

#[test]
fn jpeg_format_flag_overrides_extension() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.png");
    let output_path = dir.path().join("out.img");
    write_frame(&input, 4, 4, [10, 200, 30, 255]);
    let chain = write_chain(dir.path(), "[]");

    let output = gpufx(&[
        "render",
        "--input",
        input.to_str().unwrap(),
        "--chain",
        &chain,
        "--output",
        output_path.to_str().unwrap(),
        "--format",
        "jpeg",
        "--quality",
        "0.7",
        "--backend",
        "software",
    ]);
    assert!(output.status.success());
    let bytes = fs::read(&output_path).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
}

#[test]
fn unknown_effect_kind_fails_before_rendering() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.png");
    let output_path = dir.path().join("out.png");
    write_frame(&input, 4, 4, [0, 0, 0, 255]);
    let chain = write_chain(dir.path(), r#"[{"kind": "nonexistent"}]"#);

    let output = gpufx(&[
        "render",
        "--input",
        input.to_str().unwrap(),
        "--chain",
        &chain,
        "--output",
        output_path.to_str().unwrap(),
        "--backend",
        "software",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nonexistent"));
    assert!(!output_path.exists());
}

#[test]
fn sequence_renders_every_frame_offline() {
    let dir = TempDir::new().unwrap();
    let frames = dir.path().join("frames");
    let out = dir.path().join("out");
    fs::create_dir_all(&frames).unwrap();
    for i in 0..3u8 {
        write_frame(&frames.join(format!("f{i}.png")), 4, 4, [i * 40, 90, 160, 255]);
    }
    let chain = write_chain(dir.path(), VIGNETTE);

    let output = gpufx(&[
        "sequence",
        "--input-dir",
        frames.to_str().unwrap(),
        "--chain",
        &chain,
        "--output-dir",
        out.to_str().unwrap(),
        "--fps",
        "30",
        "--offline",
        "--json",
        "--backend",
        "software",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["rendered"], 3);
    assert_eq!(summary["stopped"], "ended");
    assert_eq!(fs::read_dir(&out).unwrap().count(), 3);
    assert!(out.join("frame_00000.png").exists());
}

#[test]
fn config_file_is_validated() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("gpufx.toml");
    fs::write(&config, "version = 3\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_gpufx"))
        .env("GPUFX_CONFIG", &config)
        .args(["probe", "--json"])
        .output()
        .expect("failed to run gpufx");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported config version"));
}

#[test]
fn config_selects_export_format() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("gpufx.toml");
    fs::write(
        &config,
        "version = 1\n[gpu]\nbackend = \"software\"\n[export]\nformat = \"webp\"\n",
    )
    .unwrap();
    let input = dir.path().join("in.png");
    let output_path = dir.path().join("out");
    write_frame(&input, 4, 4, [1, 2, 3, 255]);
    let chain = write_chain(dir.path(), "[]");

    let output = gpufx(&[
        "--config",
        config.to_str().unwrap(),
        "render",
        "--input",
        input.to_str().unwrap(),
        "--chain",
        &chain,
        "--output",
        output_path.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    let bytes = fs::read(&output_path).unwrap();
    assert_eq!(&bytes[..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WEBP");
}
