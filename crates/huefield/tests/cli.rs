use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn huefield(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_huefield"));
    command
        .env("HUEFIELD_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "warn");
    command
}

#[test]
fn paths_reports_config_override() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");

    let output = huefield(&config_dir)
        .arg("paths")
        .output()
        .expect("failed to run huefield paths");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&config_dir.display().to_string()));
    assert!(stdout.contains("huefield.toml (missing)"));
    assert!(stdout.contains("builtin:fragment.glsl"));
}

#[test]
fn palette_dump_writes_configured_gradient() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("huefield.toml"),
        r##"
[[palettes]]
name = "trio"
colors = ["#19071a", "#09012f", "#040449"]
"##,
    )
    .unwrap();
    let dump = root.path().join("trio.png");

    let output = huefield(&config_dir)
        .args(["palette", "--dump"])
        .arg(&dump)
        .output()
        .expect("failed to run huefield palette");

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("trio"));
    assert!(stdout.contains("#19071a #09012f #040449"));
    assert!(stdout.contains("Wrote 3x1 palette texture"));
    assert!(dump.exists());
}

#[test]
fn malformed_config_aborts() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("huefield.toml"),
        "[[palettes]]\ncolors = [\"#zzzzzz\"]\n",
    )
    .unwrap();

    let status = huefield(&config_dir)
        .arg("palette")
        .status()
        .expect("failed to run huefield palette");

    assert!(!status.success());
}

#[test]
fn out_of_range_resolution_is_rejected_by_the_parser() {
    let root = TempDir::new().unwrap();
    let status = huefield(root.path())
        .args(["--headless", "--resolution", "500"])
        .status()
        .expect("failed to run huefield");

    assert_eq!(status.code(), Some(2));
}
