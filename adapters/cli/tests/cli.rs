use std::{fs, process::Command};

fn merge_grid() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_merge-grid"));
    let _ = command.env("RUST_LOG", "off");
    command
}

#[test]
fn default_session_prints_a_summary() {
    let output = merge_grid()
        .args(["--knives", "2", "--guns", "0"])
        .output()
        .expect("failed to run merge-grid");

    assert!(output.status.success(), "merge-grid should exit cleanly");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("merges: 1"), "{stdout}");
    assert!(stdout.contains("board B: 1 units"), "{stdout}");
    assert!(stdout.contains("r7c1 Knife L2"), "{stdout}");
}

#[test]
fn config_file_overrides_the_board() {
    let dir = std::env::temp_dir().join(format!("merge-grid-cli-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("small.toml");
    fs::write(
        &path,
        r#"
tile_template = "tile"

[board]
rows = 2
columns = 3

[[upgrades]]
unit_type = "Knife"
levels = ["knife/1", "knife/2"]
"#,
    )
    .expect("write config");

    let output = merge_grid()
        .arg("--config")
        .arg(&path)
        .args(["--knives", "3", "--guns", "0"])
        .output()
        .expect("failed to run merge-grid");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tiles: 12 active, 0 pooled"), "{stdout}");
    assert!(stdout.contains("board A: 0 units"), "{stdout}");
    assert!(stdout.contains("merges: 1"), "{stdout}");
}

#[test]
fn unreadable_config_fails() {
    let output = merge_grid()
        .args(["--config", "/nonexistent/merge-grid.toml"])
        .output()
        .expect("failed to run merge-grid");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read config"));
}
