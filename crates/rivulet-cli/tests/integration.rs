//! Integration tests for rivulet-cli.
//!
//! Tests invoke the `rivulet` binary against the built-in configurations and
//! against files written to a temporary directory.

use std::process::Command;

use tempfile::TempDir;

/// Helper to get the path to the `rivulet` binary built by cargo.
fn rivulet_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rivulet"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

// ---------------------------------------------------------------------------
// `rivulet nodes`
// ---------------------------------------------------------------------------

#[test]
fn cli_nodes_lists_every_kind() {
    let output = rivulet_bin()
        .arg("nodes")
        .output()
        .expect("failed to run rivulet nodes");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Available Nodes"));
    for kind in [
        "ramp_source",
        "simulated_capture",
        "gain",
        "null_sink",
        "level_meter",
        "tensor_publisher",
        "event_logger",
    ] {
        assert!(stdout.contains(kind), "listing should contain '{kind}'");
    }
}

#[test]
fn cli_nodes_detail_shows_params() {
    let output = rivulet_bin()
        .args(["nodes", "tensor_publisher"])
        .output()
        .expect("failed to run rivulet nodes tensor_publisher");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Tensor Publisher"));
    assert!(stdout.contains("blocks"));
    assert!(stdout.contains("ttl"));
}

#[test]
fn cli_nodes_unknown_kind_fails() {
    let output = rivulet_bin()
        .args(["nodes", "flux_capacitor"])
        .output()
        .expect("failed to run rivulet nodes");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown node kind"));
}

// ---------------------------------------------------------------------------
// `rivulet validate`
// ---------------------------------------------------------------------------

#[test]
fn cli_validate_builtins() {
    for name in ["pipeline", "switching"] {
        let output = rivulet_bin()
            .args(["validate", name])
            .output()
            .expect("failed to run rivulet validate");
        assert!(output.status.success(), "validate {name} failed");
        assert!(String::from_utf8_lossy(&output.stdout).contains("OK"));
    }
}

#[test]
fn cli_validate_file_with_structural_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(
        &path,
        r#"
        [[graphs]]
        name = "g"
        schedule = [0, 3]

        [[graphs.nodes]]
        id = 0
        kind = "null_sink"
        inputs = ["missing"]
        "#,
    )
    .unwrap();

    let output = rivulet_bin()
        .arg("validate")
        .arg(&path)
        .output()
        .expect("failed to run rivulet validate");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown node 3"), "stderr: {stderr}");
    assert!(stderr.contains("unknown channel 'missing'"), "stderr: {stderr}");
}

#[test]
fn cli_validate_file_with_unknown_kind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kind.toml");
    std::fs::write(
        &path,
        r#"
        [[graphs]]
        name = "g"
        schedule = [0]

        [[graphs.nodes]]
        id = 0
        kind = "flux_capacitor"
        "#,
    )
    .unwrap();

    let output = rivulet_bin()
        .arg("validate")
        .arg(&path)
        .output()
        .expect("failed to run rivulet validate");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown node kind 'flux_capacitor'"));
}

#[test]
fn cli_validate_missing_file() {
    let output = rivulet_bin()
        .args(["validate", "no/such/file.toml"])
        .output()
        .expect("failed to run rivulet validate");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

// ---------------------------------------------------------------------------
// `rivulet run`
// ---------------------------------------------------------------------------

#[test]
fn cli_run_bounded_cycles() {
    let output = rivulet_bin()
        .args(["run", "pipeline", "--cycles", "300"])
        .output()
        .expect("failed to run rivulet run");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("switched - -> pipeline"), "stdout: {stdout}");
    assert!(stdout.contains("pipeline: 300 cycles"), "stdout: {stdout}");
    assert!(stdout.contains("Done:"));
}

#[test]
fn cli_run_switches_between_graphs() {
    let output = rivulet_bin()
        .args([
            "run",
            "switching",
            "--switch-every-ms",
            "30",
            "--duration-ms",
            "200",
        ])
        .output()
        .expect("failed to run rivulet run");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("switched appa -> appb"), "stdout: {stdout}");
    assert!(stdout.contains("switched appb -> appa"), "stdout: {stdout}");
}

#[test]
fn cli_run_from_file_with_initial_graph() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("two.toml");
    std::fs::write(
        &path,
        r#"
        [[graphs]]
        name = "first"
        schedule = [0, 1]
        [[graphs.channels]]
        name = "raw"
        capacity = 4
        [[graphs.nodes]]
        id = 0
        kind = "ramp_source"
        outputs = ["raw"]
        [[graphs.nodes]]
        id = 1
        kind = "null_sink"
        inputs = ["raw"]

        [[graphs]]
        name = "second"
        schedule = [0]
        [[graphs.channels]]
        name = "raw"
        capacity = 4
        [[graphs.nodes]]
        id = 0
        kind = "ramp_source"
        outputs = ["raw"]
        "#,
    )
    .unwrap();

    let output = rivulet_bin()
        .arg("run")
        .arg(&path)
        .args(["--graph", "second", "--cycles", "10"])
        .output()
        .expect("failed to run rivulet run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("switched - -> second"), "stdout: {stdout}");
    assert!(stdout.contains("second: 10 cycles"), "stdout: {stdout}");
}

#[test]
fn cli_run_reports_node_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fault.toml");
    std::fs::write(
        &path,
        r#"
        [[graphs]]
        name = "faulty"
        schedule = [0, 1]
        [[graphs.channels]]
        name = "frames"
        capacity = 8
        [[graphs.nodes]]
        id = 0
        kind = "simulated_capture"
        outputs = ["frames"]
        [graphs.nodes.params]
        fail_after = 2
        [[graphs.nodes]]
        id = 1
        kind = "null_sink"
        inputs = ["frames"]
        "#,
    )
    .unwrap();

    let output = rivulet_bin()
        .arg("run")
        .arg(&path)
        .args(["--duration-ms", "2000"])
        .output()
        .expect("failed to run rivulet run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("faulty: node 0 failed"), "stderr: {stderr}");
}

#[test]
fn cli_run_unknown_graph_fails() {
    let output = rivulet_bin()
        .args(["run", "pipeline", "--graph", "nope", "--cycles", "1"])
        .output()
        .expect("failed to run rivulet run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope"));
}
