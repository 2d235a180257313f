//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mavparam");
    cmd.env_remove("MAVPARAM_PORT").env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mavparam"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mavparam"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn completions_bash_exits_zero() {
    let mut cmd = cli_cmd();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .code(0)
        .stdout(predicate::str::contains("mavparam"));
}

#[test]
fn exit_code_two_for_unknown_command() {
    let mut cmd = cli_cmd();
    cmd.arg("unknown-command-xyz")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn unknown_command_suggests_similar() {
    let mut cmd = cli_cmd();
    cmd.arg("uplaod")
        .assert()
        .failure()
        .stderr(predicate::str::contains("upload"));
}

#[test]
fn check_prints_kind_and_bit_pattern() {
    let dir = tempdir().expect("tempdir should be created");
    let params = dir.path().join("params.txt");
    fs::write(&params, "MPC_Z_P 1.5\nSYS_AUTOSTART 4\n").expect("write params");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("REAL32"))
        .stdout(predicate::str::contains("0x3FC00000"))
        .stdout(predicate::str::contains("INT32"))
        .stdout(predicate::str::contains("0x00000004"));
}

#[test]
fn check_json_returns_records() {
    let dir = tempdir().expect("tempdir should be created");
    let params = dir.path().join("vehicle.params");
    fs::write(&params, "MPC_Z_P 1.5\nSYS_AUTOSTART 4\n").expect("write params");

    let output = cli_cmd()
        .current_dir(dir.path())
        .args(["check", "--json"])
        .arg(&params)
        .output()
        .expect("command should execute");
    assert!(output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed["ok"], true);
    let parameters = parsed["data"]["parameters"]
        .as_array()
        .expect("parameters array");
    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters[0]["name"], "MPC_Z_P");
    assert_eq!(parameters[0]["kind"], "REAL32");
    assert_eq!(parameters[1]["value"], 4);
}

#[test]
fn check_malformed_line_fails_with_clean_stdout() {
    let dir = tempdir().expect("tempdir should be created");
    let params = dir.path().join("params.txt");
    fs::write(&params, "MPC_Z_P 1.5\nONLY_ONE_TOKEN\n").expect("write params");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["check", "--json"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Malformed parameter line 2"));
}

#[test]
fn check_missing_file_fails() {
    let dir = tempdir().expect("tempdir should be created");
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("check")
        .arg(dir.path().join("missing.txt"))
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn upload_missing_file_exits_one() {
    let dir = tempdir().expect("tempdir should be created");
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("upload")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("I/O error"));
}

#[test]
fn upload_to_unopenable_port_fails_negotiation() {
    let dir = tempdir().expect("tempdir should be created");
    let params = dir.path().join("params.txt");
    fs::write(&params, "MPC_Z_P 1.5\n").expect("write params");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["--port", "/nonexistent/ttyMAVPARAM", "upload"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to connect"));
}

#[test]
fn quiet_upload_still_reports_result_line() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("params.txt"), "MPC_Z_P 1.5\n").expect("write params");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["-q", "--port", "/nonexistent/ttyMAVPARAM", "upload", "-b", "57600"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("0/0 parameter(s) set"))
        .stderr(predicate::str::contains("Failed to connect"));
}

#[test]
fn list_ports_json_returns_valid_json() {
    let dir = tempdir().expect("tempdir should be created");
    let output = cli_cmd()
        .current_dir(dir.path())
        .args(["list-ports", "--json"])
        .output()
        .expect("command should execute");

    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed["ok"], true);
    assert!(parsed["data"]["ports"].is_array());
}

#[test]
fn invalid_config_is_a_warning() {
    let dir = tempdir().expect("tempdir should be created");
    let config = dir.path().join("mavparam.toml");
    fs::write(&config, "invalid toml [[[").expect("write invalid config");

    let output = cli_cmd()
        .current_dir(dir.path())
        .arg("list-ports")
        .output()
        .expect("command should execute");

    assert!(
        output.status.success(),
        "command should succeed despite config warning"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TOML"), "should warn about invalid TOML");
}

#[test]
fn explicit_config_path_is_used() {
    let dir = tempdir().expect("tempdir should be created");
    let params = dir.path().join("params.txt");
    fs::write(&params, "MPC_Z_P 1.5\n").expect("write params");
    let config = dir.path().join("custom.toml");
    fs::write(
        &config,
        "[port]\nserial = \"/nonexistent/ttyFROMCONFIG\"\n[link]\nbaud_rates = [57600]\n",
    )
    .expect("write config");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("upload")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("/nonexistent/ttyFROMCONFIG"));
}
