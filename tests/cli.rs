//! Binary smoke tests.

use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("straylight").expect("binary builds");
    let assert = cmd.arg("--help").assert().success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(output.contains("evaluate"));
    assert!(output.contains("query"));
    assert!(output.contains("plugins"));
}

#[test]
fn unknown_subcommand_fails() {
    let mut cmd = Command::cargo_bin("straylight").expect("binary builds");
    cmd.arg("frobnicate").assert().failure();
}

#[test]
fn plugins_subcommand_lists_builtins() {
    let mut cmd = Command::cargo_bin("straylight").expect("binary builds");
    let assert = cmd.arg("plugins").assert().success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(output.contains("\"calculator\""));
    assert!(output.contains("\"echo\""));
    assert!(output.contains("\"linkedin_external\""));
    assert!(output.contains("\"pdf_resume_parser\""));
}
