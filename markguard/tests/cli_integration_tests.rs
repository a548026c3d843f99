// markguard/tests/cli_integration_tests.rs
//! Command-line integration tests for the `markguard` binary.
//!
//! Each test spawns the binary with `assert_cmd`, feeds input through stdin or a
//! temporary file, and asserts on stdout, stderr and the exit status. Output is
//! stripped of ANSI escapes before comparison.

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

use strip_ansi_escapes::strip as strip_ansi_escapes_fn;

fn markguard() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo_bin!("markguard"));
    cmd.env("RUST_LOG", "warn");
    cmd.env_remove("MARKGUARD_ALLOW_DEBUG_CONTENT");
    cmd
}

fn strip_ansi(bytes: &[u8]) -> String {
    String::from_utf8_lossy(&strip_ansi_escapes_fn(bytes)).to_string()
}

fn policy_file(yaml: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{}", yaml)?;
    Ok(file)
}

#[test]
fn test_sanitize_stdin_with_default_policy() -> Result<()> {
    let assert = markguard()
        .args(["sanitize"])
        .write_stdin("<p>ok<script>bad()</script></p>")
        .assert()
        .success();
    let output = assert.get_output();
    assert_eq!(strip_ansi(&output.stdout), "<p>ok</p>\n");
    let stderr = strip_ansi(&output.stderr);
    assert!(stderr.contains("Violation summary (1 total):"), "stderr was: {}", stderr);
    assert!(stderr.contains("removed-element"));
    Ok(())
}

#[test]
fn test_sanitize_no_summary_and_output_file() -> Result<()> {
    let mut input = NamedTempFile::new()?;
    write!(input, "<img src=\"javascript:x\">hello")?;
    let out = NamedTempFile::new()?;

    markguard()
        .args(["sanitize", "--no-summary", "-i"])
        .arg(input.path())
        .arg("-o")
        .arg(out.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Violation summary").not());

    assert_eq!(fs::read_to_string(out.path())?, "hello");
    Ok(())
}

#[test]
fn test_sanitize_with_custom_policy() -> Result<()> {
    let policy = policy_file(
        r#"
directives:
  allow-dynamic-attributes: "true"
common_attributes:
  - name: data-*
    patterns: ["test-purpose"]
dynamic_attributes: ["data-*"]
tags:
  - name: p
"#,
    )?;
    markguard()
        .args(["sanitize", "--no-summary", "--policy"])
        .arg(policy.path())
        .write_stdin("<p data-test=\"test-purpose\">t</p><p data-test=\"bad\">t</p>")
        .assert()
        .success()
        .stdout("<p data-test=\"test-purpose\">t</p><p>t</p>\n");
    Ok(())
}

#[test]
fn test_sanitize_extend_overrides_action() -> Result<()> {
    let overlay = policy_file("tags:\n  - name: script\n    action: filter\n")?;
    markguard()
        .args(["sanitize", "--no-summary", "--extend"])
        .arg(overlay.path())
        .write_stdin("<b>a</b><script>b</script>")
        .assert()
        .success()
        .stdout("<b>a</b>\n");
    Ok(())
}

#[test]
fn test_sanitize_style_and_plain_modes() -> Result<()> {
    markguard()
        .args(["sanitize", "--no-summary", "--mode", "style"])
        .write_stdin("color: #000000; margin-top: 0.08in; position: fixed")
        .assert()
        .success()
        .stdout("color: rgb(0,0,0); margin-top: 0.08in;\n");

    markguard()
        .args(["sanitize", "--no-summary", "--mode", "plain"])
        .write_stdin("<b>\"x\"</b>")
        .assert()
        .success()
        .stdout("&lt;b&gt;&quot;x&quot;&lt;/b&gt;\n");
    Ok(())
}

#[test]
fn test_sanitize_is_idempotent_through_cli() -> Result<()> {
    let input = "<div style=\"color: red; z-index: 3\"><a href=\"/x\" onclick=\"y\">l</a><center>c</center>";
    let first = markguard().args(["sanitize", "--no-summary"]).write_stdin(input).assert().success();
    let once = String::from_utf8(first.get_output().stdout.clone())?;
    markguard()
        .args(["sanitize", "--no-summary"])
        .write_stdin(once.clone())
        .assert()
        .success()
        .stdout(predicate::str::diff(once));
    Ok(())
}

#[test]
fn test_scan_json_stdout() -> Result<()> {
    let assert = markguard()
        .args(["scan", "--json-stdout"])
        .write_stdin("<p onclick=\"x\">a</p><blink>b</blink>")
        .assert()
        .success();
    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(report["total_violations"], 2);
    assert_eq!(report["summary"][0]["kind"], "unknown-element");
    assert_eq!(report["violations"][0]["attribute"], "onclick");
    Ok(())
}

#[test]
fn test_scan_json_file_and_threshold() -> Result<()> {
    let report = NamedTempFile::new()?;
    markguard()
        .args(["scan", "--fail-over-threshold", "0", "--json-file"])
        .arg(report.path())
        .write_stdin("<script>x</script>")
        .assert()
        .failure()
        .stderr(predicate::str::contains("exceed the threshold of 0"));
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(report.path())?)?;
    assert_eq!(json["total_violations"], 1);

    markguard()
        .args(["scan", "--fail-over-threshold", "0"])
        .write_stdin("<p>clean</p>")
        .assert()
        .success()
        .stderr(predicate::str::contains("No policy violations found."));
    Ok(())
}

#[test]
fn test_check_href_verdicts_and_exit_code() {
    markguard()
        .args(["check-href", "/content/page.html", "https://sling.apache.org/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("VALID\t/content/page.html"));

    markguard()
        .args(["check-href", "#top", "javascript:alert(1)"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("VALID\t#top"))
        .stdout(predicate::str::contains("INVALID\tjavascript:alert(1)"));
}

#[test]
fn test_policy_validate_reports_all_problems() -> Result<()> {
    let broken = policy_file(
        r#"
global_attributes: [missing]
tags:
  - name: p
    action: explode
"#,
    )?;
    markguard()
        .args(["policy", "validate"])
        .arg(broken.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("explode"));

    let good = policy_file("tags:\n  - name: p\n")?;
    markguard()
        .args(["policy", "validate"])
        .arg(good.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("is valid: 1 elements"));
    Ok(())
}

#[test]
fn test_policy_show_exports_yaml() {
    markguard()
        .args(["policy", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("allow-dynamic-attributes"))
        .stdout(predicate::str::contains("name: script"));
}

#[test]
fn test_missing_subcommand_prints_help() {
    markguard().assert().failure().stderr(predicate::str::contains("Usage"));
}
