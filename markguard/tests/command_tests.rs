// markguard/tests/command_tests.rs
//! Library-level tests of the command runners, without spawning the binary.

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::process::ExitCode;
use tempfile::NamedTempFile;

use markguard::cli::{InputMode, PolicyArgs, SanitizeCommand, ScanCommand};
use markguard::commands::{sanitize::run_sanitize, scan::run_scan};
use markguard::ui::theme::ThemeStyle;

#[allow(dead_code)]
mod test_setup {
    use std::sync::Once;
    static INIT: Once = Once::new();

    /// Installs `env_logger` once per test binary.
    pub fn setup_logger() {
        INIT.call_once(|| {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
                .is_test(true)
                .try_init()
                .ok();
        });
    }
}

fn temp_with(content: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{}", content)?;
    Ok(file)
}

#[test]
fn test_run_sanitize_css_mode_to_file() -> Result<()> {
    test_setup::setup_logger();
    let input = temp_with("p.note > a:hover, a[href] { color: red; behavior: url(x.htc) } @import url(evil.css);")?;
    let output = NamedTempFile::new()?;
    let cmd = SanitizeCommand {
        input_file: Some(input.path().to_path_buf()),
        output: Some(output.path().to_path_buf()),
        policy: PolicyArgs::default(),
        mode: InputMode::Css,
        no_summary: true,
    };
    let code = run_sanitize(&cmd, &ThemeStyle::default_theme_map(), true)?;
    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(fs::read_to_string(output.path())?, "p.note > a:hover {\n\tcolor: red;\n}\n");
    Ok(())
}

#[test]
fn test_run_scan_threshold_exit_code() -> Result<()> {
    test_setup::setup_logger();
    let input = temp_with("<table border=\"green\"><tr><td>x</td></tr></table>")?;
    let report = NamedTempFile::new()?;
    let cmd = ScanCommand {
        input_file: Some(input.path().to_path_buf()),
        policy: PolicyArgs::default(),
        mode: InputMode::Html,
        fail_over_threshold: Some(0),
        json_file: Some(report.path().to_path_buf()),
        json_stdout: false,
    };
    let code = run_scan(&cmd, &ThemeStyle::default_theme_map(), true)?;
    assert_eq!(code, ExitCode::FAILURE);
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(report.path())?)?;
    assert_eq!(json["violations"][0]["kind"], "invalid-attribute");
    assert_eq!(json["violations"][0]["element"], "table");
    Ok(())
}

#[test_log::test]
fn test_run_sanitize_rejects_broken_overlay() -> Result<()> {
    let input = temp_with("<p>x</p>")?;
    let overlay = temp_with("global_attributes: [undeclared]\n")?;
    let cmd = SanitizeCommand {
        input_file: Some(input.path().to_path_buf()),
        output: None,
        policy: PolicyArgs { policy: None, extend: Some(overlay.path().to_path_buf()) },
        mode: InputMode::Html,
        no_summary: true,
    };
    let err = run_sanitize(&cmd, &ThemeStyle::default_theme_map(), true).unwrap_err();
    assert!(format!("{:#}", err).contains("undeclared"));
    Ok(())
}
