//! `markguard sanitize`: writes the sanitized input and summarizes what was dropped.

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::{debug, info};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use markguard_core::{headless_sanitize, summarize};

use crate::cli::SanitizeCommand;
use crate::commands::info_msg;
use crate::ui::theme::ThemeMap;
use crate::ui::violation_summary;
use crate::utils::policy_source::{load_policy, read_input};

pub fn run_sanitize(cmd: &SanitizeCommand, theme: &ThemeMap, quiet: bool) -> Result<ExitCode> {
    info!("Starting markguard sanitize ({:?} mode).", cmd.mode);
    let input = read_input(cmd.input_file.as_deref())?;
    let document = load_policy(&cmd.policy)?;
    let output = headless_sanitize(&document, &input, cmd.mode.into())?;
    debug!(
        "Content sanitized. Original length: {}, sanitized length: {}, violations: {}",
        input.len(),
        output.content.len(),
        output.violation_count()
    );

    write_output(cmd.output.as_deref(), &output.content, theme, quiet)?;

    if !cmd.no_summary && !quiet {
        let supports_color = io::stderr().is_terminal();
        violation_summary::print_summary(&summarize(&output.violations), &mut io::stderr(), theme, supports_color)?;
    }
    info!("Sanitize completed.");
    Ok(ExitCode::SUCCESS)
}

/// Files receive the content as is; stdout gets a trailing newline if missing.
fn write_output(path: Option<&Path>, content: &str, theme: &ThemeMap, quiet: bool) -> Result<()> {
    match path {
        Some(path) => {
            if !quiet {
                info_msg(format!("Writing sanitized content to file: {}", path.display()), theme);
            }
            fs::write(path, content).with_context(|| format!("Failed to write output file: {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            writer.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                writeln!(writer)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
