//! `markguard scan`: reports violations without emitting sanitized content.

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::info;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use markguard_core::{headless_sanitize, summarize, Violation, ViolationSummaryItem};

use crate::cli::ScanCommand;
use crate::commands::{error_msg, info_msg, success_msg};
use crate::ui::theme::ThemeMap;
use crate::ui::violation_summary;
use crate::utils::policy_source::{load_policy, read_input};

/// JSON shape of `--json-stdout` / `--json-file`.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub total_violations: usize,
    pub summary: Vec<ViolationSummaryItem>,
    pub violations: Vec<Violation>,
}

pub fn run_scan(cmd: &ScanCommand, theme: &ThemeMap, quiet: bool) -> Result<ExitCode> {
    info!("Starting markguard scan.");
    let input = read_input(cmd.input_file.as_deref())?;
    let document = load_policy(&cmd.policy)?;
    let output = headless_sanitize(&document, &input, cmd.mode.into())?;

    let report = ScanReport {
        total_violations: output.violation_count(),
        summary: summarize(&output.violations),
        violations: output.violations,
    };

    if cmd.json_stdout {
        let stdout = io::stdout();
        let mut writer = stdout.lock();
        serde_json::to_writer_pretty(&mut writer, &report).context("Failed to serialize scan report")?;
        writeln!(writer)?;
    } else if let Some(path) = &cmd.json_file {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize scan report")?;
        fs::write(path, json).with_context(|| format!("Failed to write JSON report: {}", path.display()))?;
        if !quiet {
            info_msg(format!("Scan report written to {}", path.display()), theme);
        }
    }

    if !cmd.json_stdout && !quiet {
        let supports_color = io::stderr().is_terminal();
        violation_summary::print_summary(&report.summary, &mut io::stderr(), theme, supports_color)?;
    }

    if let Some(threshold) = cmd.fail_over_threshold {
        if report.total_violations > threshold {
            error_msg(
                format!("{} violations exceed the threshold of {}.", report.total_violations, threshold),
                theme,
            );
            return Ok(ExitCode::FAILURE);
        }
        if !quiet {
            success_msg(
                format!("{} violations, within the threshold of {}.", report.total_violations, threshold),
                theme,
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}
