//! `markguard check-href`: validates URLs as link targets.

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::debug;
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use markguard_core::{InvalidHrefRecorder, PolicyModel, XssFilter};

use crate::cli::CheckHrefCommand;
use crate::ui::theme::{color_for, ThemeEntry, ThemeMap};
use crate::utils::policy_source::load_policy;

/// Prints one `VALID`/`INVALID` line per URL; fails if any URL is invalid.
pub fn run_check_href(cmd: &CheckHrefCommand, theme: &ThemeMap) -> Result<ExitCode> {
    let document = load_policy(&cmd.policy)?;
    let model = PolicyModel::from_document(&document).context("Policy failed to build")?;
    let recorder = Arc::new(InvalidHrefRecorder::default());
    let filter = XssFilter::from_model(&model, recorder.clone()).context("Policy failed to compile")?;

    let stdout = io::stdout();
    let supports_color = stdout.is_terminal();
    let mut writer = stdout.lock();
    for url in &cmd.urls {
        let (label, entry) = if filter.is_valid_href(url) {
            ("VALID", ThemeEntry::VerdictValid)
        } else {
            ("INVALID", ThemeEntry::VerdictInvalid)
        };
        if supports_color {
            writeln!(writer, "{}\t{}", label.color(color_for(theme, entry)), url)?;
        } else {
            writeln!(writer, "{}\t{}", label, url)?;
        }
    }

    let rejected = recorder.total();
    debug!("check-href: {} of {} URL(s) rejected.", rejected, cmd.urls.len());
    Ok(if rejected == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
