//! Command implementations and the stderr message helpers they share.

pub mod check_href;
pub mod policy;
pub mod sanitize;
pub mod scan;

use anyhow::Result;
use is_terminal::IsTerminal;
use std::io;
use std::process::ExitCode;

use crate::cli::Commands;
use crate::ui::output_format;
use crate::ui::theme::ThemeMap;

pub fn info_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    let supports_color = io::stderr().is_terminal();
    let _ = output_format::print_info_message(&mut io::stderr(), msg.as_ref(), theme, supports_color);
}

pub fn success_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    let supports_color = io::stderr().is_terminal();
    let _ = output_format::print_success_message(&mut io::stderr(), msg.as_ref(), theme, supports_color);
}

pub fn warn_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    let supports_color = io::stderr().is_terminal();
    let _ = output_format::print_warn_message(&mut io::stderr(), msg.as_ref(), theme, supports_color);
}

pub fn error_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    let supports_color = io::stderr().is_terminal();
    let _ = output_format::print_error_message(&mut io::stderr(), msg.as_ref(), theme, supports_color);
}

/// Runs one subcommand. `Ok(ExitCode::FAILURE)` means the command ran but
/// its check failed (threshold exceeded, invalid URL).
pub fn dispatch(command: Commands, theme: &ThemeMap, quiet: bool) -> Result<ExitCode> {
    match command {
        Commands::Sanitize(cmd) => sanitize::run_sanitize(&cmd, theme, quiet),
        Commands::Scan(cmd) => scan::run_scan(&cmd, theme, quiet),
        Commands::CheckHref(cmd) => check_href::run_check_href(&cmd, theme),
        Commands::Policy(cmd) => policy::run_policy(&cmd, theme, quiet),
    }
}
