// markguard/src/main.rs
//! Markguard entry point.
//!
//! Parses arguments, installs the logger and theme, and runs one subcommand.

use clap::Parser;
use log::LevelFilter;
use std::process::ExitCode;

use markguard::cli::Cli;
use markguard::commands::{dispatch, error_msg};
use markguard::logger;
use markguard::ui::theme::{build_theme_map, ThemeStyle};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug {
        Some(LevelFilter::Debug)
    } else if cli.quiet {
        Some(LevelFilter::Off)
    } else {
        None
    };
    logger::init_logger(level);

    let theme_map = match build_theme_map(cli.theme.as_deref()) {
        Ok(theme) => theme,
        Err(e) => {
            let fallback = ThemeStyle::default_theme_map();
            error_msg(format!("{:#}", e), &fallback);
            return ExitCode::FAILURE;
        }
    };

    match dispatch(cli.command, &theme_map, cli.quiet) {
        Ok(code) => code,
        Err(e) => {
            error_msg(format!("{:#}", e), &theme_map);
            ExitCode::FAILURE
        }
    }
}
