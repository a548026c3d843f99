// markguard/src/cli.rs
//! This file defines the command-line interface (CLI) for the markguard application,
//! including all available commands and their arguments.
//! License: MIT OR APACHE 2.0

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use markguard_core::HeadlessEngineType;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "markguard",
    version = env!("CARGO_PKG_VERSION"),
    about = "Sanitize untrusted HTML and CSS against a policy",
    long_about = "Markguard removes everything from untrusted HTML and CSS that a declarative YAML policy does not allow: unknown elements and attributes, invalid attribute values, CSS selectors and property values, and unsafe links. It reports every violation it found.",
    arg_required_else_help = true
)]
pub struct Cli {
    #[arg(long, short = 'q', global = true, help = "Suppress all informational and debug messages.")]
    pub quiet: bool,

    #[arg(long, short = 'd', global = true, conflicts_with = "quiet", help = "Enable debug logging.")]
    pub debug: bool,

    #[arg(long = "theme", value_name = "FILE", global = true, help = "Path to a custom YAML theme file.")]
    pub theme: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Sanitizes an input file or stdin and writes the result.")]
    Sanitize(SanitizeCommand),

    #[command(about = "Reports policy violations in an input without writing sanitized output.")]
    Scan(ScanCommand),

    #[command(about = "Checks whether URLs are acceptable link targets.")]
    CheckHref(CheckHrefCommand),

    #[command(subcommand, about = "Validates or prints policies.")]
    Policy(PolicyCommand),
}

/// Where the policy comes from.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PolicyArgs {
    /// Replaces the built-in policy.
    #[arg(long = "policy", value_name = "FILE", help = "Policy YAML file to use instead of the built-in policy.")]
    pub policy: Option<PathBuf>,

    /// Overlaid on the base policy; named entries replace, name lists are unioned.
    #[arg(long = "extend", value_name = "FILE", help = "Policy YAML file overlaid on the base policy.")]
    pub extend: Option<PathBuf>,
}

/// What the input is.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum InputMode {
    /// An HTML fragment.
    #[default]
    Html,
    /// Plain text, escaped for HTML.
    Plain,
    /// A full stylesheet.
    Css,
    /// A `style` attribute value.
    Style,
}

impl From<InputMode> for HeadlessEngineType {
    fn from(mode: InputMode) -> Self {
        match mode {
            InputMode::Html => HeadlessEngineType::Html,
            InputMode::Plain => HeadlessEngineType::PlainText,
            InputMode::Css => HeadlessEngineType::Stylesheet,
            InputMode::Style => HeadlessEngineType::InlineStyle,
        }
    }
}

#[derive(Parser, Debug)]
pub struct SanitizeCommand {
    #[arg(long, short = 'i', value_name = "FILE", help = "Read input from a specified file instead of stdin.")]
    pub input_file: Option<PathBuf>,

    #[arg(long, short = 'o', value_name = "FILE", help = "Write output to a specified file instead of stdout.")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[arg(long, short = 'm', value_enum, default_value_t = InputMode::Html, help = "How to read the input.")]
    pub mode: InputMode,

    #[arg(long = "no-summary", help = "Suppress the violation summary.")]
    pub no_summary: bool,
}

#[derive(Parser, Debug)]
pub struct ScanCommand {
    #[arg(long, short = 'i', value_name = "FILE", help = "Read input from a specified file instead of stdin.")]
    pub input_file: Option<PathBuf>,

    #[command(flatten)]
    pub policy: PolicyArgs,

    #[arg(long, short = 'm', value_enum, default_value_t = InputMode::Html, help = "How to read the input.")]
    pub mode: InputMode,

    #[arg(
        long = "fail-over-threshold",
        value_name = "N",
        help = "Exit with a non-zero code if more than N violations are found."
    )]
    pub fail_over_threshold: Option<usize>,

    #[arg(long = "json-file", value_name = "FILE", help = "Export the scan report to a JSON file.")]
    pub json_file: Option<PathBuf>,

    #[arg(long = "json-stdout", conflicts_with = "json_file", help = "Print the scan report to stdout as JSON.")]
    pub json_stdout: bool,
}

#[derive(Parser, Debug)]
pub struct CheckHrefCommand {
    #[arg(value_name = "URL", required = true, help = "URLs to check.")]
    pub urls: Vec<String>,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    #[command(about = "Loads and compiles a policy file, reporting every problem found.")]
    Validate {
        #[arg(value_name = "FILE", help = "The policy YAML file to validate.")]
        path: PathBuf,
    },
    #[command(about = "Prints the effective policy as YAML.")]
    Show {
        #[command(flatten)]
        policy: PolicyArgs,
    },
}
