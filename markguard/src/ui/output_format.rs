//! Themed one-line status messages written to stderr.

use owo_colors::OwoColorize;
use std::io::{self, Write};

use crate::ui::theme::{color_for, ThemeEntry, ThemeMap};

/// Writes `prefix message`, colored when `supports_color` is set.
fn print_message<W: Write>(
    writer: &mut W,
    prefix: &str,
    message: &str,
    theme: &ThemeMap,
    entry: ThemeEntry,
    supports_color: bool,
) -> io::Result<()> {
    let line = format!("{} {}", prefix, message);
    if supports_color {
        writeln!(writer, "{}", line.color(color_for(theme, entry)))
    } else {
        writeln!(writer, "{}", line)
    }
}

pub fn print_info_message<W: Write>(writer: &mut W, message: &str, theme: &ThemeMap, supports_color: bool) -> io::Result<()> {
    print_message(writer, "[INFO]", message, theme, ThemeEntry::Info, supports_color)
}

pub fn print_success_message<W: Write>(writer: &mut W, message: &str, theme: &ThemeMap, supports_color: bool) -> io::Result<()> {
    print_message(writer, "[OK]", message, theme, ThemeEntry::Success, supports_color)
}

pub fn print_warn_message<W: Write>(writer: &mut W, message: &str, theme: &ThemeMap, supports_color: bool) -> io::Result<()> {
    print_message(writer, "[WARN]", message, theme, ThemeEntry::Warn, supports_color)
}

pub fn print_error_message<W: Write>(writer: &mut W, message: &str, theme: &ThemeMap, supports_color: bool) -> io::Result<()> {
    print_message(writer, "[ERROR]", message, theme, ThemeEntry::Error, supports_color)
}
