//! Colors for the CLI's stderr messages and violation summaries.
//!
//! A theme maps each [`ThemeEntry`] to an optional 16-color ANSI foreground.
//! Users may supply a YAML file with `--theme`; entries it leaves out fall back
//! to white.

use anyhow::{Context, Result};
use owo_colors::AnsiColors;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub type ThemeMap = HashMap<ThemeEntry, ThemeStyle>;

/// The parts of the output that can be styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeEntry {
    Header,
    Success,
    Info,
    Warn,
    Error,
    /// Violation kind column of the summary table.
    SummaryKind,
    /// Count column of the summary table.
    SummaryOccurrences,
    /// `VALID` verdicts of `check-href`.
    VerdictValid,
    /// `INVALID` verdicts of `check-href`.
    VerdictInvalid,
}

const ALL_ENTRIES: [ThemeEntry; 9] = [
    ThemeEntry::Header,
    ThemeEntry::Success,
    ThemeEntry::Info,
    ThemeEntry::Warn,
    ThemeEntry::Error,
    ThemeEntry::SummaryKind,
    ThemeEntry::SummaryOccurrences,
    ThemeEntry::VerdictValid,
    ThemeEntry::VerdictInvalid,
];

/// A named ANSI color, e.g. `red` or `brightgreen`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ThemeColor {
    Named(String),
}

#[derive(Debug, Clone)]
pub struct ParseThemeColorError;

impl fmt::Display for ParseThemeColorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Invalid theme color; expected one of the 16 ANSI names, e.g. red, brightgreen, brightblack."
        )
    }
}

impl std::error::Error for ParseThemeColorError {}

const COLOR_NAMES: [(&str, AnsiColors); 16] = [
    ("black", AnsiColors::Black),
    ("red", AnsiColors::Red),
    ("green", AnsiColors::Green),
    ("yellow", AnsiColors::Yellow),
    ("blue", AnsiColors::Blue),
    ("magenta", AnsiColors::Magenta),
    ("cyan", AnsiColors::Cyan),
    ("white", AnsiColors::White),
    ("brightblack", AnsiColors::BrightBlack),
    ("brightred", AnsiColors::BrightRed),
    ("brightgreen", AnsiColors::BrightGreen),
    ("brightyellow", AnsiColors::BrightYellow),
    ("brightblue", AnsiColors::BrightBlue),
    ("brightmagenta", AnsiColors::BrightMagenta),
    ("brightcyan", AnsiColors::BrightCyan),
    ("brightwhite", AnsiColors::BrightWhite),
];

impl FromStr for ThemeColor {
    type Err = ParseThemeColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        if COLOR_NAMES.iter().any(|(name, _)| *name == lower) {
            Ok(ThemeColor::Named(lower))
        } else {
            Err(ParseThemeColorError)
        }
    }
}

impl ThemeColor {
    /// Unknown names render white.
    pub fn to_ansi_color(&self) -> AnsiColors {
        let ThemeColor::Named(name) = self;
        COLOR_NAMES
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, color)| *color)
            .unwrap_or(AnsiColors::White)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ThemeStyle {
    pub fg: Option<ThemeColor>,
}

impl ThemeStyle {
    fn named(color: &str) -> Self {
        ThemeStyle { fg: Some(ThemeColor::Named(color.to_string())) }
    }

    /// Loads a theme from YAML, filling missing entries with white.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<ThemeMap> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read theme file {}", path.display()))?;
        let mut custom: ThemeMap = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse theme file {}", path.display()))?;
        for entry in ALL_ENTRIES {
            custom.entry(entry).or_insert_with(|| ThemeStyle::named("white"));
        }
        Ok(custom)
    }

    pub fn default_theme_map() -> ThemeMap {
        let mut theme = HashMap::new();
        theme.insert(ThemeEntry::Header, ThemeStyle::named("brightcyan"));
        theme.insert(ThemeEntry::Success, ThemeStyle::named("green"));
        theme.insert(ThemeEntry::Warn, ThemeStyle::named("yellow"));
        theme.insert(ThemeEntry::Error, ThemeStyle::named("red"));
        theme.insert(ThemeEntry::SummaryKind, ThemeStyle::named("magenta"));
        theme.insert(ThemeEntry::SummaryOccurrences, ThemeStyle::named("yellow"));
        theme.insert(ThemeEntry::VerdictValid, ThemeStyle::named("green"));
        theme.insert(ThemeEntry::VerdictInvalid, ThemeStyle::named("brightred"));
        for entry in ALL_ENTRIES {
            theme.entry(entry).or_insert_with(|| ThemeStyle::named("white"));
        }
        theme
    }
}

/// The theme at `theme_path`, or the default theme.
pub fn build_theme_map(theme_path: Option<&Path>) -> Result<ThemeMap> {
    match theme_path {
        Some(path) => ThemeStyle::load_from_file(path),
        None => Ok(ThemeStyle::default_theme_map()),
    }
}

/// Foreground color for `entry`, white when unset.
pub fn color_for(theme: &ThemeMap, entry: ThemeEntry) -> AnsiColors {
    theme
        .get(&entry)
        .and_then(|style| style.fg.as_ref())
        .map(ThemeColor::to_ansi_color)
        .unwrap_or(AnsiColors::White)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parse_named_colors() {
        assert!("red".parse::<ThemeColor>().is_ok());
        assert!("BrightGreen".parse::<ThemeColor>().is_ok());
        assert!("unknown".parse::<ThemeColor>().is_err());
    }

    #[test]
    fn named_color_maps_to_ansi() {
        let tc: ThemeColor = "brightmagenta".parse().unwrap();
        assert_eq!(tc.to_ansi_color(), AnsiColors::BrightMagenta);
    }

    #[test]
    fn partial_theme_file_is_filled() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "error:\n  fg: blue")?;
        let theme = build_theme_map(Some(file.path()))?;
        assert_eq!(color_for(&theme, ThemeEntry::Error), AnsiColors::Blue);
        assert_eq!(color_for(&theme, ThemeEntry::Header), AnsiColors::White);
        assert_eq!(theme.len(), ALL_ENTRIES.len());
        Ok(())
    }
}
