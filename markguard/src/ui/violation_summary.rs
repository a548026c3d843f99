//! Tabular violation summary printed after `sanitize` and `scan`.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use owo_colors::{AnsiColors, OwoColorize};
use std::io::{self, Write};

use markguard_core::ViolationSummaryItem;

use crate::ui::theme::{color_for, ThemeEntry, ThemeMap};

fn table_color(color: AnsiColors) -> Color {
    match color {
        AnsiColors::Black => Color::Black,
        AnsiColors::Red => Color::DarkRed,
        AnsiColors::Green => Color::DarkGreen,
        AnsiColors::Yellow => Color::DarkYellow,
        AnsiColors::Blue => Color::DarkBlue,
        AnsiColors::Magenta => Color::DarkMagenta,
        AnsiColors::Cyan => Color::DarkCyan,
        AnsiColors::White => Color::Grey,
        AnsiColors::BrightBlack => Color::DarkGrey,
        AnsiColors::BrightRed => Color::Red,
        AnsiColors::BrightGreen => Color::Green,
        AnsiColors::BrightYellow => Color::Yellow,
        AnsiColors::BrightBlue => Color::Blue,
        AnsiColors::BrightMagenta => Color::Magenta,
        AnsiColors::BrightCyan => Color::Cyan,
        _ => Color::White,
    }
}

fn cell(text: String, theme: &ThemeMap, entry: ThemeEntry, supports_color: bool) -> Cell {
    let cell = Cell::new(text);
    if supports_color {
        cell.fg(table_color(color_for(theme, entry)))
    } else {
        cell
    }
}

/// Builds the summary table; names are joined with commas.
pub fn summary_table(summary: &[ViolationSummaryItem], theme: &ThemeMap, supports_color: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Violation", "Count", "Where"]);
    for item in summary {
        table.add_row(vec![
            cell(item.kind.to_string(), theme, ThemeEntry::SummaryKind, supports_color),
            cell(item.occurrences.to_string(), theme, ThemeEntry::SummaryOccurrences, supports_color),
            Cell::new(item.names.join(", ")),
        ]);
    }
    table
}

/// Prints the header line and table, or a success line when nothing was found.
pub fn print_summary<W: Write>(
    summary: &[ViolationSummaryItem],
    writer: &mut W,
    theme: &ThemeMap,
    supports_color: bool,
) -> io::Result<()> {
    if summary.is_empty() {
        let line = "No policy violations found.";
        return if supports_color {
            writeln!(writer, "{}", line.color(color_for(theme, ThemeEntry::Success)))
        } else {
            writeln!(writer, "{}", line)
        };
    }
    let total: usize = summary.iter().map(|item| item.occurrences).sum();
    let header = format!("Violation summary ({} total):", total);
    if supports_color {
        writeln!(writer, "{}", header.color(color_for(theme, ThemeEntry::Header)))?;
    } else {
        writeln!(writer, "{}", header)?;
    }
    writeln!(writer, "{}", summary_table(summary, theme, supports_color))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::theme::ThemeStyle;
    use markguard_core::{summarize, Violation, ViolationKind};

    #[test]
    fn summary_lists_kinds_and_totals() {
        let violations = vec![
            Violation::new(ViolationKind::RemovedElement).element("script"),
            Violation::new(ViolationKind::InvalidAttribute).element("img").attribute("src"),
            Violation::new(ViolationKind::RemovedElement).element("iframe"),
        ];
        let mut out = Vec::new();
        print_summary(&summarize(&violations), &mut out, &ThemeStyle::default_theme_map(), false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Violation summary (3 total):"));
        assert!(text.contains("removed-element"));
        assert!(text.contains("iframe, script"));
        assert!(text.contains("img@src"));
    }

    #[test]
    fn empty_summary_says_so() {
        let mut out = Vec::new();
        print_summary(&[], &mut out, &ThemeStyle::default_theme_map(), false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No policy violations found.\n");
    }
}
