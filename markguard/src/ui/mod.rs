//! Terminal presentation: themes, status messages and violation summaries.

pub mod output_format;
pub mod theme;
pub mod violation_summary;
