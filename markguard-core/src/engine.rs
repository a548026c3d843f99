// markguard-core/src/engine.rs
//! Defines the core SanitizationEngine trait and related data structures.
//!
//! Every engine reads one compiled policy generation and turns untrusted input
//! into sanitized output plus the violations it found along the way. Sanitizing
//! never fails: content that does not fit the policy is dropped or rewritten and
//! reported, never raised to the caller.
//!
//! License: MIT OR APACHE 2.0

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::sanitizers::compiler::CompiledPolicy;
use crate::violation::Violation;

/// Result of one sanitize call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SanitizedOutput {
    pub content: String,
    pub violations: Vec<Violation>,
}

impl SanitizedOutput {
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A pluggable sanitizer bound to one policy generation.
pub trait SanitizationEngine: Send + Sync {
    /// Sanitizes `content`, always producing output (possibly empty).
    fn sanitize(&self, content: &str) -> SanitizedOutput;

    /// The generation this engine was built from.
    fn policy(&self) -> &CompiledPolicy;
}

/// What the input is and where the output will be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtectionContext {
    /// Untrusted HTML, sanitized for inclusion as HTML.
    #[default]
    HtmlToHtml,
    /// Plain text, escaped for inclusion as HTML.
    PlainTextToHtml,
}

impl fmt::Display for ProtectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtectionContext::HtmlToHtml => f.write_str("html"),
            ProtectionContext::PlainTextToHtml => f.write_str("plain"),
        }
    }
}

impl FromStr for ProtectionContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" | "html-to-html" => Ok(ProtectionContext::HtmlToHtml),
            "plain" | "plain-text" | "plain-html-content" => Ok(ProtectionContext::PlainTextToHtml),
            other => Err(format!("Unknown protection context '{}'", other)),
        }
    }
}
