// markguard-core/src/violation.rs
//! Records of content that failed the policy, and the logging guard for
//! untrusted text.

use lazy_static::lazy_static;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

lazy_static! {
    /// Read once: whether untrusted content may appear verbatim in debug logs.
    static ref CONTENT_DEBUG_ALLOWED: bool = {
        std::env::var("MARKGUARD_ALLOW_DEBUG_CONTENT")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    };
}

/// Why something was dropped or rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    /// No tag rule exists for the element.
    UnknownElement,
    /// The element and its content were removed.
    RemovedElement,
    /// The element's tags were removed, its content kept.
    FilteredElement,
    /// An invalid attribute removed the element's tags.
    RemovedTagOnInvalid,
    /// No attribute rule exists for the attribute.
    UnknownAttribute,
    /// The attribute value failed its rule.
    InvalidAttribute,
    /// A CSS selector was rejected.
    InvalidSelector,
    /// A CSS declaration lost some or all of its terms.
    InvalidProperty,
    /// An at-rule other than `@media` was dropped.
    UnsupportedAtRule,
    /// CSS text could not be tokenized.
    CssSyntax,
}

impl ViolationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::UnknownElement => "unknown-element",
            ViolationKind::RemovedElement => "removed-element",
            ViolationKind::FilteredElement => "filtered-element",
            ViolationKind::RemovedTagOnInvalid => "removed-tag-on-invalid",
            ViolationKind::UnknownAttribute => "unknown-attribute",
            ViolationKind::InvalidAttribute => "invalid-attribute",
            ViolationKind::InvalidSelector => "invalid-selector",
            ViolationKind::InvalidProperty => "invalid-property",
            ViolationKind::UnsupportedAtRule => "unsupported-at-rule",
            ViolationKind::CssSyntax => "css-syntax",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded policy violation.
///
/// `detail` never carries the offending value itself, only names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Violation {
    pub fn new(kind: ViolationKind) -> Self {
        Self { kind, element: None, attribute: None, detail: None }
    }

    pub fn element(mut self, name: &str) -> Self {
        self.element = Some(name.to_string());
        self
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.attribute = Some(name.to_string());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Count of violations of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViolationSummaryItem {
    pub kind: ViolationKind,
    pub occurrences: usize,
    /// Distinct element/attribute names involved, sorted.
    pub names: Vec<String>,
}

/// Aggregates violations per kind, in kind order.
pub fn summarize(violations: &[Violation]) -> Vec<ViolationSummaryItem> {
    let mut grouped: BTreeMap<ViolationKind, (usize, Vec<String>)> = BTreeMap::new();
    for violation in violations {
        let entry = grouped.entry(violation.kind).or_default();
        entry.0 += 1;
        let name = match (&violation.element, &violation.attribute) {
            (Some(e), Some(a)) => Some(format!("{}@{}", e, a)),
            (Some(e), None) => Some(e.clone()),
            (None, Some(a)) => Some(a.clone()),
            (None, None) => violation.detail.clone(),
        };
        if let Some(name) = name {
            if !entry.1.contains(&name) {
                entry.1.push(name);
            }
        }
    }
    grouped
        .into_iter()
        .map(|(kind, (occurrences, mut names))| {
            names.sort();
            ViolationSummaryItem { kind, occurrences, names }
        })
        .collect()
}

/// Length-only stand-in for untrusted text.
pub fn redact_content(s: &str) -> String {
    format!("[CONTENT: {} chars]", s.chars().count())
}

/// Untrusted text as it may appear in logs.
pub fn loggable(content: &str) -> String {
    if *CONTENT_DEBUG_ALLOWED {
        content.to_string()
    } else {
        redact_content(content)
    }
}

pub fn log_violation_debug(target_module: &str, violation: &Violation, value: Option<&str>) {
    debug!(
        "{} {} element={:?} attribute={:?} value={}",
        target_module,
        violation.kind,
        violation.element,
        violation.attribute,
        value.map(loggable).unwrap_or_default()
    );
}
