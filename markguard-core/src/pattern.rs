// markguard-core/src/pattern.rs
//! Full-match policy patterns.
//!
//! Policy patterns may use look-around (common in URL grammars) and are compiled
//! with `fancy-regex`. Its backtracking VM carries a step budget; running out of
//! budget is reported as [`MatchOutcome::Exhausted`], which the href fallback
//! path keys on.

use std::fmt;
use std::sync::Arc;

use fancy_regex::{Regex, RegexBuilder};
use log::debug;

use crate::errors::PolicyError;

/// Maximum length of a single policy-supplied pattern.
pub const MAX_PATTERN_LENGTH: usize = 4096;

/// Backtracking steps a single match may take before it counts as exhausted.
pub const BACKTRACK_LIMIT: usize = 100_000;

/// Result of testing a value against a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched,
    NoMatch,
    /// The matcher ran out of its backtracking budget.
    Exhausted,
}

/// A compiled, anchored policy pattern.
#[derive(Clone)]
pub struct PolicyPattern {
    name: String,
    source: String,
    regex: Arc<Regex>,
}

impl PolicyPattern {
    /// Compiles `source` so that it only accepts whole-value matches.
    ///
    /// `.` matches newlines, mirroring how common regexps are declared.
    pub fn new(name: impl Into<String>, source: &str) -> Result<Self, PolicyError> {
        Self::with_backtrack_limit(name, source, BACKTRACK_LIMIT)
    }

    pub fn with_backtrack_limit(
        name: impl Into<String>,
        source: &str,
        backtrack_limit: usize,
    ) -> Result<Self, PolicyError> {
        let name = name.into();
        let anchored = format!("^(?s:{})$", source);
        let regex = RegexBuilder::new(&anchored)
            .backtrack_limit(backtrack_limit)
            .build()
            .map_err(|e| PolicyError::PatternCompilation(name.clone(), e.to_string()))?;
        Ok(Self {
            name,
            source: source.to_string(),
            regex: Arc::new(regex),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pattern as authored, without the anchoring wrapper.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn full_match(&self, value: &str) -> MatchOutcome {
        match self.regex.is_match(value) {
            Ok(true) => MatchOutcome::Matched,
            Ok(false) => MatchOutcome::NoMatch,
            Err(e) => {
                debug!(
                    target: "markguard_core::pattern",
                    "Pattern '{}' gave up on a {}-byte value: {}",
                    self.name,
                    value.len(),
                    e
                );
                MatchOutcome::Exhausted
            }
        }
    }
}

impl fmt::Debug for PolicyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyPattern")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish()
    }
}

/// Tests `value` against every pattern in order.
///
/// A later pattern may still accept a value an earlier one exhausted on; only when
/// nothing matched and at least one pattern gave up is the outcome `Exhausted`.
pub fn match_any(patterns: &[PolicyPattern], value: &str) -> MatchOutcome {
    let mut exhausted = false;
    for pattern in patterns {
        match pattern.full_match(value) {
            MatchOutcome::Matched => return MatchOutcome::Matched,
            MatchOutcome::Exhausted => exhausted = true,
            MatchOutcome::NoMatch => {}
        }
    }
    if exhausted {
        MatchOutcome::Exhausted
    } else {
        MatchOutcome::NoMatch
    }
}
