// markguard-core/src/lib.rs
//! # Markguard Core Library
//!
//! `markguard-core` provides the platform-independent logic for sanitizing untrusted
//! HTML and CSS against a declarative policy. It defines the policy document and its
//! compiled form, and implements a pluggable `SanitizationEngine` trait for the HTML
//! and CSS engines that apply it.
//!
//! Sanitizing is fail-closed and best-effort: anything the policy does not name is
//! dropped, and every call produces output plus the list of violations it found.
//! Only loading or compiling a policy can fail.
//!
//! ## Modules
//!
//! * `config`: The YAML policy document: loading, merging and structural validation.
//! * `model`: Typed rules built from a document, with compiled patterns.
//! * `pattern`: Full-match policy patterns with a backtracking budget.
//! * `sanitizers`: Policy compilation and atomically swapped policy generations.
//! * `engine`: Defines the `SanitizationEngine` trait and the per-call output.
//! * `engines`: The HTML tag/attribute engine and the CSS policy engine.
//! * `tokenizers`: HTML and CSS event sources feeding the engines.
//! * `validators`: The link validator with its fallback grammar.
//! * `filter`: `XssFilter`, the facade for filtering, checking and link validation.
//! * `headless`: Convenience wrappers for one-shot sanitization.
//! * `violation`: Violation records, summaries and the content logging guard.
//! * `status`: Sinks that observe rejected links.
//!
//! ## Usage Example
//!
//! ```rust
//! use markguard_core::{ProtectionContext, XssFilter};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let filter = XssFilter::with_default_policy()?;
//!     let clean = filter.filter(ProtectionContext::HtmlToHtml, "<p>ok<script>bad()</script></p>");
//!     assert_eq!(clean, "<p>ok</p>");
//!     assert!(!filter.is_valid_href("javascript:alert(1)"));
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Policy problems surface as [`PolicyError`], with every problem of one load
//! collected together. File loading uses `anyhow::Error` with context.
//!
//! ---
//! License: MIT OR APACHE 2.0

pub mod config;
pub mod engine;
pub mod engines;
pub mod errors;
pub mod events;
pub mod filter;
pub mod headless;
pub mod model;
pub mod pattern;
pub mod render;
pub mod sanitizers;
pub mod status;
pub mod tokenizers;
pub mod validators;
pub mod violation;

/// Re-exports the policy document types.
pub use config::{merge_policies, AttributeSpec, PolicyDocument, PropertySpec, TagSpec};

/// Re-exports the custom error type for clear error reporting.
pub use errors::PolicyError;

pub use model::{OnInvalid, PolicyModel, TagAction};
pub use pattern::{MatchOutcome, MAX_PATTERN_LENGTH};

/// Re-exports types related to the core sanitization engine trait.
pub use engine::{ProtectionContext, SanitizationEngine, SanitizedOutput};

pub use engines::css_engine::{CssMode, CssPolicyEngine};
pub use engines::html_engine::TagAttributeEngine;

pub use filter::XssFilter;
pub use headless::{headless_sanitize, headless_sanitize_html, HeadlessEngineType};

pub use sanitizers::compiler::{compile_policy, CompiledPolicy};
pub use sanitizers::generation::{PolicyGeneration, PolicyStore};

pub use status::{InvalidHrefRecorder, InvalidHrefSink, NoopHrefSink};
pub use validators::{HrefValidator, HrefVerdict};
pub use violation::{summarize, Violation, ViolationKind, ViolationSummaryItem};
