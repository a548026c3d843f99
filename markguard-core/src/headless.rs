// markguard-core/src/headless.rs

//! `headless.rs`
//! Convenience wrappers for one-shot sanitization without managing a
//! [`PolicyStore`](crate::sanitizers::generation::PolicyStore) or filter.
//!
//! Each call compiles the given policy document, so these helpers suit scripts
//! and tests rather than hot paths.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::PolicyDocument;
use crate::engine::{SanitizationEngine, SanitizedOutput};
use crate::engines::css_engine::{CssMode, CssPolicyEngine};
use crate::engines::html_engine::TagAttributeEngine;
use crate::model::PolicyModel;
use crate::render::html_escape;
use crate::sanitizers::compiler::compile_policy;

/// Which engine a headless call runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessEngineType {
    /// HTML fragment through the tag/attribute engine.
    Html,
    /// Plain text, escaped.
    PlainText,
    /// A full stylesheet.
    Stylesheet,
    /// A `style` attribute value.
    InlineStyle,
}

/// Compiles `document` and sanitizes `content` with the selected engine.
pub fn headless_sanitize(
    document: &PolicyDocument,
    content: &str,
    engine_type: HeadlessEngineType,
) -> Result<SanitizedOutput> {
    if engine_type == HeadlessEngineType::PlainText {
        return Ok(SanitizedOutput { content: html_escape(content), violations: Vec::new() });
    }
    let model = PolicyModel::from_document(document).context("Policy failed to build")?;
    let policy = Arc::new(compile_policy(&model).context("Policy failed to compile")?);

    let engine: Box<dyn SanitizationEngine> = match engine_type {
        HeadlessEngineType::Html | HeadlessEngineType::PlainText => Box::new(TagAttributeEngine::new(policy)),
        HeadlessEngineType::Stylesheet => Box::new(CssPolicyEngine::new(policy, CssMode::Stylesheet)),
        HeadlessEngineType::InlineStyle => Box::new(CssPolicyEngine::new(policy, CssMode::Inline)),
    };
    Ok(engine.sanitize(content))
}

/// Sanitizes an HTML fragment against the built-in policy.
pub fn headless_sanitize_html(content: &str) -> Result<String> {
    let document = PolicyDocument::load_default()?;
    Ok(headless_sanitize(&document, content, HeadlessEngineType::Html)?.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"
tags:
  - name: b
css_properties:
  - name: color
    literals: [red]
"#;

    #[test]
    fn test_headless_engines() -> Result<()> {
        let document = PolicyDocument::from_yaml_str(POLICY)?;
        let html = headless_sanitize(&document, "<b onclick=\"x\">hi</b><i>there</i>", HeadlessEngineType::Html)?;
        assert_eq!(html.content, "<b>hi</b>there");
        assert_eq!(html.violation_count(), 2);

        let inline = headless_sanitize(&document, "color: red; color: blue", HeadlessEngineType::InlineStyle)?;
        assert_eq!(inline.content, "color: red;");

        let text = headless_sanitize(&document, "<b>", HeadlessEngineType::PlainText)?;
        assert_eq!(text.content, "&lt;b&gt;");
        Ok(())
    }

    #[test]
    fn test_headless_rejects_broken_policy() {
        let document = PolicyDocument::from_yaml_str("global_attributes: [missing]\n").unwrap();
        assert!(headless_sanitize(&document, "<p>x</p>", HeadlessEngineType::Html).is_err());
    }

    #[test]
    fn test_headless_default_policy() -> Result<()> {
        assert_eq!(headless_sanitize_html("<p>ok<script>bad()</script></p>")?, "<p>ok</p>");
        Ok(())
    }
}
