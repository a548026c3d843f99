// markguard-core/src/filter.rs
//! The facade most callers use: sanitize, check and validate links against the
//! current policy generation.
//!
//! Each call takes one snapshot of the [`PolicyStore`] and runs to completion on
//! it, so a reload that lands mid-call never affects that call.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use log::debug;

use crate::engine::{ProtectionContext, SanitizedOutput};
use crate::engines::html_engine::sanitize_html;
use crate::errors::PolicyError;
use crate::model::PolicyModel;
use crate::render::html_escape;
use crate::sanitizers::generation::PolicyStore;
use crate::status::{InvalidHrefSink, NoopHrefSink};
use crate::validators::HrefValidator;

pub struct XssFilter {
    store: PolicyStore,
    href_sink: Arc<dyn InvalidHrefSink>,
}

impl XssFilter {
    pub fn new(store: PolicyStore, href_sink: Arc<dyn InvalidHrefSink>) -> Self {
        Self { store, href_sink }
    }

    /// A filter over the built-in policy that discards href reports.
    pub fn with_default_policy() -> Result<Self> {
        Ok(Self::new(PolicyStore::with_default_policy()?, Arc::new(NoopHrefSink)))
    }

    pub fn from_model(model: &PolicyModel, href_sink: Arc<dyn InvalidHrefSink>) -> Result<Self, PolicyError> {
        Ok(Self::new(PolicyStore::new(model)?, href_sink))
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    /// Sanitizes `src` for `context` and reports what was dropped.
    pub fn sanitize(&self, context: ProtectionContext, src: &str) -> SanitizedOutput {
        if src.is_empty() {
            return SanitizedOutput::default();
        }
        match context {
            ProtectionContext::PlainTextToHtml => SanitizedOutput { content: html_escape(src), violations: Vec::new() },
            ProtectionContext::HtmlToHtml => {
                let policy = self.store.snapshot();
                sanitize_html(&policy, src)
            }
        }
    }

    /// Sanitized text for `context`; empty input gives empty output.
    pub fn filter(&self, context: ProtectionContext, src: &str) -> String {
        self.sanitize(context, src).content
    }

    /// `true` when `src` passes the policy without a single violation.
    pub fn check(&self, context: ProtectionContext, src: &str) -> bool {
        if src.is_empty() {
            return false;
        }
        let output = self.sanitize(context, src);
        debug!("check({}) found {} violation(s).", context, output.violation_count());
        output.is_clean()
    }

    /// Runs `url` through the link pipeline of the current generation.
    pub fn is_valid_href(&self, url: &str) -> bool {
        let policy = self.store.snapshot();
        HrefValidator::new(Arc::clone(&policy.href_rule), Arc::clone(&self.href_sink)).is_valid_href(url)
    }

    /// Compiles `model` and makes it the current generation.
    pub fn install(&self, model: &PolicyModel) -> Result<u64, PolicyError> {
        self.store.install(model)
    }

    /// Reloads the policy from a YAML file; the old generation stays on error.
    pub fn reload_from_file<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
        self.store.reload_from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyDocument;
    use crate::status::InvalidHrefRecorder;

    const POLICY: &str = r#"
common_attributes:
  - name: href
    patterns: ["https?://[a-z.]+/?"]
  - name: title
    patterns: ["[a-z ]*"]
tags:
  - name: a
    attributes:
      - name: href
  - name: p
    attributes:
      - name: title
"#;

    fn filter_with(sink: Arc<dyn InvalidHrefSink>) -> XssFilter {
        let document = PolicyDocument::from_yaml_str(POLICY).unwrap();
        XssFilter::from_model(&PolicyModel::from_document(&document).unwrap(), sink).unwrap()
    }

    #[test]
    fn test_filter_contexts() {
        let filter = filter_with(Arc::new(NoopHrefSink));
        assert_eq!(filter.filter(ProtectionContext::HtmlToHtml, "<p title=\"x\" onclick=\"y\">a</p>"), "<p title=\"x\">a</p>");
        assert_eq!(filter.filter(ProtectionContext::PlainTextToHtml, "<b>\"&\"</b>"), "&lt;b&gt;&quot;&amp;&quot;&lt;/b&gt;");
        assert_eq!(filter.filter(ProtectionContext::HtmlToHtml, ""), "");
    }

    #[test]
    fn test_check_reports_violations() {
        let filter = filter_with(Arc::new(NoopHrefSink));
        assert!(filter.check(ProtectionContext::HtmlToHtml, "<p title=\"fine\">ok</p>"));
        assert!(!filter.check(ProtectionContext::HtmlToHtml, "<p title=\"Bad!\">ok</p>"));
        assert!(!filter.check(ProtectionContext::HtmlToHtml, "<script>x</script>"));
        assert!(!filter.check(ProtectionContext::HtmlToHtml, ""));
    }

    #[test]
    fn test_is_valid_href_reports_to_sink() {
        let recorder = Arc::new(InvalidHrefRecorder::default());
        let filter = filter_with(recorder.clone());
        assert!(filter.is_valid_href("https://example.org/"));
        assert!(!filter.is_valid_href("javascript:alert(1)"));
        assert_eq!(recorder.total(), 1);
    }

    #[test]
    fn test_install_changes_later_calls_only() {
        let filter = filter_with(Arc::new(NoopHrefSink));
        let before = filter.store().snapshot();
        let document = PolicyDocument::from_yaml_str("tags:\n  - name: p\n").unwrap();
        let generation = filter.install(&PolicyModel::from_document(&document).unwrap()).unwrap();
        assert_eq!(generation, filter.store().generation());
        assert_eq!(filter.filter(ProtectionContext::HtmlToHtml, "<p title=\"x\">a</p>"), "<p>a</p>");
        assert_eq!(sanitize_html(&before, "<p title=\"x\">a</p>").content, "<p title=\"x\">a</p>");
    }
}
