// markguard-core/src/engines/html_engine.rs
//! A `SanitizationEngine` implementation for HTML.
//!
//! The engine sits between the HTML tokenizer and the [`HtmlWriter`]. For each
//! element it looks up the compiled tag rule and decides whether the element is
//! emitted, unwrapped (tags dropped, content kept) or removed with its whole
//! subtree. Attributes are judged one by one against the dynamic, per-element
//! and global tables; `style` values and `<style>` text go through the CSS
//! engine, `href` values fall back to the built-in link rule when the policy's
//! own pattern gives up.
//! License: MIT OR APACHE 2.0

use std::collections::HashSet;
use std::sync::Arc;

use log::debug;

use crate::engine::{SanitizationEngine, SanitizedOutput};
use crate::engines::css_engine::{clean_css, CssMode};
use crate::events::{HtmlAttribute, HtmlEventSink};
use crate::model::{OnInvalid, TagAction};
use crate::pattern::MatchOutcome;
use crate::render::{is_void_element, HtmlWriter};
use crate::sanitizers::compiler::{AttributeCheck, CompiledElement, CompiledPolicy};
use crate::tokenizers::html::tokenize_html;
use crate::validators::check_href_rule;
use crate::violation::{log_violation_debug, Violation, ViolationKind};

/// Elements unwrapped when none of their attributes survive, unless the policy
/// allows them empty.
const SKIP_IF_EMPTY: &[&str] = &["a", "font", "img", "input", "span"];

/// Elements whose content the tokenizer reads as raw text.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext"];

const TARGET: &str = "markguard_core::html";

#[derive(Debug)]
pub struct TagAttributeEngine {
    policy: Arc<CompiledPolicy>,
}

impl TagAttributeEngine {
    pub fn new(policy: Arc<CompiledPolicy>) -> Self {
        Self { policy }
    }
}

impl SanitizationEngine for TagAttributeEngine {
    fn sanitize(&self, content: &str) -> SanitizedOutput {
        sanitize_html(&self.policy, content)
    }

    fn policy(&self) -> &CompiledPolicy {
        &self.policy
    }
}

/// Sanitizes an HTML fragment against `policy`.
pub fn sanitize_html(policy: &CompiledPolicy, html: &str) -> SanitizedOutput {
    let mut filter = TagFilter::new(policy, html.len());
    tokenize_html(html, &mut filter);
    debug!(target: TARGET, "Sanitized {} bytes of HTML with {} violation(s).", html.len(), filter.violations.len());
    filter.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Emitted,
    /// Tags dropped, content kept.
    Unwrapped,
    /// Tags and content dropped.
    Removed,
}

#[derive(Debug)]
struct OpenElement {
    name: String,
    disposition: Disposition,
}

struct TagFilter<'p> {
    policy: &'p CompiledPolicy,
    writer: HtmlWriter,
    stack: Vec<OpenElement>,
    /// Number of `Removed` entries on the stack.
    removed_depth: usize,
    /// Text of the emitted `<style>` element being read.
    style_text: Option<String>,
    violations: Vec<Violation>,
}

impl<'p> TagFilter<'p> {
    fn new(policy: &'p CompiledPolicy, capacity: usize) -> Self {
        Self {
            policy,
            writer: HtmlWriter::with_capacity(capacity),
            stack: Vec::new(),
            removed_depth: 0,
            style_text: None,
            violations: Vec::new(),
        }
    }

    fn finish(self) -> SanitizedOutput {
        SanitizedOutput { content: self.writer.finish(), violations: self.violations }
    }

    fn record(&mut self, violation: Violation, value: Option<&str>) {
        log_violation_debug(TARGET, &violation, value);
        self.violations.push(violation);
    }

    fn disposition_for(&mut self, name: &str, attributes: Vec<HtmlAttribute>) -> (Disposition, Vec<HtmlAttribute>) {
        let policy = self.policy;
        let Some(element) = policy.element(name) else {
            self.record(Violation::new(ViolationKind::UnknownElement).element(name), None);
            return (Disposition::Unwrapped, Vec::new());
        };
        match element.action {
            TagAction::Remove => {
                self.record(Violation::new(ViolationKind::RemovedElement).element(name), None);
                (Disposition::Removed, Vec::new())
            }
            TagAction::Filter => {
                self.record(Violation::new(ViolationKind::FilteredElement).element(name), None);
                (Disposition::Unwrapped, Vec::new())
            }
            TagAction::Validate | TagAction::Truncate => {
                let (kept, remove_tag) = self.evaluate_attributes(element, attributes);
                if remove_tag {
                    self.record(Violation::new(ViolationKind::RemovedTagOnInvalid).element(name), None);
                    return (Disposition::Unwrapped, Vec::new());
                }
                if kept.is_empty() && SKIP_IF_EMPTY.contains(&name) && !policy.allowed_empty_tags.contains(name) {
                    debug!(target: TARGET, "Unwrapping <{}> left without attributes.", name);
                    return (Disposition::Unwrapped, Vec::new());
                }
                (Disposition::Emitted, kept)
            }
        }
    }

    /// Returns the surviving attributes and whether the tag must be removed.
    fn evaluate_attributes(
        &mut self,
        element: &CompiledElement,
        attributes: Vec<HtmlAttribute>,
    ) -> (Vec<HtmlAttribute>, bool) {
        let policy = self.policy;
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        let mut remove_tag = false;

        for attribute in attributes {
            let name = attribute.name.to_lowercase();
            if !seen.insert(name.clone()) {
                self.record(
                    Violation::new(ViolationKind::InvalidAttribute)
                        .element(&element.name)
                        .attribute(&name)
                        .detail("duplicate"),
                    None,
                );
                continue;
            }

            let dynamic = policy.dynamic_rule(&name).map(|rule| AttributeCheck::Rule(Arc::clone(rule)));
            let check = dynamic
                .as_ref()
                .or_else(|| element.attributes.get(&name))
                .or_else(|| policy.global_attributes.get(&name));

            match check {
                None => {
                    self.record(
                        Violation::new(ViolationKind::UnknownAttribute).element(&element.name).attribute(&name),
                        Some(&attribute.value),
                    );
                }
                Some(AttributeCheck::Stylesheet) => {
                    let cleaned = clean_css(&policy.css, &attribute.value, CssMode::Inline, &mut self.violations);
                    if !cleaned.is_empty() {
                        kept.push(HtmlAttribute::new(name, cleaned));
                    }
                }
                Some(AttributeCheck::Rule(rule)) => {
                    let accepted = if name == "href" {
                        check_href_rule(rule, &attribute.value).is_valid()
                    } else {
                        rule.evaluate(&attribute.value) == MatchOutcome::Matched
                    };
                    if accepted {
                        kept.push(HtmlAttribute::new(name, attribute.value));
                        continue;
                    }
                    if policy.remove_tag_names.contains(&name) || rule.on_invalid == OnInvalid::RemoveTag {
                        remove_tag = true;
                    }
                    self.record(
                        Violation::new(ViolationKind::InvalidAttribute).element(&element.name).attribute(&name),
                        Some(&attribute.value),
                    );
                }
            }
        }
        (kept, remove_tag)
    }

    fn flush_style(&mut self) {
        if let Some(text) = self.style_text.take() {
            let cleaned = clean_css(&self.policy.css, &text, CssMode::Stylesheet, &mut self.violations);
            self.writer.raw(&cleaned.replace('<', "\\3c "));
        }
    }

    fn pop_element(&mut self, element: OpenElement) {
        match element.disposition {
            Disposition::Emitted => {
                if element.name == "style" {
                    self.flush_style();
                }
                self.writer.close_tag(&element.name);
            }
            Disposition::Removed => self.removed_depth -= 1,
            Disposition::Unwrapped => {}
        }
    }
}

impl HtmlEventSink for TagFilter<'_> {
    fn open_tag(&mut self, name: &str, attributes: Vec<HtmlAttribute>) {
        let disposition = if self.removed_depth > 0 {
            Disposition::Removed
        } else {
            let (disposition, kept) = self.disposition_for(name, attributes);
            if disposition == Disposition::Emitted {
                self.writer.open_tag(name, &kept);
                if name == "style" {
                    self.style_text = Some(String::new());
                }
            }
            disposition
        };
        if is_void_element(name) {
            return;
        }
        if disposition == Disposition::Removed {
            self.removed_depth += 1;
        }
        self.stack.push(OpenElement { name: name.to_string(), disposition });
    }

    fn close_tag(&mut self, name: &str) {
        let Some(index) = self.stack.iter().rposition(|open| open.name == name) else {
            return;
        };
        while self.stack.len() > index {
            if let Some(element) = self.stack.pop() {
                self.pop_element(element);
            }
        }
    }

    fn text(&mut self, text: &str) {
        if self.removed_depth > 0 {
            return;
        }
        if let Some(current) = self.stack.last() {
            if RAW_TEXT_ELEMENTS.contains(&current.name.as_str()) {
                if current.name == "style" && current.disposition == Disposition::Emitted {
                    if let Some(buffer) = self.style_text.as_mut() {
                        buffer.push_str(text);
                    }
                }
                return;
            }
        }
        self.writer.text(text);
    }

    fn close_document(&mut self) {
        while let Some(element) = self.stack.pop() {
            self.pop_element(element);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyDocument;
    use crate::model::PolicyModel;
    use crate::sanitizers::compiler::compile_policy;

    const POLICY: &str = r#"
directives:
  allow-dynamic-attributes: "true"
common_regexps:
  length: "\\d+(\\.\\d+)?(px|in|em)"
  url: "(https?://|/)[\\w./\\-]*"
  cssElementSelector: "[a-z]+"
  cssClassSelector: "\\.[a-z]+"
common_attributes:
  - name: src
    on_invalid: removeTag
    regexps: [url]
  - name: href
    regexps: [url]
  - name: title
    patterns: ["[\\w ]*"]
  - name: data-*
    patterns: ["test-purpose"]
global_attributes: [title, style]
dynamic_attributes: ["data-*"]
tags:
  - name: p
  - name: b
  - name: span
  - name: div
    attributes:
      - name: align
        on_invalid: removeTag
        literals: [left, right]
  - name: br
  - name: style
  - name: a
    attributes:
      - name: href
  - name: img
    attributes:
      - name: src
      - name: alt
        patterns: ["[\\w ]*"]
  - name: script
    action: remove
  - name: center
    action: filter
  - name: font
    action: truncate
css_properties:
  - name: color
    literals: [red, blue]
    patterns: ["rgb\\(\\d{1,3},\\d{1,3},\\d{1,3}\\)"]
  - name: margin
    regexps: [length]
  - name: margin-top
    shorthands: [margin]
"#;

    fn policy() -> CompiledPolicy {
        let document = PolicyDocument::from_yaml_str(POLICY).unwrap();
        compile_policy(&PolicyModel::from_document(&document).unwrap()).unwrap()
    }

    fn sanitize(html: &str) -> SanitizedOutput {
        sanitize_html(&policy(), html)
    }

    #[test]
    fn test_remove_drops_subtree() {
        let out = sanitize("<p>ok<script>bad()</script></p>");
        assert_eq!(out.content, "<p>ok</p>");
        assert_eq!(out.violations[0].kind, ViolationKind::RemovedElement);
    }

    #[test]
    fn test_remove_tag_cascade_keeps_content() {
        let out = sanitize("<img src=\"javascript:x\" alt=\"a\" onerror=\"y\">hello");
        assert_eq!(out.content, "hello");
        let kinds: Vec<ViolationKind> = out.violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![ViolationKind::InvalidAttribute, ViolationKind::UnknownAttribute, ViolationKind::RemovedTagOnInvalid]
        );
    }

    #[test]
    fn test_remove_tag_is_not_remove_subtree() {
        let out = sanitize("<p><div align=\"evil\"><b>kept</b></div></p>");
        assert_eq!(out.content, "<p><b>kept</b></p>");
        assert_eq!(out.violations.last().map(|v| v.kind), Some(ViolationKind::RemovedTagOnInvalid));
    }

    #[test]
    fn test_dynamic_prefix() {
        assert_eq!(sanitize("<p data-test=\"test-purpose\">t</p>").content, "<p data-test=\"test-purpose\">t</p>");
        let out = sanitize("<p data-test=\"bad\">t</p>");
        assert_eq!(out.content, "<p>t</p>");
        assert_eq!(out.violation_count(), 1);
    }

    #[test]
    fn test_first_duplicate_attribute_wins() {
        let policy = policy();
        let mut filter = TagFilter::new(&policy, 0);
        filter.open_tag(
            "p",
            vec![HtmlAttribute::new("title", "first"), HtmlAttribute::new("TITLE", "second")],
        );
        filter.text("x");
        filter.close_document();
        let out = filter.finish();
        assert_eq!(out.content, "<p title=\"first\">x</p>");
        assert_eq!(out.violation_count(), 1);
        assert_eq!(out.violations[0].kind, ViolationKind::InvalidAttribute);
        assert_eq!(out.violations[0].attribute.as_deref(), Some("title"));
        assert_eq!(out.violations[0].detail.as_deref(), Some("duplicate"));
    }

    #[test]
    fn test_filter_and_unknown_unwrap() {
        let out = sanitize("<center><blink>x</blink></center>");
        assert_eq!(out.content, "x");
        assert_eq!(out.violation_count(), 2);
    }

    #[test]
    fn test_style_attribute_is_rewritten() {
        let out = sanitize("<div style=\"color: #000000; margin-top: 0.08in; position: fixed\">x</div>");
        assert_eq!(out.content, "<div style=\"color: rgb(0,0,0); margin-top: 0.08in;\">x</div>");
        assert_eq!(out.violation_count(), 1);
    }

    #[test]
    fn test_fully_rejected_style_is_dropped() {
        assert_eq!(sanitize("<p style=\"behavior: url(x.htc)\">x</p>").content, "<p>x</p>");
    }

    #[test]
    fn test_style_element_is_cleaned() {
        let out = sanitize("<style>p.note { color: red; z-index: 9 } p { color: green }</style><p>x</p>");
        assert_eq!(out.content, "<style>p.note {\n\tcolor: red;\n}\n</style><p>x</p>");
    }

    #[test]
    fn test_truncate_keeps_global_attributes_only() {
        let out = sanitize("<font title=\"t\" color=\"red\">x</font>");
        assert_eq!(out.content, "<font title=\"t\">x</font>");
    }

    #[test]
    fn test_empty_span_is_unwrapped() {
        assert_eq!(sanitize("<span onclick=\"x()\">y</span>").content, "y");
        assert_eq!(sanitize("<span title=\"ok\">y</span>").content, "<span title=\"ok\">y</span>");
    }

    #[test]
    fn test_unclosed_elements_are_closed() {
        assert_eq!(sanitize("<p><b>bold").content, "<p><b>bold</b></p>");
        assert_eq!(sanitize("</b>x<br>").content, "x<br />");
    }

    #[test]
    fn test_output_is_escaped() {
        let out = sanitize("<p title=\"a\">1 &lt; 2 &amp; <b>3</b></p>");
        assert_eq!(out.content, "<p title=\"a\">1 &lt; 2 &amp; <b>3</b></p>");
    }

    #[test]
    fn test_href_checked() {
        assert_eq!(
            sanitize("<a href=\"/ok\">x</a><a href=\"javascript:alert(1)\">y</a>").content,
            "<a href=\"/ok\">x</a><a>y</a>"
        );
    }

    #[test]
    fn test_sanitizing_twice_is_stable() {
        let inputs = [
            "<p title=\"a &amp; b\">x<span style=\"color: red\">y</span><img src=\"/i.png\" alt=\"i\"></p>",
            "<div><style>p { margin: 1px }</style><center>c</center><b>unclosed",
        ];
        for input in inputs {
            let once = sanitize(input).content;
            let twice = sanitize(&once).content;
            assert_eq!(once, twice);
        }
    }
}
