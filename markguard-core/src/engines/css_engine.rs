// markguard-core/src/engines/css_engine.rs
//! A `SanitizationEngine` implementation for CSS.
//!
//! Works in two modes that share one validator: a full stylesheet (selector
//! blocks, e.g. the text of a `<style>` element) and an inline declaration list
//! (a `style` attribute). Rejected selectors, properties and terms are dropped;
//! retained terms are written back in canonical form.
//! License: MIT OR APACHE 2.0

use std::collections::HashSet;
use std::sync::Arc;

use log::debug;

use crate::engine::{SanitizationEngine, SanitizedOutput};
use crate::events::{ComplexSelector, CompoundSelector, CssDocumentHandler, SelectorComponent, Term};
use crate::model::CssPropertyRule;
use crate::pattern::{match_any, MatchOutcome};
use crate::sanitizers::compiler::{CompiledCss, CompiledPolicy};
use crate::tokenizers::css::{parse_declaration_list, parse_stylesheet};
use crate::violation::{loggable, redact_content, Violation, ViolationKind};

/// Pseudo-classes without arguments that are always allowed.
const STRUCTURAL_PSEUDO_CLASSES: &[&str] = &["only-child", "only-of-type"];

/// Which grammar the input follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssMode {
    Stylesheet,
    Inline,
}

#[derive(Debug)]
pub struct CssPolicyEngine {
    policy: Arc<CompiledPolicy>,
    mode: CssMode,
}

impl CssPolicyEngine {
    pub fn new(policy: Arc<CompiledPolicy>, mode: CssMode) -> Self {
        Self { policy, mode }
    }

    pub fn mode(&self) -> CssMode {
        self.mode
    }
}

impl SanitizationEngine for CssPolicyEngine {
    fn sanitize(&self, content: &str) -> SanitizedOutput {
        let mut violations = Vec::new();
        let content = clean_css(&self.policy.css, content, self.mode, &mut violations);
        SanitizedOutput { content, violations }
    }

    fn policy(&self) -> &CompiledPolicy {
        &self.policy
    }
}

/// Cleans `text` against `css`, appending violations.
///
/// A tokenizer fault discards the whole unit: the result is empty.
pub fn clean_css(css: &CompiledCss, text: &str, mode: CssMode, violations: &mut Vec<Violation>) -> String {
    let mut cleaner = CssCleaner {
        css,
        mode,
        open_selectors: None,
        declarations: Vec::new(),
        out: String::new(),
        violations,
    };
    let parsed = match mode {
        CssMode::Stylesheet => parse_stylesheet(unwrap_cdata(text), &mut cleaner),
        CssMode::Inline => parse_declaration_list(text, &mut cleaner),
    };
    match parsed {
        Ok(()) => cleaner.finish(),
        Err(e) => {
            debug!(target: "markguard_core::css", "Discarding CSS {}: {}", loggable(text), e);
            cleaner.violations.push(Violation::new(ViolationKind::CssSyntax).detail(e.to_string()));
            String::new()
        }
    }
}

fn unwrap_cdata(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|inner| inner.strip_suffix("]]>"))
        .unwrap_or(text)
}

struct CssCleaner<'a> {
    css: &'a CompiledCss,
    mode: CssMode,
    /// Valid selectors of the block being read; `None` outside a valid block.
    open_selectors: Option<Vec<String>>,
    declarations: Vec<String>,
    out: String,
    violations: &'a mut Vec<Violation>,
}

impl CssCleaner<'_> {
    fn finish(self) -> String {
        match self.mode {
            CssMode::Inline => self.declarations.join(" "),
            CssMode::Stylesheet => self.out,
        }
    }

    fn complex_selector_is_valid(&self, selector: &ComplexSelector) -> bool {
        self.compound_selector_is_valid(&selector.head)
            && selector.tail.iter().all(|(_, compound)| self.compound_selector_is_valid(compound))
    }

    fn compound_selector_is_valid(&self, compound: &CompoundSelector) -> bool {
        let selectors = &self.css.selectors;
        let element_ok = compound
            .element
            .as_ref()
            .map_or(true, |element| selectors.element.accepts(&element.to_lowercase()));
        element_ok
            && compound.components.iter().all(|component| match component {
                SelectorComponent::Class(class) => selectors.class.accepts(&format!(".{}", class.to_lowercase())),
                SelectorComponent::Id(id) => selectors.id.accepts(&format!("#{}", id.to_lowercase())),
                SelectorComponent::PseudoClass(name) => {
                    let name = name.to_lowercase();
                    STRUCTURAL_PSEUDO_CLASSES.contains(&name.as_str()) || selectors.pseudo.accepts(&format!(":{}", name))
                }
                SelectorComponent::PseudoElement(name) => selectors.pseudo.accepts(&format!(":{}", name.to_lowercase())),
                SelectorComponent::Negation(inner) => {
                    !inner.is_empty() && inner.iter().all(|s| self.complex_selector_is_valid(s))
                }
                SelectorComponent::Attribute(_) | SelectorComponent::Unsupported(_) => false,
            })
    }

    fn term_is_valid(&self, rule: &CssPropertyRule, text: &str, visited: &mut HashSet<String>) -> bool {
        if !visited.insert(rule.name.clone()) {
            return false;
        }
        if rule.literals.contains(&text.to_lowercase()) || match_any(&rule.patterns, text) == MatchOutcome::Matched {
            return true;
        }
        rule.shorthands.iter().any(|shorthand| {
            self.css
                .properties
                .get(shorthand)
                .is_some_and(|shorthand_rule| self.term_is_valid(shorthand_rule, text, visited))
        })
    }

    fn reject_property(&mut self, name: &str, detail: &str) {
        self.violations
            .push(Violation::new(ViolationKind::InvalidProperty).detail(format!("{} ({})", name, detail)));
    }

    /// Renders the retained terms of one declaration, or `None` if none survive.
    fn clean_declaration(&mut self, name: &str, value: &[Term], important: bool) -> Option<String> {
        let css = self.css;
        let Some(rule) = css.properties.get(name) else {
            self.reject_property(name, "no rule");
            return None;
        };
        let mut kept: Vec<String> = Vec::new();
        let mut pending_comma = false;
        let mut rejected = 0usize;
        for term in value {
            if *term == Term::Comma {
                pending_comma = !kept.is_empty();
                continue;
            }
            let accepted = term
                .canonical()
                .filter(|text| self.term_is_valid(rule, text, &mut HashSet::new()));
            match accepted {
                Some(text) => {
                    if pending_comma {
                        if let Some(last) = kept.last_mut() {
                            last.push(',');
                        }
                        pending_comma = false;
                    }
                    kept.push(text);
                }
                None => rejected += 1,
            }
        }
        if rejected > 0 {
            self.reject_property(name, &format!("{} term(s) dropped", rejected));
        }
        if kept.is_empty() {
            return None;
        }
        let mut declaration = format!("{}: {}", name, kept.join(" "));
        if important {
            declaration.push_str(" !important");
        }
        declaration.push(';');
        Some(declaration)
    }

    fn drop_at_rule(&mut self, name: &str) {
        self.violations
            .push(Violation::new(ViolationKind::UnsupportedAtRule).detail(format!("@{}", name)));
    }
}

impl CssDocumentHandler for CssCleaner<'_> {
    fn import_style(&mut self, _prelude: &str) {
        self.drop_at_rule("import");
    }

    fn namespace_declaration(&mut self, _prelude: &str) {
        self.drop_at_rule("namespace");
    }

    fn ignorable_at_rule(&mut self, name: &str) {
        self.drop_at_rule(name);
    }

    fn start_page(&mut self, _selector: &str) {
        self.drop_at_rule("page");
    }

    fn start_font_face(&mut self) {
        self.drop_at_rule("font-face");
    }

    fn start_selector(&mut self, selectors: &[ComplexSelector]) {
        let mut valid = Vec::new();
        for selector in selectors {
            let text = selector.to_string();
            if self.complex_selector_is_valid(selector) {
                valid.push(text);
            } else {
                debug!(target: "markguard_core::css", "Rejected selector {}", loggable(&text));
                self.violations
                    .push(Violation::new(ViolationKind::InvalidSelector).detail(redact_content(&text)));
            }
        }
        self.declarations.clear();
        self.open_selectors = if valid.is_empty() { None } else { Some(valid) };
    }

    fn end_selector(&mut self, _selectors: &[ComplexSelector]) {
        let Some(selectors) = self.open_selectors.take() else {
            return;
        };
        if self.declarations.is_empty() {
            return;
        }
        self.out.push_str(&selectors.join(", "));
        self.out.push_str(" {\n");
        for declaration in self.declarations.drain(..) {
            self.out.push('\t');
            self.out.push_str(&declaration);
            self.out.push('\n');
        }
        self.out.push_str("}\n");
    }

    fn property(&mut self, name: &str, value: &[Term], important: bool) {
        if self.mode == CssMode::Stylesheet && self.open_selectors.is_none() {
            return;
        }
        let name = name.to_lowercase();
        if let Some(declaration) = self.clean_declaration(&name, value, important) {
            self.declarations.push(declaration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyDocument;
    use crate::model::PolicyModel;
    use crate::sanitizers::compiler::compile_policy;

    const POLICY: &str = r##"
common_regexps:
  length: "-?\\d+(\\.\\d+)?(in|px|em|%)"
  integer: "\\d+"
  cssElementSelector: "[a-z0-9]+|\\*"
  cssClassSelector: "\\.[a-z0-9\\-_]+"
  cssIDSelector: "#[a-z0-9\\-_]+"
  cssPseudoElementSelector: ":(hover|first-line)"
  cssIDExclusion: "#forbidden"
css_properties:
  - name: margin
    literals: [auto, inherit]
    regexps: [length]
  - name: margin-top
    shorthands: [margin]
  - name: color
    literals: [red]
    patterns: ["rgb\\(\\d{1,3},\\d{1,3},\\d{1,3}\\)"]
  - name: font-family
    patterns: ["[\\w ,\"'\\-]+"]
  - name: z-index
    regexps: [integer]
    shorthands: [loop-a]
  - name: loop-a
    shorthands: [loop-b]
  - name: loop-b
    shorthands: [loop-a]
"##;

    fn css() -> CompiledCss {
        let document = PolicyDocument::from_yaml_str(POLICY).unwrap();
        compile_policy(&PolicyModel::from_document(&document).unwrap()).unwrap().css
    }

    fn clean(text: &str, mode: CssMode) -> (String, Vec<Violation>) {
        let mut violations = Vec::new();
        let out = clean_css(&css(), text, mode, &mut violations);
        (out, violations)
    }

    #[test]
    fn test_shorthand_fallback_keeps_term() {
        let (out, violations) = clean("margin-top: 0.08in", CssMode::Inline);
        assert_eq!(out, "margin-top: 0.08in;");
        assert!(violations.is_empty());
    }

    #[test]
    fn test_colors_are_canonical() {
        let (out, _) = clean("color: #000000; color: rgb(1, 2, 3); color: RED", CssMode::Inline);
        assert_eq!(out, "color: rgb(0,0,0); color: rgb(1,2,3); color: RED;");
    }

    #[test]
    fn test_invalid_terms_are_dropped_and_counted() {
        let (out, violations) = clean("margin: 2px expression(alert(1)) -3em; position: fixed", CssMode::Inline);
        assert_eq!(out, "margin: 2px -3em;");
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.kind == ViolationKind::InvalidProperty));
    }

    #[test]
    fn test_commas_join_retained_terms() {
        let (out, _) = clean("font-family: Geneva, \"Courier New\", sans-serif", CssMode::Inline);
        assert_eq!(out, "font-family: Geneva, \"Courier New\", sans-serif;");
    }

    #[test]
    fn test_important_is_emitted_once() {
        let (out, _) = clean("margin: 1px 2px !important", CssMode::Inline);
        assert_eq!(out, "margin: 1px 2px !important;");
    }

    #[test]
    fn test_shorthand_cycles_terminate() {
        let (out, _) = clean("z-index: 5; z-index: high", CssMode::Inline);
        assert_eq!(out, "z-index: 5;");
    }

    #[test]
    fn test_stylesheet_selectors() {
        let (out, violations) = clean(
            "p.note > a:hover, a[href], #forbidden { color: red } \
             div:only-child, :not(#forbidden) { margin: auto } \
             p::first-line { font-family: serif }",
            CssMode::Stylesheet,
        );
        assert_eq!(
            out,
            "p.note > a:hover {\n\tcolor: red;\n}\ndiv:only-child {\n\tmargin: auto;\n}\np::first-line {\n\tfont-family: serif;\n}\n"
        );
        let rejected: Vec<&str> = violations
            .iter()
            .filter(|v| v.kind == ViolationKind::InvalidSelector)
            .filter_map(|v| v.detail.as_deref())
            .collect();
        assert_eq!(rejected, vec!["[CONTENT: 7 chars]", "[CONTENT: 10 chars]", "[CONTENT: 16 chars]"]);
        assert!(violations
            .iter()
            .filter_map(|v| v.detail.as_deref())
            .all(|detail| !detail.contains("forbidden")));
    }

    #[test]
    fn test_media_is_flattened_and_import_dropped() {
        let (out, violations) = clean("@import url(evil.css); @media screen { p { color: red } }", CssMode::Stylesheet);
        assert_eq!(out, "p {\n\tcolor: red;\n}\n");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::UnsupportedAtRule);
    }

    #[test]
    fn test_cdata_is_unwrapped() {
        let (out, _) = clean("  <![CDATA[ p { color: red } ]]>  ", CssMode::Stylesheet);
        assert_eq!(out, "p {\n\tcolor: red;\n}\n");
    }

    #[test]
    fn test_syntax_fault_empties_the_unit() {
        let (out, violations) = clean("color: red; background: url(a b)", CssMode::Inline);
        assert_eq!(out, "");
        assert_eq!(violations.last().map(|v| v.kind), Some(ViolationKind::CssSyntax));
    }

    #[test]
    fn test_engine_trait_uses_mode() {
        let document = PolicyDocument::from_yaml_str(POLICY).unwrap();
        let policy = Arc::new(compile_policy(&PolicyModel::from_document(&document).unwrap()).unwrap());
        let engine = CssPolicyEngine::new(policy, CssMode::Inline);
        let output = engine.sanitize("margin: auto; float: left");
        assert_eq!(output.content, "margin: auto;");
        assert_eq!(output.violation_count(), 1);
    }
}
