//! compiler.rs - Turns a policy model into the read-only tables used while sanitizing.
//!
//! Compilation resolves every attribute reference against the common attribute
//! catalogue, gates the dynamic attribute table behind its directive and derives the
//! set of attribute names whose rejection removes the surrounding tag. Either every
//! table is built or an error is returned; no partially compiled policy escapes.
//!
//! License: MIT OR APACHE 2.0

use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::DIRECTIVE_ALLOW_DYNAMIC_ATTRIBUTES;
use crate::errors::{collect_errors, PolicyError};
use crate::model::{
    AttributeRule, CssPropertyRule, CssSelectorPolicy, DirectiveMap, OnInvalid, PolicyModel, TagAction,
};
use crate::validators::default_href_rule;

/// The attribute whose value is a declaration list handled by the CSS engine.
pub const STYLE_ATTRIBUTE: &str = "style";

/// How the value of one attribute is judged.
#[derive(Debug, Clone)]
pub enum AttributeCheck {
    /// Accept or reject against an allow-list.
    Rule(Arc<AttributeRule>),
    /// Rewrite through the CSS engine in inline mode.
    Stylesheet,
}

/// An element with its attribute table fully resolved.
#[derive(Debug, Clone)]
pub struct CompiledElement {
    pub name: String,
    pub action: TagAction,
    /// Tag-specific attributes; always empty for `Truncate`.
    pub attributes: HashMap<String, AttributeCheck>,
}

/// Property rules and selector matchers for the CSS engine.
#[derive(Debug, Clone, Default)]
pub struct CompiledCss {
    pub properties: HashMap<String, CssPropertyRule>,
    pub selectors: CssSelectorPolicy,
}

/// One immutable, fully resolved policy generation.
#[derive(Debug)]
pub struct CompiledPolicy {
    pub elements: HashMap<String, CompiledElement>,
    pub global_attributes: HashMap<String, AttributeCheck>,
    /// Prefix-matched rules in declaration order; empty unless the directive is on.
    pub dynamic_attributes: Vec<(String, Arc<AttributeRule>)>,
    /// Attribute names whose rejection removes the enclosing tag, whatever the element.
    pub remove_tag_names: HashSet<String>,
    pub allowed_empty_tags: HashSet<String>,
    pub css: CompiledCss,
    /// Rule used by the standalone href check.
    pub href_rule: Arc<AttributeRule>,
    pub directives: DirectiveMap,
}

impl CompiledPolicy {
    pub fn element(&self, name: &str) -> Option<&CompiledElement> {
        self.elements.get(name)
    }

    /// The first dynamic rule whose prefix starts `attribute`.
    pub fn dynamic_rule(&self, attribute: &str) -> Option<&Arc<AttributeRule>> {
        self.dynamic_attributes
            .iter()
            .find(|(prefix, _)| attribute.starts_with(prefix.as_str()))
            .map(|(_, rule)| rule)
    }
}

/// Resolves `model` into a [`CompiledPolicy`].
pub fn compile_policy(model: &PolicyModel) -> Result<CompiledPolicy, PolicyError> {
    debug!(
        target: "markguard_core::compiler",
        "Compiling policy: {} tags, {} global attributes, {} dynamic attributes.",
        model.tag_rules.len(),
        model.global_attributes.len(),
        model.dynamic_attributes.len()
    );

    let mut errors = Vec::new();
    let common: HashMap<&str, Arc<AttributeRule>> = model
        .common_attributes
        .iter()
        .map(|(name, rule)| (name.as_str(), Arc::new(rule.clone())))
        .collect();

    let mut remove_tag_names: HashSet<String> = common
        .values()
        .filter(|rule| rule.on_invalid == OnInvalid::RemoveTag)
        .map(|rule| rule.name.clone())
        .collect();

    let mut global_attributes = HashMap::new();
    for name in &model.global_attributes {
        match resolve_reference(name, &common, "global attributes") {
            Ok(check) => {
                global_attributes.insert(name.clone(), check);
            }
            Err(e) => errors.push(e),
        }
    }

    let mut dynamic_attributes = Vec::new();
    for dynamic in &model.dynamic_attributes {
        match common.get(dynamic.reference.as_str()) {
            Some(rule) => dynamic_attributes.push((dynamic.prefix.clone(), Arc::clone(rule))),
            None => errors.push(PolicyError::UnresolvedAttribute {
                name: dynamic.reference.clone(),
                context: "dynamic attributes".to_string(),
            }),
        }
    }
    if !model.directives.is_enabled(DIRECTIVE_ALLOW_DYNAMIC_ATTRIBUTES) {
        if !dynamic_attributes.is_empty() {
            debug!(
                target: "markguard_core::compiler",
                "Directive '{}' is not \"true\"; {} dynamic attribute(s) stay inactive.",
                DIRECTIVE_ALLOW_DYNAMIC_ATTRIBUTES,
                dynamic_attributes.len()
            );
        }
        dynamic_attributes.clear();
    }

    let mut elements = HashMap::new();
    for tag in model.tag_rules.values() {
        let mut attributes = HashMap::new();
        for attribute in &tag.attributes {
            let context = format!("tag '{}'", tag.name);
            let check = if attribute.name == STYLE_ATTRIBUTE {
                Ok(AttributeCheck::Stylesheet)
            } else if attribute.is_reference() {
                resolve_reference(&attribute.name, &common, &context)
            } else {
                Ok(AttributeCheck::Rule(Arc::new(attribute.clone())))
            };
            match check {
                Ok(check) => {
                    attributes.insert(attribute.name.clone(), check);
                }
                Err(e) => errors.push(e),
            }
        }
        if tag.action == TagAction::Truncate && !attributes.is_empty() {
            debug!(
                target: "markguard_core::compiler",
                "Tag '{}' truncates; its {} attribute rule(s) are ignored.",
                tag.name,
                attributes.len()
            );
            attributes.clear();
        }
        elements.insert(
            tag.name.clone(),
            CompiledElement { name: tag.name.clone(), action: tag.action, attributes },
        );
    }

    collect_errors(errors)?;

    let scoped_rules = global_attributes
        .values()
        .chain(elements.values().flat_map(|e| e.attributes.values()))
        .filter_map(|check| match check {
            AttributeCheck::Rule(rule) => Some(rule),
            AttributeCheck::Stylesheet => None,
        })
        .chain(dynamic_attributes.iter().map(|(_, rule)| rule));
    for rule in scoped_rules {
        if rule.on_invalid == OnInvalid::RemoveTag {
            remove_tag_names.insert(rule.name.clone());
        }
    }

    let href_rule = match href_check(&elements, &global_attributes) {
        Some(rule) => rule,
        None => {
            debug!(target: "markguard_core::compiler", "No href rule declared; using the built-in link grammar.");
            default_href_rule()?
        }
    };

    debug!(
        target: "markguard_core::compiler",
        "Policy compiled: {} elements, {} dynamic prefixes, remove-tag names {:?}.",
        elements.len(),
        dynamic_attributes.len(),
        remove_tag_names
    );

    Ok(CompiledPolicy {
        elements,
        global_attributes,
        dynamic_attributes,
        remove_tag_names,
        allowed_empty_tags: model.allowed_empty_tags.clone(),
        css: CompiledCss {
            properties: model.css_properties.clone(),
            selectors: model.selectors.clone(),
        },
        href_rule,
        directives: model.directives.clone(),
    })
}

fn resolve_reference(
    name: &str,
    common: &HashMap<&str, Arc<AttributeRule>>,
    context: &str,
) -> Result<AttributeCheck, PolicyError> {
    if name == STYLE_ATTRIBUTE {
        return Ok(AttributeCheck::Stylesheet);
    }
    common
        .get(name)
        .map(|rule| AttributeCheck::Rule(Arc::clone(rule)))
        .ok_or_else(|| PolicyError::UnresolvedAttribute {
            name: name.to_string(),
            context: context.to_string(),
        })
}

fn href_check(
    elements: &HashMap<String, CompiledElement>,
    global_attributes: &HashMap<String, AttributeCheck>,
) -> Option<Arc<AttributeRule>> {
    let on_anchor = elements.get("a").and_then(|a| a.attributes.get("href"));
    match on_anchor.or_else(|| global_attributes.get("href")) {
        Some(AttributeCheck::Rule(rule)) => Some(Arc::clone(rule)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyDocument;
    use crate::pattern::MatchOutcome;

    fn compile(yaml: &str) -> Result<CompiledPolicy, PolicyError> {
        let document = PolicyDocument::from_yaml_str(yaml)?;
        compile_policy(&PolicyModel::from_document(&document)?)
    }

    fn rule<'a>(policy: &'a CompiledPolicy, tag: &str, attribute: &str) -> &'a AttributeRule {
        match policy.element(tag).and_then(|e| e.attributes.get(attribute)) {
            Some(AttributeCheck::Rule(rule)) => rule,
            other => panic!("expected a rule for {tag}/{attribute}, got {other:?}"),
        }
    }

    const CATALOGUE: &str = r#"
common_attributes:
  - name: align
    literals: [left, right]
  - name: src
    on_invalid: removeTag
    patterns: ["https://.*"]
  - name: data-*
    patterns: ["test-purpose"]
"#;

    #[test]
    fn test_reference_copies_the_common_rule() -> Result<(), PolicyError> {
        let policy = compile(&format!("{CATALOGUE}tags:\n  - name: p\n    attributes:\n      - name: align\n"))?;
        let align = rule(&policy, "p", "align");
        assert_eq!(align.evaluate("LEFT"), MatchOutcome::Matched);
        assert_eq!(align.evaluate("center"), MatchOutcome::NoMatch);
        Ok(())
    }

    #[test]
    fn test_tag_declaration_overrides_without_merging() -> Result<(), PolicyError> {
        let policy = compile(&format!(
            "{CATALOGUE}tags:\n  - name: p\n    attributes:\n      - name: align\n        literals: [center]\n"
        ))?;
        let align = rule(&policy, "p", "align");
        assert_eq!(align.evaluate("center"), MatchOutcome::Matched);
        assert_eq!(align.evaluate("left"), MatchOutcome::NoMatch);
        Ok(())
    }

    #[test]
    fn test_unresolved_reference_fails_compilation() {
        let err = compile("tags:\n  - name: p\n    attributes:\n      - name: title\n").unwrap_err();
        assert!(matches!(
            err,
            PolicyError::UnresolvedAttribute { ref name, ref context } if name == "title" && context == "tag 'p'"
        ));

        let err = compile("global_attributes: [lang]\n").unwrap_err();
        assert!(err.to_string().contains("'lang'"));
    }

    #[test]
    fn test_dynamic_table_requires_exact_directive() -> Result<(), PolicyError> {
        let base = format!("{CATALOGUE}dynamic_attributes: [\"data-*\"]\n");
        let disabled = compile(&base)?;
        assert!(disabled.dynamic_rule("data-test").is_none());

        let enabled = compile(&format!("{base}directives:\n  allow-dynamic-attributes: \"true\"\n"))?;
        let rule = enabled.dynamic_rule("data-test").map(|r| r.evaluate("test-purpose"));
        assert_eq!(rule, Some(MatchOutcome::Matched));
        assert!(enabled.dynamic_rule("aria-label").is_none());
        Ok(())
    }

    #[test]
    fn test_first_registered_dynamic_prefix_wins() -> Result<(), PolicyError> {
        let policy = compile(
            "directives:\n  allow-dynamic-attributes: \"true\"\n\
             common_attributes:\n  - name: data-*\n    patterns: [\"a+\"]\n  - name: data-x-*\n    patterns: [\"b+\"]\n\
             dynamic_attributes: [\"data-*\", \"data-x-*\"]\n",
        )?;
        let rule = policy.dynamic_rule("data-x-y").map(|r| (r.evaluate("aaa"), r.evaluate("bbb")));
        assert_eq!(rule, Some((MatchOutcome::Matched, MatchOutcome::NoMatch)));

        let reversed = compile(
            "directives:\n  allow-dynamic-attributes: \"true\"\n\
             common_attributes:\n  - name: data-*\n    patterns: [\"a+\"]\n  - name: data-x-*\n    patterns: [\"b+\"]\n\
             dynamic_attributes: [\"data-x-*\", \"data-*\"]\n",
        )?;
        let rule = reversed.dynamic_rule("data-x-y").map(|r| (r.evaluate("aaa"), r.evaluate("bbb")));
        assert_eq!(rule, Some((MatchOutcome::NoMatch, MatchOutcome::Matched)));
        assert_eq!(reversed.dynamic_rule("data-z").map(|r| r.evaluate("aaa")), Some(MatchOutcome::Matched));
        Ok(())
    }

    #[test]
    fn test_remove_tag_names_union() -> Result<(), PolicyError> {
        let policy = compile(&format!(
            "{CATALOGUE}tags:\n  - name: div\n    attributes:\n      - name: title\n        on_invalid: remove-tag\n        patterns: [\"[a-z]+\"]\n"
        ))?;
        assert!(policy.remove_tag_names.contains("src"));
        assert!(policy.remove_tag_names.contains("title"));
        assert!(!policy.remove_tag_names.contains("align"));
        Ok(())
    }

    #[test]
    fn test_style_is_routed_to_css() -> Result<(), PolicyError> {
        let policy = compile("global_attributes: [style]\ntags:\n  - name: p\n    attributes:\n      - name: style\n")?;
        assert!(matches!(policy.global_attributes.get("style"), Some(AttributeCheck::Stylesheet)));
        let p = policy.element("p").map(|e| &e.attributes);
        assert!(matches!(p.and_then(|a| a.get("style")), Some(AttributeCheck::Stylesheet)));
        Ok(())
    }

    #[test]
    fn test_truncate_drops_tag_attributes() -> Result<(), PolicyError> {
        let policy = compile(&format!(
            "{CATALOGUE}tags:\n  - name: center\n    action: truncate\n    attributes:\n      - name: align\n"
        ))?;
        let center = policy.element("center").map(|e| (e.action, e.attributes.len()));
        assert_eq!(center, Some((TagAction::Truncate, 0)));
        Ok(())
    }

    #[test]
    fn test_href_rule_prefers_anchor_declaration() -> Result<(), PolicyError> {
        let policy = compile("tags:\n  - name: a\n    attributes:\n      - name: href\n        literals: [\"#top\"]\n")?;
        assert_eq!(policy.href_rule.evaluate("#top"), MatchOutcome::Matched);
        assert_eq!(policy.href_rule.evaluate("/index.html"), MatchOutcome::NoMatch);

        let fallback = compile("tags: []\n")?;
        assert_eq!(fallback.href_rule.evaluate("/index.html"), MatchOutcome::Matched);
        Ok(())
    }
}
