// markguard-core/src/model.rs
//! In-memory policy model.
//!
//! [`PolicyModel::from_document`] turns a [`PolicyDocument`] into typed rules:
//! names and literals are lower-cased, patterns are compiled, dynamic attribute
//! names lose their wildcard marker. Cross references between attributes are kept
//! by name here and resolved by the compiler.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, warn};

use crate::config::{
    AttributeSpec, PolicyDocument, PropertySpec, DEFAULT_ALLOWED_EMPTY_TAGS,
    DIRECTIVE_ALLOW_DYNAMIC_ATTRIBUTES,
};
use crate::errors::{collect_errors, PolicyError};
use crate::pattern::{match_any, MatchOutcome, PolicyPattern, MAX_PATTERN_LENGTH};

/// What happens when an attribute value fails its rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnInvalid {
    #[default]
    RemoveAttribute,
    /// Drop the element's open/close tags as well; its content stays.
    RemoveTag,
}

impl OnInvalid {
    fn parse(value: Option<&str>, context: &str) -> Result<Self, PolicyError> {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("removeattribute") | Some("remove-attribute") => {
                Ok(OnInvalid::RemoveAttribute)
            }
            Some("removetag") | Some("remove-tag") => Ok(OnInvalid::RemoveTag),
            Some(_) => Err(PolicyError::InvalidKeyword {
                kind: "on_invalid action",
                value: value.unwrap_or_default().to_string(),
                context: context.to_string(),
            }),
        }
    }
}

/// What to do with an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    Validate,
    /// Drop the element and everything inside it.
    Remove,
    /// Drop the element's tags, keep its content.
    Filter,
    /// Keep the element with global and dynamic attributes only.
    Truncate,
}

impl TagAction {
    fn parse(value: &str, context: &str) -> Result<Self, PolicyError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "validate" => Ok(TagAction::Validate),
            "remove" => Ok(TagAction::Remove),
            "filter" => Ok(TagAction::Filter),
            "truncate" => Ok(TagAction::Truncate),
            _ => Err(PolicyError::InvalidKeyword {
                kind: "tag action",
                value: value.to_string(),
                context: context.to_string(),
            }),
        }
    }
}

/// Allow-list and invalidity action for one attribute name.
#[derive(Debug, Clone)]
pub struct AttributeRule {
    pub name: String,
    pub on_invalid: OnInvalid,
    pub literals: HashSet<String>,
    pub patterns: Vec<PolicyPattern>,
    pub description: Option<String>,
}

impl AttributeRule {
    /// True when the rule carries no allow-list of its own.
    pub fn is_reference(&self) -> bool {
        self.literals.is_empty() && self.patterns.is_empty()
    }

    /// Literal test on the lower-cased value, then patterns on the raw value.
    pub fn evaluate(&self, value: &str) -> MatchOutcome {
        if self.literals.contains(&value.to_lowercase()) {
            return MatchOutcome::Matched;
        }
        match_any(&self.patterns, value)
    }
}

/// A tag rule. Attributes are kept in declaration order and unresolved.
#[derive(Debug, Clone)]
pub struct TagRule {
    pub name: String,
    pub action: TagAction,
    pub attributes: Vec<AttributeRule>,
}

/// A CSS property rule.
#[derive(Debug, Clone)]
pub struct CssPropertyRule {
    pub name: String,
    pub on_invalid: OnInvalid,
    pub literals: HashSet<String>,
    pub patterns: Vec<PolicyPattern>,
    pub shorthands: Vec<String>,
    pub description: Option<String>,
}

/// A pair of optional patterns gating one kind of selector component.
#[derive(Debug, Clone, Default)]
pub struct SelectorMatcher {
    pub include: Option<PolicyPattern>,
    pub exclude: Option<PolicyPattern>,
}

impl SelectorMatcher {
    /// Accepted when included (or no include pattern exists) and not excluded.
    ///
    /// An exclude pattern that gives up counts as a hit.
    pub fn accepts(&self, text: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .map_or(true, |p| p.full_match(text) == MatchOutcome::Matched);
        let excluded = self
            .exclude
            .as_ref()
            .is_some_and(|p| p.full_match(text) != MatchOutcome::NoMatch);
        included && !excluded
    }
}

/// Selector matchers per component kind.
///
/// Attribute selectors are always rejected by the CSS engine; their matcher is
/// loaded so a policy that declares one still validates.
#[derive(Debug, Clone, Default)]
pub struct CssSelectorPolicy {
    pub element: SelectorMatcher,
    pub class: SelectorMatcher,
    pub id: SelectorMatcher,
    pub pseudo: SelectorMatcher,
    pub attribute: SelectorMatcher,
}

/// String toggles from the policy.
#[derive(Debug, Clone, Default)]
pub struct DirectiveMap(BTreeMap<String, String>);

impl DirectiveMap {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Exact, case-sensitive comparison against `"true"`.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name) == Some("true")
    }
}

/// A prefix-matched attribute, e.g. prefix `data-` referring to `data-*`.
#[derive(Debug, Clone)]
pub struct DynamicAttribute {
    pub prefix: String,
    pub reference: String,
}

/// Immutable in-memory policy.
#[derive(Debug, Clone)]
pub struct PolicyModel {
    pub directives: DirectiveMap,
    pub common_attributes: HashMap<String, AttributeRule>,
    pub global_attributes: Vec<String>,
    pub dynamic_attributes: Vec<DynamicAttribute>,
    pub tag_rules: HashMap<String, TagRule>,
    pub css_properties: HashMap<String, CssPropertyRule>,
    pub allowed_empty_tags: HashSet<String>,
    pub selectors: CssSelectorPolicy,
}

impl PolicyModel {
    /// Compiles every pattern and normalises names. All problems are collected
    /// and reported together.
    pub fn from_document(document: &PolicyDocument) -> Result<Self, PolicyError> {
        let mut errors = Vec::new();
        let regexps = compile_common_regexps(&document.common_regexps, &mut errors);

        let mut common_attributes = HashMap::new();
        for spec in &document.common_attributes {
            let context = format!("common attribute '{}'", spec.name);
            if let Some(rule) = build_attribute(spec, &regexps, &context, &mut errors) {
                common_attributes.insert(rule.name.clone(), rule);
            }
        }

        let mut tag_rules = HashMap::new();
        for tag in &document.tags {
            let context = format!("tag '{}'", tag.name);
            let action = match TagAction::parse(&tag.action, &context) {
                Ok(action) => action,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let attributes = tag
                .attributes
                .iter()
                .filter_map(|spec| {
                    let context = format!("attribute '{}' on tag '{}'", spec.name, tag.name);
                    build_attribute(spec, &regexps, &context, &mut errors)
                })
                .collect();
            let name = tag.name.to_ascii_lowercase();
            tag_rules.insert(name.clone(), TagRule { name, action, attributes });
        }

        let mut css_properties = HashMap::new();
        for spec in &document.css_properties {
            if let Some(rule) = build_property(spec, &regexps, &mut errors) {
                css_properties.insert(rule.name.clone(), rule);
            }
        }
        for rule in css_properties.values() {
            for shorthand in &rule.shorthands {
                if !css_properties.contains_key(shorthand) {
                    warn!(
                        "CSS property '{}' names unknown shorthand '{}'; it will never match.",
                        rule.name, shorthand
                    );
                }
            }
        }

        let dynamic_attributes = document
            .dynamic_attributes
            .iter()
            .map(|name| {
                let reference = name.to_ascii_lowercase();
                let prefix = reference.strip_suffix('*').unwrap_or(&reference).to_string();
                DynamicAttribute { prefix, reference }
            })
            .collect();

        let allowed_empty_tags = match &document.allowed_empty_tags {
            Some(names) => names.iter().map(|n| n.to_ascii_lowercase()).collect(),
            None => DEFAULT_ALLOWED_EMPTY_TAGS.iter().map(|n| n.to_string()).collect(),
        };

        let selectors = CssSelectorPolicy {
            element: selector_matcher(&regexps, "cssElementSelector", "cssElementExclusion"),
            class: selector_matcher(&regexps, "cssClassSelector", "cssClassExclusion"),
            id: selector_matcher(&regexps, "cssIDSelector", "cssIDExclusion"),
            pseudo: selector_matcher(&regexps, "cssPseudoElementSelector", "cssPseudoElementExclusion"),
            attribute: selector_matcher(&regexps, "cssAttributeSelector", "cssAttributeExclusion"),
        };

        collect_errors(errors)?;

        let directives = DirectiveMap(document.directives.clone());
        debug!(
            "Policy model built: {} common attributes, {} tags, {} CSS properties, dynamic attributes {}.",
            common_attributes.len(),
            tag_rules.len(),
            css_properties.len(),
            if directives.is_enabled(DIRECTIVE_ALLOW_DYNAMIC_ATTRIBUTES) { "enabled" } else { "disabled" }
        );

        Ok(PolicyModel {
            directives,
            common_attributes,
            global_attributes: document
                .global_attributes
                .iter()
                .map(|n| n.to_ascii_lowercase())
                .collect(),
            dynamic_attributes,
            tag_rules,
            css_properties,
            allowed_empty_tags,
            selectors,
        })
    }
}

fn compile_common_regexps(
    sources: &BTreeMap<String, String>,
    errors: &mut Vec<PolicyError>,
) -> HashMap<String, PolicyPattern> {
    let mut compiled = HashMap::new();
    for (name, source) in sources {
        if source.len() > MAX_PATTERN_LENGTH {
            errors.push(PolicyError::PatternLengthExceeded(name.clone(), source.len(), MAX_PATTERN_LENGTH));
            continue;
        }
        match PolicyPattern::new(name.clone(), source) {
            Ok(pattern) => {
                compiled.insert(name.clone(), pattern);
            }
            Err(e) => errors.push(e),
        }
    }
    compiled
}

fn collect_patterns(
    regexp_names: &[String],
    inline: &[String],
    regexps: &HashMap<String, PolicyPattern>,
    context: &str,
    errors: &mut Vec<PolicyError>,
) -> Vec<PolicyPattern> {
    let mut patterns = Vec::new();
    for name in regexp_names {
        match regexps.get(name) {
            Some(pattern) => patterns.push(pattern.clone()),
            None => errors.push(PolicyError::UnknownRegexp {
                name: name.clone(),
                context: context.to_string(),
            }),
        }
    }
    for (index, source) in inline.iter().enumerate() {
        let name = format!("{}#{}", context, index);
        if source.len() > MAX_PATTERN_LENGTH {
            errors.push(PolicyError::PatternLengthExceeded(name, source.len(), MAX_PATTERN_LENGTH));
            continue;
        }
        match PolicyPattern::new(name, source) {
            Ok(pattern) => patterns.push(pattern),
            Err(e) => errors.push(e),
        }
    }
    patterns
}

fn build_attribute(
    spec: &AttributeSpec,
    regexps: &HashMap<String, PolicyPattern>,
    context: &str,
    errors: &mut Vec<PolicyError>,
) -> Option<AttributeRule> {
    let on_invalid = match OnInvalid::parse(spec.on_invalid.as_deref(), context) {
        Ok(action) => action,
        Err(e) => {
            errors.push(e);
            return None;
        }
    };
    Some(AttributeRule {
        name: spec.name.to_ascii_lowercase(),
        on_invalid,
        literals: spec.literals.iter().map(|l| l.to_lowercase()).collect(),
        patterns: collect_patterns(&spec.regexps, &spec.patterns, regexps, context, errors),
        description: spec.description.clone(),
    })
}

fn build_property(
    spec: &PropertySpec,
    regexps: &HashMap<String, PolicyPattern>,
    errors: &mut Vec<PolicyError>,
) -> Option<CssPropertyRule> {
    let context = format!("CSS property '{}'", spec.name);
    let on_invalid = match OnInvalid::parse(spec.on_invalid.as_deref(), &context) {
        Ok(action) => action,
        Err(e) => {
            errors.push(e);
            return None;
        }
    };
    Some(CssPropertyRule {
        name: spec.name.to_ascii_lowercase(),
        on_invalid,
        literals: spec.literals.iter().map(|l| l.to_lowercase()).collect(),
        patterns: collect_patterns(&spec.regexps, &spec.patterns, regexps, &context, errors),
        shorthands: spec.shorthands.iter().map(|s| s.to_ascii_lowercase()).collect(),
        description: spec.description.clone(),
    })
}

fn selector_matcher(regexps: &HashMap<String, PolicyPattern>, include: &str, exclude: &str) -> SelectorMatcher {
    SelectorMatcher {
        include: regexps.get(include).cloned(),
        exclude: regexps.get(exclude).cloned(),
    }
}
