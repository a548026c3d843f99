//! Policy document management for `markguard-core`.
//!
//! This module defines the serialized shape of a sanitizing policy as authored in
//! YAML. It handles loading, exporting, merging and structural validation of
//! those documents. Turning a document into compiled patterns happens in
//! [`crate::model`]; resolving cross references happens in the compiler.
//!
//! License: MIT OR Apache-2.0

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::errors::{collect_errors, PolicyError};

/// Directive that enables prefix-matched attributes such as `data-*`.
pub const DIRECTIVE_ALLOW_DYNAMIC_ATTRIBUTES: &str = "allow-dynamic-attributes";

/// Directive kept for compatibility with older policies; embedding is unsupported.
pub const DIRECTIVE_EMBED_STYLE_SHEETS: &str = "embed-style-sheets";

/// Elements allowed to render without attributes when a policy names none.
pub const DEFAULT_ALLOWED_EMPTY_TAGS: &[&str] = &[
    "br", "hr", "a", "img", "link", "iframe", "script", "object", "applet", "frame", "base",
    "param", "meta", "input", "textarea", "embed", "basefont", "col",
];

/// An attribute as written in the catalogue or on a tag.
///
/// On a tag, an entry with neither literals nor patterns is a reference to the
/// common attribute of the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_invalid: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub literals: Vec<String>,
    /// Names of entries in `common_regexps`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub regexps: Vec<String>,
    /// Inline patterns.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AttributeSpec {
    pub fn is_reference(&self) -> bool {
        self.literals.is_empty() && self.regexps.is_empty() && self.patterns.is_empty()
    }
}

/// A per-element rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TagSpec {
    pub name: String,
    /// One of `validate`, `remove`, `filter`, `truncate`.
    pub action: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeSpec>,
}

impl Default for TagSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            action: "validate".to_string(),
            attributes: Vec::new(),
        }
    }
}

/// A CSS property rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PropertySpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_invalid: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub literals: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub regexps: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
    /// Properties whose rules are consulted when this one rejects a term.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shorthands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The top-level policy document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyDocument {
    pub directives: BTreeMap<String, String>,
    pub common_regexps: BTreeMap<String, String>,
    pub common_attributes: Vec<AttributeSpec>,
    pub global_attributes: Vec<String>,
    /// Names ending in the `*` wildcard marker, e.g. `data-*`.
    pub dynamic_attributes: Vec<String>,
    pub tags: Vec<TagSpec>,
    pub css_properties: Vec<PropertySpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_empty_tags: Option<Vec<String>>,
}

impl PolicyDocument {
    /// Loads a policy from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading policy from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy file {}", path.display()))?;
        let document = Self::from_yaml_str(&text)
            .with_context(|| format!("Failed to parse policy file {}", path.display()))?;
        info!(
            "Loaded policy with {} tags and {} CSS properties from {}.",
            document.tags.len(),
            document.css_properties.len(),
            path.display()
        );
        Ok(document)
    }

    /// Parses and structurally validates a YAML policy.
    pub fn from_yaml_str(text: &str) -> Result<Self, PolicyError> {
        let document: PolicyDocument = serde_yml::from_str(text)?;
        document.validate()?;
        Ok(document)
    }

    /// Loads the built-in policy.
    pub fn load_default() -> Result<Self> {
        debug!("Loading default policy from embedded string...");
        let default_yaml = include_str!("../config/default_policy.yaml");
        let document = Self::from_yaml_str(default_yaml).context("Failed to parse default policy")?;
        debug!("Loaded default policy with {} tags.", document.tags.len());
        Ok(document)
    }

    /// Serializes the document back to YAML, e.g. to export the active policy.
    pub fn to_yaml_string(&self) -> Result<String, PolicyError> {
        Ok(serde_yml::to_string(self)?)
    }

    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives.get(name).map(String::as_str)
    }

    /// Checks names and duplicates. Pattern and reference checks come later.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let mut errors = Vec::new();

        check_names(
            self.common_attributes.iter().map(|a| a.name.as_str()),
            "common attribute",
            &mut errors,
        );
        check_names(self.tags.iter().map(|t| t.name.as_str()), "tag", &mut errors);
        check_names(
            self.css_properties.iter().map(|p| p.name.as_str()),
            "CSS property",
            &mut errors,
        );

        for tag in &self.tags {
            check_names(
                tag.attributes.iter().map(|a| a.name.as_str()),
                "attribute on tag",
                &mut errors,
            );
        }

        for name in &self.dynamic_attributes {
            if !name.ends_with('*') {
                warn!("Dynamic attribute '{}' has no trailing '*' marker.", name);
            }
        }

        if self.directive(DIRECTIVE_EMBED_STYLE_SHEETS).is_some() {
            warn!(
                "The '{}' directive is not supported; embedded stylesheets are always dropped.",
                DIRECTIVE_EMBED_STYLE_SHEETS
            );
        }

        collect_errors(errors)
    }
}

fn check_names<'a>(names: impl Iterator<Item = &'a str>, kind: &str, errors: &mut Vec<PolicyError>) {
    let mut seen = HashSet::new();
    let mut problems = Vec::new();
    for name in names {
        if name.trim().is_empty() {
            problems.push(format!("A {} has an empty `name` field.", kind));
        } else if !seen.insert(name.to_ascii_lowercase()) {
            problems.push(format!("Duplicate {} name found: '{}'.", kind, name));
        }
    }
    if !problems.is_empty() {
        errors.push(PolicyError::Invalid(problems));
    }
}

/// Overlays `overlay` onto `base`.
///
/// Named entries (regexps, attributes, tags, properties, directives) in the
/// overlay replace base entries of the same name; lists of names are unioned.
pub fn merge_policies(base: PolicyDocument, overlay: Option<PolicyDocument>) -> PolicyDocument {
    let Some(overlay) = overlay else {
        return base;
    };
    debug!(
        "Merging overlay policy ({} tags) onto base policy ({} tags).",
        overlay.tags.len(),
        base.tags.len()
    );

    let mut merged = base;
    merged.directives.extend(overlay.directives);
    merged.common_regexps.extend(overlay.common_regexps);
    replace_by_name(&mut merged.common_attributes, overlay.common_attributes, |a| &a.name);
    replace_by_name(&mut merged.tags, overlay.tags, |t| &t.name);
    replace_by_name(&mut merged.css_properties, overlay.css_properties, |p| &p.name);
    union_names(&mut merged.global_attributes, overlay.global_attributes);
    union_names(&mut merged.dynamic_attributes, overlay.dynamic_attributes);
    if overlay.allowed_empty_tags.is_some() {
        merged.allowed_empty_tags = overlay.allowed_empty_tags;
    }
    merged
}

fn replace_by_name<T>(base: &mut Vec<T>, overlay: Vec<T>, name: impl Fn(&T) -> &String) {
    for entry in overlay {
        let key = name(&entry).to_ascii_lowercase();
        match base.iter().position(|b| name(b).to_ascii_lowercase() == key) {
            Some(index) => base[index] = entry,
            None => base.push(entry),
        }
    }
}

fn union_names(base: &mut Vec<String>, overlay: Vec<String>) {
    for name in overlay {
        if !base.iter().any(|b| b.eq_ignore_ascii_case(&name)) {
            base.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_tags_are_rejected() {
        let yaml = r#"
tags:
  - name: p
  - name: P
"#;
        let err = PolicyDocument::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("Duplicate tag name found: 'P'"));
    }

    #[test]
    fn test_tag_action_defaults_to_validate() -> Result<()> {
        let doc = PolicyDocument::from_yaml_str("tags:\n  - name: p\n")?;
        assert_eq!(doc.tags[0].action, "validate");
        Ok(())
    }

    #[test]
    fn test_merge_replaces_tags_by_name() -> Result<()> {
        let base = PolicyDocument::from_yaml_str(
            "tags:\n  - name: p\n  - name: script\n    action: remove\n",
        )?;
        let overlay = PolicyDocument::from_yaml_str(
            "tags:\n  - name: script\n    action: filter\n  - name: div\nglobal_attributes: [id]\n",
        )?;
        let merged = merge_policies(base, Some(overlay));
        assert_eq!(merged.tags.len(), 3);
        let script = merged.tags.iter().find(|t| t.name == "script").map(|t| t.action.as_str());
        assert_eq!(script, Some("filter"));
        assert_eq!(merged.global_attributes, vec!["id".to_string()]);
        Ok(())
    }

    #[test]
    fn test_export_round_trips_through_yaml() -> Result<()> {
        let doc = PolicyDocument::load_default()?;
        let exported = doc.to_yaml_string()?;
        assert_eq!(PolicyDocument::from_yaml_str(&exported)?, doc);
        Ok(())
    }
}
