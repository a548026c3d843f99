// markguard-core/src/events.rs
//! Event vocabulary exchanged between the tokenizers and the policy engines.
//!
//! HTML is pushed as open/close/text events into an [`HtmlEventSink`]. CSS is
//! pushed into a [`CssDocumentHandler`] as selector groups and declarations whose
//! values are already split into lexical [`Term`]s.

use std::fmt;

/// A name/value pair as it appeared on an open tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlAttribute {
    pub name: String,
    pub value: String,
}

impl HtmlAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Receiver of a push-style HTML event stream.
pub trait HtmlEventSink {
    fn open_document(&mut self) {}
    fn close_document(&mut self) {}
    fn open_tag(&mut self, name: &str, attributes: Vec<HtmlAttribute>);
    fn close_tag(&mut self, name: &str);
    fn text(&mut self, text: &str);
}

/// How two compound selectors are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

/// One condition attached to a compound selector.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorComponent {
    Class(String),
    Id(String),
    PseudoClass(String),
    PseudoElement(String),
    /// `[attr]`, `[attr=value]` and friends, kept as source text.
    Attribute(String),
    /// `:not(...)`
    Negation(Vec<ComplexSelector>),
    /// Anything else, e.g. functional pseudo-classes, kept as source text.
    Unsupported(String),
}

/// A type selector plus its conditions, e.g. `p.note:hover`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompoundSelector {
    /// `None` when the type selector is implied (`.note` rather than `*.note`).
    pub element: Option<String>,
    pub components: Vec<SelectorComponent>,
}

/// Compound selectors chained by combinators, e.g. `ul > li a`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexSelector {
    pub head: CompoundSelector,
    pub tail: Vec<(Combinator, CompoundSelector)>,
}

impl fmt::Display for SelectorComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorComponent::Class(c) => write!(f, ".{}", c),
            SelectorComponent::Id(id) => write!(f, "#{}", id),
            SelectorComponent::PseudoClass(p) => write!(f, ":{}", p),
            SelectorComponent::PseudoElement(p) => write!(f, "::{}", p),
            SelectorComponent::Attribute(raw) => write!(f, "[{}]", raw),
            SelectorComponent::Negation(inner) => {
                f.write_str(":not(")?;
                for (i, selector) in inner.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", selector)?;
                }
                f.write_str(")")
            }
            SelectorComponent::Unsupported(raw) => f.write_str(raw),
        }
    }
}

impl fmt::Display for CompoundSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.element, self.components.is_empty()) {
            (Some(element), _) => f.write_str(element)?,
            (None, true) => f.write_str("*")?,
            (None, false) => {}
        }
        for component in &self.components {
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}

impl fmt::Display for ComplexSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        for (combinator, compound) in &self.tail {
            let joiner = match combinator {
                Combinator::Descendant => " ",
                Combinator::Child => " > ",
                Combinator::NextSibling => " + ",
                Combinator::SubsequentSibling => " ~ ",
            };
            write!(f, "{}{}", joiner, compound)?;
        }
        Ok(())
    }
}

/// One lexical unit of a declaration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// A number with a unit; percentages use the unit `%`.
    Dimension { value: f32, unit: String },
    Integer(i32),
    Number(f32),
    Ident(String),
    String(String),
    Url(String),
    Rgb(i32, i32, i32),
    Inherit,
    Comma,
    /// Functions, `attr()`, counters, unicode ranges, stray operators and blocks.
    /// The payload names what was seen, for logging only.
    Unsupported(String),
}

impl Term {
    /// Canonical text of a supported term; `None` for unsupported kinds.
    pub fn canonical(&self) -> Option<String> {
        match self {
            Term::Dimension { value, unit } => Some(format!("{}{}", format_number(*value), unit)),
            Term::Integer(i) => Some(i.to_string()),
            Term::Number(n) => Some(format_number(*n)),
            Term::Ident(s) | Term::String(s) => {
                if s.chars().any(char::is_whitespace) {
                    Some(quote(s))
                } else {
                    Some(s.clone())
                }
            }
            Term::Url(u) => Some(format!("url({})", u)),
            Term::Rgb(r, g, b) => Some(format!("rgb({},{},{})", r, g, b)),
            Term::Inherit => Some("inherit".to_string()),
            Term::Comma => Some(",".to_string()),
            Term::Unsupported(_) => None,
        }
    }
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Decimal text without a trailing `.0`, rounded to four places.
pub fn format_number(value: f32) -> String {
    let rounded = (f64::from(value) * 10_000.0).round() / 10_000.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        let text = format!("{:.4}", rounded);
        text.trim_end_matches('0').to_string()
    }
}

/// Receiver of a CSS document, mirroring a SAX-style CSS parser.
///
/// Only selectors and properties carry meaning for sanitizing; every other
/// callback defaults to a no-op.
pub trait CssDocumentHandler {
    fn start_document(&mut self) {}
    fn end_document(&mut self) {}
    fn comment(&mut self, _text: &str) {}
    fn ignorable_at_rule(&mut self, _name: &str) {}
    fn namespace_declaration(&mut self, _prelude: &str) {}
    fn import_style(&mut self, _prelude: &str) {}
    fn start_media(&mut self, _media: &str) {}
    fn end_media(&mut self, _media: &str) {}
    fn start_page(&mut self, _selector: &str) {}
    fn end_page(&mut self, _selector: &str) {}
    fn start_font_face(&mut self) {}
    fn end_font_face(&mut self) {}
    fn start_selector(&mut self, selectors: &[ComplexSelector]);
    fn end_selector(&mut self, selectors: &[ComplexSelector]);
    fn property(&mut self, name: &str, value: &[Term], important: bool);
}
