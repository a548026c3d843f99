// File: markguard-core/src/validators.rs
//! Link validation.
//!
//! [`HrefValidator`] decides whether a URL-like value may be used as a link
//! target. It decodes the value the way a browser would before looking at it,
//! checks the policy's `href` rule and, when the rule's matcher gives up on an
//! adversarial value, retries against two simple built-in patterns that cannot
//! blow up. Every rejection is reported to an [`InvalidHrefSink`].
//!
//! License: MIT OR APACHE 2.0

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, error, warn};
use markup5ever::data::NAMED_ENTITIES;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};

use crate::errors::PolicyError;
use crate::model::{AttributeRule, OnInvalid};
use crate::pattern::{MatchOutcome, PolicyPattern};
use crate::status::InvalidHrefSink;
use crate::violation::loggable;

const ALPHA: &str = r"(?:\p{L}\p{M}*)";
const HEX_DIGIT: &str = "[0-9A-Fa-f]";
const SUB_DELIMS: &str = r"[!$&'()*+,;=]";
const DEC_OCTET: &str = r"(?:\p{N}|[\x31-\x39]\p{N}|1\p{N}{2}|2[\x30-\x34]\p{N}|25[\x30-\x35])";

/// Relative path on the same site, or a bare fragment.
const ON_SITE_SIMPLIFIED: &str = r"[\p{L}\p{N}\\.#@$%+&;:\-_~,?=/!*()]*|#\w+";

/// Absolute http(s), ftp(s) or mailto link.
const OFF_SITE_SIMPLIFIED: &str =
    r"\s*(?:(?:ht|f)tps?://|mailto:)[\p{L}\p{N}]+[\p{L}\p{N}\p{Zs}.#@$%+&;:\-_~,?=/!*()]*\s*";

/// Builds the RFC 3986 relative-reference and URI patterns, both refusing any
/// `javascript` scheme.
fn default_href_grammar() -> (String, String) {
    let pct_encoded = format!("%{h}{h}", h = HEX_DIGIT);
    let unreserved = format!(r"{}|[\p{{N}}\-._~]", ALPHA);
    let reg_name = format!("(?:(?:{u})*|(?:{p})*|(?:{s})*)", u = unreserved, p = pct_encoded, s = SUB_DELIMS);
    let pchar = format!("{u}|{p}|{s}|:|@", u = unreserved, p = pct_encoded, s = SUB_DELIMS);
    let h16 = format!("{}{{1,4}}", HEX_DIGIT);
    let ipv4 = format!(r"{d}\.{d}\.{d}\.{d}", d = DEC_OCTET);
    let ls32 = format!("(?:{h}:{h})|{ip}", h = h16, ip = ipv4);
    let ipv6 = [
        format!("(?:(?:{h}:){{6}}(?:{l}))", h = h16, l = ls32),
        format!("(?:::(?:{h}:){{5}}(?:{l}))", h = h16, l = ls32),
        format!("(?:(?:{h}){{0,1}}::(?:{h}:){{4}}(?:{l}))", h = h16, l = ls32),
        format!("(?:(?:(?:{h}:){{0,1}}{h})?::(?:{h}:){{3}}(?:{l}))", h = h16, l = ls32),
        format!("(?:(?:(?:{h}:){{0,2}}{h})?::(?:{h}:){{2}}(?:{l}))", h = h16, l = ls32),
        format!("(?:(?:(?:{h}:){{0,3}}{h})?::(?:{h}:){{1}}(?:{l}))", h = h16, l = ls32),
        format!("(?:(?:(?:{h}:){{0,4}}{h})?::(?:{l}))", h = h16, l = ls32),
        format!("(?:(?:(?:{h}:){{0,5}}{h})?::(?:{h}))", h = h16),
        format!("(?:(?:(?:{h}:){{0,6}}{h})?::)", h = h16),
    ]
    .join("|");
    let ip_literal = format!(r"\[(?:{})\]", ipv6);
    let host = format!("(?:{}|{}|{})", ip_literal, ipv4, reg_name);
    let user_info = format!("(?:(?:{u})|(?:{p})|(?:{s}))*", u = unreserved, p = pct_encoded, s = SUB_DELIMS);
    let authority = format!("(?:{}@)?{}(?::[0-9]+)?", user_info, host);
    let scheme = r"(?!\s*javascript)\p{L}[\p{L}\p{N}+.\-]*";
    let fragment = format!("(?:{}|/|\\?)*", pchar);
    let query = fragment.clone();
    let segment_nz = format!("(?:{})+", pchar);
    let segment_nz_nc = format!("(?:{u}|{p}|{s}|@)+", u = unreserved, p = pct_encoded, s = SUB_DELIMS);
    let path_abempty = format!("(?:/|(?:/{}/?)*)", segment_nz);
    let path_absolute = format!("/(?:{}{})?", segment_nz, path_abempty);
    let path_noscheme = format!("{}(?:/|(?:/{})*)", segment_nz_nc, segment_nz);
    let path_rootless = format!("{}(?:/|(?:/{})*)", segment_nz, segment_nz);

    let relative_part = format!(
        "(?:(?://{a}{pa})|(?:{abs})|(?:{rl}))",
        a = authority,
        pa = path_abempty,
        abs = path_absolute,
        rl = path_rootless
    );
    // The empty path is the trailing empty alternative.
    let hier_part = format!(
        "(?:(?://{a}{pa})|(?:{abs})|(?:{ns})|)",
        a = authority,
        pa = path_abempty,
        abs = path_absolute,
        ns = path_noscheme
    );

    let relative_ref = format!(
        r"(?!\s*javascript(?::|&colon;)){rp}?(?:\?{q})?(?:#{f})?",
        rp = relative_part,
        q = query,
        f = fragment
    );
    let uri = format!(
        r"{s}:{h}(?:\?{q})?(?:#{f})?",
        s = scheme,
        h = hier_part,
        q = query,
        f = fragment
    );
    (relative_ref, uri)
}

fn builtin_rule(patterns: Vec<(&str, String)>) -> Result<AttributeRule, PolicyError> {
    let patterns = patterns
        .into_iter()
        .map(|(name, source)| PolicyPattern::new(name, &source))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(AttributeRule {
        name: "href".to_string(),
        on_invalid: OnInvalid::RemoveAttribute,
        literals: HashSet::new(),
        patterns,
        description: None,
    })
}

static DEFAULT_HREF_RULE: Lazy<Result<Arc<AttributeRule>, String>> = Lazy::new(|| {
    let (relative_ref, uri) = default_href_grammar();
    builtin_rule(vec![("relative-ref", relative_ref), ("uri", uri)])
        .map(Arc::new)
        .map_err(|e| e.to_string())
});

static FALLBACK_HREF_RULE: Lazy<Result<AttributeRule, String>> = Lazy::new(|| {
    builtin_rule(vec![
        ("on-site-simplified", ON_SITE_SIMPLIFIED.to_string()),
        ("off-site-simplified", OFF_SITE_SIMPLIFIED.to_string()),
    ])
    .map_err(|e| e.to_string())
});

/// The link rule used when a policy gives `<a>` no `href` attribute.
pub fn default_href_rule() -> Result<Arc<AttributeRule>, PolicyError> {
    DEFAULT_HREF_RULE
        .clone()
        .map_err(|message| PolicyError::PatternCompilation("default-href".to_string(), message))
}

/// How an href check concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HrefVerdict {
    Valid,
    /// Accepted by the built-in fallback after the primary rule gave up.
    ValidViaFallback,
    Invalid,
    /// Rejected by the fallback after the primary rule gave up.
    InvalidAfterFallback,
}

impl HrefVerdict {
    pub fn is_valid(self) -> bool {
        matches!(self, HrefVerdict::Valid | HrefVerdict::ValidViaFallback)
    }

    pub fn used_fallback(self) -> bool {
        matches!(self, HrefVerdict::ValidViaFallback | HrefVerdict::InvalidAfterFallback)
    }
}

/// Matches `value` against `rule`, consulting the fallback rule on exhaustion.
///
/// Shared by the standalone validator (which lower-cases first) and the tag
/// engine (which passes the raw attribute value).
pub fn check_href_rule(rule: &AttributeRule, value: &str) -> HrefVerdict {
    match rule.evaluate(value) {
        MatchOutcome::Matched => HrefVerdict::Valid,
        MatchOutcome::NoMatch => HrefVerdict::Invalid,
        MatchOutcome::Exhausted => {
            debug!(
                target: "markguard_core::href",
                "Primary href rule gave up on {}; trying fallback.",
                loggable(value)
            );
            let fallback = match FALLBACK_HREF_RULE.as_ref() {
                Ok(rule) => rule,
                Err(message) => {
                    error!("Built-in fallback href rule is unavailable: {}", message);
                    return HrefVerdict::InvalidAfterFallback;
                }
            };
            match fallback.evaluate(value) {
                MatchOutcome::Matched => HrefVerdict::ValidViaFallback,
                MatchOutcome::NoMatch | MatchOutcome::Exhausted => HrefVerdict::InvalidAfterFallback,
            }
        }
    }
}

/// Standalone pre-flight check for link values.
#[derive(Clone)]
pub struct HrefValidator {
    rule: Arc<AttributeRule>,
    sink: Arc<dyn InvalidHrefSink>,
}

impl HrefValidator {
    pub fn new(rule: Arc<AttributeRule>, sink: Arc<dyn InvalidHrefSink>) -> Self {
        Self { rule, sink }
    }

    pub fn is_valid_href(&self, url: &str) -> bool {
        self.evaluate(url).is_valid()
    }

    /// Runs the full decode-then-match pipeline.
    pub fn evaluate(&self, url: &str) -> HrefVerdict {
        if url.is_empty() {
            return HrefVerdict::Valid;
        }

        let Some(decoded) = percent_decode_strict(url) else {
            warn!("Unable to validate url: malformed percent-encoding.");
            debug!(target: "markguard_core::href", "URL input: {}", loggable(url));
            self.sink.record_invalid_href(url);
            return HrefVerdict::Invalid;
        };

        let (Ok(numeric), Ok(named)) = (NUMERIC_REFERENCE.as_ref(), NAMED_REFERENCE.as_ref()) else {
            error!("Character reference decoders are unavailable; rejecting href.");
            self.sink.record_invalid_href(url);
            return HrefVerdict::Invalid;
        };

        // The percent-decoded form is only kept when it hid numeric references.
        // Named references are always decoded.
        let unescaped = replace_numeric_references(numeric, &decoded);
        let selected = if unescaped == decoded { Cow::Borrowed(url) } else { unescaped };
        let candidate = replace_named_references(named, &selected);

        let verdict = check_href_rule(&self.rule, &candidate.to_lowercase());
        if !verdict.is_valid() {
            debug!(target: "markguard_core::href", "Rejected href {}", loggable(url));
            self.sink.record_invalid_href(url);
        }
        verdict
    }
}

/// Decodes `%XX` escapes and `+`, refusing any `%` not followed by two hex digits.
pub fn percent_decode_strict(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !valid {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    let spaced = input.replace('+', " ");
    Some(percent_decode_str(&spaced).decode_utf8_lossy().into_owned())
}

static NUMERIC_REFERENCE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"&#(?:[xX]([0-9A-Fa-f]{1,8})|([0-9]{1,10}));"));

static NAMED_REFERENCE: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]{0,31});"));

/// Decodes `&#NN;` and `&#xHH;`. References to invalid code points stay as written.
pub fn decode_numeric_references(input: &str) -> Cow<'_, str> {
    match NUMERIC_REFERENCE.as_ref() {
        Ok(pattern) => replace_numeric_references(pattern, input),
        Err(e) => {
            error!("Numeric reference pattern failed to compile: {}", e);
            Cow::Borrowed(input)
        }
    }
}

/// Decodes named references such as `&amp;` or `&colon;`; unknown names stay.
pub fn decode_named_references(input: &str) -> Cow<'_, str> {
    match NAMED_REFERENCE.as_ref() {
        Ok(pattern) => replace_named_references(pattern, input),
        Err(e) => {
            error!("Named reference pattern failed to compile: {}", e);
            Cow::Borrowed(input)
        }
    }
}

fn replace_numeric_references<'a>(pattern: &Regex, input: &'a str) -> Cow<'a, str> {
    pattern.replace_all(input, |caps: &Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            (None, None) => None,
        };
        match code.and_then(char::from_u32) {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        }
    })
}

fn replace_named_references<'a>(pattern: &Regex, input: &'a str) -> Cow<'a, str> {
    pattern.replace_all(input, |caps: &Captures| {
        let key = format!("{};", &caps[1]);
        match NAMED_ENTITIES.get(key.as_str()) {
            Some(&(first, second)) if first != 0 => {
                let mut decoded = String::new();
                decoded.extend(char::from_u32(first));
                if second != 0 {
                    decoded.extend(char::from_u32(second));
                }
                decoded
            }
            _ => caps[0].to_string(),
        }
    })
}
