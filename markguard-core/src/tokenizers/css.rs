// markguard-core/src/tokenizers/css.rs
//! CSS event source built on `cssparser`.
//!
//! Walks a stylesheet (or a bare declaration list) and reports selectors,
//! declarations and at-rules to a [`CssDocumentHandler`]. Values are lowered to
//! [`Term`]s; anything the term vocabulary cannot express becomes
//! [`Term::Unsupported`]. Bad strings and bad URLs abort the whole unit with a
//! [`CssSyntaxError`].

use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};
use thiserror::Error;

use crate::events::{
    Combinator, ComplexSelector, CompoundSelector, CssDocumentHandler, SelectorComponent, Term,
};

type CssResult<'i, T> = Result<T, ParseError<'i, ()>>;

/// A tokenizer fault. The whole unit being parsed must be discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("CSS syntax error at line {line}, column {column}")]
pub struct CssSyntaxError {
    pub line: u32,
    pub column: u32,
}

impl<'i> From<ParseError<'i, ()>> for CssSyntaxError {
    fn from(e: ParseError<'i, ()>) -> Self {
        CssSyntaxError { line: e.location.line, column: e.location.column }
    }
}

/// Parses a full stylesheet.
pub fn parse_stylesheet<H: CssDocumentHandler + ?Sized>(css: &str, handler: &mut H) -> Result<(), CssSyntaxError> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    handler.start_document();
    parse_rules(&mut parser, handler)?;
    handler.end_document();
    Ok(())
}

/// Parses the content of a `style` attribute.
pub fn parse_declaration_list<H: CssDocumentHandler + ?Sized>(
    css: &str,
    handler: &mut H,
) -> Result<(), CssSyntaxError> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    parse_declarations(&mut parser, handler, true)?;
    Ok(())
}

fn fault<'i, T>(parser: &Parser<'i, '_>) -> CssResult<'i, T> {
    Err(parser.new_custom_error(()))
}

fn consume_rest<'i>(parser: &mut Parser<'i, '_>) -> CssResult<'i, String> {
    let start = parser.position();
    loop {
        match parser.next_including_whitespace_and_comments() {
            Ok(Token::BadUrl(_)) | Ok(Token::BadString(_)) => return fault(parser),
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Ok(parser.slice_from(start).trim().to_string())
}

/// Consumes the block just opened and returns its source text.
fn consume_block<'i>(parser: &mut Parser<'i, '_>) -> CssResult<'i, String> {
    parser.parse_nested_block(|p| consume_rest(p))
}

fn parse_rules<'i, H: CssDocumentHandler + ?Sized>(parser: &mut Parser<'i, '_>, handler: &mut H) -> CssResult<'i, ()> {
    loop {
        let state = parser.state();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };
        match token {
            Token::WhiteSpace(_)
            | Token::CDO
            | Token::CDC
            | Token::Semicolon
            | Token::CloseCurlyBracket
            | Token::CloseParenthesis
            | Token::CloseSquareBracket => {}
            Token::Comment(text) => handler.comment(text),
            Token::BadUrl(_) | Token::BadString(_) => return fault(parser),
            Token::AtKeyword(name) => parse_at_rule(&name, parser, handler)?,
            _ => {
                parser.reset(&state);
                parse_qualified_rule(parser, handler)?;
            }
        }
    }
}

fn parse_at_rule<'i, H: CssDocumentHandler + ?Sized>(
    name: &str,
    parser: &mut Parser<'i, '_>,
    handler: &mut H,
) -> CssResult<'i, ()> {
    let prelude = parser.parse_until_before(Delimiter::CurlyBracketBlock | Delimiter::Semicolon, |p| consume_rest(p))?;
    let has_block = matches!(parser.next(), Ok(Token::CurlyBracketBlock));
    let name = name.to_ascii_lowercase();
    match (name.as_str(), has_block) {
        ("media", true) => {
            handler.start_media(&prelude);
            parser.parse_nested_block(|p| parse_rules(p, handler))?;
            handler.end_media(&prelude);
        }
        ("page", true) => {
            handler.start_page(&prelude);
            consume_block(parser)?;
            handler.end_page(&prelude);
        }
        ("font-face", true) => {
            handler.start_font_face();
            consume_block(parser)?;
            handler.end_font_face();
        }
        ("import", false) => handler.import_style(&prelude),
        ("namespace", false) => handler.namespace_declaration(&prelude),
        (_, true) => {
            consume_block(parser)?;
            handler.ignorable_at_rule(&name);
        }
        (_, false) => handler.ignorable_at_rule(&name),
    }
    Ok(())
}

fn parse_qualified_rule<'i, H: CssDocumentHandler + ?Sized>(
    parser: &mut Parser<'i, '_>,
    handler: &mut H,
) -> CssResult<'i, ()> {
    let selectors = parser.parse_until_before(Delimiter::CurlyBracketBlock, |p| parse_selector_list(p))?;
    if !matches!(parser.next(), Ok(Token::CurlyBracketBlock)) {
        // Prelude ran to the end of input without a block.
        return Ok(());
    }
    handler.start_selector(&selectors);
    parser.parse_nested_block(|p| parse_declarations(p, handler, false))?;
    handler.end_selector(&selectors);
    Ok(())
}

#[derive(Default)]
struct SelectorListBuilder {
    selectors: Vec<ComplexSelector>,
    parts: Vec<(Combinator, CompoundSelector)>,
    current: Option<CompoundSelector>,
    next_combinator: Option<Combinator>,
}

impl SelectorListBuilder {
    fn compound(&mut self) -> &mut CompoundSelector {
        self.current.get_or_insert_with(CompoundSelector::default)
    }

    fn push_component(&mut self, component: SelectorComponent) {
        self.compound().components.push(component);
    }

    fn close_compound(&mut self) {
        if let Some(compound) = self.current.take() {
            let combinator = self.next_combinator.take().unwrap_or(Combinator::Descendant);
            self.parts.push((combinator, compound));
        }
    }

    fn combinator(&mut self, combinator: Combinator) {
        self.close_compound();
        self.next_combinator = Some(combinator);
    }

    fn close_selector(&mut self) {
        self.close_compound();
        self.next_combinator = None;
        let mut parts = std::mem::take(&mut self.parts).into_iter();
        if let Some((_, head)) = parts.next() {
            self.selectors.push(ComplexSelector { head, tail: parts.collect() });
        }
    }
}

fn parse_selector_list<'i>(parser: &mut Parser<'i, '_>) -> CssResult<'i, Vec<ComplexSelector>> {
    let mut builder = SelectorListBuilder::default();
    loop {
        let token = match parser.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::WhiteSpace(_) => builder.close_compound(),
            Token::Comma => builder.close_selector(),
            Token::Delim('>') => builder.combinator(Combinator::Child),
            Token::Delim('+') => builder.combinator(Combinator::NextSibling),
            Token::Delim('~') => builder.combinator(Combinator::SubsequentSibling),
            Token::Delim('*') if builder.current.is_none() => builder.compound().element = Some("*".to_string()),
            Token::Ident(name) if builder.current.is_none() => builder.compound().element = Some(name.to_string()),
            Token::Delim('.') => {
                let component = match parser.next_including_whitespace() {
                    Ok(Token::Ident(class)) => SelectorComponent::Class(class.to_string()),
                    _ => SelectorComponent::Unsupported(".".to_string()),
                };
                builder.push_component(component);
            }
            Token::IDHash(id) | Token::Hash(id) => builder.push_component(SelectorComponent::Id(id.to_string())),
            Token::Colon => {
                let component = parse_pseudo(parser)?;
                builder.push_component(component);
            }
            Token::SquareBracketBlock => {
                let raw = consume_block(parser)?;
                builder.push_component(SelectorComponent::Attribute(raw));
            }
            Token::Function(name) => {
                let raw = consume_block(parser)?;
                builder.push_component(SelectorComponent::Unsupported(format!("{}({})", name, raw)));
            }
            Token::ParenthesisBlock | Token::CurlyBracketBlock => {
                consume_block(parser)?;
                builder.push_component(SelectorComponent::Unsupported("block".to_string()));
            }
            Token::BadUrl(_) | Token::BadString(_) => return fault(parser),
            other => builder.push_component(SelectorComponent::Unsupported(format!("{:?}", other))),
        }
    }
    builder.close_selector();
    Ok(builder.selectors)
}

fn parse_pseudo<'i>(parser: &mut Parser<'i, '_>) -> CssResult<'i, SelectorComponent> {
    let token = match parser.next_including_whitespace() {
        Ok(token) => token.clone(),
        Err(_) => return Ok(SelectorComponent::Unsupported(":".to_string())),
    };
    let component = match token {
        Token::Ident(name) => SelectorComponent::PseudoClass(name.to_string()),
        Token::Colon => match parser.next_including_whitespace() {
            Ok(Token::Ident(name)) => SelectorComponent::PseudoElement(name.to_string()),
            _ => SelectorComponent::Unsupported("::".to_string()),
        },
        Token::Function(name) if name.eq_ignore_ascii_case("not") => {
            let inner = parser.parse_nested_block(|p| parse_selector_list(p))?;
            SelectorComponent::Negation(inner)
        }
        Token::Function(name) => {
            let raw = consume_block(parser)?;
            SelectorComponent::Unsupported(format!(":{}({})", name, raw))
        }
        Token::BadUrl(_) | Token::BadString(_) => return fault(parser),
        other => SelectorComponent::Unsupported(format!(":{:?}", other)),
    };
    Ok(component)
}

fn parse_declarations<'i, H: CssDocumentHandler + ?Sized>(
    parser: &mut Parser<'i, '_>,
    handler: &mut H,
    inline: bool,
) -> CssResult<'i, ()> {
    loop {
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };
        match token {
            Token::WhiteSpace(_) | Token::Semicolon => {}
            Token::Comment(text) => {
                if !inline {
                    handler.comment(text);
                }
            }
            Token::BadUrl(_) | Token::BadString(_) => return fault(parser),
            Token::Ident(name) => {
                let before_colon = parser.state();
                if parser.expect_colon().is_err() {
                    parser.reset(&before_colon);
                    parser.parse_until_after(Delimiter::Semicolon, |p| consume_rest(p))?;
                    continue;
                }
                let (terms, important) = parser.parse_until_after(Delimiter::Semicolon, |p| parse_value(p))?;
                handler.property(&name, &terms, important);
            }
            _ => {
                parser.parse_until_after(Delimiter::Semicolon, |p| consume_rest(p))?;
            }
        }
    }
}

fn parse_value<'i>(parser: &mut Parser<'i, '_>) -> CssResult<'i, (Vec<Term>, bool)> {
    let mut terms = Vec::new();
    let mut important = false;
    loop {
        let token = match parser.next() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        let term = match token {
            Token::Delim('!') => match parser.next() {
                Ok(Token::Ident(word)) if word.eq_ignore_ascii_case("important") => {
                    important = true;
                    continue;
                }
                _ => Term::Unsupported("!".to_string()),
            },
            Token::Ident(word) if word.eq_ignore_ascii_case("inherit") => Term::Inherit,
            Token::Ident(word) => Term::Ident(word.to_string()),
            Token::QuotedString(text) => Term::String(text.to_string()),
            Token::UnquotedUrl(url) => Term::Url(url.to_string()),
            Token::Number { int_value: Some(i), .. } => Term::Integer(i),
            Token::Number { value, .. } => Term::Number(value),
            Token::Percentage { unit_value, .. } => Term::Dimension { value: unit_value * 100.0, unit: "%".to_string() },
            Token::Dimension { value, unit, .. } => Term::Dimension { value, unit: unit.to_string() },
            Token::Hash(hex) | Token::IDHash(hex) => match parse_hex_color(&hex) {
                Some((r, g, b)) => Term::Rgb(r, g, b),
                None => Term::Unsupported(format!("hash {}", hex)),
            },
            Token::Comma => Term::Comma,
            Token::Function(name) if name.eq_ignore_ascii_case("url") => {
                parser.parse_nested_block(|p| parse_url_argument(p))?
            }
            Token::Function(name) if name.eq_ignore_ascii_case("rgb") => {
                parser.parse_nested_block(|p| parse_rgb_arguments(p))?
            }
            Token::Function(name) => {
                consume_block(parser)?;
                Term::Unsupported(format!("function {}", name))
            }
            Token::ParenthesisBlock | Token::SquareBracketBlock | Token::CurlyBracketBlock => {
                consume_block(parser)?;
                Term::Unsupported("block".to_string())
            }
            Token::BadUrl(_) | Token::BadString(_) => return fault(parser),
            other => Term::Unsupported(format!("{:?}", other)),
        };
        terms.push(term);
    }
    Ok((terms, important))
}

fn parse_url_argument<'i>(parser: &mut Parser<'i, '_>) -> CssResult<'i, Term> {
    let term = match parser.next() {
        Ok(Token::QuotedString(url)) => Term::Url(url.to_string()),
        Ok(Token::BadString(_)) => return fault(parser),
        _ => Term::Unsupported("function url".to_string()),
    };
    consume_rest(parser)?;
    Ok(term)
}

fn parse_rgb_arguments<'i>(parser: &mut Parser<'i, '_>) -> CssResult<'i, Term> {
    let mut channels = Vec::new();
    let mut well_formed = true;
    loop {
        match parser.next() {
            Ok(Token::Number { int_value: Some(i), .. }) => channels.push(*i),
            Ok(Token::Comma) => {}
            Ok(Token::BadUrl(_)) | Ok(Token::BadString(_)) => return fault(parser),
            Ok(_) => well_formed = false,
            Err(_) => break,
        }
    }
    Ok(match channels.as_slice() {
        [r, g, b] if well_formed => Term::Rgb(*r, *g, *b),
        _ => Term::Unsupported("function rgb".to_string()),
    })
}

fn parse_hex_color(hex: &str) -> Option<(i32, i32, i32)> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| i32::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut digits = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as i32));
            Some((digits.next()??, digits.next()??, digits.next()??))
        }
        6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        _ => None,
    }
}
