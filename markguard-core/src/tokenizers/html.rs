// markguard-core/src/tokenizers/html.rs
//! HTML event source built on the `html5ever` tokenizer.
//!
//! Tokens are pushed into an [`HtmlEventSink`] as open/close/text events.
//! Consecutive character tokens are coalesced into one text event. Comments,
//! doctypes and NUL characters are not forwarded. The tokenizer already
//! lower-cases names, decodes character references and keeps only the first of
//! repeated attributes.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use log::trace;

use crate::events::{HtmlAttribute, HtmlEventSink};
use crate::render::is_void_element;

/// Feeds `html` through the tokenizer into `sink`.
pub fn tokenize_html<S: HtmlEventSink + ?Sized>(html: &str, sink: &mut S) {
    sink.open_document();
    let bridge = EventBridge { sink, text: String::new() };
    let mut tokenizer = Tokenizer::new(bridge, TokenizerOpts::default());
    let mut queue = BufferQueue::default();
    queue.push_back(StrTendril::from_slice(html));
    let _ = tokenizer.feed(&mut queue);
    tokenizer.end();
    tokenizer.sink.flush_text();
    tokenizer.sink.sink.close_document();
}

struct EventBridge<'a, S: HtmlEventSink + ?Sized> {
    sink: &'a mut S,
    text: String,
}

impl<S: HtmlEventSink + ?Sized> EventBridge<'_, S> {
    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.sink.text(&text);
        }
    }

    fn tag(&mut self, tag: Tag) -> TokenSinkResult<()> {
        self.flush_text();
        let name = tag.name.to_string();
        match tag.kind {
            TagKind::EndTag => {
                self.sink.close_tag(&name);
                TokenSinkResult::Continue
            }
            TagKind::StartTag => {
                let attributes = tag
                    .attrs
                    .into_iter()
                    .map(|attr| HtmlAttribute::new(attr.name.local.to_string(), attr.value.to_string()))
                    .collect();
                self.sink.open_tag(&name, attributes);
                if tag.self_closing && !is_void_element(&name) {
                    self.sink.close_tag(&name);
                    return TokenSinkResult::Continue;
                }
                content_model(&name)
            }
        }
    }
}

/// Tokenizer state switch for elements whose content is not markup.
fn content_model(name: &str) -> TokenSinkResult<()> {
    match name {
        "script" => TokenSinkResult::RawData(RawKind::ScriptData),
        "style" | "xmp" | "iframe" | "noembed" | "noframes" | "noscript" => {
            TokenSinkResult::RawData(RawKind::Rawtext)
        }
        "textarea" | "title" => TokenSinkResult::RawData(RawKind::Rcdata),
        "plaintext" => TokenSinkResult::Plaintext,
        _ => TokenSinkResult::Continue,
    }
}

impl<S: HtmlEventSink + ?Sized> TokenSink for EventBridge<'_, S> {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => return self.tag(tag),
            Token::CharacterTokens(text) => self.text.push_str(&text),
            Token::NullCharacterToken | Token::CommentToken(_) | Token::DoctypeToken(_) => {}
            Token::ParseError(message) => trace!(target: "markguard_core::html", "Tokenizer: {}", message),
            Token::EOFToken => self.flush_text(),
        }
        TokenSinkResult::Continue
    }

    fn end(&mut self) {
        self.flush_text();
    }
}
