//! Adapters from third-party tokenizers to the event vocabulary in [`crate::events`].

pub mod css;
pub mod html;
