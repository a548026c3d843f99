// markguard-core/src/engines/mod.rs
//! Sanitization engine implementations.
//!
//! Each engine lives in its own file and implements the `SanitizationEngine`
//! trait over one compiled policy generation: `html_engine` for markup,
//! `css_engine` for stylesheets and inline declarations.
//!
//! License: MIT OR APACHE 2.0

pub mod css_engine;
pub mod html_engine;
