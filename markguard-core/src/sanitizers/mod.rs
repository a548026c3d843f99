//! Policy compilation for markguard.
//!
//! `compiler` resolves a [`crate::model::PolicyModel`] into the lookup tables the
//! engines read; `generation` keeps the active compiled policy and swaps in new ones.

pub mod compiler;
pub mod generation;
