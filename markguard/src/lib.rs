// markguard/src/lib.rs
//! # Markguard CLI Application
//!
//! This crate provides the command-line interface for the markguard sanitizer.
//! The policy engine itself lives in `markguard-core`; this crate reads input,
//! resolves the policy from files and flags, and presents results.

pub mod cli;
pub mod commands;
pub mod logger;
pub mod ui;
pub mod utils;

pub use commands::dispatch;
