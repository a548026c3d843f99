//! Helpers shared by the commands.

pub mod policy_source;
