// markguard/src/utils/policy_source.rs
//! Resolves `--policy` / `--extend` into one policy document and reads input.

use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use markguard_core::config::{merge_policies, PolicyDocument};

use crate::cli::PolicyArgs;

/// The base policy (file or built-in) with the optional overlay applied.
pub fn load_policy(args: &PolicyArgs) -> Result<PolicyDocument> {
    let base = match &args.policy {
        Some(path) => PolicyDocument::load_from_file(path)?,
        None => PolicyDocument::load_default()?,
    };
    let overlay = args
        .extend
        .as_deref()
        .map(PolicyDocument::load_from_file)
        .transpose()?;
    if overlay.is_some() {
        debug!("Applying policy overlay.");
    }
    Ok(merge_policies(base, overlay))
}

/// Reads the whole input from `path`, or from stdin.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn overlay_replaces_named_entries() -> Result<()> {
        let mut overlay = NamedTempFile::new()?;
        writeln!(overlay, "tags:\n  - name: script\n    action: filter\n")?;
        let args = PolicyArgs { policy: None, extend: Some(overlay.path().to_path_buf()) };
        let document = load_policy(&args)?;
        let script = document.tags.iter().find(|t| t.name == "script").expect("script rule");
        assert_eq!(script.action, "filter");
        assert!(document.tags.iter().any(|t| t.name == "p"));
        Ok(())
    }

    #[test]
    fn missing_policy_file_is_an_error() {
        let args = PolicyArgs { policy: Some("/definitely/not/here.yaml".into()), extend: None };
        assert!(load_policy(&args).is_err());
    }
}
