//! `markguard policy`: validation and export of policy files.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::process::ExitCode;

use markguard_core::{compile_policy, PolicyDocument, PolicyModel};

use crate::cli::PolicyCommand;
use crate::commands::success_msg;
use crate::ui::theme::ThemeMap;
use crate::utils::policy_source::load_policy;

pub fn run_policy(cmd: &PolicyCommand, theme: &ThemeMap, quiet: bool) -> Result<ExitCode> {
    match cmd {
        PolicyCommand::Validate { path } => {
            let document = PolicyDocument::load_from_file(path)?;
            let model = PolicyModel::from_document(&document)
                .with_context(|| format!("Policy {} failed to build", path.display()))?;
            let compiled = compile_policy(&model)
                .with_context(|| format!("Policy {} failed to compile", path.display()))?;
            if !quiet {
                success_msg(
                    format!(
                        "Policy {} is valid: {} elements, {} CSS properties, {} dynamic attribute prefix(es).",
                        path.display(),
                        compiled.elements.len(),
                        compiled.css.properties.len(),
                        compiled.dynamic_attributes.len()
                    ),
                    theme,
                );
            }
        }
        PolicyCommand::Show { policy } => {
            let document = load_policy(policy)?;
            let yaml = document.to_yaml_string().context("Failed to export policy")?;
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            writer.write_all(yaml.as_bytes())?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
