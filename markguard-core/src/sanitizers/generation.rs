//! generation.rs - Atomic replacement of compiled policy generations.
//!
//! Readers take an `Arc` snapshot and keep using it for the whole call; a reload
//! builds the next generation off to the side and swaps it in only once it has
//! compiled successfully.
//!
//! License: MIT OR APACHE 2.0

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

use crate::config::PolicyDocument;
use crate::errors::PolicyError;
use crate::model::PolicyModel;
use crate::sanitizers::compiler::{compile_policy, CompiledPolicy};

/// One compiled policy together with its generation number.
#[derive(Debug)]
pub struct PolicyGeneration {
    pub number: u64,
    pub policy: Arc<CompiledPolicy>,
}

/// Holder of the active policy generation (lock-free swappable).
#[derive(Debug)]
pub struct PolicyStore {
    current: ArcSwap<PolicyGeneration>,
}

impl PolicyStore {
    /// Compiles `model` as generation 1.
    pub fn new(model: &PolicyModel) -> Result<Self, PolicyError> {
        let compiled = compile_policy(model)?;
        Ok(Self {
            current: ArcSwap::from_pointee(PolicyGeneration { number: 1, policy: Arc::new(compiled) }),
        })
    }

    /// Builds a store from the embedded default policy.
    pub fn with_default_policy() -> Result<Self> {
        let document = PolicyDocument::load_default()?;
        let model = PolicyModel::from_document(&document).context("Default policy failed to build")?;
        Ok(Self::new(&model)?)
    }

    /// The active generation and its number, read together.
    #[inline]
    pub fn load(&self) -> Arc<PolicyGeneration> {
        self.current.load_full()
    }

    /// The active policy. Later installs do not affect the returned value.
    pub fn snapshot(&self) -> Arc<CompiledPolicy> {
        Arc::clone(&self.current.load().policy)
    }

    pub fn generation(&self) -> u64 {
        self.current.load().number
    }

    /// Compiles `model` and makes it the active generation.
    ///
    /// On error the previous generation stays active.
    pub fn install(&self, model: &PolicyModel) -> Result<u64, PolicyError> {
        let compiled = match compile_policy(model) {
            Ok(compiled) => Arc::new(compiled),
            Err(e) => {
                warn!("Policy update rejected, keeping generation {}: {}", self.generation(), e);
                return Err(e);
            }
        };
        // Concurrent installs each get their own number.
        let previous = self.current.rcu(|current| {
            Arc::new(PolicyGeneration { number: current.number + 1, policy: Arc::clone(&compiled) })
        });
        let generation = previous.number + 1;
        info!("Installed policy generation {}.", generation);
        Ok(generation)
    }

    /// Loads, builds and installs the policy at `path`.
    pub fn reload_from_file<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
        let path = path.as_ref();
        let document = PolicyDocument::load_from_file(path)?;
        let model = PolicyModel::from_document(&document)
            .with_context(|| format!("Policy {} failed to build", path.display()))?;
        let generation = self
            .install(&model)
            .with_context(|| format!("Policy {} failed to compile", path.display()))?;
        Ok(generation)
    }
}
