//! Contract registry: name → build artifact
//!
//! The registry answers `require("SimpleStorage")` the way a build tool's
//! artifact loader would, from built-in artifacts or a directory of JSON.

use super::artifact::ContractArtifact;
use crate::error::{HarnessError, HarnessResult};
use crate::tier1_component::runtime::simple_storage;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

#[derive(Default)]
pub struct ContractRegistry {
    artifacts: RwLock<IndexMap<String, Arc<ContractArtifact>>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry containing the built-in SimpleStorage artifact
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register(simple_storage_artifact());
        registry
    }

    /// Add or replace an artifact under its contract name
    pub fn register(&self, artifact: ContractArtifact) {
        let name = artifact.contract_name.clone();
        if self
            .artifacts
            .write()
            .insert(name.clone(), Arc::new(artifact))
            .is_some()
        {
            log::debug!("Replaced contract artifact {}", name);
        }
    }

    /// Look up an artifact by contract name
    pub fn require(&self, name: &str) -> HarnessResult<Arc<ContractArtifact>> {
        self.artifacts
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| HarnessError::ArtifactNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.artifacts.read().keys().cloned().collect()
    }

    /// Register every `*.json` artifact in `dir`, returning how many were loaded
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read artifacts directory {}", dir.display()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            let artifact = ContractArtifact::load(path)?;
            if log::log_enabled!(log::Level::Debug) {
                log::debug!(
                    "Loaded contract artifact {} from {}",
                    artifact.contract_name,
                    path.display()
                );
            }
            self.register(artifact);
        }

        Ok(paths.len())
    }
}

/// Build artifact of the built-in SimpleStorage contract
pub fn simple_storage_artifact() -> ContractArtifact {
    ContractArtifact::new(
        simple_storage::NAME,
        simple_storage::abi(),
        simple_storage::bytecode().to_vec(),
    )
}
