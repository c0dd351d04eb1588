use std::path::Path;

use dochub_core::{Category, HierarchyNode, SuppliersByCategory};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid project file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Storage backend a project syncs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Bridge,
    Drive,
}

/// Project file handed to the CLI: identity, backend, root reference, the
/// serialized hierarchy and the data placeholders expand over.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub project_id: String,
    pub provider: Provider,
    pub root: String,
    #[serde(default = "dochub_core::default_hierarchy")]
    pub hierarchy: Vec<HierarchyNode>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub suppliers: SuppliersByCategory,
}

impl ProjectConfig {
    /// Reads a project file and normalizes the hierarchy in place, so
    /// depth clamping happens once at the boundary.
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw)?;
        dochub_core::normalize(&mut config.hierarchy);
        Ok(config)
    }
}
