use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::TreeError;

/// How "expand all" treats nodes whose children were never fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandAllMode {
    /// Marks every present node expanded; unloaded nodes show empty.
    #[default]
    ExpandedOnly,

    /// Also issues a fetch for every unloaded expandable node.
    CascadeLoad,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default)]
    pub expand_all: ExpandAllMode,

    /// Make tables expandable, loading their columns into the tree.
    #[serde(default)]
    pub table_columns_in_tree: bool,

    /// Synthesize folders for object kinds a schema has none of.
    #[serde(default)]
    pub show_empty_folders: bool,
}

pub struct TreeConfigStore {
    path: PathBuf,
}

impl TreeConfigStore {
    /// Store at `<config dir>/dbtree/tree.json`. The directory is created on
    /// the first save.
    pub fn new() -> Result<Self, TreeError> {
        Self::default_path()
            .map(Self::at)
            .ok_or_else(|| TreeError::InvalidConfig("no platform config directory".into()))
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dbtree").join("tree.json"))
    }

    /// Uses an explicit file location.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the configuration.
    ///
    /// Returns defaults if the file doesn't exist or is corrupted.
    /// Corruption is logged but doesn't fail the load.
    pub fn load(&self) -> Result<TreeConfig, TreeError> {
        if !self.path.exists() {
            return Ok(TreeConfig::default());
        }

        let content = fs::read_to_string(&self.path).map_err(TreeError::IoError)?;

        match serde_json::from_str::<TreeConfig>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                log::warn!(
                    "Failed to parse tree config {} ({}), using defaults",
                    self.path.display(),
                    e
                );
                Ok(TreeConfig::default())
            }
        }
    }

    pub fn save(&self, config: &TreeConfig) -> Result<(), TreeError> {
        let content = serde_json::to_string_pretty(config)
            .map_err(|e| TreeError::InvalidConfig(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(TreeError::IoError)?;
        }

        fs::write(&self.path, content).map_err(TreeError::IoError)?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
