use std::fs;
use std::path::Path;

use arca_store::DiskKvConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ArchiveError, ArchiveResult};

/// File name of the archive configuration inside the archive root.
pub const CONFIG_FILE: &str = "arca.toml";

/// On-disk archive settings, read from `<root>/arca.toml`.
///
/// Every field has a default, so a missing file or a partial file is fine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Display name; the root directory's name when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Blob store directory, relative to the root.
    pub blob_dir: String,
    /// Metadata store directory, relative to the root.
    pub meta_dir: String,
    pub blobs: DiskKvConfig,
    pub metadata: DiskKvConfig,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            name: None,
            blob_dir: "blobstore".into(),
            meta_dir: "metastore".into(),
            blobs: DiskKvConfig::default(),
            metadata: DiskKvConfig::default(),
        }
    }
}

impl ArchiveConfig {
    /// Load `<root>/arca.toml`, falling back to defaults if it does not exist.
    pub fn load(root: &Path) -> ArchiveResult<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            debug!(root = %root.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> ArchiveResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ArchiveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ArchiveResult<String> {
        toml::to_string_pretty(self).map_err(|e| ArchiveError::Config(e.to_string()))
    }

    /// Write this configuration to `<root>/arca.toml`, creating `root` if needed.
    pub fn save(&self, root: &Path) -> ArchiveResult<()> {
        fs::create_dir_all(root)?;
        fs::write(root.join(CONFIG_FILE), self.to_toml_string()?)?;
        Ok(())
    }

    /// Store directories must be single, distinct, plain path components.
    pub fn validate(&self) -> ArchiveResult<()> {
        for (field, dir) in [("blob_dir", &self.blob_dir), ("meta_dir", &self.meta_dir)] {
            let plain = !dir.is_empty()
                && dir != "."
                && dir != ".."
                && !dir.contains(['/', '\\']);
            if !plain {
                return Err(ArchiveError::Config(format!(
                    "{field} must be a plain directory name, got {dir:?}"
                )));
            }
        }
        if self.blob_dir == self.meta_dir {
            return Err(ArchiveError::Config(
                "blob_dir and meta_dir must differ".into(),
            ));
        }
        Ok(())
    }
}
