//! CLI configuration.
//!
//! TOML file describing the local store topology: where bytes and
//! record catalogs live, which stores exist and how they replicate.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding store data (bytes and record catalogs).
    pub data_dir: PathBuf,

    /// Base URL prepended to derived file URLs, when serving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Configured stores, primary first.
    #[serde(default, rename = "store")]
    pub stores: Vec<StoreConfig>,
}

/// One named store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store name, unique within the configuration.
    pub name: String,

    /// Bytes directory. Defaults to `<data_dir>/<name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Names of stores that receive replicas of finished files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copy_to: Vec<String>,

    /// Allowed file extensions; empty means no restriction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,

    /// Minimum accepted file size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,

    /// Maximum accepted file size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("skiff"),
            base_url: None,
            stores: vec![StoreConfig {
                name: "files".to_string(),
                path: None,
                copy_to: Vec::new(),
                extensions: Vec::new(),
                min_size: None,
                max_size: None,
            }],
        }
    }
}

impl Config {
    /// Default configuration file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skiff")
            .join("config.toml")
    }

    /// Load and parse a configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("cannot parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load the file at `path`, falling back to defaults when it is the
    /// default location and does not exist yet.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        Self::load_or_else(path, &Self::default_path())
    }

    fn load_or_else(path: &Path, default_path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else if path == default_path {
            Ok(Self::default())
        } else {
            bail!("config {} does not exist", path.display())
        }
    }

    /// Serialize and write the configuration.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("cannot serialize config")?;
        std::fs::write(path, text)
            .with_context(|| format!("cannot write config {}", path.display()))?;
        Ok(())
    }

    /// Sanity-check the store topology.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.stores.is_empty() {
            bail!("no stores configured");
        }
        let mut names = HashSet::new();
        for store in &self.stores {
            if store.name.is_empty() {
                bail!("store with empty name");
            }
            if !names.insert(store.name.as_str()) {
                bail!("duplicate store name: {}", store.name);
            }
        }
        for store in &self.stores {
            for target in &store.copy_to {
                if !names.contains(target.as_str()) {
                    bail!(
                        "store {} replicates to unknown store {}",
                        store.name,
                        target
                    );
                }
                if target == &store.name {
                    bail!("store {} replicates to itself", store.name);
                }
            }
        }
        Ok(())
    }

    /// Bytes directory for a store.
    pub fn store_path(&self, store: &StoreConfig) -> PathBuf {
        store
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(&store.name))
    }

    /// Catalog file for a store's records.
    pub fn catalog_path(&self, store: &StoreConfig) -> PathBuf {
        self.data_dir.join(format!("{}.records.json", store.name))
    }

    /// Find a store by name, or the first configured one.
    pub fn resolve_store(&self, name: Option<&str>) -> anyhow::Result<&StoreConfig> {
        match name {
            Some(name) => self
                .stores
                .iter()
                .find(|s| s.name == name)
                .with_context(|| format!("unknown store: {name}")),
            None => self.stores.first().context("no stores configured"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(name: &str) -> StoreConfig {
        StoreConfig {
            name: name.to_string(),
            path: None,
            copy_to: Vec::new(),
            extensions: Vec::new(),
            min_size: None,
            max_size: None,
        }
    }

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_duplicate_names_and_unknown_targets() {
        let mut config = Config::default();
        config.stores = vec![store("a"), store("a")];
        assert!(config.validate().is_err());

        let mut with_target = store("a");
        with_target.copy_to = vec!["missing".to_string()];
        config.stores = vec![with_target];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_self_replication() {
        let mut config = Config::default();
        let mut looped = store("a");
        looped.copy_to = vec!["a".to_string()];
        config.stores = vec![looped];
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        let mut primary = store("primary");
        primary.copy_to = vec!["backup".to_string()];
        let mut backup = store("backup");
        backup.extensions = vec!["png".to_string()];
        backup.max_size = Some(1024);
        config.stores = vec![primary, backup];
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        loaded.validate().unwrap();
        assert_eq!(loaded.stores.len(), 2);
        assert_eq!(loaded.stores[0].copy_to, vec!["backup"]);
        assert_eq!(loaded.stores[1].max_size, Some(1024));
    }

    #[test]
    fn missing_default_location_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config::load_or_else(&path, &path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.stores[0].name, "files");
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("elsewhere.toml");
        let default = dir.path().join("config.toml");
        assert!(Config::load_or_else(&path, &default).is_err());
    }

    #[test]
    fn store_paths_default_under_data_dir() {
        let config = Config::default();
        let first = &config.stores[0];
        assert_eq!(config.store_path(first), config.data_dir.join("files"));
        assert_eq!(
            config.catalog_path(first),
            config.data_dir.join("files.records.json")
        );
    }
}
