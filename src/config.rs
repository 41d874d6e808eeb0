use anyhow::{Context, Result};
use dsckit::{EngineConfig, FailurePolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// Config file name inside the config directory.
pub const CONFIG_FILE: &str = "dscrun.toml";

/// Settings for `apply`, `test` and `get` runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    pub policy: FailurePolicy,
}

/// Contents of `dscrun.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DscrunConfig {
    pub engine: EngineConfig,
    pub apply: ApplyConfig,
}

/// A config together with the file it came from, if any.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: DscrunConfig,
    pub source: Option<PathBuf>,
}

impl DscrunConfig {
    /// Load from the config directory, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<LoadedConfig> {
        let path = config_path()?;
        match Self::load_from(&path)? {
            Some(config) => Ok(LoadedConfig {
                config,
                source: Some(path),
            }),
            None => {
                log::debug!("No {} at {}, using defaults", CONFIG_FILE, path.display());
                Ok(LoadedConfig {
                    config: Self::default(),
                    source: None,
                })
            }
        }
    }

    /// Load a specific file. `Ok(None)` when it does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        Ok(Some(config))
    }

    /// Parse TOML text and expand `~` in the engine executable.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        if config.engine.executable.is_empty() {
            anyhow::bail!("engine.executable must not be empty");
        }
        config.engine.executable = paths::expand(&config.engine.executable)
            .to_string_lossy()
            .into_owned();
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Write to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        fs::write(path, self.to_toml()?)
            .with_context(|| format!("Could not write {}", path.display()))
    }
}

/// Path of `dscrun.toml` in the config directory.
pub fn config_path() -> Result<PathBuf> {
    Ok(paths::config_dir()?.join(CONFIG_FILE))
}
