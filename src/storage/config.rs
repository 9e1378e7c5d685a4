//! Current-context configuration
//!
//! Records which permissions system is the default for commands that do not
//! name one. Stored as `config.json` in the zed configuration directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::env::ReadEnv;
use crate::paths;

/// Name of the config file inside the config directory
pub const CONFIG_FILENAME: &str = "config.json";

/// Configuration storage errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config does not exist")]
    NotFound,

    #[error("Failed to determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// System name of the token used by default
    #[serde(default)]
    pub current_token: String,
}

/// Anything that can persist the current context.
pub trait ConfigStore {
    /// Fails with [`ConfigError::NotFound`] when no current context is set.
    fn get(&self) -> Result<Config, ConfigError>;
    fn put(&self, config: &Config) -> Result<(), ConfigError>;
}

impl<C: ConfigStore + ?Sized> ConfigStore for &C {
    fn get(&self) -> Result<Config, ConfigError> {
        (**self).get()
    }

    fn put(&self, config: &Config) -> Result<(), ConfigError> {
        (**self).put(config)
    }
}

/// JSON file config store
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    /// Store at the default location
    pub fn from_env<E: ReadEnv>(env: &E) -> Result<Self, ConfigError> {
        let dir = paths::config_dir(env).ok_or(ConfigError::NoConfigDir)?;
        Ok(Self {
            path: dir.join(CONFIG_FILENAME),
        })
    }

    /// Create store with custom path (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make `system` the current context
    pub fn set_current(&self, system: &str) -> Result<(), ConfigError> {
        self.put(&Config {
            current_token: system.to_string(),
        })
    }

    /// Read the file. A missing file yields `None`.
    fn load(&self) -> Result<Option<Config>, ConfigError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::Io(e)),
        };

        match serde_json::from_str::<Config>(&contents) {
            Ok(config) => Ok(Some(config)),
            Err(e) => {
                tracing::warn!("Config file corrupted: {:?}: {}", self.path, e);
                Err(ConfigError::Json(e))
            }
        }
    }

    /// Create a backup of the current config
    pub fn backup(&self) -> Result<PathBuf, ConfigError> {
        let backup_path = self.path.with_extension(format!(
            "json.backup.{}",
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        ));

        if self.path.exists() {
            fs::copy(&self.path, &backup_path)?;
        }

        Ok(backup_path)
    }
}

impl ConfigStore for FileConfigStore {
    fn get(&self) -> Result<Config, ConfigError> {
        match self.load()? {
            Some(config) if !config.current_token.is_empty() => Ok(config),
            _ => Err(ConfigError::NotFound),
        }
    }

    /// Replaces the file. A corrupt file is backed up before it is replaced.
    fn put(&self, config: &Config) -> Result<(), ConfigError> {
        if let Err(ConfigError::Json(_)) = self.load() {
            let backup_path = self.backup()?;
            tracing::warn!("Corrupted config backed up to {:?}", backup_path);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to temp file first, then rename (atomic write)
        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(config)?;

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;

        tracing::debug!("Current context set to {:?}", config.current_token);
        Ok(())
    }
}
