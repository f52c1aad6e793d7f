use std::path::{Path, PathBuf};

use tablesmith_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

pub const PREFIX_ENV: &str = "TABLESMITH_TABLE_PREFIX";
pub const LOG_ENV: &str = "TABLESMITH_LOG";

const CONFIG_FILES: [&str; 3] = ["config.toml", "config.yml", "config.yaml"];

pub struct ConfigLoader;

impl ConfigLoader {
    /// `<config dir>/tablesmith`, e.g. `~/.config/tablesmith` on Linux.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tablesmith")
    }

    /// The first existing config file in [`Self::config_dir`], if any.
    pub fn default_path() -> Option<PathBuf> {
        let dir = Self::config_dir();
        CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    pub fn default_versions_path() -> PathBuf {
        Self::config_dir().join("versions.db")
    }

    /// Load `path` (or the default location), then apply environment overrides.
    ///
    /// An explicit path must exist. Without one, a missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("no config file found, using defaults");
                    AppConfig::default()
                }
            },
        };
        Self::apply_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `TABLESMITH_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup(PREFIX_ENV) {
            config.database.table_prefix = prefix;
        }
        if let Some(level) = lookup(LOG_ENV).filter(|l| !l.is_empty()) {
            config.log.level = level;
        }
    }

    /// Where version markers live, honouring the configured path.
    pub fn versions_path(config: &AppConfig) -> PathBuf {
        config
            .versions
            .path
            .clone()
            .unwrap_or_else(Self::default_versions_path)
    }
}
