use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration, read from `config.toml` or `config.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub versions: VersionStoreConfig,
    pub log: LogConfig,
}

/// Naming and table options shared by every table the host owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub table_prefix: String,
    pub charset: String,
    pub collate: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            charset: "utf8mb4".to_string(),
            collate: "utf8mb4_unicode_ci".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// The table-options suffix appended to `CREATE TABLE`.
    ///
    /// Empty when neither a charset nor a collation is configured.
    pub fn charset_collate(&self) -> String {
        let mut parts = Vec::new();
        if !self.charset.is_empty() {
            parts.push(format!("DEFAULT CHARSET={}", self.charset));
        }
        if !self.collate.is_empty() {
            parts.push(format!("COLLATE={}", self.collate));
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionStoreConfig {
    /// SQLite file holding version markers. Defaults to
    /// `<config dir>/tablesmith/versions.db`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_render_utf8mb4_options() {
        let config = AppConfig::default();
        assert_eq!(
            config.database.charset_collate(),
            "DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"
        );
        assert_eq!(config.log.level, "info");
        assert!(config.versions.path.is_none());
    }

    #[test]
    fn empty_charset_and_collation_render_nothing() {
        let db = DatabaseConfig {
            charset: String::new(),
            collate: String::new(),
            ..Default::default()
        };
        assert_eq!(db.charset_collate(), "");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: AppConfig = serde_yaml::from_str("database:\n  table_prefix: wp_\n").unwrap();
        assert_eq!(config.database.table_prefix, "wp_");
        assert_eq!(config.database.charset, "utf8mb4");
        assert!(!config.log.json);
    }
}
