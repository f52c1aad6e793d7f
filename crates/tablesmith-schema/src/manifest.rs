use std::path::Path;

use serde::{Deserialize, Serialize};
use tablesmith_common::{Error, Result};
use tracing::debug;

use crate::descriptor::SchemaDescriptor;

/// A table definition as written in a TOML or YAML file.
///
/// ```toml
/// table = "notes"
/// engine = "InnoDB"
/// version = "1.0.0"
/// primary = "id"
///
/// [[columns]]
/// name = "id"
/// definition = "BIGINT UNSIGNED NOT NULL AUTO_INCREMENT"
///
/// [[indexes]]
/// name = "user_id_idx"
/// columns = ["user_id"]
///
/// [[foreign_keys]]
/// column = "user_id"
/// references_table = "users"
/// references_column = "ID"
/// on_delete = "CASCADE"
/// ```
///
/// Values are kept as plain strings and only checked when the manifest is
/// replayed through the descriptor builder, so a file gets exactly the same
/// validation as code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableManifest {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnEntry>,
    #[serde(default)]
    pub indexes: Vec<IndexEntry>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnEntry {
    pub name: String,
    #[serde(default)]
    pub definition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyEntry {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
    #[serde(default = "default_on_delete")]
    pub on_delete: String,
    #[serde(default = "default_on_update")]
    pub on_update: String,
}

fn default_on_delete() -> String {
    "CASCADE".to_string()
}

fn default_on_update() -> String {
    "RESTRICT".to_string()
}

impl TableManifest {
    /// Read a manifest, choosing the format from the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        debug!("loading table manifest from {}", path.display());

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yml" | "yaml" => Self::from_yaml_str(&contents),
            "toml" => Self::from_toml_str(&contents),
            other => Err(Error::Manifest(format!(
                "unsupported manifest extension: {other:?}"
            ))),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Manifest(format!("TOML parse error: {e}")))
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| Error::Manifest(format!("YAML parse error: {e}")))
    }

    /// Replay the manifest through the builder for `<prefix><table>`.
    pub fn to_descriptor(&self, prefix: &str) -> Result<SchemaDescriptor> {
        let mut descriptor = SchemaDescriptor::with_prefix(prefix, &self.table)?;

        for column in &self.columns {
            descriptor.add_column(&column.name, &column.definition)?;
        }
        if let Some(primary) = &self.primary {
            descriptor.add_primary(primary)?;
        }
        for index in &self.indexes {
            descriptor.add_index(&index.name, &index.columns)?;
        }
        for fk in &self.foreign_keys {
            descriptor.add_foreign_key_with(
                &fk.column,
                &fk.references_table,
                &fk.references_column,
                &fk.on_delete,
                &fk.on_update,
            )?;
        }
        if let Some(engine) = &self.engine {
            descriptor.set_engine(engine)?;
        }
        if let Some(version) = &self.version {
            descriptor.set_version(version)?;
        }

        Ok(descriptor)
    }
}
