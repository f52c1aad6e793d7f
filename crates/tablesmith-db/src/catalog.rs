//! Live-structure introspection through MySQL's catalog.
//!
//! Column and index names are compared case-insensitively, as MySQL does.
//! Foreign-key constraint names are compared exactly.

use std::collections::HashSet;

use tablesmith_common::Result;
use tablesmith_schema::ddl::quote;
use tracing::debug;

use crate::client::SqlClient;

pub const TABLE_EXISTS_SQL: &str = "SELECT TABLE_NAME FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

pub const FOREIGN_KEYS_SQL: &str = "SELECT DISTINCT CONSTRAINT_NAME \
     FROM information_schema.KEY_COLUMN_USAGE \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     AND REFERENCED_TABLE_NAME IS NOT NULL";

/// Whether `table` exists in the current schema (exact name match).
pub fn table_exists<C: SqlClient + ?Sized>(client: &mut C, table: &str) -> Result<bool> {
    let found = client.query_scalar(TABLE_EXISTS_SQL, &[table])?;
    Ok(found.as_deref() == Some(table))
}

pub fn column_names<C: SqlClient + ?Sized>(client: &mut C, table: &str) -> Result<Vec<String>> {
    let rows = client.query_rows(&format!("SHOW COLUMNS FROM {}", quote(table)), &[])?;
    Ok(rows
        .iter()
        .filter_map(|r| r.get("Field").map(str::to_string))
        .collect())
}

/// Index names of `table`. `SHOW INDEX` yields one row per indexed column, so
/// composite indexes are collapsed.
pub fn index_names<C: SqlClient + ?Sized>(client: &mut C, table: &str) -> Result<Vec<String>> {
    let rows = client.query_rows(&format!("SHOW INDEX FROM {}", quote(table)), &[])?;
    let mut names: Vec<String> = Vec::new();
    for name in rows.iter().filter_map(|r| r.get("Key_name")) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// Names of true foreign-key constraints on `table` in the current schema.
pub fn foreign_key_names<C: SqlClient + ?Sized>(
    client: &mut C,
    table: &str,
) -> Result<Vec<String>> {
    let rows = client.query_rows(FOREIGN_KEYS_SQL, &[table])?;
    Ok(rows
        .iter()
        .filter_map(|r| r.get("CONSTRAINT_NAME").map(str::to_string))
        .collect())
}

/// Snapshot of what a table currently has, by name only.
#[derive(Debug, Clone, Default)]
pub struct LiveStructure {
    columns: HashSet<String>,
    indexes: HashSet<String>,
    foreign_keys: HashSet<String>,
}

impl LiveStructure {
    pub fn introspect<C: SqlClient + ?Sized>(client: &mut C, table: &str) -> Result<Self> {
        let live = Self {
            columns: column_names(client, table)?
                .into_iter()
                .map(|c| c.to_ascii_lowercase())
                .collect(),
            indexes: index_names(client, table)?
                .into_iter()
                .map(|i| i.to_ascii_lowercase())
                .collect(),
            foreign_keys: foreign_key_names(client, table)?.into_iter().collect(),
        };
        debug!(
            "{table} has {} columns, {} indexes, {} foreign keys",
            live.columns.len(),
            live.indexes.len(),
            live.foreign_keys.len()
        );
        Ok(live)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(&name.to_ascii_lowercase())
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.contains(&name.to_ascii_lowercase())
    }

    pub fn has_foreign_key(&self, constraint: &str) -> bool {
        self.foreign_keys.contains(constraint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedClient;

    #[test]
    fn table_lookup_is_exact() {
        let mut client = SimulatedClient::new();
        client.add_table("wp_users", &["ID", "user_login"]);

        assert!(table_exists(&mut client, "wp_users").unwrap());
        assert!(!table_exists(&mut client, "wp_user").unwrap());
        assert!(!table_exists(&mut client, "wp%users").unwrap());
    }

    #[test]
    fn live_structure_matches_columns_and_indexes_case_insensitively() {
        let mut client = SimulatedClient::new();
        client.add_table("wp_users", &["ID"]);
        client
            .execute(
                "CREATE TABLE `wp_notes` (\n  `id` INT,\n  `user_id` INT,\n  PRIMARY KEY (`id`),\n  \
                 KEY `by_user` (`user_id`),\n  CONSTRAINT `fk_n` FOREIGN KEY (`user_id`) REFERENCES `wp_users` (`ID`) \
                 ON DELETE CASCADE ON UPDATE RESTRICT\n) ENGINE=InnoDB",
            )
            .unwrap();

        let live = LiveStructure::introspect(&mut client, "wp_notes").unwrap();
        assert!(live.has_column("ID"));
        assert!(live.has_column("user_id"));
        assert!(!live.has_column("content"));
        assert!(live.has_index("primary"));
        assert!(live.has_index("BY_USER"));
        assert!(live.has_foreign_key("fk_n"));
        assert!(!live.has_foreign_key("FK_N"));
    }

    #[test]
    fn foreign_key_lookup_binds_the_table_name() {
        let mut client = SimulatedClient::new();
        client.add_table("wp_users", &["ID"]);
        client.add_table("wp_notes", &["user_id"]);
        client
            .execute(
                "ALTER TABLE `wp_notes` ADD CONSTRAINT `fk_n` FOREIGN KEY (`user_id`) \
                 REFERENCES `wp_users` (`ID`) ON DELETE CASCADE ON UPDATE RESTRICT",
            )
            .unwrap();

        assert!(!FOREIGN_KEYS_SQL.contains("wp_notes"));
        assert_eq!(foreign_key_names(&mut client, "wp_notes").unwrap(), vec!["fk_n"]);
        assert!(foreign_key_names(&mut client, "wp_users").unwrap().is_empty());
        assert!(foreign_key_names(&mut client, "ghost").unwrap().is_empty());
    }

    #[test]
    fn introspecting_a_missing_table_fails() {
        let mut client = SimulatedClient::new();
        assert!(LiveStructure::introspect(&mut client, "ghost").is_err());
    }
}
