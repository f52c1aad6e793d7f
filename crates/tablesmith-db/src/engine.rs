//! Create-or-alter migration of a single table.
//!
//! [`MigrationEngine::create_or_update`] decides between three paths:
//!
//! - **create** when the table is absent: one `CREATE TABLE` with every column,
//!   key and foreign key;
//! - **alter** when the descriptor's version is newer than the recorded one:
//!   one `ALTER TABLE ... ADD` per missing column, index or foreign key;
//! - **repair** when the version is current but an earlier alter left indexes
//!   behind: retry just those indexes.
//!
//! Each path runs inside one transaction. Column and foreign-key failures roll
//! the whole call back; index failures are recorded as warnings and the call
//! carries on. Version and pending-index markers are written only after the
//! transaction commits.

use serde::Serialize;
use tablesmith_common::MigrationError;
use tablesmith_schema::{SchemaDescriptor, SchemaVersion, ddl};
use tracing::{debug, info, warn};

use crate::catalog::{self, LiveStructure};
use crate::client::SqlClient;
use crate::version_store::VersionStore;

/// Key under which the version marker of `table` is stored.
pub fn version_key(table: &str) -> String {
    format!("{table}_schema_version")
}

/// Key under which indexes still waiting for a retry are stored.
pub fn pending_indexes_key(table: &str) -> String {
    format!("{table}_pending_indexes")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationAction {
    Created,
    Altered,
    Repaired,
    Unchanged,
    Failed,
}

impl MigrationAction {
    fn changed_structure(self) -> bool {
        matches!(self, Self::Created | Self::Altered | Self::Repaired)
    }
}

/// Result of one `create_or_update` call.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    pub table: String,
    /// True when the call committed at least one structural change.
    pub applied: bool,
    pub action: MigrationAction,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// DDL statements that succeeded, in execution order. After a rollback
    /// they are listed but did not persist.
    pub statements: Vec<String>,
}

impl MigrationOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Default)]
struct RunLog {
    warnings: Vec<String>,
    statements: Vec<String>,
}

/// Marker writes a path asks for, applied once its transaction has committed.
#[derive(Debug, Default)]
struct MarkerWrites {
    version: Option<SchemaVersion>,
    pending_indexes: Option<Vec<String>>,
}

type PathResult = Result<(MigrationAction, MarkerWrites), MigrationError>;

/// Applies schema descriptors to a database through injected collaborators.
///
/// The engine holds exclusive borrows of its client and version store, so one
/// engine drives one connection at a time.
pub struct MigrationEngine<'a, C: SqlClient, S: VersionStore> {
    client: &'a mut C,
    store: &'a mut S,
    errors: Vec<String>,
}

impl<'a, C: SqlClient, S: VersionStore> MigrationEngine<'a, C, S> {
    pub fn new(client: &'a mut C, store: &'a mut S) -> Self {
        Self {
            client,
            store,
            errors: Vec::new(),
        }
    }

    /// Error messages recorded by the most recent call.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Bring the live table in line with `descriptor`.
    ///
    /// Never fails: operational problems are reported through
    /// [`MigrationOutcome::errors`] with `applied == false`.
    pub fn create_or_update(&mut self, descriptor: &SchemaDescriptor) -> MigrationOutcome {
        self.errors.clear();
        let table = descriptor.table_name().to_string();
        let mut log = RunLog::default();
        info!("migrating table {table}");

        let action = match self.run(descriptor, &mut log) {
            Ok(action) => action,
            Err(e) => {
                warn!("migration of {table} failed: {e}");
                // Rollback problems were recorded first; the cause leads.
                self.errors.insert(0, e.to_string());
                MigrationAction::Failed
            }
        };

        MigrationOutcome {
            table,
            applied: action.changed_structure(),
            action,
            errors: self.errors.clone(),
            warnings: log.warnings,
            statements: log.statements,
        }
    }

    fn run(
        &mut self,
        descriptor: &SchemaDescriptor,
        log: &mut RunLog,
    ) -> Result<MigrationAction, MigrationError> {
        let table = descriptor.table_name();
        let exists = catalog::table_exists(&mut *self.client, table)
            .map_err(|e| MigrationError::Catalog(e.to_string()))?;
        let current = self.current_version(table)?;

        let (action, markers) = if !exists {
            info!("creating table {table}");
            self.in_transaction(|engine| engine.create(descriptor, log))?
        } else {
            match descriptor.version() {
                Some(target) if target > current => {
                    info!("altering table {table} from {current} to {target}");
                    self.in_transaction(|engine| engine.alter(descriptor, log))?
                }
                _ => {
                    let pending = self.pending_indexes(table)?;
                    if pending.is_empty() {
                        debug!("table {table} is current at {current}");
                        return Ok(MigrationAction::Unchanged);
                    }
                    info!(
                        "retrying {} pending index(es) on {table}",
                        pending.len()
                    );
                    self.in_transaction(|engine| engine.repair(descriptor, &pending, log))?
                }
            }
        };

        // The structure is committed at this point; a marker failure is
        // reported without undoing the action.
        if let Err(e) = self.write_markers(table, markers) {
            warn!("schema of {table} committed but markers were not updated: {e}");
            self.errors.push(e.to_string());
        }
        Ok(action)
    }

    fn write_markers(&mut self, table: &str, markers: MarkerWrites) -> Result<(), MigrationError> {
        if let Some(names) = markers.pending_indexes {
            self.set_pending_indexes(table, &names)?;
        }
        if let Some(version) = markers.version {
            self.record_version(table, version)?;
        }
        Ok(())
    }

    fn in_transaction<F>(&mut self, body: F) -> PathResult
    where
        F: FnOnce(&mut Self) -> PathResult,
    {
        self.client
            .begin()
            .map_err(|e| MigrationError::Transaction(format!("begin failed: {e}")))?;

        let result = body(self).and_then(|outcome| {
            self.client
                .commit()
                .map(|_| outcome)
                .map_err(|e| MigrationError::Transaction(format!("commit failed: {e}")))
        });

        if result.is_err() {
            warn!("rolling back schema changes");
            if let Err(e) = self.client.rollback() {
                self.errors.push(format!("rollback failed: {e}"));
            }
        }
        result
    }

    fn create(&mut self, descriptor: &SchemaDescriptor, log: &mut RunLog) -> PathResult {
        let table = descriptor.table_name();
        let sql = ddl::create_table_sql(descriptor, self.client.charset_collate());

        self.client
            .execute(&sql)
            .map_err(|e| MigrationError::TableCreationFailed {
                table: table.to_string(),
                reason: e.to_string(),
            })?;
        debug!("{sql}");
        log.statements.push(sql);

        // A fresh table has every index; forget retries left by a dropped one.
        Ok((
            MigrationAction::Created,
            MarkerWrites {
                version: descriptor.version(),
                pending_indexes: Some(Vec::new()),
            },
        ))
    }

    fn alter(&mut self, descriptor: &SchemaDescriptor, log: &mut RunLog) -> PathResult {
        let table = descriptor.table_name();
        let live = LiveStructure::introspect(&mut *self.client, table)
            .map_err(|e| MigrationError::Catalog(e.to_string()))?;
        let mut altered = false;

        for column in descriptor.columns() {
            if live.has_column(&column.name) {
                continue;
            }
            let sql = ddl::add_column_sql(table, column);
            self.client
                .execute(&sql)
                .map_err(|e| MigrationError::ColumnAlterFailed {
                    table: table.to_string(),
                    column: column.name.clone(),
                    reason: e.to_string(),
                })?;
            debug!("{sql}");
            log.statements.push(sql);
            altered = true;
        }

        let mut failed_indexes = Vec::new();
        for index in descriptor.indexes() {
            if live.has_index(&index.name) {
                continue;
            }
            if self.try_add_index(table, index, log) {
                altered = true;
            } else {
                failed_indexes.push(index.name.clone());
            }
        }

        for fk in descriptor.foreign_keys() {
            if live.has_foreign_key(&fk.constraint_name) {
                continue;
            }
            let sql = ddl::add_foreign_key_sql(table, fk);
            self.client
                .execute(&sql)
                .map_err(|e| MigrationError::ForeignKeyAlterFailed {
                    table: table.to_string(),
                    constraint: fk.constraint_name.clone(),
                    reason: e.to_string(),
                })?;
            debug!("{sql}");
            log.statements.push(sql);
            altered = true;
        }

        let mut markers = MarkerWrites {
            version: None,
            pending_indexes: Some(failed_indexes),
        };
        if !altered {
            info!("table {table} already has every column, index and foreign key");
            return Ok((MigrationAction::Unchanged, markers));
        }
        markers.version = descriptor.version();
        Ok((MigrationAction::Altered, markers))
    }

    fn repair(
        &mut self,
        descriptor: &SchemaDescriptor,
        pending: &[String],
        log: &mut RunLog,
    ) -> PathResult {
        let table = descriptor.table_name();
        let live = LiveStructure::introspect(&mut *self.client, table)
            .map_err(|e| MigrationError::Catalog(e.to_string()))?;
        let mut repaired = false;
        let mut still_failing = Vec::new();

        let wanted = descriptor
            .indexes()
            .filter(|i| pending.iter().any(|p| p.eq_ignore_ascii_case(&i.name)));
        for index in wanted {
            if live.has_index(&index.name) {
                continue;
            }
            if self.try_add_index(table, index, log) {
                repaired = true;
            } else {
                still_failing.push(index.name.clone());
            }
        }

        let action = if repaired {
            MigrationAction::Repaired
        } else {
            MigrationAction::Unchanged
        };
        Ok((
            action,
            MarkerWrites {
                version: None,
                pending_indexes: Some(still_failing),
            },
        ))
    }

    /// Index additions are best-effort: a failure becomes a warning.
    fn try_add_index(
        &mut self,
        table: &str,
        index: &tablesmith_schema::IndexSpec,
        log: &mut RunLog,
    ) -> bool {
        let sql = ddl::add_index_sql(table, index);
        match self.client.execute(&sql) {
            Ok(_) => {
                debug!("{sql}");
                log.statements.push(sql);
                true
            }
            Err(e) => {
                let message = format!("failed to add index {} to {table}: {e}", index.name);
                warn!("{message}");
                log.warnings.push(message);
                false
            }
        }
    }

    fn current_version(&self, table: &str) -> Result<SchemaVersion, MigrationError> {
        let stored = self
            .store
            .get(&version_key(table))
            .map_err(|e| MigrationError::VersionStore(e.to_string()))?;

        Ok(match stored {
            None => SchemaVersion::ZERO,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("ignoring malformed schema version {raw:?} recorded for {table}");
                SchemaVersion::ZERO
            }),
        })
    }

    fn record_version(&mut self, table: &str, version: SchemaVersion) -> Result<(), MigrationError> {
        self.store
            .set(&version_key(table), &version.to_string())
            .map_err(|e| MigrationError::VersionStore(e.to_string()))?;
        info!("recorded schema version {version} for {table}");
        Ok(())
    }

    fn pending_indexes(&self, table: &str) -> Result<Vec<String>, MigrationError> {
        let raw = self
            .store
            .get(&pending_indexes_key(table))
            .map_err(|e| MigrationError::VersionStore(e.to_string()))?
            .unwrap_or_default();
        Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn set_pending_indexes(&mut self, table: &str, names: &[String]) -> Result<(), MigrationError> {
        if self.pending_indexes(table)? == names {
            return Ok(());
        }
        self.store
            .set(&pending_indexes_key(table), &names.join(","))
            .map_err(|e| MigrationError::VersionStore(e.to_string()))
    }
}
