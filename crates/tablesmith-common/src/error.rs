use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejections raised while building a schema descriptor.
///
/// These describe bad input to the builder API. The descriptor is left
/// untouched by the call that produced one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("forbidden syntax in definition of column {column}: {definition:?}")]
    ForbiddenSyntax { column: String, definition: String },

    #[error("unsupported storage engine: {0:?}")]
    UnsupportedEngine(String),

    #[error("invalid version format: {0:?} (expected x.y.z)")]
    InvalidVersionFormat(String),

    #[error("invalid referential action: {0:?}")]
    InvalidReferentialAction(String),

    #[error("index {0} must name at least one column")]
    EmptyIndexColumns(String),

    #[error("index name {0:?} is reserved for the primary key")]
    ReservedIndexName(String),
}

/// Operational failures while applying a descriptor to a live database.
///
/// Every variant aborts the running transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("failed to create table {table}: {reason}")]
    TableCreationFailed { table: String, reason: String },

    #[error("failed to add column {column} to {table}: {reason}")]
    ColumnAlterFailed {
        table: String,
        column: String,
        reason: String,
    },

    #[error("failed to add foreign key {constraint} to {table}: {reason}")]
    ForeignKeyAlterFailed {
        table: String,
        constraint: String,
        reason: String,
    },

    #[error("catalog query failed: {0}")]
    Catalog(String),

    #[error("version store failure: {0}")]
    VersionStore(String),

    #[error("transaction failure: {0}")]
    Transaction(String),
}

#[cfg(test)]
mod tests {
    use super::{Error, MigrationError, SchemaError};

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");

        let e = Error::Database("connection reset".into());
        assert_eq!(e.to_string(), "database error: connection reset");

        let e = Error::Manifest("unsupported manifest extension: \"ini\"".into());
        assert_eq!(
            e.to_string(),
            "manifest error: unsupported manifest extension: \"ini\""
        );
    }

    #[test]
    fn schema_errors_convert_and_keep_detail() {
        let e: Error = SchemaError::InvalidIdentifier("1abc".into()).into();
        assert_eq!(e.to_string(), "schema error: invalid identifier: \"1abc\"");

        let e = SchemaError::EmptyIndexColumns("by_user".into());
        assert_eq!(e.to_string(), "index by_user must name at least one column");
    }

    #[test]
    fn migration_errors_name_the_failing_object() {
        let e = MigrationError::ColumnAlterFailed {
            table: "wp_notes".into(),
            column: "content".into(),
            reason: "Duplicate column name".into(),
        };
        assert_eq!(
            e.to_string(),
            "failed to add column content to wp_notes: Duplicate column name"
        );

        let e: Error = MigrationError::Transaction("deadlock".into()).into();
        assert_eq!(
            e.to_string(),
            "migration error: transaction failure: deadlock"
        );
    }
}
