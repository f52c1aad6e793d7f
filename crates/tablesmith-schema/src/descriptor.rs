//! In-memory description of the table a migration should converge to.
//!
//! A [`SchemaDescriptor`] is filled through fluent builder calls, each of which
//! validates its input and leaves the descriptor untouched when it fails:
//!
//! ```
//! use tablesmith_schema::{ReferentialAction, SchemaDescriptor};
//!
//! # fn main() -> Result<(), tablesmith_common::SchemaError> {
//! let mut notes = SchemaDescriptor::with_prefix("wp_", "notes")?;
//! notes
//!     .add_column("id", "BIGINT UNSIGNED NOT NULL AUTO_INCREMENT")?
//!     .add_column("user_id", "BIGINT UNSIGNED NOT NULL")?
//!     .add_primary("id")?
//!     .add_index("user_id_idx", &["user_id"])?
//!     .add_foreign_key("user_id", "users", "ID", ReferentialAction::Cascade, ReferentialAction::Cascade)?
//!     .set_version("1.0.0")?;
//! assert_eq!(notes.table_name(), "wp_notes");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;

use ring::digest::{SHA256, digest};
use serde::{Deserialize, Serialize};
use tablesmith_common::SchemaError;

use crate::identifier::{IdentifierGuard, MAX_IDENTIFIER_LEN};
use crate::version::SchemaVersion;

/// Index name MySQL reports for the primary key.
pub const PRIMARY_INDEX: &str = "PRIMARY";

/// Hex digits of the reference hash appended to constraint names.
const CONSTRAINT_HASH_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub definition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<String>,
    pub kind: IndexKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReferentialAction {
    Restrict,
    Cascade,
    SetNull,
    NoAction,
    SetDefault,
}

impl ReferentialAction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::NoAction => "NO ACTION",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

impl FromStr for ReferentialAction {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "RESTRICT" => Ok(Self::Restrict),
            "CASCADE" => Ok(Self::Cascade),
            "SET NULL" => Ok(Self::SetNull),
            "NO ACTION" => Ok(Self::NoAction),
            "SET DEFAULT" => Ok(Self::SetDefault),
            _ => Err(SchemaError::InvalidReferentialAction(s.to_string())),
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl TryFrom<String> for ReferentialAction {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReferentialAction> for String {
    fn from(action: ReferentialAction) -> Self {
        action.as_sql().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeySpec {
    pub constraint_name: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

/// Storage engines a descriptor may request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Engine {
    #[default]
    InnoDb,
    MyIsam,
    Memory,
    Archive,
}

impl Engine {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::InnoDb => "InnoDB",
            Self::MyIsam => "MyISAM",
            Self::Memory => "MEMORY",
            Self::Archive => "ARCHIVE",
        }
    }
}

impl FromStr for Engine {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INNODB" => Ok(Self::InnoDb),
            "MYISAM" => Ok(Self::MyIsam),
            "MEMORY" => Ok(Self::Memory),
            "ARCHIVE" => Ok(Self::Archive),
            _ => Err(SchemaError::UnsupportedEngine(s.to_string())),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl TryFrom<String> for Engine {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Engine> for String {
    fn from(engine: Engine) -> Self {
        engine.as_sql().to_string()
    }
}

/// Derive the constraint name for a foreign key.
///
/// The name is `fk_<table>_<column>_<hash>`, where `<hash>` is the first eight
/// hex digits of SHA-256 over `<table>.<column>-><ref_table>.<ref_column>`.
/// The table/column segment is shortened when needed so the result never
/// exceeds 64 characters; the hash still covers the full names, so columns
/// sharing a long prefix keep distinct constraints.
pub fn constraint_name(table: &str, column: &str, ref_table: &str, ref_column: &str) -> String {
    let key = format!("{table}.{column}->{ref_table}.{ref_column}");
    let hash: String = digest(&SHA256, key.as_bytes())
        .as_ref()
        .iter()
        .take(CONSTRAINT_HASH_LEN / 2)
        .map(|b| format!("{b:02x}"))
        .collect();

    let mut stem = format!("fk_{table}_{column}");
    // Identifiers are ASCII, so truncating on a byte index is safe.
    stem.truncate(MAX_IDENTIFIER_LEN - CONSTRAINT_HASH_LEN - 1);
    format!("{stem}_{hash}")
}

/// Target definition of one table.
///
/// Clause order in generated statements is fixed: columns in declared order,
/// then the primary key, then secondary indexes in declared order, then
/// foreign keys in declared order.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    table_name: String,
    prefix: String,
    columns: Vec<ColumnSpec>,
    primary: Option<IndexSpec>,
    indexes: Vec<IndexSpec>,
    foreign_keys: Vec<ForeignKeySpec>,
    engine: Engine,
    version: Option<SchemaVersion>,
}

impl SchemaDescriptor {
    /// Describe the table `table_name` without a prefix.
    pub fn new(table_name: &str) -> Result<Self, SchemaError> {
        Self::with_prefix("", table_name)
    }

    /// Describe `<prefix><table_name>`. The prefix is also applied to tables
    /// referenced by foreign keys.
    pub fn with_prefix(prefix: &str, table_name: &str) -> Result<Self, SchemaError> {
        IdentifierGuard::check(table_name)?;
        let full = format!("{prefix}{table_name}");
        IdentifierGuard::check(&full)?;

        Ok(Self {
            table_name: full,
            prefix: prefix.to_string(),
            columns: Vec::new(),
            primary: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            engine: Engine::default(),
            version: None,
        })
    }

    /// Add a column, or replace the definition of an existing one in place.
    pub fn add_column(&mut self, name: &str, definition: &str) -> Result<&mut Self, SchemaError> {
        IdentifierGuard::check(name)?;
        IdentifierGuard::check_definition(name, definition)?;

        let spec = ColumnSpec {
            name: name.to_string(),
            definition: definition.trim().to_string(),
        };
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => *existing = spec,
            None => self.columns.push(spec),
        }
        Ok(self)
    }

    /// Set the single-column primary key, replacing any previous one.
    pub fn add_primary(&mut self, column: &str) -> Result<&mut Self, SchemaError> {
        IdentifierGuard::check(column)?;

        self.primary = Some(IndexSpec {
            name: PRIMARY_INDEX.to_string(),
            columns: vec![column.to_string()],
            kind: IndexKind::Primary,
        });
        Ok(self)
    }

    /// Add a secondary index over `columns`, replacing one with the same name.
    pub fn add_index<S: AsRef<str>>(
        &mut self,
        name: &str,
        columns: &[S],
    ) -> Result<&mut Self, SchemaError> {
        IdentifierGuard::check(name)?;
        if name.eq_ignore_ascii_case(PRIMARY_INDEX) {
            return Err(SchemaError::ReservedIndexName(name.to_string()));
        }
        if columns.is_empty() {
            return Err(SchemaError::EmptyIndexColumns(name.to_string()));
        }
        IdentifierGuard::check_all(columns)?;

        let spec = IndexSpec {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            kind: IndexKind::Secondary,
        };
        match self.indexes.iter_mut().find(|i| i.name == name) {
            Some(existing) => *existing = spec,
            None => self.indexes.push(spec),
        }
        Ok(self)
    }

    /// Add a foreign key from `column` to `<prefix><ref_table>.<ref_column>`.
    pub fn add_foreign_key(
        &mut self,
        column: &str,
        ref_table: &str,
        ref_column: &str,
        on_delete: ReferentialAction,
        on_update: ReferentialAction,
    ) -> Result<&mut Self, SchemaError> {
        IdentifierGuard::check(column)?;
        IdentifierGuard::check(ref_table)?;
        IdentifierGuard::check(ref_column)?;
        let ref_table = format!("{}{ref_table}", self.prefix);
        IdentifierGuard::check(&ref_table)?;

        let spec = ForeignKeySpec {
            constraint_name: constraint_name(&self.table_name, column, &ref_table, ref_column),
            column: column.to_string(),
            ref_table,
            ref_column: ref_column.to_string(),
            on_delete,
            on_update,
        };
        match self
            .foreign_keys
            .iter_mut()
            .find(|fk| fk.constraint_name == spec.constraint_name)
        {
            Some(existing) => *existing = spec,
            None => self.foreign_keys.push(spec),
        }
        Ok(self)
    }

    /// Like [`add_foreign_key`](Self::add_foreign_key) but with the actions
    /// given as SQL keywords, e.g. `"set null"`.
    pub fn add_foreign_key_with(
        &mut self,
        column: &str,
        ref_table: &str,
        ref_column: &str,
        on_delete: &str,
        on_update: &str,
    ) -> Result<&mut Self, SchemaError> {
        let on_delete = on_delete.parse()?;
        let on_update = on_update.parse()?;
        self.add_foreign_key(column, ref_table, ref_column, on_delete, on_update)
    }

    /// Foreign key with `ON DELETE CASCADE ON UPDATE RESTRICT`.
    pub fn add_foreign_key_default(
        &mut self,
        column: &str,
        ref_table: &str,
        ref_column: &str,
    ) -> Result<&mut Self, SchemaError> {
        self.add_foreign_key(
            column,
            ref_table,
            ref_column,
            ReferentialAction::Cascade,
            ReferentialAction::Restrict,
        )
    }

    pub fn set_engine(&mut self, engine: &str) -> Result<&mut Self, SchemaError> {
        self.engine = engine.parse()?;
        Ok(self)
    }

    pub fn set_version(&mut self, version: &str) -> Result<&mut Self, SchemaError> {
        self.version = Some(version.parse()?);
        Ok(self)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn primary_key(&self) -> Option<&IndexSpec> {
        self.primary.as_ref()
    }

    pub fn secondary_indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    /// Primary key first, then secondary indexes in declared order.
    pub fn indexes(&self) -> impl Iterator<Item = &IndexSpec> {
        self.primary.iter().chain(self.indexes.iter())
    }

    pub fn foreign_keys(&self) -> &[ForeignKeySpec] {
        &self.foreign_keys
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn version(&self) -> Option<SchemaVersion> {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> SchemaDescriptor {
        SchemaDescriptor::new("notes").unwrap()
    }

    #[test]
    fn columns_keep_first_seen_order_and_last_definition() {
        let mut d = descriptor();
        d.add_column("a", "INT")
            .unwrap()
            .add_column("b", "TEXT")
            .unwrap()
            .add_column("a", "BIGINT NOT NULL")
            .unwrap();

        let cols: Vec<_> = d
            .columns()
            .iter()
            .map(|c| (c.name.as_str(), c.definition.as_str()))
            .collect();
        assert_eq!(cols, vec![("a", "BIGINT NOT NULL"), ("b", "TEXT")]);
    }

    #[test]
    fn rejected_calls_leave_descriptor_unchanged() {
        let mut d = descriptor();
        d.add_column("a", "INT").unwrap();

        assert!(d.add_column("a", "INT; DROP TABLE x").is_err());
        assert!(d.add_column("2a", "INT").is_err());
        assert!(d.add_index("by_a", &["a", "b-c"]).is_err());
        assert!(d.set_engine("CSV").is_err());
        assert!(d.set_version("1.0").is_err());

        assert_eq!(d.columns().len(), 1);
        assert_eq!(d.columns()[0].definition, "INT");
        assert!(d.secondary_indexes().is_empty());
        assert_eq!(d.engine(), Engine::InnoDb);
        assert_eq!(d.version(), None);
    }

    #[test]
    fn invalid_identifiers_fail_every_builder() {
        let too_long = "x".repeat(65);
        let bad = ["", "1col", "has-dash", too_long.as_str()];
        for name in bad {
            let mut d = descriptor();
            let expected = SchemaError::InvalidIdentifier(name.to_string());
            assert_eq!(d.add_column(name, "INT").unwrap_err(), expected);
            assert_eq!(d.add_primary(name).unwrap_err(), expected);
            assert_eq!(d.add_index(name, &["a"]).unwrap_err(), expected);
            assert_eq!(d.add_index("idx", &[name]).unwrap_err(), expected);
            assert_eq!(d.add_foreign_key_default(name, "users", "ID").unwrap_err(), expected);
            assert_eq!(d.add_foreign_key_default("a", name, "ID").unwrap_err(), expected);
            assert_eq!(d.add_foreign_key_default("a", "users", name).unwrap_err(), expected);
            assert_eq!(SchemaDescriptor::new(name).unwrap_err(), expected);
        }
    }

    #[test]
    fn primary_key_is_replaced_not_duplicated() {
        let mut d = descriptor();
        d.add_primary("id").unwrap().add_primary("uuid").unwrap();

        let pk = d.primary_key().unwrap();
        assert_eq!(pk.name, PRIMARY_INDEX);
        assert_eq!(pk.columns, vec!["uuid".to_string()]);
        assert_eq!(pk.kind, IndexKind::Primary);
        assert_eq!(d.indexes().count(), 1);
    }

    #[test]
    fn indexes_iterate_primary_first_then_declared_order() {
        let mut d = descriptor();
        d.add_index("zeta", &["z"])
            .unwrap()
            .add_index("alpha", &["a", "b"])
            .unwrap()
            .add_primary("id")
            .unwrap();

        let names: Vec<_> = d.indexes().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["PRIMARY", "zeta", "alpha"]);
    }

    #[test]
    fn empty_and_reserved_indexes_are_rejected() {
        let mut d = descriptor();
        let none: [&str; 0] = [];
        assert_eq!(
            d.add_index("by_nothing", &none).unwrap_err(),
            SchemaError::EmptyIndexColumns("by_nothing".into())
        );
        assert_eq!(
            d.add_index("primary", &["id"]).unwrap_err(),
            SchemaError::ReservedIndexName("primary".into())
        );
    }

    #[test]
    fn referential_actions_parse_case_insensitively() {
        let parse = |s: &str| s.parse::<ReferentialAction>();
        assert_eq!(parse("cascade"), Ok(ReferentialAction::Cascade));
        assert_eq!(parse("  Set Null "), Ok(ReferentialAction::SetNull));
        assert_eq!(parse("no   action"), Ok(ReferentialAction::NoAction));
        assert_eq!(parse("SET DEFAULT"), Ok(ReferentialAction::SetDefault));
        assert_eq!(
            "DELETE".parse::<ReferentialAction>(),
            Err(SchemaError::InvalidReferentialAction("DELETE".into()))
        );

        let mut d = descriptor();
        assert!(matches!(
            d.add_foreign_key_with("user_id", "users", "ID", "cascade", "explode"),
            Err(SchemaError::InvalidReferentialAction(_))
        ));
        assert!(d.foreign_keys().is_empty());
    }

    #[test]
    fn engines_are_limited_to_the_supported_set() {
        let mut d = descriptor();
        d.set_engine("myisam").unwrap();
        assert_eq!(d.engine(), Engine::MyIsam);
        d.set_engine("Memory").unwrap();
        assert_eq!(d.engine().as_sql(), "MEMORY");
        assert_eq!(
            d.set_engine("CSV").unwrap_err(),
            SchemaError::UnsupportedEngine("CSV".into())
        );
        assert_eq!(d.engine(), Engine::Memory);
    }

    #[test]
    fn constraint_names_are_deterministic() {
        let first = constraint_name("wp_notes", "user_id", "wp_users", "ID");
        let second = constraint_name("wp_notes", "user_id", "wp_users", "ID");
        assert_eq!(first, second);
        assert!(first.starts_with("fk_wp_notes_user_id_"));
        assert_eq!(first.len(), "fk_wp_notes_user_id_".len() + 8);

        let other = constraint_name("wp_notes", "user_id", "wp_users", "user_login");
        assert_ne!(first, other);

        let mut a = SchemaDescriptor::with_prefix("wp_", "notes").unwrap();
        let mut b = SchemaDescriptor::with_prefix("wp_", "notes").unwrap();
        a.add_foreign_key_default("user_id", "users", "ID").unwrap();
        b.add_foreign_key_default("user_id", "users", "ID").unwrap();
        assert_eq!(a.foreign_keys()[0].constraint_name, first);
        assert_eq!(a.foreign_keys(), b.foreign_keys());
    }

    #[test]
    fn long_constraint_names_fit_the_identifier_limit() {
        let table = "t".repeat(60);
        let column = "c".repeat(60);
        let name = constraint_name(&table, &column, "users", "ID");
        assert_eq!(name.len(), 64);
        assert!(IdentifierGuard::check(&name).is_ok());
    }

    #[test]
    fn truncated_names_stay_distinct_per_column() {
        let table = "t".repeat(40);
        let mut d = SchemaDescriptor::new(&table).unwrap();
        d.add_column("owner_user_id_a", "BIGINT UNSIGNED")
            .unwrap()
            .add_column("owner_user_id_b", "BIGINT UNSIGNED")
            .unwrap()
            .add_foreign_key_default("owner_user_id_a", "users", "ID")
            .unwrap()
            .add_foreign_key_default("owner_user_id_b", "users", "ID")
            .unwrap();

        let fks = d.foreign_keys();
        assert_eq!(fks.len(), 2);
        assert_eq!(fks[0].column, "owner_user_id_a");
        assert_eq!(fks[1].column, "owner_user_id_b");
        assert_ne!(fks[0].constraint_name, fks[1].constraint_name);
        assert!(fks.iter().all(|fk| fk.constraint_name.len() <= 64));
    }

    #[test]
    fn same_reference_from_different_tables_gets_different_names() {
        let a = constraint_name("wp_notes", "user_id", "wp_users", "ID");
        let b = constraint_name("wp_tasks", "user_id", "wp_users", "ID");
        assert_ne!(a[a.len() - 8..], b[b.len() - 8..]);
    }

    #[test]
    fn foreign_keys_reference_prefixed_tables_with_defaults() {
        let mut d = SchemaDescriptor::with_prefix("wp_", "notes").unwrap();
        d.add_foreign_key_default("user_id", "users", "ID").unwrap();

        let fk = &d.foreign_keys()[0];
        assert_eq!(fk.ref_table, "wp_users");
        assert_eq!(fk.ref_column, "ID");
        assert_eq!(fk.on_delete, ReferentialAction::Cascade);
        assert_eq!(fk.on_update, ReferentialAction::Restrict);
        assert_eq!(d.table_name(), "wp_notes");
    }

    #[test]
    fn prefix_counts_toward_identifier_length() {
        let name = "n".repeat(60);
        assert!(SchemaDescriptor::new(&name).is_ok());
        assert!(matches!(
            SchemaDescriptor::with_prefix("wp_long_", &name),
            Err(SchemaError::InvalidIdentifier(_))
        ));
    }
}
