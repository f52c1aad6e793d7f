//! An in-memory stand-in for a MySQL schema.
//!
//! [`SimulatedClient`] understands the DDL produced by
//! [`tablesmith_schema::ddl`] and the catalog queries issued by
//! [`crate::catalog`]. It applies statements to an in-memory catalog, snapshots
//! that catalog on `begin` and restores it on `rollback`, and can be told to
//! reject statements containing a given fragment. It powers dry runs and the
//! engine tests.
//!
//! Unlike a real MySQL server, DDL here is transactional: a rollback undoes
//! every statement executed since `begin`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tablesmith_common::{Error, Result};
use tracing::debug;

use crate::catalog::{FOREIGN_KEYS_SQL, TABLE_EXISTS_SQL};
use crate::client::{Row, SqlClient};

static CREATE_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^CREATE TABLE `(\w+)` \((.*)\) ENGINE=(\w+)").expect("valid pattern")
});
static ALTER_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^ALTER TABLE `(\w+)` ADD (.*)$").expect("valid pattern"));
static COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:COLUMN )?`(\w+)`").expect("valid pattern"));
static PRIMARY_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^PRIMARY KEY \(([^)]*)\)").expect("valid pattern"));
static KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^KEY `(\w+)` \(([^)]*)\)").expect("valid pattern"));
static FOREIGN_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^CONSTRAINT `(\w+)` FOREIGN KEY \(`(\w+)`\) REFERENCES `(\w+)` \(`(\w+)`\)")
        .expect("valid pattern")
});
static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`(\w+)`").expect("valid pattern"));
static SHOW_COLUMNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SHOW COLUMNS FROM `(\w+)`$").expect("valid pattern"));
static SHOW_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SHOW INDEX FROM `(\w+)`$").expect("valid pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedIndex {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedForeignKey {
    pub name: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedTable {
    pub engine: String,
    pub columns: Vec<String>,
    pub indexes: Vec<SimulatedIndex>,
    pub foreign_keys: Vec<SimulatedForeignKey>,
}

impl SimulatedTable {
    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    fn has_index(&self, name: &str) -> bool {
        self.indexes.iter().any(|i| i.name.eq_ignore_ascii_case(name))
    }

    fn require_columns(&self, columns: &[String]) -> Result<()> {
        match columns.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(Error::Database(format!(
                "Key column '{missing}' doesn't exist in table"
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedClient {
    tables: BTreeMap<String, SimulatedTable>,
    snapshot: Option<BTreeMap<String, SimulatedTable>>,
    executed: Vec<String>,
    failures: Vec<(String, String)>,
    prefix: String,
    charset_collate: String,
}

impl SimulatedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_charset_collate(mut self, clause: impl Into<String>) -> Self {
        self.charset_collate = clause.into();
        self
    }

    /// Seed a pre-existing table with the given columns and no keys.
    pub fn add_table(&mut self, name: &str, columns: &[&str]) -> &mut Self {
        self.tables.insert(
            name.to_string(),
            SimulatedTable {
                engine: "InnoDB".to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                ..Default::default()
            },
        );
        self
    }

    /// Reject every later statement containing `fragment` with `message`.
    pub fn fail_when(&mut self, fragment: &str, message: &str) -> &mut Self {
        self.failures
            .push((fragment.to_string(), message.to_string()));
        self
    }

    pub fn clear_failures(&mut self) -> &mut Self {
        self.failures.clear();
        self
    }

    /// Statements that executed successfully, including rolled-back ones.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn table(&self, name: &str) -> Option<&SimulatedTable> {
        self.tables.get(name)
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut SimulatedTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::Database(format!("Table '{name}' doesn't exist")))
    }

    fn require_table(&self, name: &str) -> Result<&SimulatedTable> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::Database(format!("Table '{name}' doesn't exist")))
    }

    fn create_table(&mut self, name: &str, body: &str, engine: &str) -> Result<()> {
        if self.tables.contains_key(name) {
            return Err(Error::Database(format!("Table '{name}' already exists")));
        }

        let mut table = SimulatedTable {
            engine: engine.to_string(),
            ..Default::default()
        };
        for clause in split_top_level(body) {
            self.apply_clause(name, &mut table, &clause)?;
        }
        self.tables.insert(name.to_string(), table);
        Ok(())
    }

    fn alter_table(&mut self, name: &str, clause: &str) -> Result<()> {
        let mut table = self.require_table(name)?.clone();
        self.apply_clause(name, &mut table, clause)?;
        *self.table_mut(name)? = table;
        Ok(())
    }

    fn apply_clause(&self, name: &str, table: &mut SimulatedTable, clause: &str) -> Result<()> {
        let clause = clause.trim();

        if let Some(caps) = PRIMARY_KEY.captures(clause) {
            let columns = quoted_names(&caps[1]);
            if table.has_index("PRIMARY") {
                return Err(Error::Database("Multiple primary key defined".into()));
            }
            table.require_columns(&columns)?;
            table.indexes.push(SimulatedIndex {
                name: "PRIMARY".to_string(),
                columns,
            });
        } else if let Some(caps) = KEY.captures(clause) {
            let columns = quoted_names(&caps[2]);
            if table.has_index(&caps[1]) {
                return Err(Error::Database(format!("Duplicate key name '{}'", &caps[1])));
            }
            table.require_columns(&columns)?;
            table.indexes.push(SimulatedIndex {
                name: caps[1].to_string(),
                columns,
            });
        } else if let Some(caps) = FOREIGN_KEY.captures(clause) {
            let fk = SimulatedForeignKey {
                name: caps[1].to_string(),
                column: caps[2].to_string(),
                ref_table: caps[3].to_string(),
                ref_column: caps[4].to_string(),
            };
            if table.foreign_keys.iter().any(|f| f.name == fk.name) {
                return Err(Error::Database(format!(
                    "Duplicate foreign key constraint name '{}'",
                    fk.name
                )));
            }
            table.require_columns(std::slice::from_ref(&fk.column))?;
            let referenced = if fk.ref_table == name {
                Some(&*table)
            } else {
                self.tables.get(&fk.ref_table)
            };
            match referenced {
                Some(r) if r.has_column(&fk.ref_column) => {}
                _ => {
                    return Err(Error::Database(format!(
                        "Failed to open the referenced table '{}'",
                        fk.ref_table
                    )));
                }
            }
            table.foreign_keys.push(fk);
        } else if let Some(caps) = COLUMN.captures(clause) {
            if table.has_column(&caps[1]) {
                return Err(Error::Database(format!(
                    "Duplicate column name '{}'",
                    &caps[1]
                )));
            }
            table.columns.push(caps[1].to_string());
        } else {
            return Err(Error::Database(format!(
                "You have an error in your SQL syntax near '{clause}'"
            )));
        }
        Ok(())
    }
}

impl SqlClient for SimulatedClient {
    fn execute(&mut self, sql: &str) -> Result<u64> {
        if let Some((_, message)) = self.failures.iter().find(|(f, _)| sql.contains(f.as_str())) {
            return Err(Error::Database(message.clone()));
        }

        if let Some(caps) = CREATE_TABLE.captures(sql) {
            self.create_table(&caps[1], &caps[2], &caps[3])?;
        } else if let Some(caps) = ALTER_TABLE.captures(sql) {
            self.alter_table(&caps[1], &caps[2])?;
        } else {
            return Err(Error::Database(format!("unsupported statement: {sql}")));
        }

        debug!("simulated: {sql}");
        self.executed.push(sql.to_string());
        Ok(0)
    }

    fn query_scalar(&mut self, sql: &str, params: &[&str]) -> Result<Option<String>> {
        if sql != TABLE_EXISTS_SQL {
            return Err(Error::Database(format!("unsupported query: {sql}")));
        }
        let name = params
            .first()
            .ok_or_else(|| Error::Database("missing table name parameter".into()))?;
        Ok(self.tables.get_key_value(*name).map(|(k, _)| k.clone()))
    }

    fn query_rows(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        if let Some(caps) = SHOW_COLUMNS.captures(sql) {
            let table = self.require_table(&caps[1])?;
            return Ok(table
                .columns
                .iter()
                .map(|c| Row::new().with("Field", Some(c.as_str())))
                .collect());
        }
        if let Some(caps) = SHOW_INDEX.captures(sql) {
            let table = self.require_table(&caps[1])?;
            return Ok(table
                .indexes
                .iter()
                .flat_map(|i| {
                    i.columns.iter().map(move |c| {
                        Row::new()
                            .with("Key_name", Some(i.name.as_str()))
                            .with("Column_name", Some(c.as_str()))
                    })
                })
                .collect());
        }
        if sql == FOREIGN_KEYS_SQL {
            let name = params
                .first()
                .ok_or_else(|| Error::Database("missing table name parameter".into()))?;
            // information_schema yields no rows for unknown tables
            return Ok(self
                .tables
                .get(*name)
                .map(|t| {
                    t.foreign_keys
                        .iter()
                        .map(|fk| Row::new().with("CONSTRAINT_NAME", Some(fk.name.as_str())))
                        .collect()
                })
                .unwrap_or_default());
        }
        Err(Error::Database(format!("unsupported query: {sql}")))
    }

    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(Error::Database("transaction already open".into()));
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| Error::Database("no open transaction".into()))
    }

    fn rollback(&mut self) -> Result<()> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| Error::Database("no open transaction".into()))?;
        self.tables = snapshot;
        Ok(())
    }

    fn table_prefix(&self) -> &str {
        &self.prefix
    }

    fn charset_collate(&self) -> &str {
        &self.charset_collate
    }
}

fn quoted_names(list: &str) -> Vec<String> {
    QUOTED
        .captures_iter(list)
        .map(|c| c[1].to_string())
        .collect()
}

/// Split a `CREATE TABLE` body on commas outside parentheses and quotes.
fn split_top_level(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in body.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}
