use tablesmith_common::Result;

/// One result row, addressed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<(String, Option<String>)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.values.push((column.into(), value.map(Into::into)));
        self
    }

    /// Value of `column`, matched case-insensitively. `None` for SQL NULL or
    /// an unknown column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .and_then(|(_, value)| value.as_deref())
    }
}

/// Blocking connection to the MySQL database being migrated.
///
/// Implementations wrap whatever driver the host application already uses.
/// Errors carry the driver's error text.
pub trait SqlClient {
    /// Run a statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Run a query with `?` placeholders bound to `params` and return the first
    /// column of the first row.
    fn query_scalar(&mut self, sql: &str, params: &[&str]) -> Result<Option<String>>;

    /// Run a query with `?` placeholders bound to `params` and return every row.
    fn query_rows(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Prefix the host prepends to its table names.
    ///
    /// The engine does not read it: descriptors carry their own prefix. Hosts
    /// pass it to [`SchemaDescriptor::with_prefix`] so descriptors and the
    /// connection agree.
    ///
    /// [`SchemaDescriptor::with_prefix`]: tablesmith_schema::SchemaDescriptor::with_prefix
    fn table_prefix(&self) -> &str {
        ""
    }

    /// Charset/collation clause appended to `CREATE TABLE`.
    fn charset_collate(&self) -> &str {
        ""
    }
}
