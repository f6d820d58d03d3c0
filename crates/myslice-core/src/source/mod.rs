//! External collaborators: schema introspection and query execution.
//!
//! The engine never talks to a database directly. It asks a [`SchemaSource`]
//! for table names and DDL, and a [`QueryExecutor`] for rows.

mod memory;

use std::fmt;

pub use memory::{MemorySource, MemoryTable, RowView, DEFAULT_MAX_ALLOWED_PACKET};

use crate::catalog::KeySet;
use crate::error::Error;
use crate::quote::{escape_string, quote_identifier};

/// Answers "list tables" and "show DDL for table".
pub trait SchemaSource {
    /// Names of every table in the database.
    fn list_tables(&self) -> Result<Vec<String>, Error>;

    /// The `CREATE TABLE` statement of a table, one entry per line.
    fn create_table_lines(&self, table: &str) -> Result<Vec<String>, Error>;
}

/// Runs SELECTs and exposes the server properties the dump needs.
pub trait QueryExecutor {
    /// Run raw SQL returning rows.
    fn execute(&self, sql: &str) -> Result<ResultSet, Error>;

    /// Run a structured select. Defaults to rendering it as SQL.
    fn select(&self, query: &Select) -> Result<ResultSet, Error> {
        self.execute(&query.to_string())
    }

    /// Hand every row of a structured select to `visit`, in cursor order.
    ///
    /// Executors that can read rows off the wire one at a time override this;
    /// the default collects the whole result first. `visit` must not call back
    /// into the executor.
    fn select_each(
        &self,
        query: &Select,
        visit: &mut dyn FnMut(&Row) -> Result<(), Error>,
    ) -> Result<(), Error> {
        for row in &self.select(query)?.rows {
            visit(row)?;
        }
        Ok(())
    }

    /// Maximum statement size accepted by the target server, in bytes.
    fn max_allowed_packet(&self) -> Result<usize, Error>;

    /// Escape a raw value for use inside a single-quoted string literal.
    fn escape_string(&self, raw: &[u8]) -> Vec<u8> {
        escape_string(raw)
    }

    /// Server version string for the dump header.
    fn server_version(&self) -> Result<String, Error>;

    /// Start a consistent read snapshot.
    fn begin_snapshot(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Release the snapshot.
    fn rollback(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// One result row: raw field bytes, `None` for SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row(pub Vec<Option<Vec<u8>>>);

impl Row {
    /// Build a row from text values.
    pub fn from_text<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        Row(values
            .into_iter()
            .map(|v| v.map(|s| s.as_bytes().to_vec()))
            .collect())
    }

    /// Raw bytes of column `index`, `None` for NULL or out of range.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.0.get(index).and_then(|v| v.as_deref())
    }

    /// Column `index` as text, lossy for non UTF-8 data.
    pub fn get_str(&self, index: usize) -> Option<std::borrow::Cow<'_, str>> {
        self.get(index).map(String::from_utf8_lossy)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rows returned by an executor together with their column names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSet {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// Create a result set.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse the first column of every row as an integer key.
    ///
    /// NULLs are skipped; anything else that is not an integer is an error.
    pub fn key_set(&self, table: &str, field: &str) -> Result<KeySet, Error> {
        let mut keys = KeySet::new();
        for row in &self.rows {
            let Some(raw) = row.get(0) else {
                continue;
            };
            keys.insert(parse_key(raw).ok_or_else(|| Error::InvalidKey {
                table: table.to_string(),
                field: field.to_string(),
                value: String::from_utf8_lossy(raw).into_owned(),
            })?);
        }
        Ok(keys)
    }
}

/// Parse raw field bytes as an integer key.
pub fn parse_key(raw: &[u8]) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}

/// Row filter of a [`Select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// No restriction.
    All,
    /// `column IN (values)`; an empty set matches nothing.
    In {
        /// Column name.
        column: String,
        /// Allowed integer values.
        values: KeySet,
    },
    /// Conjunction of filters.
    And(Vec<Filter>),
    /// Caller supplied SQL predicate.
    Raw(String),
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => f.write_str("true"),
            Filter::In { values, .. } if values.is_empty() => f.write_str("false"),
            Filter::In { column, values } => {
                write!(f, "{} IN (", quote_identifier(column))?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
            Filter::And(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Filter::Raw(sql) => f.write_str(sql),
        }
    }
}

/// A single-table SELECT built by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    /// Table name.
    pub table: String,
    /// Projected columns, empty for `*`.
    pub columns: Vec<String>,
    /// Row filter.
    pub filter: Filter,
    /// Raw `ORDER BY` expression.
    pub order_by: Option<String>,
    /// Row limit.
    pub limit: Option<u64>,
}

impl Select {
    /// `SELECT * FROM table`.
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filter: Filter::All,
            order_by: None,
            limit: None,
        }
    }

    /// `SELECT column FROM table`.
    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::columns(table, [column])
    }

    /// `SELECT a, b, ... FROM table`.
    pub fn columns<C: Into<String>>(
        table: impl Into<String>,
        columns: impl IntoIterator<Item = C>,
    ) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::all(table)
        }
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the `ORDER BY` expression.
    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Set the row limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            f.write_str("SELECT *")?;
        } else {
            f.write_str("SELECT ")?;
            for (i, column) in self.columns.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(&quote_identifier(column))?;
            }
        }
        write!(f, " FROM {}", quote_identifier(&self.table))?;
        if self.filter != Filter::All {
            write!(f, " WHERE {}", self.filter)?;
        }
        if let Some(order_by) = &self.order_by {
            write!(f, " ORDER BY {order_by}")?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}
