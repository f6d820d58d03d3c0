//! Core error types.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Core slicing errors.
#[derive(Debug, Error)]
pub enum Error {
    /// DDL could not be understood.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The cascade needs exactly one primary key field on the table.
    #[error("table `{table}` has {count} primary key fields, exactly one is required")]
    MultiplePrimaryKeys {
        /// Table name.
        table: String,
        /// Number of primary key fields found.
        count: usize,
    },

    /// The query executor failed.
    #[error("query error: {0}")]
    Query(String),

    /// A key column returned something that is not an integer.
    #[error("invalid key `{value}` in {table}.{field}")]
    InvalidKey {
        /// Table name.
        table: String,
        /// Key field name.
        field: String,
        /// Raw value as text.
        value: String,
    },

    /// Table is not in the catalog.
    #[error("unknown table `{0}`")]
    UnknownTable(String),

    /// Field is not part of the table.
    #[error("unknown field `{table}.{field}`")]
    UnknownField {
        /// Table name.
        table: String,
        /// Field name.
        field: String,
    },

    /// Invalid slicing plan.
    #[error("plan error: {0}")]
    Plan(String),

    /// Output sink failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems found while parsing `CREATE TABLE` output.
///
/// These are collected into a [`ParseReport`](crate::catalog::ParseReport)
/// instead of aborting the parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A column declaration did not match the expected grammar.
    #[error("table `{table}`: unparsable line `{line}`")]
    UnparsableLine {
        /// Table name.
        table: String,
        /// Offending DDL line.
        line: String,
    },

    /// A `CONSTRAINT ... FOREIGN KEY` line did not match the expected grammar.
    #[error("table `{table}`: unparsable foreign key definition `{line}`")]
    UnparsableForeignKey {
        /// Table name.
        table: String,
        /// Offending DDL line.
        line: String,
    },

    /// The column type has no quoting class.
    #[error("table `{table}`: unknown type `{column_type}` for column `{field}`")]
    UnknownColumnType {
        /// Table name.
        table: String,
        /// Column name.
        field: String,
        /// Raw type string.
        column_type: String,
    },

    /// A key declaration names a column that was never declared.
    #[error("table `{table}`: reference to undeclared column `{field}`")]
    UnknownField {
        /// Table name.
        table: String,
        /// Column name.
        field: String,
    },

    /// Unrecognised `ON DELETE` / `ON UPDATE` action.
    #[error("unknown referential action `{0}`")]
    UnknownRefOption(String),
}

impl Error {
    /// Wrap any displayable collaborator failure as a query error.
    pub fn query(err: impl std::fmt::Display) -> Self {
        Error::Query(err.to_string())
    }
}
