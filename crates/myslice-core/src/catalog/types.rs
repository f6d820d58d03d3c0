//! Core type definitions for the catalog.

use std::collections::BTreeSet;
use std::fmt;

/// A set of integer primary key values.
///
/// Ordered so generated `IN (...)` lists are deterministic.
pub type KeySet = BTreeSet<i64>;

/// Index of a table inside its [`Catalog`](super::Catalog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(pub(crate) usize);

/// Index of a field inside its [`Table`](super::Table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub(crate) usize);

/// Catalog-wide address of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Owning table.
    pub table: TableId,
    /// Field within the table.
    pub field: FieldId,
}

/// Catalog-wide address of a foreign key, owned by the table holding the
/// local (referencing) field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FkRef {
    /// Table that owns the foreign key.
    pub table: TableId,
    /// Position in that table's foreign key list.
    pub index: usize,
}

impl TableId {
    /// Position of the table in catalog insertion order.
    pub fn index(self) -> usize {
        self.0
    }
}

impl FieldId {
    /// Position of the field in declaration order.
    pub fn index(self) -> usize {
        self.0
    }
}

impl FieldRef {
    /// Create a field reference.
    pub fn new(table: TableId, field: FieldId) -> Self {
        Self { table, field }
    }
}

/// How values of a column are turned into SQL literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotingClass {
    /// Escaped and wrapped in single quotes.
    StringQuoted,
    /// Written verbatim.
    Numeric,
}

impl QuotingClass {
    /// Resolve the quoting class of a MySQL column type name.
    ///
    /// Returns `None` for types without a known mapping.
    pub fn from_column_type(column_type: &str) -> Option<Self> {
        let quoting = match column_type.to_ascii_lowercase().as_str() {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "float"
            | "double" | "real" | "decimal" | "numeric" | "dec" | "year" => QuotingClass::Numeric,
            "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "binary"
            | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" | "date"
            | "datetime" | "timestamp" | "time" | "enum" | "set" | "json" | "bit" => {
                QuotingClass::StringQuoted
            }
            _ => return None,
        };
        Some(quoting)
    }

    /// Check if values of this class are quoted.
    pub fn is_quoted(self) -> bool {
        self == QuotingClass::StringQuoted
    }
}

impl fmt::Display for QuotingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotingClass::StringQuoted => write!(f, "string"),
            QuotingClass::Numeric => write!(f, "numeric"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_types() {
        for t in ["int", "tinyint", "bigint", "float", "double", "decimal", "INT"] {
            assert_eq!(
                QuotingClass::from_column_type(t),
                Some(QuotingClass::Numeric),
                "{t}"
            );
        }
    }

    #[test]
    fn test_string_types() {
        for t in ["varchar", "char", "text", "longblob", "datetime", "date", "enum", "json"] {
            assert_eq!(
                QuotingClass::from_column_type(t),
                Some(QuotingClass::StringQuoted),
                "{t}"
            );
        }
        assert!(QuotingClass::StringQuoted.is_quoted());
        assert!(!QuotingClass::Numeric.is_quoted());
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(QuotingClass::from_column_type("geometry"), None);
        assert_eq!(QuotingClass::from_column_type(""), None);
    }
}
