//! Field definitions for tables.

use super::types::{KeySet, QuotingClass, TableId};
use crate::quote::quote_identifier;
use crate::source::Filter;

/// A column of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Owning table.
    pub table: TableId,
    /// Column name.
    pub name: String,
    /// Raw type name from the DDL (e.g. `varchar`).
    pub column_type: String,
    /// Quoting class resolved from `column_type`.
    pub quoting: QuotingClass,
    /// Display size, if the DDL carried one.
    pub size: Option<u32>,
    /// Everything after the type in the column declaration.
    pub options: Option<String>,
    /// Part of the table's primary key.
    pub pk: bool,
    /// Column accepts NULL.
    pub nullable: bool,
    pub(crate) fk: Option<usize>,
    pub(crate) restricted_values: Option<KeySet>,
    pub(crate) expunge_orphans: Option<bool>,
}

impl Field {
    /// Create a new non-key, non-nullable field.
    pub fn new(
        table: TableId,
        name: impl Into<String>,
        column_type: impl Into<String>,
        quoting: QuotingClass,
    ) -> Self {
        Self {
            table,
            name: name.into(),
            column_type: column_type.into(),
            quoting,
            size: None,
            options: None,
            pk: false,
            nullable: false,
            fk: None,
            restricted_values: None,
            expunge_orphans: None,
        }
    }

    /// Index of the outgoing foreign key in the owning table, if any.
    pub fn foreign_key_index(&self) -> Option<usize> {
        self.fk
    }

    /// Current restricted key set. `None` until first restricted.
    pub fn restricted_values(&self) -> Option<&KeySet> {
        self.restricted_values.as_ref()
    }

    /// Check if a restriction has been applied to this field.
    pub fn is_restricted(&self) -> bool {
        self.restricted_values.is_some()
    }

    /// Override the orphan policy for this field only.
    pub fn set_expunge_orphans(&mut self, expunge: bool) {
        self.expunge_orphans = Some(expunge);
    }

    /// Field-level orphan policy override, if set.
    pub fn expunge_orphans_override(&self) -> Option<bool> {
        self.expunge_orphans
    }

    /// Filter selecting rows whose value for this field is in `values`.
    pub fn filter(&self, values: &KeySet) -> Filter {
        Filter::In {
            column: self.name.clone(),
            values: values.clone(),
        }
    }

    /// Type with display size, e.g. `varchar(255)`.
    pub fn type_with_size(&self) -> String {
        match self.size {
            Some(size) => format!("{}({})", self.column_type, size),
            None => self.column_type.clone(),
        }
    }

    /// One-line description: name, PK, nullable, quoted, type, options.
    pub fn describe(&self) -> String {
        format!(
            "{:<25} {:2} {:1} {:1} {:<20} {}",
            quote_identifier(&self.name),
            if self.pk { "PK" } else { "" },
            if self.nullable { "N" } else { "" },
            if self.quoting.is_quoted() { "Q" } else { "" },
            self.type_with_size(),
            self.options.as_deref().unwrap_or("<no options>")
        )
    }
}
