//! Foreign key edges between tables.

use std::fmt;
use std::str::FromStr;

use super::types::FieldRef;
use crate::error::SchemaError;

/// Referential action recorded for `ON DELETE` / `ON UPDATE`.
///
/// Recorded for description only; the restriction cascade does not depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefAction {
    /// Reject the change (MySQL default).
    #[default]
    Restrict,
    /// Propagate the change.
    Cascade,
    /// Null out the referencing column.
    SetNull,
    /// Deferred restrict.
    NoAction,
    /// Reset to the column default.
    SetDefault,
}

impl FromStr for RefAction {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RESTRICT" => Ok(RefAction::Restrict),
            "CASCADE" => Ok(RefAction::Cascade),
            "SET NULL" => Ok(RefAction::SetNull),
            "NO ACTION" => Ok(RefAction::NoAction),
            "SET DEFAULT" => Ok(RefAction::SetDefault),
            other => Err(SchemaError::UnknownRefOption(other.to_string())),
        }
    }
}

impl fmt::Display for RefAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RefAction::Restrict => "RESTRICT",
            RefAction::Cascade => "CASCADE",
            RefAction::SetNull => "SET NULL",
            RefAction::NoAction => "NO ACTION",
            RefAction::SetDefault => "SET DEFAULT",
        };
        f.write_str(s)
    }
}

/// A directed edge from a local field to the field it references.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    /// Constraint name from the DDL.
    pub name: String,
    /// Referencing field.
    pub local: FieldRef,
    /// Referenced field, normally the foreign table's primary key.
    pub foreign: FieldRef,
    /// `ON DELETE` action.
    pub on_delete: RefAction,
    /// `ON UPDATE` action.
    pub on_update: RefAction,
}

impl ForeignKey {
    /// Create a foreign key with default (RESTRICT) actions.
    pub fn new(name: impl Into<String>, local: FieldRef, foreign: FieldRef) -> Self {
        Self {
            name: name.into(),
            local,
            foreign,
            on_delete: RefAction::default(),
            on_update: RefAction::default(),
        }
    }

    /// Set the `ON DELETE` action.
    pub fn with_on_delete(mut self, action: RefAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Set the `ON UPDATE` action.
    pub fn with_on_update(mut self, action: RefAction) -> Self {
        self.on_update = action;
        self
    }
}
