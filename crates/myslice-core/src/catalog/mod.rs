//! Schema catalog for myslice.
//!
//! The catalog stores the tables, fields and foreign keys of one database,
//! parsed from the `CREATE TABLE` statements reported by a [`SchemaSource`].
//! Structure is fixed after parsing; only field restrictions change.
//!
//! [`SchemaSource`]: crate::source::SchemaSource

mod database;
mod field;
mod foreign_key;
pub(crate) mod parse;
mod table;
mod types;

pub use database::{Catalog, ParseReport};
pub use field::Field;
pub use foreign_key::{ForeignKey, RefAction};
pub use table::Table;
pub use types::{FieldId, FieldRef, FkRef, KeySet, QuotingClass, TableId};
