//! myslice core - schema catalog, restriction cascade, and dump writer.
//!
//! This crate computes a referentially consistent subset of a relational
//! database and writes it out as loadable SQL:
//!
//! - **Catalog**: tables, fields and foreign keys parsed from `CREATE TABLE` DDL
//! - **Restriction**: primary-key sets narrowed from a starting table and
//!   cascaded along every foreign key until a fixed point is reached
//! - **Quoting**: per-column SQL literals, nulling orphaned nullable references
//! - **Dump**: DDL plus packet-size bounded `INSERT` batches
//!
//! The live database is reached only through the [`SchemaSource`] and
//! [`QueryExecutor`] traits.

pub mod catalog;
pub mod dump;
pub mod error;
pub mod plan;
pub mod quote;
pub mod restrict;
pub mod source;

pub use catalog::{
    Catalog, Field, FieldId, FieldRef, ForeignKey, FkRef, KeySet, ParseReport, QuotingClass,
    RefAction, Table, TableId,
};
pub use dump::{DumpHeader, DumpStats, PACKET_SAFETY_MARGIN};
pub use error::{Error, Result, SchemaError};
pub use plan::{FieldPolicy, KeySpec, Plan, Step, TablePolicy};
pub use source::{
    Filter, MemorySource, MemoryTable, QueryExecutor, ResultSet, Row, RowView, SchemaSource,
    Select,
};
