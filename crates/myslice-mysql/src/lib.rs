//! myslice MySQL - live MySQL collaborator for the myslice engine.
//!
//! [`MySqlSource`] implements both [`SchemaSource`](myslice_core::SchemaSource)
//! and [`QueryExecutor`](myslice_core::QueryExecutor) over a single connection,
//! so a consistent snapshot opened on it covers every query of a slicing run.
//!
//! # Quick Start
//!
//! ```ignore
//! use myslice_core::{Catalog, DumpHeader, QueryExecutor};
//! use myslice_mysql::{MySqlConfig, MySqlSource};
//!
//! let config = MySqlConfig::new("mysql://root@localhost/shop");
//! let source = MySqlSource::connect(&config)?;
//!
//! let mut catalog = Catalog::new(config.database().unwrap_or_default());
//! catalog.parse_tables(&source)?;
//!
//! source.begin_snapshot()?;
//! let org = catalog.table_id("org")?;
//! catalog.limit_pks(&source, org, &[42].into(), "org 42")?;
//! catalog.dump(&source, &DumpHeader::new(config.host(), "shop"), &mut std::io::stdout())?;
//! source.rollback()?;
//! ```

pub mod config;
pub mod error;
pub mod source;

pub use config::MySqlConfig;
pub use error::{Error, Result};
pub use source::MySqlSource;
