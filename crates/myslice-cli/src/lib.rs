//! myslice CLI - command-line slicing of a live MySQL database.
//!
//! The binary wires the pieces together; the library half holds argument
//! handling, the slicing pipeline and schema description so they can be tested
//! against the in-memory collaborator.

pub mod config;
pub mod describe;
pub mod error;
pub mod slice;

pub use config::{Args, SliceConfig};
pub use error::{CliError, Result};
pub use slice::run_slice;
