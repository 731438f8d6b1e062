//! Shared test fixtures for the tenancy workspace.
//!
//! - A PostgreSQL testcontainer, started lazily once per test process and
//!   cleaned up when the process exits. Tests skip when Docker is missing.
//! - [`MemoryCatalog`], an in-memory catalog that records executed
//!   statements, for exercising role and migration logic without a database.
//! - Unique name generators so parallel tests never share roles or tables.

mod fixtures;
mod memory_catalog;

pub use fixtures::*;
pub use memory_catalog::MemoryCatalog;
