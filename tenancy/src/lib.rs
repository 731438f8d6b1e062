//! # Tenancy
//!
//! Multi-tenant isolation on PostgreSQL row-level security.
//!
//! Each tenant maps to a database role named `<prefix><slug>`. Tables marked
//! for RLS get a permissive policy comparing their `tenant` column with a
//! resolver function that derives the tenant from `current_user`. A session
//! switched to a tenant role therefore only sees and writes that tenant's
//! rows, enforced by the database itself.
//!
//! - [`model`]: table declarations and the RLS registry
//! - [`policy`]: deterministic policy and resolver DDL
//! - [`catalog`]: catalog lookups over a connection or transaction
//! - [`migration`]: the revision hook appending RLS operations
//! - [`roles`]: tenant role creation, deletion and listing
//! - [`TenantManager`] / [`blocking::TenantManager`]: async and blocking
//!   entry points handing out [`TenantSession`]s

pub mod blocking;
pub mod catalog;
pub mod identifier;
pub mod manager;
pub mod migration;
pub mod model;
pub mod policy;
pub mod roles;
pub mod session;

pub use catalog::{Catalog, DbCondition, PgCatalog, classify, classify_sqlstate};
pub use errors::{ConfigurationError, Result, TenancyError};
pub use manager::{TenantManager, connect_pool};
pub use migration::{
    MigrationContext, MigrationOp, MigrationScript, ProcessRevisionDirectives, RevisionIds,
    RlsDirectiveInjector, get_process_revision_directives,
};
pub use model::{
    ColumnDef, ColumnType, Metadata, ModelFile, RlsTable, TENANT_COLUMN, TableDeclaration,
    TableDef, mark_for_rls,
};
pub use policy::{DEFAULT_POLICY_NAME, PolicyTemplate, render_policy};
pub use roles::TenantRoles;
pub use session::{SessionState, TenantSession};
