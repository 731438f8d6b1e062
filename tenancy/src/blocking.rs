//! Blocking tenant manager.
//!
//! Same contract as [`crate::TenantManager`], for callers without an async
//! runtime. The manager owns a small tokio runtime and blocks the calling
//! thread on each operation. Do not call it from inside another runtime.

use std::collections::HashSet;
use std::mem::ManuallyDrop;

use config::{PostgresConfig, TenancySettings};
use errors::Result;
use futures_util::future::BoxFuture;
use sqlx::postgres::PgRow;
use sqlx::{AssertSqlSafe, PgConnection, PgPool};
use tokio::runtime::{Builder, Runtime};

use crate::migration::MigrationOp;
use crate::model::Metadata;
use crate::session::SessionState;

fn build_runtime() -> Result<Runtime> {
    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("tenancy-blocking")
        .enable_all()
        .build()?;
    Ok(runtime)
}

#[derive(Debug)]
pub struct TenantManager {
    inner: crate::TenantManager,
    runtime: Runtime
}

impl TenantManager {
    pub fn connect(config: &PostgresConfig, settings: TenancySettings) -> Result<Self> {
        let runtime = build_runtime()?;
        let inner = runtime.block_on(crate::TenantManager::connect(config, settings))?;
        Ok(Self { inner, runtime })
    }

    /// Wraps an existing pool. The pool must not have been created on a
    /// runtime that shuts down before this manager does.
    pub fn from_pool(pool: PgPool, settings: TenancySettings) -> Result<Self> {
        let runtime = build_runtime()?;
        let inner = crate::TenantManager::from_pool(pool, settings)?;
        Ok(Self { inner, runtime })
    }

    pub fn settings(&self) -> &TenancySettings {
        self.inner.settings()
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.active_sessions()
    }

    pub fn get_tenant_role_name(&self, slug: &str) -> Result<String> {
        self.inner.get_tenant_role_name(slug)
    }

    pub fn create_tenant(&self, slug: &str) -> Result<()> {
        self.runtime.block_on(self.inner.create_tenant(slug))
    }

    pub fn delete_tenant(&self, slug: &str) -> Result<()> {
        self.runtime.block_on(self.inner.delete_tenant(slug))
    }

    pub fn list_tenants(&self) -> Result<HashSet<String>> {
        self.runtime.block_on(self.inner.list_tenants())
    }

    pub fn tenant_exists(&self, slug: &str) -> Result<bool> {
        self.runtime.block_on(self.inner.tenant_exists(slug))
    }

    pub fn new_admin_session(&self) -> Result<TenantSession<'_>> {
        let session = self.runtime.block_on(self.inner.new_admin_session())?;
        Ok(TenantSession::new(session, &self.runtime))
    }

    pub fn new_session(&self, slug: &str) -> Result<TenantSession<'_>> {
        let session = self.runtime.block_on(self.inner.new_session(slug))?;
        Ok(TenantSession::new(session, &self.runtime))
    }

    pub fn plan_rls(&self, collections: &[Metadata]) -> Result<Vec<MigrationOp>> {
        self.runtime.block_on(self.inner.plan_rls(collections))
    }

    pub fn apply_rls(&self, collections: &[Metadata]) -> Result<Vec<MigrationOp>> {
        self.runtime.block_on(self.inner.apply_rls(collections))
    }
}

impl Drop for TenantManager {
    fn drop(&mut self) {
        self.runtime.block_on(self.inner.pool().close());
    }
}

/// Blocking handle to a [`crate::TenantSession`].
///
/// Queries are issued through [`TenantSession::run`], or the `execute` and
/// `fetch_all` shortcuts for plain SQL.
pub struct TenantSession<'m> {
    // Dropped explicitly inside the runtime; see the `Drop` impl.
    inner: ManuallyDrop<crate::TenantSession>,
    runtime: &'m Runtime
}

impl<'m> TenantSession<'m> {
    fn new(inner: crate::TenantSession, runtime: &'m Runtime) -> Self {
        Self {
            inner: ManuallyDrop::new(inner),
            runtime
        }
    }

    fn session(&self) -> &crate::TenantSession {
        &self.inner
    }

    fn session_mut(&mut self) -> &mut crate::TenantSession {
        &mut self.inner
    }

    pub fn tenant(&self) -> Option<&str> {
        self.session().tenant()
    }

    pub fn role(&self) -> Option<&str> {
        self.session().role()
    }

    pub fn is_admin(&self) -> bool {
        self.session().is_admin()
    }

    pub fn state(&self) -> SessionState {
        self.session().state()
    }

    /// Runs `f` against the session's connection and blocks until it
    /// completes.
    pub fn run<T, F>(&mut self, f: F) -> std::result::Result<T, sqlx::Error>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, std::result::Result<T, sqlx::Error>>
    {
        let runtime = self.runtime;
        let conn: &mut PgConnection = self.session_mut();
        runtime.block_on(f(conn))
    }

    pub fn execute(&mut self, sql: &str) -> std::result::Result<u64, sqlx::Error> {
        let runtime = self.runtime;
        let conn: &mut PgConnection = self.session_mut();
        runtime.block_on(async move {
            let result = sqlx::query(AssertSqlSafe(sql)).execute(conn).await?;
            Ok(result.rows_affected())
        })
    }

    pub fn fetch_all(&mut self, sql: &str) -> std::result::Result<Vec<PgRow>, sqlx::Error> {
        let runtime = self.runtime;
        let conn: &mut PgConnection = self.session_mut();
        runtime.block_on(sqlx::query(AssertSqlSafe(sql)).fetch_all(conn))
    }

    pub fn current_user(&mut self) -> Result<String> {
        let runtime = self.runtime;
        runtime.block_on(self.session_mut().current_user())
    }
}

impl Drop for TenantSession<'_> {
    fn drop(&mut self) {
        // Returning or closing the pooled connection spawns onto the runtime.
        let _guard = self.runtime.enter();
        // SAFETY: `inner` is dropped exactly once, here, and never used again.
        unsafe { ManuallyDrop::drop(&mut self.inner) };
    }
}

impl std::fmt::Debug for TenantSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TenantSession").field(self.session()).finish()
    }
}
