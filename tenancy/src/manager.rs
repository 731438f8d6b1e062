//! Asynchronous tenant manager.
//!
//! Role management runs inside a single transaction per call, so a failure
//! part way through leaves no partial role state behind. Sessions are
//! acquired from the manager's pool and released when dropped.

use std::collections::HashSet;
use std::time::Duration;

use config::{PostgresConfig, TenancySettings};
use errors::Result;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::{debug, info};

use crate::catalog::PgCatalog;
use crate::migration::{MigrationOp, RlsDirectiveInjector};
use crate::model::Metadata;
use crate::roles::TenantRoles;
use crate::session::{SessionTracker, TenantSession};

/// Builds a pool from connection settings.
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool> {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.username)
        .password(&config.password);

    debug!(url = %config.redacted_url(), "Connecting to PostgreSQL");
    let pool = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .acquire_timeout(Duration::from_secs(config.timeout_seconds))
        .connect_with(options)
        .await?;
    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct TenantManager {
    pool: PgPool,
    roles: TenantRoles,
    settings: TenancySettings,
    sessions: SessionTracker
}

impl TenantManager {
    pub async fn connect(config: &PostgresConfig, settings: TenancySettings) -> Result<Self> {
        let pool = connect_pool(config).await?;
        info!(
            host = %config.host,
            database = %config.database,
            "Tenant manager connected"
        );
        Self::from_pool(pool, settings)
    }

    pub fn from_pool(pool: PgPool, settings: TenancySettings) -> Result<Self> {
        Ok(Self {
            pool,
            roles: TenantRoles::new(&settings)?,
            settings,
            sessions: SessionTracker::default()
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn settings(&self) -> &TenancySettings {
        &self.settings
    }

    /// Sessions handed out by this manager and not yet released.
    pub fn active_sessions(&self) -> usize {
        self.sessions.active()
    }

    pub fn get_tenant_role_name(&self, slug: &str) -> Result<String> {
        self.roles.role_name(slug)
    }

    pub async fn create_tenant(&self, slug: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.roles
            .create(&mut PgCatalog::new(&mut tx), slug)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_tenant(&self, slug: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.roles
            .delete(&mut PgCatalog::new(&mut tx), slug)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_tenants(&self) -> Result<HashSet<String>> {
        let mut session = self.new_admin_session().await?;
        self.roles.list(&mut PgCatalog::new(&mut session)).await
    }

    pub async fn tenant_exists(&self, slug: &str) -> Result<bool> {
        let mut session = self.new_admin_session().await?;
        self.roles
            .exists(&mut PgCatalog::new(&mut session), slug)
            .await
    }

    /// Session running as the pool's own user, without a role switch.
    pub async fn new_admin_session(&self) -> Result<TenantSession> {
        let conn = self.pool.acquire().await?;
        Ok(TenantSession::admin(conn, self.sessions.lease()))
    }

    /// Session whose effective role is the tenant's role. Fails with
    /// `TenantNotFound` when no such role exists.
    pub async fn new_session(&self, slug: &str) -> Result<TenantSession> {
        let role = self.roles.existing_role_name(slug)?;
        let conn = self.pool.acquire().await?;
        TenantSession::for_tenant(conn, self.sessions.lease(), slug, &role).await
    }

    /// Migration hook over `collections`, configured with these settings.
    pub fn rls_injector<'m>(
        &self,
        collections: impl IntoIterator<Item = &'m Metadata>
    ) -> Result<RlsDirectiveInjector> {
        RlsDirectiveInjector::new(collections, &self.settings)
    }

    /// Operations still needed to bring `collections` under RLS.
    pub async fn plan_rls(&self, collections: &[Metadata]) -> Result<Vec<MigrationOp>> {
        let injector = self.rls_injector(collections)?;
        let mut session = self.new_admin_session().await?;
        injector.plan(&mut PgCatalog::new(&mut session)).await
    }

    /// Plans and executes the RLS operations for `collections` in one
    /// transaction.
    pub async fn apply_rls(&self, collections: &[Metadata]) -> Result<Vec<MigrationOp>> {
        let injector = self.rls_injector(collections)?;
        let mut tx = self.pool.begin().await?;
        let ops = injector.apply(&mut PgCatalog::new(&mut tx)).await?;
        tx.commit().await?;
        Ok(ops)
    }
}
