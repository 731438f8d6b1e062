//! Scoped database sessions.
//!
//! A [`TenantSession`] owns exactly one pooled connection for its lifetime
//! and dereferences to [`PgConnection`], so it can be passed anywhere an
//! executor is expected (`&mut *session`).
//!
//! Tenant-bound sessions switch the session role and are closed instead of
//! being returned to the pool when dropped, so a role binding can never
//! leak into an unrelated checkout.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use errors::{Result, TenancyError};
use sqlx::pool::PoolConnection;
use sqlx::{AssertSqlSafe, PgConnection, Postgres};
use tracing::{debug, warn};

use crate::catalog::{DbCondition, classify};
use crate::identifier::quote_ident;

/// Lifecycle of a session.
///
/// `Created -> RoleSwitchAttempted -> (Active | Failed) -> Released` for
/// tenant sessions, `Created -> Active -> Released` for admin sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    RoleSwitchAttempted,
    Active,
    Failed,
    Released
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Created, RoleSwitchAttempted | Active | Released)
                | (RoleSwitchAttempted, Active | Failed | Released)
                | (Active | Failed, Released)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::RoleSwitchAttempted => "role-switch-attempted",
            Self::Active => "active",
            Self::Failed => "failed",
            Self::Released => "released"
        };
        f.write_str(name)
    }
}

/// Counts sessions that currently hold a connection.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    active: Arc<AtomicUsize>
}

impl SessionTracker {
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn lease(&self) -> SessionLease {
        self.active.fetch_add(1, Ordering::SeqCst);
        SessionLease {
            active: Arc::clone(&self.active)
        }
    }
}

#[derive(Debug)]
pub(crate) struct SessionLease {
    active: Arc<AtomicUsize>
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct TenantSession {
    conn: PoolConnection<Postgres>,
    tenant: Option<String>,
    role: Option<String>,
    state: SessionState,
    _lease: SessionLease
}

impl TenantSession {
    /// Session running as the pool's own user.
    pub(crate) fn admin(conn: PoolConnection<Postgres>, lease: SessionLease) -> Self {
        let mut session = Self {
            conn,
            tenant: None,
            role: None,
            state: SessionState::Created,
            _lease: lease
        };
        session.transition(SessionState::Active);
        session
    }

    /// Session running as `role` on behalf of `tenant`.
    pub(crate) async fn for_tenant(
        mut conn: PoolConnection<Postgres>,
        lease: SessionLease,
        tenant: &str,
        role: &str
    ) -> Result<Self> {
        conn.close_on_drop();
        let mut session = Self {
            conn,
            tenant: Some(tenant.to_string()),
            role: Some(role.to_string()),
            state: SessionState::Created,
            _lease: lease
        };
        session.switch_role(tenant, role).await?;
        Ok(session)
    }

    async fn switch_role(&mut self, tenant: &str, role: &str) -> Result<()> {
        self.transition(SessionState::RoleSwitchAttempted);
        let sql = format!("SET SESSION ROLE {}", quote_ident(role)?);

        match sqlx::query(AssertSqlSafe(sql.as_str()))
            .persistent(false)
            .execute(&mut *self.conn)
            .await
        {
            Ok(_) => {
                self.transition(SessionState::Active);
                debug!(tenant = %tenant, role = %role, "Session role switched");
                Ok(())
            }
            Err(e) => {
                self.transition(SessionState::Failed);
                if classify(&e) == Some(DbCondition::UndefinedObject) {
                    warn!(tenant = %tenant, "Session requested for unknown tenant");
                    Err(TenancyError::not_found(tenant))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid session transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Tenant slug this session is bound to; `None` for admin sessions.
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn is_admin(&self) -> bool {
        self.tenant.is_none()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Effective role of the connection as reported by the database.
    pub async fn current_user(&mut self) -> Result<String> {
        let user = sqlx::query_scalar("SELECT current_user::text")
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(user)
    }

    /// Releases the session now instead of at end of scope.
    pub fn release(self) {}
}

impl Deref for TenantSession {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for TenantSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for TenantSession {
    fn drop(&mut self) {
        let from = self.state;
        self.transition(SessionState::Released);
        debug!(
            tenant = self.tenant.as_deref().unwrap_or("<admin>"),
            from = %from,
            "Session released"
        );
    }
}

impl fmt::Debug for TenantSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantSession")
            .field("tenant", &self.tenant)
            .field("role", &self.role)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
