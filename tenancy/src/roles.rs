//! Tenant role lifecycle.
//!
//! A tenant is a database role named `<prefix><slug>`. Creating it grants
//! table privileges in the tenant schema (current and future tables) and
//! makes the administrative role a member, so admin sessions can
//! `SET SESSION ROLE` into it. Deleting it reassigns and drops anything the
//! role owns before dropping the role itself.
//!
//! Every operation runs against a [`Catalog`]; callers own the transaction.

use std::collections::HashSet;

use config::TenancySettings;
use errors::{Result, TenancyError};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, DbCondition, classify};
use crate::identifier::{RoleNaming, ensure_plain, quote_ident};

/// Table privileges granted to every tenant role.
pub const TENANT_TABLE_PRIVILEGES: &str = "SELECT, INSERT, UPDATE, DELETE";

/// Sequence privileges granted so tenants can insert into serial columns.
pub const TENANT_SEQUENCE_PRIVILEGES: &str = "USAGE, SELECT";

#[derive(Debug, Clone)]
pub struct TenantRoles {
    naming: RoleNaming,
    schema: String
}

impl TenantRoles {
    pub fn new(settings: &TenancySettings) -> Result<Self> {
        ensure_plain(&settings.schema)?;
        Ok(Self {
            naming: RoleNaming::new(settings.role_prefix.clone())?,
            schema: settings.schema.clone()
        })
    }

    pub fn naming(&self) -> &RoleNaming {
        &self.naming
    }

    pub fn role_name(&self, slug: &str) -> Result<String> {
        self.naming.role_name(slug)
    }

    /// Role name for a tenant that is expected to exist. A slug that cannot
    /// form a role name has no role, so it is reported as `TenantNotFound`.
    pub fn existing_role_name(&self, slug: &str) -> Result<String> {
        self.naming
            .role_name(slug)
            .map_err(|_| TenancyError::not_found(slug))
    }

    /// Statements creating `role` and granting it access, in execution order.
    /// Both names must already be quoted.
    pub fn create_statements(&self, role: &str, admin: &str) -> Vec<String> {
        let schema = &self.schema;
        vec![
            format!("CREATE ROLE {}", role),
            format!("GRANT {} TO {}", role, admin),
            format!("GRANT USAGE ON SCHEMA {} TO {}", schema, role),
            format!(
                "GRANT {} ON ALL TABLES IN SCHEMA {} TO {}",
                TENANT_TABLE_PRIVILEGES, schema, role
            ),
            format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA {} GRANT {} ON TABLES TO {}",
                schema, TENANT_TABLE_PRIVILEGES, role
            ),
            format!(
                "GRANT {} ON ALL SEQUENCES IN SCHEMA {} TO {}",
                TENANT_SEQUENCE_PRIVILEGES, schema, role
            ),
            format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA {} GRANT {} ON SEQUENCES TO {}",
                schema, TENANT_SEQUENCE_PRIVILEGES, role
            ),
        ]
    }

    /// Statements removing `role`, in execution order. Both names must
    /// already be quoted.
    pub fn drop_statements(&self, role: &str, admin: &str) -> Vec<String> {
        vec![
            format!("REASSIGN OWNED BY {} TO {}", role, admin),
            format!("DROP OWNED BY {}", role),
            format!("DROP ROLE {}", role),
        ]
    }

    pub async fn exists<C>(&self, catalog: &mut C, slug: &str) -> Result<bool>
    where
        C: Catalog + ?Sized
    {
        match self.naming.role_name(slug) {
            Ok(role) => Ok(catalog.role_exists(&role).await?),
            Err(_) => Ok(false)
        }
    }

    /// Creates the tenant role for `slug`.
    pub async fn create<C>(&self, catalog: &mut C, slug: &str) -> Result<()>
    where
        C: Catalog + ?Sized
    {
        let role = self.role_name(slug)?;
        let quoted_role = quote_ident(&role)?;

        if catalog.role_exists(&role).await? {
            return Err(TenancyError::already_exists(slug));
        }

        let admin = catalog.current_user().await?;
        let quoted_admin = quote_ident(&admin)?;

        for (step, sql) in self
            .create_statements(&quoted_role, &quoted_admin)
            .iter()
            .enumerate()
        {
            debug!(tenant = %slug, statement = %sql, "Provisioning tenant role");
            if let Err(e) = catalog.execute(sql).await {
                if step == 0 && classify(&e) == Some(DbCondition::DuplicateObject) {
                    warn!(tenant = %slug, "Tenant role was created concurrently");
                    return Err(TenancyError::already_exists(slug));
                }
                return Err(e.into());
            }
        }

        info!(tenant = %slug, role = %role, "Created tenant");
        Ok(())
    }

    /// Removes the tenant role for `slug` and everything it owns.
    pub async fn delete<C>(&self, catalog: &mut C, slug: &str) -> Result<()>
    where
        C: Catalog + ?Sized
    {
        let role = self.existing_role_name(slug)?;
        let quoted_role = quote_ident(&role)?;

        if !catalog.role_exists(&role).await? {
            return Err(TenancyError::not_found(slug));
        }

        let admin = catalog.current_user().await?;
        let quoted_admin = quote_ident(&admin)?;

        for sql in self.drop_statements(&quoted_role, &quoted_admin) {
            debug!(tenant = %slug, statement = %sql, "Removing tenant role");
            if let Err(e) = catalog.execute(&sql).await {
                if classify(&e) == Some(DbCondition::UndefinedObject) {
                    warn!(tenant = %slug, "Tenant role was dropped concurrently");
                    return Err(TenancyError::not_found(slug));
                }
                return Err(e.into());
            }
        }

        info!(tenant = %slug, role = %role, "Deleted tenant");
        Ok(())
    }

    /// Slugs of every existing tenant role.
    pub async fn list<C>(&self, catalog: &mut C) -> Result<HashSet<String>>
    where
        C: Catalog + ?Sized
    {
        let roles = catalog.roles_with_prefix(self.naming.prefix()).await?;
        Ok(roles
            .iter()
            .filter_map(|role| self.naming.slug_of(role))
            .map(str::to_string)
            .collect())
    }
}
