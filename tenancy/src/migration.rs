//! # Migration Directive Injector
//!
//! Hooks into migration generation and appends the operations that bring
//! every RLS-marked table to its target state: resolver function present,
//! row-level security enabled, isolation policy created.
//!
//! Tables are addressed as `<schema>.<table>` in the configured schema, both
//! in catalog lookups and in the emitted DDL. The resolver counts as present
//! only when its stored body matches the one rendered for the current role
//! prefix. The injector only compares declared tables against the live
//! catalog, so running it again after the generated migration has been
//! applied yields no operations.

use std::collections::HashSet;

use async_trait::async_trait;
use config::TenancySettings;
use errors::{Result, TenancyError};
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::identifier::{ensure_plain, qualified_name};
use crate::model::{Metadata, RlsTable};
use crate::policy::{
    PolicyTemplate, enable_rls_statement, normalize_sql, render_resolver_function,
    resolver_function_body,
};

/// A single upgrade operation of a migration script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MigrationOp {
    /// Raw SQL executed verbatim.
    ExecuteSql { sql: String },
    /// Operation produced by the schema differ; opaque to this crate.
    Autogenerated { description: String }
}

impl MigrationOp {
    pub fn execute_sql(sql: impl Into<String>) -> Self {
        Self::ExecuteSql { sql: sql.into() }
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::ExecuteSql { sql } => Some(sql),
            Self::Autogenerated { .. } => None
        }
    }
}

/// A migration script being generated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationScript {
    pub message: Option<String>,
    pub upgrade_ops: Vec<MigrationOp>,
    pub downgrade_ops: Vec<MigrationOp>
}

impl MigrationScript {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Revision identifiers the script is generated against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionIds {
    pub heads: Vec<String>,
    pub new_revision: Option<String>
}

/// What the generator hands to revision hooks.
pub struct MigrationContext<'a> {
    connection: Option<&'a mut dyn Catalog>
}

impl<'a> MigrationContext<'a> {
    pub fn new(connection: &'a mut dyn Catalog) -> Self {
        Self {
            connection: Some(connection)
        }
    }

    /// Context without a live connection, as in offline generation.
    pub fn offline() -> Self {
        Self { connection: None }
    }

    pub fn connection(&mut self) -> Option<&mut (dyn Catalog + 'a)> {
        self.connection.as_deref_mut()
    }
}

/// Hook invoked while a migration is being generated.
#[async_trait]
pub trait ProcessRevisionDirectives: Send + Sync {
    async fn process_revision_directives(
        &self,
        context: &mut MigrationContext<'_>,
        revision: &RevisionIds,
        directives: &mut Vec<MigrationScript>
    ) -> Result<()>;
}

/// Builds the RLS hook over every table marked in `collections`.
pub fn get_process_revision_directives<'m>(
    collections: impl IntoIterator<Item = &'m Metadata>,
    settings: &TenancySettings
) -> Result<RlsDirectiveInjector> {
    RlsDirectiveInjector::new(collections, settings)
}

#[derive(Debug, Clone)]
pub struct RlsDirectiveInjector {
    tables: Vec<RlsTable>,
    template: PolicyTemplate,
    schema: String,
    resolver_function: String,
    role_prefix: String
}

impl RlsDirectiveInjector {
    pub fn new<'m>(
        collections: impl IntoIterator<Item = &'m Metadata>,
        settings: &TenancySettings
    ) -> Result<Self> {
        ensure_plain(&settings.schema)?;
        ensure_plain(&settings.resolver_function)?;
        ensure_plain(&settings.policy_name)?;
        ensure_plain(&settings.role_prefix)?;

        let mut seen = HashSet::new();
        let mut tables = Vec::new();
        for metadata in collections {
            for table in metadata.rls_tables() {
                ensure_plain(&table.name)?;
                if seen.insert(table.name.clone()) {
                    tables.push(table.clone());
                }
            }
        }

        Ok(Self {
            tables,
            template: PolicyTemplate::new(
                settings.policy_name.clone(),
                settings.qualified_resolver()
            ),
            schema: settings.schema.clone(),
            resolver_function: settings.resolver_function.clone(),
            role_prefix: settings.role_prefix.clone()
        })
    }

    pub fn tables(&self) -> &[RlsTable] {
        &self.tables
    }

    pub fn template(&self) -> &PolicyTemplate {
        &self.template
    }

    /// Operations still needed for the catalog to match the declared tables.
    pub async fn plan<C>(&self, catalog: &mut C) -> Result<Vec<MigrationOp>>
    where
        C: Catalog + ?Sized
    {
        let mut ops = Vec::new();
        if self.tables.is_empty() {
            return Ok(ops);
        }

        let expected_body = resolver_function_body(&self.role_prefix);
        let current = catalog
            .function_source(&self.schema, &self.resolver_function)
            .await?;
        let up_to_date = current
            .as_deref()
            .is_some_and(|source| normalize_sql(source) == expected_body);
        if !up_to_date {
            debug!(
                function = %self.template.resolver(),
                exists = current.is_some(),
                "Resolver function missing or outdated"
            );
            ops.push(MigrationOp::execute_sql(render_resolver_function(
                &self.schema,
                &self.resolver_function,
                &self.role_prefix
            )));
        }

        for table in &self.tables {
            let qualified = qualified_name(&self.schema, &table.name);
            let name = qualified.as_str();
            let before = ops.len();
            if !catalog.row_security_enabled(name).await? {
                debug!(table = %name, "Row level security not enabled");
                ops.push(MigrationOp::execute_sql(enable_rls_statement(name)));
            }
            if !catalog
                .policy_exists(name, self.template.policy_name())
                .await?
            {
                debug!(table = %name, "Isolation policy missing");
                ops.push(MigrationOp::execute_sql(self.template.render(name)));
            }
            if ops.len() == before {
                debug!(table = %name, "Table already isolated");
            }
        }

        Ok(ops)
    }

    /// Executes the planned operations against `catalog`, returning them.
    pub async fn apply<C>(&self, catalog: &mut C) -> Result<Vec<MigrationOp>>
    where
        C: Catalog + ?Sized
    {
        let ops = self.plan(catalog).await?;
        for op in &ops {
            if let Some(sql) = op.sql() {
                catalog.execute(sql).await?;
            }
        }
        info!(operations = ops.len(), "Applied row level security operations");
        Ok(ops)
    }
}

#[async_trait]
impl ProcessRevisionDirectives for RlsDirectiveInjector {
    async fn process_revision_directives(
        &self,
        context: &mut MigrationContext<'_>,
        revision: &RevisionIds,
        directives: &mut Vec<MigrationScript>
    ) -> Result<()> {
        let Some(script) = directives.first_mut() else {
            return Ok(());
        };
        let catalog = context
            .connection()
            .ok_or(TenancyError::MissingConnection)?;

        let ops = self.plan(catalog).await?;
        info!(
            revision = revision.new_revision.as_deref().unwrap_or("<unnamed>"),
            operations = ops.len(),
            "Injected row level security operations"
        );
        script.upgrade_ops.extend(ops);
        Ok(())
    }
}
