//! # Tenancy Errors
//!
//! Error handling for the tenant isolation layer.
//!
//! - Uses `thiserror` for structured error definitions
//! - Local validation failures never reach the database
//! - Database errors are either translated into the tenant taxonomy or passed
//!   through unchanged as [`TenancyError::Database`]

use thiserror::Error;

/// Declaration-time model errors.
///
/// Raised while a table is being marked for row-level security, before any
/// database interaction happens. Never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("'{name}' is not a valid table declaration: {reason}")]
    NotATable { name: String, reason: String },

    #[error(
        "Table '{table}' is marked for RLS but is missing a required 'tenant' column. Hint: use \
         TableDef::with_tenant_column() to add it"
    )]
    MissingTenantColumn { table: String },

    #[error(
        "Table '{table}' is marked for RLS but 'tenant' has type '{found}', expected a text type"
    )]
    TenantColumnNotText { table: String, found: String },

    #[error("Table '{table}' is declared more than once")]
    DuplicateTable { table: String },

    #[error("Table '{table}' is not declared in this metadata collection")]
    UnknownTable { table: String }
}

/// Errors produced by tenant lifecycle, session and migration operations.
#[derive(Debug, Error)]
pub enum TenancyError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Tenant '{tenant}' already exists")]
    TenantAlreadyExists { tenant: String },

    #[error("Tenant '{tenant}' not found")]
    TenantNotFound { tenant: String },

    #[error("Invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("No connection available in the migration context")]
    MissingConnection,

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error)
}

impl TenancyError {
    pub fn already_exists(tenant: impl Into<String>) -> Self {
        Self::TenantAlreadyExists {
            tenant: tenant.into()
        }
    }

    pub fn not_found(tenant: impl Into<String>) -> Self {
        Self::TenantNotFound {
            tenant: tenant.into()
        }
    }

    pub fn invalid_identifier(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
            reason: reason.into()
        }
    }

    pub fn is_tenant_not_found(&self) -> bool {
        matches!(self, Self::TenantNotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::TenantAlreadyExists { .. })
    }

    /// Returns the wrapped driver error when this error was passed through.
    pub fn as_database_error(&self) -> Option<&sqlx::Error> {
        match self {
            Self::Database(e) => Some(e),
            _ => None
        }
    }
}

pub type Result<T> = std::result::Result<T, TenancyError>;
