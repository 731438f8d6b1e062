//! # Schema Introspection
//!
//! [`Catalog`] is the unit of work that tenant lifecycle and migration logic
//! run against: a handful of catalog lookups plus raw statement execution.
//! [`PgCatalog`] implements it on a live connection, usually a transaction.
//!
//! Table lookups resolve their argument with `to_regclass`, so a table that
//! does not exist yet reads as "RLS not enabled" and "no policy" instead of
//! failing. An unqualified name goes through `search_path`; callers that
//! know the schema pass `schema.table`.

use async_trait::async_trait;
use sqlx::{AssertSqlSafe, PgConnection};

#[async_trait]
pub trait Catalog: Send {
    /// Role the connection currently executes as.
    async fn current_user(&mut self) -> Result<String, sqlx::Error>;

    async fn role_exists(&mut self, role: &str) -> Result<bool, sqlx::Error>;

    /// Role names starting with `prefix`, sorted.
    async fn roles_with_prefix(&mut self, prefix: &str) -> Result<Vec<String>, sqlx::Error>;

    /// Whether row-level security is enabled on `table`.
    async fn row_security_enabled(&mut self, table: &str) -> Result<bool, sqlx::Error>;

    /// Whether a policy named `policy` exists on `table`.
    async fn policy_exists(&mut self, table: &str, policy: &str) -> Result<bool, sqlx::Error>;

    /// Source text of the zero-argument `schema.function`, if it exists.
    async fn function_source(
        &mut self,
        schema: &str,
        function: &str
    ) -> Result<Option<String>, sqlx::Error>;

    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error>;
}

/// [`Catalog`] over a borrowed Postgres connection or transaction.
pub struct PgCatalog<'c> {
    conn: &'c mut PgConnection
}

impl<'c> PgCatalog<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Catalog for PgCatalog<'_> {
    async fn current_user(&mut self) -> Result<String, sqlx::Error> {
        sqlx::query_scalar("SELECT current_user::text")
            .fetch_one(&mut *self.conn)
            .await
    }

    async fn role_exists(&mut self, role: &str) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM pg_roles WHERE rolname::text = $1")
            .bind(role)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(row.is_some())
    }

    async fn roles_with_prefix(&mut self, prefix: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT rolname::text FROM pg_roles WHERE left(rolname::text, char_length($1)) = $1 \
             ORDER BY rolname"
        )
        .bind(prefix)
        .fetch_all(&mut *self.conn)
        .await
    }

    async fn row_security_enabled(&mut self, table: &str) -> Result<bool, sqlx::Error> {
        let enabled: Option<bool> =
            sqlx::query_scalar("SELECT relrowsecurity FROM pg_class WHERE oid = to_regclass($1)")
                .bind(table)
                .fetch_optional(&mut *self.conn)
                .await?;
        Ok(enabled.unwrap_or(false))
    }

    async fn policy_exists(&mut self, table: &str, policy: &str) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            "SELECT 1 FROM pg_policy WHERE polname::text = $1 AND polrelid = to_regclass($2)"
        )
        .bind(policy)
        .bind(table)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(row.is_some())
    }

    async fn function_source(
        &mut self,
        schema: &str,
        function: &str
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT p.prosrc::text FROM pg_proc p JOIN pg_namespace n ON n.oid = p.pronamespace \
             WHERE n.nspname::text = $1 AND p.proname::text = $2 AND p.pronargs = 0"
        )
        .bind(schema)
        .bind(function)
        .fetch_optional(&mut *self.conn)
        .await
    }

    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        sqlx::query(AssertSqlSafe(sql))
            .persistent(false)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}

/// Database conditions the tenant layer translates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbCondition {
    /// The object being created already exists.
    DuplicateObject,
    /// The object being used or dropped does not exist.
    UndefinedObject
}

/// Classifies a SQLSTATE code and message.
///
/// - `42710` (duplicate_object) and `23505` (unique_violation, raised by a
///   concurrent `CREATE ROLE` racing on `pg_authid`) mean the object exists.
/// - `42704` (undefined_object) means it does not. `22023`
///   (invalid_parameter_value) is what `SET ROLE` reports for a missing
///   role, so it counts only when the message says "does not exist".
pub fn classify_sqlstate(code: Option<&str>, message: &str) -> Option<DbCondition> {
    match code? {
        "42710" | "23505" => Some(DbCondition::DuplicateObject),
        "42704" => Some(DbCondition::UndefinedObject),
        "22023" if message.contains("does not exist") => Some(DbCondition::UndefinedObject),
        _ => None
    }
}

/// Classifies a driver error. Anything that is not a database error, or
/// carries an unrecognized code, yields `None` and passes through untouched.
pub fn classify(err: &sqlx::Error) -> Option<DbCondition> {
    let db = err.as_database_error()?;
    let code = db.code();
    classify_sqlstate(code.as_deref(), db.message())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_codes() {
        assert_eq!(
            classify_sqlstate(Some("42710"), "role \"tenant_a\" already exists"),
            Some(DbCondition::DuplicateObject)
        );
        assert_eq!(
            classify_sqlstate(
                Some("23505"),
                "duplicate key value violates unique constraint \"pg_authid_rolname_index\""
            ),
            Some(DbCondition::DuplicateObject)
        );
    }

    #[test]
    fn test_undefined_codes() {
        assert_eq!(
            classify_sqlstate(Some("42704"), "role \"tenant_x\" does not exist"),
            Some(DbCondition::UndefinedObject)
        );
        assert_eq!(
            classify_sqlstate(Some("22023"), "role \"tenant_x\" does not exist"),
            Some(DbCondition::UndefinedObject)
        );
        assert_eq!(
            classify_sqlstate(Some("22023"), "invalid value for parameter"),
            None
        );
    }

    #[test]
    fn test_other_errors_pass_through() {
        assert_eq!(classify_sqlstate(Some("42501"), "permission denied"), None);
        assert_eq!(classify_sqlstate(None, "does not exist"), None);
        assert_eq!(classify(&sqlx::Error::PoolTimedOut), None);
        assert_eq!(classify(&sqlx::Error::RowNotFound), None);
    }
}
