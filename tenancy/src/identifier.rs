//! Identifier rules for roles and structural DDL names.
//!
//! Tenant slugs end up inside `CREATE ROLE` and `SET SESSION ROLE`, so they
//! are always double-quoted. Table, schema, function and policy names are
//! interpolated unquoted and must therefore be plain identifiers.

use config::is_plain_identifier;
use errors::{Result, TenancyError};

/// Postgres truncates identifiers longer than this many bytes.
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Quotes `name` as a Postgres identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(TenancyError::invalid_identifier(name, "identifier is empty"));
    }
    if name.contains('\0') {
        return Err(TenancyError::invalid_identifier(
            name,
            "identifier contains a NUL byte"
        ));
    }
    if name.len() > MAX_IDENTIFIER_BYTES {
        return Err(TenancyError::invalid_identifier(
            name,
            format!("identifier is longer than {} bytes", MAX_IDENTIFIER_BYTES)
        ));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quotes `value` as a SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Accepts `name` only if it can be interpolated into DDL without quoting.
pub fn ensure_plain(name: &str) -> Result<&str> {
    if is_plain_identifier(name) {
        Ok(name)
    } else {
        Err(TenancyError::invalid_identifier(
            name,
            "expected a plain SQL identifier ([A-Za-z_][A-Za-z0-9_$]*, at most 63 bytes)"
        ))
    }
}

/// `schema.name`, for names already checked with [`ensure_plain`].
pub fn qualified_name(schema: &str, name: &str) -> String {
    format!("{}.{}", schema.trim(), name.trim())
}

/// Maps tenant slugs to role names and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleNaming {
    prefix: String
}

impl RoleNaming {
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        ensure_plain(&prefix)?;
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Role name for `slug`. Fails when the slug is empty, contains NUL, or
    /// the combined name would be silently truncated by Postgres.
    pub fn role_name(&self, slug: &str) -> Result<String> {
        if slug.is_empty() {
            return Err(TenancyError::invalid_identifier(slug, "tenant slug is empty"));
        }
        let role = format!("{}{}", self.prefix, slug);
        quote_ident(&role)?;
        Ok(role)
    }

    /// Tenant slug of `role`, if the role carries this prefix.
    pub fn slug_of<'r>(&self, role: &'r str) -> Option<&'r str> {
        role.strip_prefix(self.prefix.as_str())
            .filter(|slug| !slug.is_empty())
    }
}

impl Default for RoleNaming {
    fn default() -> Self {
        Self {
            prefix: "tenant_".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(quote_ident("tenant_acme").unwrap(), "\"tenant_acme\"");
        assert_eq!(
            quote_ident("tenant_a\"b").unwrap(),
            "\"tenant_a\"\"b\""
        );
        assert_eq!(
            quote_ident("tenant_O'Brien & Co").unwrap(),
            "\"tenant_O'Brien & Co\""
        );
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified_name("app", "orders"), "app.orders");
        assert_eq!(qualified_name(" public", "orders\n"), "public.orders");
    }

    #[test]
    fn test_quote_ident_rejects_unrepresentable_names() {
        assert!(matches!(
            quote_ident(""),
            Err(TenancyError::InvalidIdentifier { .. })
        ));
        assert!(quote_ident("a\0b").is_err());
        assert!(quote_ident(&"x".repeat(63)).is_ok());
        assert!(quote_ident(&"x".repeat(64)).is_err());
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("tenant_"), "'tenant_'");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_role_naming_round_trip() {
        let naming = RoleNaming::default();
        let role = naming.role_name("acme").unwrap();
        assert_eq!(role, "tenant_acme");
        assert_eq!(naming.slug_of(&role), Some("acme"));
        assert_eq!(naming.slug_of("postgres"), None);
        assert_eq!(naming.slug_of("tenant_"), None);
    }

    #[test]
    fn test_role_name_length_counts_the_prefix() {
        let naming = RoleNaming::default();
        let fits = "a".repeat(MAX_IDENTIFIER_BYTES - "tenant_".len());
        assert!(naming.role_name(&fits).is_ok());
        let too_long = format!("{}a", fits);
        assert!(naming.role_name(&too_long).is_err());
        // multi-byte characters count by bytes
        assert!(naming.role_name(&"é".repeat(28)).is_ok());
        assert!(naming.role_name(&"é".repeat(29)).is_err());
    }

    #[test]
    fn test_role_naming_rejects_bad_prefix() {
        assert!(RoleNaming::new("tenant-").is_err());
        assert!(RoleNaming::new("t_").is_ok());
    }

    #[test]
    fn test_ensure_plain() {
        assert!(ensure_plain("orders").is_ok());
        assert!(ensure_plain("orders; DROP TABLE users").is_err());
        assert!(ensure_plain("1orders").is_err());
    }
}
