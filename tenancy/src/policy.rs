//! # Policy Template Engine
//!
//! Renders the DDL that enables row-level security on a table and the
//! permissive policy restricting every command to rows whose `tenant`
//! column equals the tenant resolved from the session role.
//!
//! Rendering is pure: identical inputs always produce byte-identical text,
//! so generated migrations are stable across runs.

use crate::identifier::quote_literal;

/// Policy created on every RLS table unless the settings name another.
pub const DEFAULT_POLICY_NAME: &str = "tenant_select_policy";

/// Function policies call to resolve the session's tenant.
pub const DEFAULT_RESOLVER_FUNCTION: &str = "tenancy_current_tenant";

/// Renders the isolation policy for `table_name` under the default policy
/// name, using `resolver_function_name` to resolve the session tenant.
pub fn render_policy(table_name: &str, resolver_function_name: &str) -> String {
    PolicyTemplate::new(DEFAULT_POLICY_NAME, resolver_function_name).render(table_name)
}

/// `ALTER TABLE ... ENABLE ROW LEVEL SECURITY` for `table_name`.
pub fn enable_rls_statement(table_name: &str) -> String {
    format!("ALTER TABLE {} ENABLE ROW LEVEL SECURITY", table_name.trim())
}

/// Policy template bound to a policy name and resolver function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTemplate {
    policy_name: String,
    resolver: String
}

impl PolicyTemplate {
    pub fn new(policy_name: impl Into<String>, resolver: impl Into<String>) -> Self {
        Self {
            policy_name: policy_name.into().trim().to_string(),
            resolver: resolver.into().trim().to_string()
        }
    }

    pub fn policy_name(&self) -> &str {
        &self.policy_name
    }

    pub fn resolver(&self) -> &str {
        &self.resolver
    }

    pub fn render(&self, table_name: &str) -> String {
        let predicate = format!("tenant = ( select {}()::varchar )", self.resolver);
        let lines = [
            format!("CREATE POLICY {}", self.policy_name),
            format!("ON {}", table_name.trim()),
            "AS PERMISSIVE".to_string(),
            "FOR ALL".to_string(),
            "USING (".to_string(),
            format!("    {}", predicate),
            ")".to_string(),
            "WITH CHECK (".to_string(),
            format!("    {}", predicate),
            ")".to_string()
        ];
        lines.join("\n")
    }
}

impl Default for PolicyTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_POLICY_NAME, DEFAULT_RESOLVER_FUNCTION)
    }
}

/// `CREATE OR REPLACE FUNCTION` for the tenant resolver.
///
/// The function returns the part of `current_user` following `role_prefix`,
/// or NULL when the session does not run under a tenant role. Admin sessions
/// therefore match no rows through the policy predicate.
pub fn render_resolver_function(schema: &str, function: &str, role_prefix: &str) -> String {
    [
        format!("CREATE OR REPLACE FUNCTION {}.{}()", schema.trim(), function.trim()),
        "RETURNS varchar".to_string(),
        "LANGUAGE sql".to_string(),
        "STABLE".to_string(),
        "AS $$".to_string(),
        resolver_function_body(role_prefix),
        "$$".to_string()
    ]
    .join("\n")
}

/// Body of the resolver function, as stored in `pg_proc.prosrc` once
/// normalized with [`normalize_sql`].
pub fn resolver_function_body(role_prefix: &str) -> String {
    let prefix_len = role_prefix.chars().count();
    [
        "    SELECT CASE".to_string(),
        format!(
            "        WHEN left(current_user::text, {}) = {}",
            prefix_len,
            quote_literal(role_prefix)
        ),
        format!(
            "        THEN substr(current_user::text, {})::varchar",
            prefix_len + 1
        ),
        "    END".to_string()
    ]
    .join("\n")
}

/// Normalizes whitespace in a SQL snippet: trailing spaces go, CRLF becomes
/// LF and surrounding blank lines are dropped. Rendered text is already
/// normalized, so this is what SQL read back from elsewhere is compared in.
pub fn normalize_sql(sql: &str) -> String {
    sql.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED_ORDERS: &str = "CREATE POLICY tenant_select_policy
ON orders
AS PERMISSIVE
FOR ALL
USING (
    tenant = ( select tenancy_current_tenant()::varchar )
)
WITH CHECK (
    tenant = ( select tenancy_current_tenant()::varchar )
)";

    #[test]
    fn test_render_policy_matches_template() {
        assert_eq!(
            render_policy("orders", "tenancy_current_tenant"),
            EXPECTED_ORDERS
        );
    }

    #[test]
    fn test_render_policy_is_deterministic() {
        let first = render_policy("invoices", "public.current_tenant");
        let second = render_policy("invoices", "public.current_tenant");
        assert_eq!(first, second);
        assert_eq!(normalize_sql(&first), first);
        assert!(first.contains("ON invoices\n"));
        assert!(first.contains("select public.current_tenant()::varchar"));
    }

    #[test]
    fn test_render_trims_surrounding_whitespace() {
        assert_eq!(
            render_policy("  orders\n", " tenancy_current_tenant "),
            EXPECTED_ORDERS
        );
    }

    #[test]
    fn test_custom_policy_name() {
        let template = PolicyTemplate::new("isolate_tenant", "app.whoami");
        let sql = template.render("orders");
        assert!(sql.starts_with("CREATE POLICY isolate_tenant\nON orders"));
        assert_eq!(template.policy_name(), "isolate_tenant");
    }

    #[test]
    fn test_enable_rls_statement() {
        assert_eq!(
            enable_rls_statement("orders"),
            "ALTER TABLE orders ENABLE ROW LEVEL SECURITY"
        );
    }

    #[test]
    fn test_resolver_function_strips_prefix() {
        let sql = render_resolver_function("public", "tenancy_current_tenant", "tenant_");
        assert!(sql.starts_with("CREATE OR REPLACE FUNCTION public.tenancy_current_tenant()"));
        assert!(sql.contains("left(current_user::text, 7) = 'tenant_'"));
        assert!(sql.contains("substr(current_user::text, 8)::varchar"));
        assert_eq!(normalize_sql(&sql), sql);
    }

    #[test]
    fn test_resolver_body_is_embedded_verbatim() {
        let body = resolver_function_body("org_");
        let sql = render_resolver_function("app", "whoami", "org_");
        assert!(sql.contains(&format!("AS $$\n{}\n$$", body)));
        assert_eq!(normalize_sql(&format!("\n{}\n", body)), body);
        assert_ne!(body, resolver_function_body("tenant_"));
    }

    #[test]
    fn test_normalize_sql() {
        assert_eq!(normalize_sql("\nSELECT 1   \r\nFROM t \n\n"), "SELECT 1\nFROM t");
    }
}
