use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tenancy::Catalog;
use tenancy::policy::normalize_sql;

static CREATE_ROLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^CREATE ROLE "((?:[^"]|"")+)"$"#).unwrap());
static DROP_ROLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^DROP ROLE "((?:[^"]|"")+)"$"#).unwrap());
static ENABLE_RLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ALTER TABLE (\S+) ENABLE ROW LEVEL SECURITY$").unwrap());
static CREATE_POLICY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CREATE POLICY (\S+)\s+ON (\S+)").unwrap());
static CREATE_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)^CREATE OR REPLACE FUNCTION ([A-Za-z0-9_$]+)\.([A-Za-z0-9_$]+)\(\).*?AS \$\$(.*)\$\$$"
    )
    .unwrap()
});

/// Schema an unqualified table name resolves to, as with the default
/// `search_path`.
const DEFAULT_SCHEMA: &str = "public";

fn qualify(table: &str) -> String {
    if table.contains('.') {
        table.to_string()
    } else {
        format!("{}.{}", DEFAULT_SCHEMA, table)
    }
}

/// In-memory [`Catalog`] that records every executed statement and applies
/// the DDL this workspace generates to its own state.
///
/// Tables are keyed by `schema.table`; an unqualified name means a table in
/// `public`, so a lookup that forgets the schema misses like it would on a
/// real database. Functions keep their body so changed definitions show.
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    current_user: String,
    roles: BTreeSet<String>,
    rls_tables: HashSet<String>,
    policies: HashSet<(String, String)>,
    functions: HashMap<(String, String), String>,
    statements: Vec<String>,
    fail_on: Option<String>
}

impl MemoryCatalog {
    pub fn new(current_user: impl Into<String>) -> Self {
        Self {
            current_user: current_user.into(),
            roles: BTreeSet::new(),
            rls_tables: HashSet::new(),
            policies: HashSet::new(),
            functions: HashMap::new(),
            statements: Vec::new(),
            fail_on: None
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_rls_enabled(mut self, table: impl Into<String>) -> Self {
        self.rls_tables.insert(qualify(&table.into()));
        self
    }

    pub fn with_policy(mut self, table: impl Into<String>, policy: impl Into<String>) -> Self {
        self.policies.insert((qualify(&table.into()), policy.into()));
        self
    }

    pub fn with_function(
        mut self,
        schema: impl Into<String>,
        name: impl Into<String>,
        body: impl Into<String>
    ) -> Self {
        self.functions
            .insert((schema.into(), name.into()), body.into());
        self
    }

    /// Fails any statement containing `fragment` with an I/O error.
    pub fn fail_on(mut self, fragment: impl Into<String>) -> Self {
        self.fail_on = Some(fragment.into());
        self
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn take_statements(&mut self) -> Vec<String> {
        std::mem::take(&mut self.statements)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_rls_enabled(&self, table: &str) -> bool {
        self.rls_tables.contains(&qualify(table))
    }

    pub fn has_policy(&self, table: &str, policy: &str) -> bool {
        self.policies
            .contains(&(qualify(table), policy.to_string()))
    }

    pub fn has_function(&self, schema: &str, name: &str) -> bool {
        self.function_body(schema, name).is_some()
    }

    pub fn function_body(&self, schema: &str, name: &str) -> Option<&str> {
        self.functions
            .get(&(schema.to_string(), name.to_string()))
            .map(String::as_str)
    }

    fn apply(&mut self, sql: &str) {
        if let Some(caps) = CREATE_ROLE.captures(sql) {
            self.roles.insert(caps[1].replace("\"\"", "\""));
        } else if let Some(caps) = DROP_ROLE.captures(sql) {
            self.roles.remove(&caps[1].replace("\"\"", "\""));
        } else if let Some(caps) = ENABLE_RLS.captures(sql) {
            self.rls_tables.insert(qualify(&caps[1]));
        } else if let Some(caps) = CREATE_POLICY.captures(sql) {
            self.policies
                .insert((qualify(&caps[2]), caps[1].to_string()));
        } else if let Some(caps) = CREATE_FUNCTION.captures(sql) {
            self.functions.insert(
                (caps[1].to_string(), caps[2].to_string()),
                normalize_sql(&caps[3])
            );
        }
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new("postgres")
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn current_user(&mut self) -> Result<String, sqlx::Error> {
        Ok(self.current_user.clone())
    }

    async fn role_exists(&mut self, role: &str) -> Result<bool, sqlx::Error> {
        Ok(self.roles.contains(role))
    }

    async fn roles_with_prefix(&mut self, prefix: &str) -> Result<Vec<String>, sqlx::Error> {
        Ok(self
            .roles
            .iter()
            .filter(|role| role.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn row_security_enabled(&mut self, table: &str) -> Result<bool, sqlx::Error> {
        Ok(self.is_rls_enabled(table))
    }

    async fn policy_exists(&mut self, table: &str, policy: &str) -> Result<bool, sqlx::Error> {
        Ok(self.has_policy(table, policy))
    }

    async fn function_source(
        &mut self,
        schema: &str,
        function: &str
    ) -> Result<Option<String>, sqlx::Error> {
        Ok(self.function_body(schema, function).map(str::to_string))
    }

    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        self.statements.push(sql.to_string());
        if let Some(fragment) = &self.fail_on
            && sql.contains(fragment.as_str())
        {
            return Err(sqlx::Error::Io(std::io::Error::other(format!(
                "injected failure on '{}'",
                fragment
            ))));
        }
        self.apply(sql);
        Ok(())
    }
}
