//! Table declarations and the row-level security registry.
//!
//! A [`Metadata`] collection holds declared tables and records which of them
//! have been marked for RLS. Marking validates the table eagerly: it must be
//! a well-formed table with a text-typed `tenant` column.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use config::is_plain_identifier;
use errors::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Column every RLS table must carry.
pub const TENANT_COLUMN: &str = "tenant";

/// Declared type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    Text,
    Varchar(Option<u32>),
    Char(Option<u32>),
    SmallInt,
    Integer,
    BigInt,
    Boolean,
    Numeric,
    Uuid,
    Timestamp,
    TimestampTz,
    Json,
    Jsonb,
    Bytea,
    Other(String)
}

impl ColumnType {
    /// Whether values of this type compare with the resolver's varchar.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text | Self::Varchar(_) | Self::Char(_))
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Varchar(None) => write!(f, "varchar"),
            Self::Varchar(Some(n)) => write!(f, "varchar({})", n),
            Self::Char(None) => write!(f, "char"),
            Self::Char(Some(n)) => write!(f, "char({})", n),
            Self::SmallInt => write!(f, "smallint"),
            Self::Integer => write!(f, "integer"),
            Self::BigInt => write!(f, "bigint"),
            Self::Boolean => write!(f, "boolean"),
            Self::Numeric => write!(f, "numeric"),
            Self::Uuid => write!(f, "uuid"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::TimestampTz => write!(f, "timestamptz"),
            Self::Json => write!(f, "json"),
            Self::Jsonb => write!(f, "jsonb"),
            Self::Bytea => write!(f, "bytea"),
            Self::Other(name) => write!(f, "{}", name)
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err("column type is empty".to_string());
        }

        let (base, length) = match normalized.split_once('(') {
            Some((base, rest)) => {
                let digits = rest
                    .strip_suffix(')')
                    .ok_or_else(|| format!("unterminated type modifier in '{}'", s))?;
                let length = digits
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("invalid length in '{}'", s))?;
                (base.trim().to_string(), Some(length))
            }
            None => (normalized.clone(), None)
        };

        let ty = match base.as_str() {
            "text" => Self::Text,
            "varchar" | "character varying" | "string" => Self::Varchar(length),
            "char" | "character" | "bpchar" => Self::Char(length),
            "smallint" | "int2" => Self::SmallInt,
            "integer" | "int" | "int4" => Self::Integer,
            "bigint" | "int8" => Self::BigInt,
            "boolean" | "bool" => Self::Boolean,
            "numeric" | "decimal" => Self::Numeric,
            "uuid" => Self::Uuid,
            "timestamp" => Self::Timestamp,
            "timestamptz" | "timestamp with time zone" => Self::TimestampTz,
            "json" => Self::Json,
            "jsonb" => Self::Jsonb,
            "bytea" => Self::Bytea,
            _ => Self::Other(normalized)
        };
        Ok(ty)
    }
}

impl TryFrom<String> for ColumnType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool
}

fn default_nullable() -> bool {
    true
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// The `tenant` column added by [`TableDef::with_tenant_column`].
    pub fn tenant() -> Self {
        Self::new(TENANT_COLUMN, ColumnType::Varchar(None)).not_null()
    }
}

/// A declared table: a name and its columns, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnDef>
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new()
        }
    }

    pub fn column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(ColumnDef::new(name, column_type));
        self
    }

    pub fn column_def(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a non-null varchar `tenant` column unless one is already declared.
    pub fn with_tenant_column(mut self) -> Self {
        if self.find_column(TENANT_COLUMN).is_none() {
            self.columns.push(ColumnDef::tenant());
        }
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Checks that this describes a table DDL can be generated for.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let not_a_table = |reason: &str| ConfigurationError::NotATable {
            name: self.name.clone(),
            reason: reason.to_string()
        };

        if self.name.trim().is_empty() {
            return Err(not_a_table("table name is empty"));
        }
        if !is_plain_identifier(&self.name) {
            return Err(not_a_table("table name is not a plain SQL identifier"));
        }
        if self.columns.is_empty() {
            return Err(not_a_table("table has no columns"));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.is_empty() {
                return Err(not_a_table("column name is empty"));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(not_a_table(&format!(
                    "column '{}' is declared twice",
                    column.name
                )));
            }
        }
        Ok(())
    }
}

/// A table accepted for row-level security.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RlsTable {
    pub name: String,
    pub tenant_column_type: ColumnType
}

/// Validates `table` for row-level security.
///
/// Checks run in order: table shape, presence of `tenant`, then its type.
pub fn mark_for_rls(table: &TableDef) -> Result<RlsTable, ConfigurationError> {
    table.validate()?;

    let tenant = table.find_column(TENANT_COLUMN).ok_or_else(|| {
        ConfigurationError::MissingTenantColumn {
            table: table.name.clone()
        }
    })?;

    if !tenant.column_type.is_text() {
        return Err(ConfigurationError::TenantColumnNotText {
            table: table.name.clone(),
            found: tenant.column_type.to_string()
        });
    }

    Ok(RlsTable {
        name: table.name.clone(),
        tenant_column_type: tenant.column_type.clone()
    })
}

/// A collection of declared tables plus the registry of RLS-marked ones.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    tables: Vec<TableDef>,
    index: HashMap<String, usize>,
    rls: HashMap<String, RlsTable>
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a table without row-level security.
    pub fn declare(&mut self, table: TableDef) -> Result<&mut Self, ConfigurationError> {
        table.validate()?;
        if self.index.contains_key(&table.name) {
            return Err(ConfigurationError::DuplicateTable { table: table.name });
        }
        self.index.insert(table.name.clone(), self.tables.len());
        self.tables.push(table);
        Ok(self)
    }

    /// Declares a table and marks it for row-level security. Nothing is
    /// declared when the table fails validation.
    pub fn declare_with_rls(&mut self, table: TableDef) -> Result<RlsTable, ConfigurationError> {
        let rls = mark_for_rls(&table)?;
        self.declare(table)?;
        self.rls.insert(rls.name.clone(), rls.clone());
        Ok(rls)
    }

    /// Marks an already declared table for row-level security.
    pub fn mark_for_rls(&mut self, name: &str) -> Result<RlsTable, ConfigurationError> {
        let table = self
            .table(name)
            .ok_or_else(|| ConfigurationError::UnknownTable {
                table: name.to_string()
            })?;
        let rls = mark_for_rls(table)?;
        self.rls.insert(rls.name.clone(), rls.clone());
        Ok(rls)
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.index.get(name).map(|&i| &self.tables[i])
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn is_rls_enabled(&self, name: &str) -> bool {
        self.rls.contains_key(name)
    }

    /// RLS tables in declaration order.
    pub fn rls_tables(&self) -> impl Iterator<Item = &RlsTable> {
        self.tables.iter().filter_map(|t| self.rls.get(&t.name))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Builds a collection from a parsed model file.
    pub fn from_model_file(file: ModelFile) -> Result<Self, ConfigurationError> {
        let mut metadata = Self::new();
        for declaration in file.tables {
            if declaration.rls {
                metadata.declare_with_rls(declaration.table)?;
            } else {
                metadata.declare(declaration.table)?;
            }
        }
        Ok(metadata)
    }
}

/// On-disk table declarations (TOML or YAML).
///
/// ```toml
/// [[tables]]
/// name = "orders"
/// rls = true
/// columns = [
///     { name = "id", type = "bigint" },
///     { name = "tenant", type = "varchar(64)" },
/// ]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFile {
    #[serde(default)]
    pub tables: Vec<TableDeclaration>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDeclaration {
    #[serde(flatten)]
    pub table: TableDef,
    #[serde(default)]
    pub rls: bool
}
