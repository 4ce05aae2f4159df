//! Target table definition and SQL generation
//!
//! The table is keyed by an `id` column. Every other column is nullable so
//! that records may omit fields. Identifiers are validated once, when the
//! schema is built, and then spliced into SQL text quoted.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default target table name
pub const DEFAULT_TABLE_NAME: &str = "d_products";

/// Name of the primary key column every schema must declare
pub const PRIMARY_KEY: &str = "id";

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]{0,62}$";

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("'{0}' is not a valid SQL identifier")]
    InvalidIdentifier(String),

    #[error("table '{0}' has no 'id' column")]
    MissingPrimaryKey(String),

    #[error("column '{0}' is declared twice")]
    DuplicateColumn(String),

    #[error("primary key must be bigint or text, got {0}")]
    UnsupportedKeyKind(ColumnKind),

    #[error("identifier pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    BigInt,
    Double,
    Text,
    Boolean,
    /// Nested documents; JSONB on Postgres, TEXT on SQLite
    Json,
}

impl ColumnKind {
    pub fn sql_type(self, dialect: Dialect) -> &'static str {
        match (self, dialect) {
            (ColumnKind::BigInt, _) => "BIGINT",
            (ColumnKind::Double, Dialect::Postgres) => "DOUBLE PRECISION",
            (ColumnKind::Double, Dialect::Sqlite) => "REAL",
            (ColumnKind::Text, _) => "TEXT",
            (ColumnKind::Boolean, _) => "BOOLEAN",
            (ColumnKind::Json, Dialect::Postgres) => "JSONB",
            (ColumnKind::Json, Dialect::Sqlite) => "TEXT",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::BigInt => "bigint",
            ColumnKind::Double => "double",
            ColumnKind::Text => "text",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Json => "json",
        };
        f.write_str(name)
    }
}

/// SQL flavour of a target store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    fn placeholder(self, position: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", position),
            Dialect::Sqlite => format!("?{}", position),
        }
    }
}

/// What an upsert does when the `id` already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// First write wins; later duplicates are ignored
    #[default]
    Skip,
    /// Last write wins; non-key columns are replaced
    Overwrite,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" | "ignore" | "nothing" => Ok(ConflictPolicy::Skip),
            "overwrite" | "update" | "replace" => Ok(ConflictPolicy::Overwrite),
            other => Err(format!("unknown conflict policy '{}'", other)),
        }
    }
}

/// One column of the target table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Validated table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnDef>,
    key_index: usize,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Result<Self, SchemaError> {
        let name = name.into();
        let pattern = Regex::new(IDENTIFIER_PATTERN)?;

        if !pattern.is_match(&name) {
            return Err(SchemaError::InvalidIdentifier(name));
        }

        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if !pattern.is_match(&column.name) {
                return Err(SchemaError::InvalidIdentifier(column.name.clone()));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.name.clone()));
            }
        }

        let key_index = columns
            .iter()
            .position(|c| c.name == PRIMARY_KEY)
            .ok_or_else(|| SchemaError::MissingPrimaryKey(name.clone()))?;
        let key_kind = columns[key_index].kind;
        if !matches!(key_kind, ColumnKind::BigInt | ColumnKind::Text) {
            return Err(SchemaError::UnsupportedKeyKind(key_kind));
        }

        Ok(Self {
            name,
            columns,
            key_index,
        })
    }

    /// Product catalogue layout: scalar columns plus two JSON columns for
    /// nested data
    pub fn products(name: impl Into<String>) -> Result<Self, SchemaError> {
        Self::new(name, Self::product_columns())
    }

    pub fn product_columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("id", ColumnKind::BigInt),
            ColumnDef::new("name", ColumnKind::Text),
            ColumnDef::new("url_key", ColumnKind::Text),
            ColumnDef::new("price", ColumnKind::BigInt),
            ColumnDef::new("description", ColumnKind::Text),
            ColumnDef::new("images", ColumnKind::Json),
            ColumnDef::new("specifications", ColumnKind::Json),
        ]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> &ColumnDef {
        &self.columns[self.key_index]
    }

    pub fn create_table_sql(&self, dialect: Dialect) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut line = format!("    \"{}\" {}", c.name, c.kind.sql_type(dialect));
                if c.name == PRIMARY_KEY {
                    line.push_str(" PRIMARY KEY");
                }
                line
            })
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n{}\n)",
            self.name,
            columns.join(",\n")
        )
    }

    /// Single-row upsert for the given column list, in that order
    pub fn upsert_sql(&self, columns: &[&str], policy: ConflictPolicy, dialect: Dialect) -> String {
        let names: Vec<String> = columns.iter().map(|c| format!("\"{}\"", c)).collect();
        let placeholders: Vec<String> =
            (1..=columns.len()).map(|i| dialect.placeholder(i)).collect();

        let updates: Vec<String> = columns
            .iter()
            .filter(|c| **c != PRIMARY_KEY)
            .map(|c| format!("\"{0}\" = excluded.\"{0}\"", c))
            .collect();

        let on_conflict = match policy {
            ConflictPolicy::Overwrite if !updates.is_empty() => {
                format!("DO UPDATE SET {}", updates.join(", "))
            },
            _ => "DO NOTHING".to_string(),
        };

        format!(
            "INSERT INTO \"{}\" ({}) VALUES ({}) ON CONFLICT (\"{}\") {}",
            self.name,
            names.join(", "),
            placeholders.join(", "),
            PRIMARY_KEY,
            on_conflict
        )
    }
}

impl Default for TableSchema {
    /// Product layout on `d_products`
    fn default() -> Self {
        Self {
            name: DEFAULT_TABLE_NAME.to_string(),
            columns: Self::product_columns(),
            key_index: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_products_schema() {
        let schema = TableSchema::products(DEFAULT_TABLE_NAME).unwrap();
        assert_eq!(schema.name(), "d_products");
        assert_eq!(schema.primary_key().kind, ColumnKind::BigInt);
        assert_eq!(schema.column("images").unwrap().kind, ColumnKind::Json);
        assert!(schema.column("missing").is_none());
    }

    #[test]
    fn test_default_matches_validated_products() {
        assert_eq!(
            TableSchema::default(),
            TableSchema::products(DEFAULT_TABLE_NAME).unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        let result = TableSchema::products("products; DROP TABLE x");
        assert!(matches!(result, Err(SchemaError::InvalidIdentifier(_))));

        let result = TableSchema::new(
            "t",
            vec![
                ColumnDef::new("id", ColumnKind::BigInt),
                ColumnDef::new("bad-name", ColumnKind::Text),
            ],
        );
        assert!(matches!(result, Err(SchemaError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_requires_primary_key() {
        let result = TableSchema::new("t", vec![ColumnDef::new("name", ColumnKind::Text)]);
        assert!(matches!(result, Err(SchemaError::MissingPrimaryKey(_))));

        let result = TableSchema::new("t", vec![ColumnDef::new("id", ColumnKind::Json)]);
        assert!(matches!(result, Err(SchemaError::UnsupportedKeyKind(ColumnKind::Json))));
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let result = TableSchema::new(
            "t",
            vec![
                ColumnDef::new("id", ColumnKind::BigInt),
                ColumnDef::new("id", ColumnKind::Text),
            ],
        );
        assert!(matches!(result, Err(SchemaError::DuplicateColumn(_))));
    }

    #[test]
    fn test_create_table_sql_per_dialect() {
        let schema = TableSchema::products("d_products").unwrap();

        let pg = schema.create_table_sql(Dialect::Postgres);
        assert!(pg.starts_with("CREATE TABLE IF NOT EXISTS \"d_products\""));
        assert!(pg.contains("\"id\" BIGINT PRIMARY KEY"));
        assert!(pg.contains("\"images\" JSONB"));

        let lite = schema.create_table_sql(Dialect::Sqlite);
        assert!(lite.contains("\"images\" TEXT"));
    }

    #[test]
    fn test_upsert_sql_skip() {
        let schema = TableSchema::products("d_products").unwrap();
        let sql = schema.upsert_sql(&["id", "name"], ConflictPolicy::Skip, Dialect::Postgres);
        assert_eq!(
            sql,
            "INSERT INTO \"d_products\" (\"id\", \"name\") VALUES ($1, $2) ON CONFLICT (\"id\") DO NOTHING"
        );
    }

    #[test]
    fn test_upsert_sql_overwrite() {
        let schema = TableSchema::products("d_products").unwrap();
        let sql = schema.upsert_sql(
            &["id", "name", "price"],
            ConflictPolicy::Overwrite,
            Dialect::Sqlite,
        );
        assert!(sql.contains("VALUES (?1, ?2, ?3)"));
        assert!(sql.ends_with(
            "DO UPDATE SET \"name\" = excluded.\"name\", \"price\" = excluded.\"price\""
        ));

        // Only the key: nothing to overwrite
        let sql = schema.upsert_sql(&["id"], ConflictPolicy::Overwrite, Dialect::Sqlite);
        assert!(sql.ends_with("DO NOTHING"));
    }

    #[test]
    fn test_conflict_policy_from_str() {
        assert_eq!("skip".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Skip);
        assert_eq!("Overwrite".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Overwrite);
        assert!("merge".parse::<ConflictPolicy>().is_err());
    }
}
