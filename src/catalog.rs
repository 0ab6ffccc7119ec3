//! Catalog browsing: databases, schemas and tables

use serde::Serialize;
use std::sync::Arc;

use crate::error::{AdminError, Result};
use crate::orchestrator::ExecutionOrchestrator;
use crate::result::{ResultSet, Value};
use crate::types::ExecutionContext;

const DATABASES_SQL: &str = "SELECT datname FROM pg_database ORDER BY datname";

const SCHEMAS_SQL: &str = "\
SELECT schema_name
FROM svv_all_schemas
WHERE database_name = :database
ORDER BY schema_name";

const TABLES_SQL: &str = "\
SELECT table_name, table_type
FROM svv_all_tables
WHERE database_name = :database
  AND schema_name = :schema
ORDER BY table_name";

/// One table or view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    /// Table name
    pub name: String,
    /// `TABLE`, `VIEW`, `EXTERNAL TABLE`, ...
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,
}

/// Catalog reader
pub struct Catalog {
    orchestrator: Arc<ExecutionOrchestrator>,
    context: ExecutionContext,
}

impl Catalog {
    /// Reader running statements under `context`
    pub fn new(orchestrator: Arc<ExecutionOrchestrator>, context: ExecutionContext) -> Self {
        Self {
            orchestrator,
            context,
        }
    }

    /// Database names
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let result = self.orchestrator.execute(DATABASES_SQL, &self.context).await?;
        text_column(&result, "datname")
    }

    /// Schema names in `database`
    pub async fn list_schemas(&self, database: &str) -> Result<Vec<String>> {
        let database = identifier("database", database)?;
        let ctx = self.context.clone().with_parameter("database", database);
        let result = self.orchestrator.execute(SCHEMAS_SQL, &ctx).await?;
        text_column(&result, "schema_name")
    }

    /// Tables in `database`.`schema`
    pub async fn list_tables(&self, database: &str, schema: &str) -> Result<Vec<TableInfo>> {
        let database = identifier("database", database)?;
        let schema = identifier("schema", schema)?;
        let ctx = self
            .context
            .clone()
            .with_parameter("database", database)
            .with_parameter("schema", schema);
        let result = self.orchestrator.execute(TABLES_SQL, &ctx).await?;

        let names = text_column(&result, "table_name")?;
        Ok(names
            .into_iter()
            .zip(result.rows())
            .map(|(name, row)| TableInfo {
                name,
                table_type: row
                    .get("table_type")
                    .and_then(Value::as_str)
                    .map(|t| t.trim().to_string()),
            })
            .collect())
    }
}

fn identifier<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AdminError::invalid(format!("{} name cannot be empty", what)));
    }
    Ok(trimmed)
}

fn text_column(result: &ResultSet, column: &str) -> Result<Vec<String>> {
    result
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| match row.get(column) {
            Some(Value::String(s)) => Ok(s.trim().to_string()),
            Some(other) => Err(AdminError::materialization(format!(
                "row {}: '{}' is not text: {}",
                i + 1,
                column,
                other
            ))),
            None => Err(AdminError::materialization(format!(
                "missing column '{}'",
                column
            ))),
        })
        .collect()
}
