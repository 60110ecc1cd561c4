use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use tracing::debug;

use crate::domain::ports::{RowFetcher, RowWriter};
use crate::domain::query::QuerySpec;
use crate::domain::row::RowMap;
use crate::domain::value_objects::{Schema, TableName};
use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::row_mapper::row_to_map;
use crate::infrastructure::db::sql_utils::{build_insert_query, build_select_query};

/// Connect to the database described in `cfg` and return the shared pool.
///
/// The pool is a stateless handle, safe to clone into any number of fetchers
/// and listeners.
pub async fn connect(cfg: &DbConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.url())
        .await
        .with_context(|| format!("Failed to connect to {} on {}", cfg.dbname, cfg.host))?;

    debug!("Connected to {}/{}", cfg.host, cfg.dbname);
    Ok(pool)
}

/// Postgres implementation of the read and write ports.
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Bind a JSON value with the closest matching Postgres type.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) if n.is_i64() => query.bind(n.as_i64()),
        Value::Number(n) => query.bind(n.as_f64()),
        Value::String(s) => query.bind(s.clone()),
        Value::Null => query.bind(Option::<String>::None),
        other => query.bind(other.to_string()),
    }
}

#[async_trait]
impl RowFetcher for PgBackend {
    async fn fetch_rows(&self, spec: &QuerySpec) -> Result<Vec<RowMap>> {
        let sql = build_select_query(spec);
        debug!("Executing: {}", sql);

        let mut query = sqlx::query(&sql);
        if let Some(filter) = &spec.filter {
            query = bind_value(query, &filter.value);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to query {}.{}", spec.schema.0, spec.table.0))?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            result.push(row_to_map(row)?);
        }
        Ok(result)
    }
}

#[async_trait]
impl RowWriter for PgBackend {
    async fn insert_row(&self, schema: &Schema, table: &TableName, row: &RowMap) -> Result<()> {
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let sql = build_insert_query(schema, table, &columns);
        debug!("Executing: {}", sql);

        let mut query = sqlx::query(&sql);
        for value in row.values() {
            query = bind_value(query, value);
        }

        query
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to insert into {}.{}", schema.0, table.0))?;
        Ok(())
    }
}
