use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use crate::domain::row::RowMap;

/// Convert a sqlx `PgRow` into a `RowMap`.
///
/// Every column is decoded to the closest `serde_json::Value` by its Postgres
/// type name. Types without a native mapping fall back to a text decode, and
/// to `Null` when even that fails — the sync layer treats rows as opaque, so
/// a lossy column is better than a failed snapshot.
pub fn row_to_map(row: &PgRow) -> Result<RowMap> {
    let mut map = BTreeMap::new();
    for col in row.columns() {
        let name = col.name().to_string();
        let value = decode_column(row, col.ordinal(), col.type_info().name())?;
        map.insert(name, value);
    }
    Ok(map)
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Result<Value> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)?
            .map(|v| Value::Number(v.into())),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)?
            .map(|v| Value::Number(v.into())),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)?
            .map(|v| Value::Number(v.into())),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)?
            .and_then(|v| serde_json::Number::from_f64(v as f64))
            .map(Value::Number),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(idx)?.map(Value::String)
        }
        "UUID" => row
            .try_get::<Option<Uuid>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|v| Value::String(v.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)?
            .map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx)?,
        other => match row.try_get::<Option<String>, _>(idx) {
            Ok(v) => v.map(Value::String),
            Err(err) => {
                debug!(pg_type = other, error = %err, "column type not decodable, mapping to null");
                Some(Value::Null)
            }
        },
    };
    Ok(value.unwrap_or(Value::Null))
}
