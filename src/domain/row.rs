use serde_json::Value;
use std::collections::BTreeMap;

/// Type alias for a database row represented as a sorted map of column name → JSON value.
///
/// Rows are schemaless on purpose: the sync layer never interprets column
/// values, it only fetches, sorts and republishes them.
pub type RowMap = BTreeMap<String, Value>;
