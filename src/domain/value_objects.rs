use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::row::RowMap;

/// Newtype to avoid confusion between schema names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema(pub String);

/// Newtype for table names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName(pub String);

/// Newtype for column names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ColumnName(pub String);

/// Sort direction for the snapshot query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

/// Ordering specification: one column, one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: ColumnName,
    pub direction: OrderDirection,
}

impl OrderBy {
    pub fn ascending(column: &str) -> Self {
        Self {
            column: ColumnName(column.to_string()),
            direction: OrderDirection::Ascending,
        }
    }

    pub fn descending(column: &str) -> Self {
        Self {
            column: ColumnName(column.to_string()),
            direction: OrderDirection::Descending,
        }
    }
}

/// Equality filter restricting a query or feed scope to rows where
/// `field = value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqFilter {
    pub field: ColumnName,
    pub value: Value,
}

impl EqFilter {
    pub fn new(field: &str, value: Value) -> Self {
        Self {
            field: ColumnName(field.to_string()),
            value,
        }
    }

    /// Wire form of the filter, `"<field>=eq.<value>"`.
    ///
    /// String values are rendered raw (no quotes), everything else through
    /// its JSON representation.
    pub fn expression(&self) -> String {
        let rendered = match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        format!("{}=eq.{}", self.field.0, rendered)
    }

    /// Provider-side check: does `row` satisfy this filter?
    ///
    /// Only feed providers call this when scoping event delivery; consumers
    /// trust the feed and never re-filter locally.
    pub fn matches(&self, row: &RowMap) -> bool {
        row.get(&self.field.0) == Some(&self.value)
    }
}
