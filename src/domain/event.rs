use serde::{Deserialize, Serialize};

use crate::domain::row::RowMap;
use crate::domain::value_objects::TableName;

/// Kind of row change a feed event reports.
///
/// Serialized in uppercase to match Postgres `TG_OP` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One change notification delivered on a feed subscription.
///
/// The row payload is carried for logging and provider-side filtering only;
/// the sync layer never patches snapshots from it — every event triggers a
/// full refetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: TableName,
    pub row: Option<RowMap>,
}
