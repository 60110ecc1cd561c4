use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{EqFilter, OrderBy, Schema, TableName};

/// One logical query: table, ordering, optional equality filter.
///
/// Immutable for the lifetime of one sync activation. Changing the key
/// parameter (user id, order id) means building a new `QuerySpec` and
/// rebinding the sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub schema: Schema,
    pub table: TableName,
    pub order: OrderBy,
    pub filter: Option<EqFilter>,
}

/// What a change-feed subscription watches: a table, optionally narrowed to
/// rows matching an equality filter.
///
/// Kept separate from [`QuerySpec`] because the two do not always agree: the
/// orders list fetches with a per-user filter but subscribes to the whole
/// table, so any order change triggers a refetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedScope {
    pub schema: Schema,
    pub table: TableName,
    pub filter: Option<EqFilter>,
}

impl FeedScope {
    /// Wire form of the scope filter, if any (`"<field>=eq.<value>"`).
    pub fn filter_expression(&self) -> Option<String> {
        self.filter.as_ref().map(EqFilter::expression)
    }
}

/// Everything a [`crate::application::sync::LiveQuerySync`] needs to describe
/// one subscription: a channel name, the fetch query and the feed scope.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncParams {
    pub channel: String,
    pub query: QuerySpec,
    pub scope: FeedScope,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feed_scope_filter_expression() {
        let scope = FeedScope {
            schema: Schema("public".into()),
            table: TableName("order_updates".into()),
            filter: Some(EqFilter::new("order_id", json!(42))),
        };
        assert_eq!(scope.filter_expression().as_deref(), Some("order_id=eq.42"));
    }

    #[test]
    fn test_feed_scope_without_filter_has_no_expression() {
        let scope = FeedScope {
            schema: Schema("public".into()),
            table: TableName("orders".into()),
            filter: None,
        };
        assert_eq!(scope.filter_expression(), None);
    }
}
