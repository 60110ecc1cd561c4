use std::sync::Arc;

use serde_json::json;

use crate::application::sync::LiveQuerySync;
use crate::domain::ports::{ChangeFeed, RowFetcher, SnapshotListener};
use crate::domain::query::{FeedScope, QuerySpec, SyncParams};
use crate::domain::value_objects::{EqFilter, OrderBy, Schema, TableName};

pub const ORDERS_TABLE: &str = "orders";
pub const ORDER_UPDATES_TABLE: &str = "order_updates";

/// Parameters for the orders list: newest first, optionally narrowed to one
/// creating user.
///
/// The feed scope is deliberately unfiltered — any change to the orders table
/// triggers a refetch, and the per-user narrowing happens in the fetch alone.
pub fn orders_params(schema: &Schema, user_id: Option<&str>) -> SyncParams {
    SyncParams {
        channel: ORDERS_TABLE.to_string(),
        query: QuerySpec {
            schema: schema.clone(),
            table: TableName(ORDERS_TABLE.to_string()),
            order: OrderBy::descending("created_at"),
            filter: user_id.map(|u| EqFilter::new("created_by", json!(u))),
        },
        scope: FeedScope {
            schema: schema.clone(),
            table: TableName(ORDERS_TABLE.to_string()),
            filter: None,
        },
    }
}

/// Parameters for one order's update log: latest update first, fetch and feed
/// both scoped to the order id.
pub fn order_tracking_params(schema: &Schema, order_id: i64) -> SyncParams {
    let filter = EqFilter::new("order_id", json!(order_id));
    SyncParams {
        channel: format!("{}:{}", ORDER_UPDATES_TABLE, order_id),
        query: QuerySpec {
            schema: schema.clone(),
            table: TableName(ORDER_UPDATES_TABLE.to_string()),
            order: OrderBy::descending("time"),
            filter: Some(filter.clone()),
        },
        scope: FeedScope {
            schema: schema.clone(),
            table: TableName(ORDER_UPDATES_TABLE.to_string()),
            filter: Some(filter),
        },
    }
}

/// Build an (inactive) orders-list sync. Call `activate` to start it.
pub fn orders_sync(
    schema: &Schema,
    user_id: Option<&str>,
    fetcher: Arc<dyn RowFetcher>,
    feed: Arc<dyn ChangeFeed>,
    listener: Arc<dyn SnapshotListener>,
) -> LiveQuerySync {
    LiveQuerySync::new(orders_params(schema, user_id), fetcher, feed, listener)
}

/// Build an (inactive) per-order tracking sync. Call `activate` to start it.
pub fn order_tracking_sync(
    schema: &Schema,
    order_id: i64,
    fetcher: Arc<dyn RowFetcher>,
    feed: Arc<dyn ChangeFeed>,
    listener: Arc<dyn SnapshotListener>,
) -> LiveQuerySync {
    LiveQuerySync::new(order_tracking_params(schema, order_id), fetcher, feed, listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::OrderDirection;

    #[test]
    fn test_orders_params_without_user_fetch_everything() {
        let p = orders_params(&Schema("public".into()), None);
        assert_eq!(p.channel, "orders");
        assert_eq!(p.query.filter, None);
        assert_eq!(p.scope.filter, None);
        assert_eq!(p.query.order.column.0, "created_at");
        assert_eq!(p.query.order.direction, OrderDirection::Descending);
    }

    #[test]
    fn test_orders_params_user_filter_is_fetch_only() {
        let p = orders_params(&Schema("public".into()), Some("user-7"));
        let filter = p.query.filter.expect("fetch filter");
        assert_eq!(filter.expression(), "created_by=eq.user-7");
        assert_eq!(p.scope.filter, None, "orders feed stays table-wide");
    }

    #[test]
    fn test_tracking_params_scope_fetch_and_channel_by_order() {
        let p = order_tracking_params(&Schema("public".into()), 42);
        assert_eq!(p.channel, "order_updates:42");
        assert_eq!(
            p.query.filter.as_ref().map(EqFilter::expression).as_deref(),
            Some("order_id=eq.42")
        );
        assert_eq!(p.query.filter, p.scope.filter);
        assert_eq!(p.query.order.column.0, "time");
    }
}
