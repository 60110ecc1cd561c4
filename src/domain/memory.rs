use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::event::{ChangeEvent, ChangeKind};
use crate::domain::ports::{
    ChangeFeed, FeedSubscription, RowFetcher, RowWriter, SnapshotListener, SubscriptionId,
};
use crate::domain::query::{FeedScope, QuerySpec};
use crate::domain::row::RowMap;
use crate::domain::value_objects::{OrderDirection, Schema, TableName};

// ─── MemoryBackend ───────────────────────────────────────────────────────────

/// In-memory implementation of [`RowFetcher`], [`RowWriter`] and
/// [`ChangeFeed`], usable as a headless harness for driving syncs without a
/// database.
///
/// Mutations go through [`insert`](Self::insert),
/// [`update_where`](Self::update_where) and
/// [`delete_where`](Self::delete_where), which also deliver change events to
/// every subscription whose scope matches — filtering happens here, on the
/// provider side, exactly as a real feed would do it.
///
/// Fetch failure and fetch latency can be injected to exercise the sync
/// layer's error and race behavior.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<BTreeMap<String, Vec<RowMap>>>,
    subscriptions: Mutex<BTreeMap<SubscriptionId, FeedEntry>>,
    fail_fetches: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
}

struct FeedEntry {
    scope: FeedScope,
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents of `table` without emitting events.
    pub fn seed(&self, table: &str, rows: Vec<RowMap>) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.insert(table.to_string(), rows);
        }
    }

    /// When set, every subsequent fetch fails with an error.
    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, AtomicOrdering::SeqCst);
    }

    /// Artificial latency applied to every fetch, for in-flight race tests.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        if let Ok(mut slot) = self.fetch_delay.lock() {
            *slot = delay;
        }
    }

    /// Number of currently open feed subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Append a row and notify matching subscriptions.
    pub fn insert(&self, table: &str, row: RowMap) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.entry(table.to_string()).or_default().push(row.clone());
        }
        self.emit(ChangeKind::Insert, table, row);
    }

    /// Merge `patch` into every row where `field == value`, notifying per row.
    pub fn update_where(&self, table: &str, field: &str, value: &Value, patch: RowMap) {
        let mut touched = Vec::new();
        if let Ok(mut tables) = self.tables.lock() {
            if let Some(rows) = tables.get_mut(table) {
                for row in rows.iter_mut() {
                    if row.get(field) == Some(value) {
                        row.extend(patch.clone());
                        touched.push(row.clone());
                    }
                }
            }
        }
        for row in touched {
            self.emit(ChangeKind::Update, table, row);
        }
    }

    /// Remove every row where `field == value`, notifying per removed row.
    pub fn delete_where(&self, table: &str, field: &str, value: &Value) {
        let mut removed = Vec::new();
        if let Ok(mut tables) = self.tables.lock() {
            if let Some(rows) = tables.get_mut(table) {
                rows.retain(|row| {
                    if row.get(field) == Some(value) {
                        removed.push(row.clone());
                        false
                    } else {
                        true
                    }
                });
            }
        }
        for row in removed {
            self.emit(ChangeKind::Delete, table, row);
        }
    }

    fn emit(&self, kind: ChangeKind, table: &str, row: RowMap) {
        let Ok(subs) = self.subscriptions.lock() else {
            return;
        };
        for entry in subs.values() {
            if entry.scope.table.0 != table {
                continue;
            }
            if let Some(filter) = &entry.scope.filter {
                if !filter.matches(&row) {
                    continue;
                }
            }
            let event = ChangeEvent {
                kind,
                table: TableName(table.to_string()),
                row: Some(row.clone()),
            };
            let _ = entry.sender.send(event);
        }
    }
}

#[async_trait]
impl RowFetcher for MemoryBackend {
    async fn fetch_rows(&self, query: &QuerySpec) -> Result<Vec<RowMap>> {
        // Copy the delay out so no lock is held across the sleep.
        let delay = self.fetch_delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetches.load(AtomicOrdering::SeqCst) {
            bail!("injected fetch failure for {}", query.table.0);
        }

        let mut rows = self
            .tables
            .lock()
            .map(|tables| tables.get(&query.table.0).cloned().unwrap_or_default())
            .unwrap_or_default();

        if let Some(filter) = &query.filter {
            rows.retain(|row| filter.matches(row));
        }

        let column = &query.order.column.0;
        rows.sort_by(|a, b| {
            let av = a.get(column).unwrap_or(&Value::Null);
            let bv = b.get(column).unwrap_or(&Value::Null);
            let ord = cmp_json(av, bv);
            match query.order.direction {
                OrderDirection::Ascending => ord,
                OrderDirection::Descending => ord.reverse(),
            }
        });
        Ok(rows)
    }
}

#[async_trait]
impl RowWriter for MemoryBackend {
    async fn insert_row(&self, _schema: &Schema, table: &TableName, row: &RowMap) -> Result<()> {
        self.insert(&table.0, row.clone());
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe(&self, _channel: &str, scope: &FeedScope) -> Result<FeedSubscription> {
        let (sender, events) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        if let Ok(mut subs) = self.subscriptions.lock() {
            subs.insert(
                id,
                FeedEntry {
                    scope: scope.clone(),
                    sender,
                },
            );
        }
        Ok(FeedSubscription { id, events })
    }

    async fn remove_channel(&self, id: SubscriptionId) -> Result<()> {
        if let Ok(mut subs) = self.subscriptions.lock() {
            subs.remove(&id);
        }
        Ok(())
    }
}

/// No-op listener for callers that only read snapshots through the accessor.
pub struct NullListener;

impl SnapshotListener for NullListener {
    fn snapshot_changed(&self, _rows: &[RowMap]) {}
}

/// Total order over JSON values, good enough for ORDER BY semantics on
/// homogeneous columns: null < bool < number < string < everything else.
fn cmp_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Bool(_), _) => Ordering::Less,
        (_, Value::Bool(_)) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{EqFilter, OrderBy};
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> RowMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn query(table: &str, order: OrderBy, filter: Option<EqFilter>) -> QuerySpec {
        QuerySpec {
            schema: Schema("public".into()),
            table: TableName(table.into()),
            order,
            filter,
        }
    }

    fn scope(table: &str, filter: Option<EqFilter>) -> FeedScope {
        FeedScope {
            schema: Schema("public".into()),
            table: TableName(table.into()),
            filter,
        }
    }

    #[tokio::test]
    async fn fetch_sorts_descending_by_column() {
        let backend = MemoryBackend::new();
        backend.seed(
            "orders",
            vec![
                row(&[("id", json!(1)), ("created_at", json!("2026-01-01"))]),
                row(&[("id", json!(2)), ("created_at", json!("2026-03-01"))]),
                row(&[("id", json!(3)), ("created_at", json!("2026-02-01"))]),
            ],
        );
        let rows = backend
            .fetch_rows(&query("orders", OrderBy::descending("created_at"), None))
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(2), json!(3), json!(1)]);
    }

    #[tokio::test]
    async fn fetch_applies_equality_filter() {
        let backend = MemoryBackend::new();
        backend.seed(
            "order_updates",
            vec![
                row(&[("order_id", json!(42)), ("time", json!(1))]),
                row(&[("order_id", json!(7)), ("time", json!(2))]),
                row(&[("order_id", json!(42)), ("time", json!(3))]),
            ],
        );
        let rows = backend
            .fetch_rows(&query(
                "order_updates",
                OrderBy::ascending("time"),
                Some(EqFilter::new("order_id", json!(42))),
            ))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["order_id"] == json!(42)));
    }

    #[tokio::test]
    async fn fetch_without_filter_returns_all_rows_sorted() {
        let backend = MemoryBackend::new();
        backend.seed(
            "orders",
            vec![row(&[("id", json!(2))]), row(&[("id", json!(1))])],
        );
        let rows = backend
            .fetch_rows(&query("orders", OrderBy::ascending("id"), None))
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[1]["id"], json!(2));
    }

    #[tokio::test]
    async fn fetch_of_unknown_table_is_empty() {
        let backend = MemoryBackend::new();
        let rows = backend
            .fetch_rows(&query("nope", OrderBy::ascending("id"), None))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn injected_failure_errors_the_fetch() {
        let backend = MemoryBackend::new();
        backend.set_fail_fetches(true);
        let err = backend
            .fetch_rows(&query("orders", OrderBy::ascending("id"), None))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn events_are_scoped_to_subscription_filter() {
        let backend = MemoryBackend::new();
        let mut sub = backend
            .subscribe(
                "order_updates:42",
                &scope("order_updates", Some(EqFilter::new("order_id", json!(42)))),
            )
            .await
            .unwrap();

        backend.insert("order_updates", row(&[("order_id", json!(7))]));
        backend.insert("orders", row(&[("order_id", json!(42))]));
        backend.insert("order_updates", row(&[("order_id", json!(42))]));

        let event = sub.events.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.table, TableName("order_updates".into()));
        assert_eq!(event.row.unwrap()["order_id"], json!(42));
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn remove_channel_stops_delivery() {
        let backend = MemoryBackend::new();
        let sub = backend
            .subscribe("orders", &scope("orders", None))
            .await
            .unwrap();
        assert_eq!(backend.subscription_count(), 1);

        backend.remove_channel(sub.id).await.unwrap();
        assert_eq!(backend.subscription_count(), 0);

        let mut events = sub.events;
        backend.insert("orders", row(&[("id", json!(1))]));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn update_and_delete_emit_events() {
        let backend = MemoryBackend::new();
        backend.seed("orders", vec![row(&[("id", json!(1)), ("status", json!("new"))])]);
        let mut sub = backend
            .subscribe("orders", &scope("orders", None))
            .await
            .unwrap();

        backend.update_where("orders", "id", &json!(1), row(&[("status", json!("shipped"))]));
        let event = sub.events.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.row.unwrap()["status"], json!("shipped"));

        backend.delete_where("orders", "id", &json!(1));
        let event = sub.events.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
    }
}
