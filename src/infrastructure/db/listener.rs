use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::event::{ChangeEvent, ChangeKind};
use crate::domain::ports::{ChangeFeed, FeedSubscription, SubscriptionId};
use crate::domain::query::FeedScope;
use crate::domain::row::RowMap;
use crate::domain::value_objects::TableName;

use crate::infrastructure::db::sql_utils::notify_channel;

/// Payload published by the notify trigger
/// (see [`crate::infrastructure::db::sql_utils::notify_trigger_sql`]).
#[derive(Debug, Deserialize)]
struct NotifyPayload {
    op: ChangeKind,
    schema: String,
    table: String,
    row: Option<RowMap>,
}

/// Change feed backed by Postgres LISTEN/NOTIFY.
///
/// Each subscription gets its own listener connection and relay task. The
/// relay parses trigger payloads, drops anything outside the subscription's
/// scope (table, schema, equality filter) and forwards the rest — consumers
/// receive only events they asked for and never re-filter.
pub struct PgChangeFeed {
    pool: PgPool,
    relays: Mutex<BTreeMap<SubscriptionId, JoinHandle<()>>>,
}

impl PgChangeFeed {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            relays: Mutex::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn subscribe(&self, channel: &str, scope: &FeedScope) -> Result<FeedSubscription> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .context("Failed to open listener connection")?;
        let pg_channel = notify_channel(&scope.table);
        listener
            .listen(&pg_channel)
            .await
            .with_context(|| format!("Failed to LISTEN on {}", pg_channel))?;

        let id = Uuid::new_v4();
        let (tx, events) = mpsc::unbounded_channel();
        debug!(
            channel,
            subscription = %id,
            pg_channel = %pg_channel,
            filter = ?scope.filter_expression(),
            "subscribed"
        );

        let scope = scope.clone();
        let channel = channel.to_string();
        let task = tokio::spawn(relay(listener, scope, channel, tx));
        if let Ok(mut relays) = self.relays.lock() {
            relays.insert(id, task);
        }

        Ok(FeedSubscription { id, events })
    }

    async fn remove_channel(&self, id: SubscriptionId) -> Result<()> {
        let task = self.relays.lock().ok().and_then(|mut r| r.remove(&id));
        if let Some(task) = task {
            task.abort();
            debug!(subscription = %id, "unsubscribed");
        }
        Ok(())
    }
}

async fn relay(
    mut listener: PgListener,
    scope: FeedScope,
    channel: String,
    tx: mpsc::UnboundedSender<ChangeEvent>,
) {
    loop {
        let notification = match listener.recv().await {
            Ok(n) => n,
            Err(err) => {
                // recv re-establishes the connection on the next call.
                warn!(channel = %channel, error = %err, "listener connection lost, retrying");
                continue;
            }
        };

        let payload: NotifyPayload = match serde_json::from_str(notification.payload()) {
            Ok(p) => p,
            Err(err) => {
                warn!(channel = %channel, error = %err, "unparseable notify payload, skipping");
                continue;
            }
        };

        if payload.schema != scope.schema.0 || payload.table != scope.table.0 {
            continue;
        }
        if let Some(filter) = &scope.filter {
            match &payload.row {
                Some(row) if filter.matches(row) => {}
                _ => continue,
            }
        }

        let event = ChangeEvent {
            kind: payload.op,
            table: TableName(payload.table),
            row: payload.row,
        };
        if tx.send(event).is_err() {
            // Receiver gone: the sync was deactivated.
            break;
        }
    }
}
