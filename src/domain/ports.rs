use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::event::ChangeEvent;
use crate::domain::query::{FeedScope, QuerySpec};
use crate::domain::row::RowMap;
use crate::domain::value_objects::{Schema, TableName};

/// Identifier of one open feed subscription.
pub type SubscriptionId = Uuid;

/// Handle to a live change feed: the id to release it with, and the stream
/// of events it delivers. Dropping the receiver ends delivery.
pub struct FeedSubscription {
    pub id: SubscriptionId,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

/// Port: read access to query results (implemented by PgBackend, MemoryBackend)
#[async_trait]
pub trait RowFetcher: Send + Sync {
    async fn fetch_rows(&self, query: &QuerySpec) -> Result<Vec<RowMap>>;
}

/// Port: one-shot row inserts (implemented by PgBackend, MemoryBackend)
#[async_trait]
pub trait RowWriter: Send + Sync {
    async fn insert_row(&self, schema: &Schema, table: &TableName, row: &RowMap) -> Result<()>;
}

/// Port: change-feed subscriptions (implemented by PgChangeFeed, MemoryBackend)
///
/// Scope filtering is the provider's responsibility: a subscription with a
/// filter must only be handed events for rows matching it.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, channel: &str, scope: &FeedScope) -> Result<FeedSubscription>;
    async fn remove_channel(&self, id: SubscriptionId) -> Result<()>;
}

/// Port: snapshot observer (implemented by the UI layer or a test harness)
///
/// Called with the full new snapshot after every completed, still-current
/// fetch. The receiver decides what to do with it; the sync layer has no
/// opinion on rendering.
pub trait SnapshotListener: Send + Sync {
    fn snapshot_changed(&self, rows: &[RowMap]);
}
