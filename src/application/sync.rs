use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::event::ChangeEvent;
use crate::domain::ports::{ChangeFeed, RowFetcher, SnapshotListener, SubscriptionId};
use crate::domain::query::{QuerySpec, SyncParams};
use crate::domain::row::RowMap;

// ─────────────────────────────────────────────────────────────────────────────
// LiveQuerySync
// ─────────────────────────────────────────────────────────────────────────────

/// Keeps an in-memory snapshot of a filtered, ordered table query eventually
/// consistent with the backing store, using change notifications as the
/// refresh trigger rather than polling.
///
/// # Lifecycle
/// Two states: *inactive* (no subscription) and *active* (subscription open,
/// snapshot refreshed on every event). [`activate`](Self::activate) opens the
/// feed subscription and issues the first fetch; [`deactivate`](Self::deactivate)
/// closes it. [`rebind`](Self::rebind) swaps the query parameters, tearing the
/// old subscription down before the new one is established. Any UI framework —
/// or a headless test harness — drives these entry points directly.
///
/// # Consistency
/// Every delivered event triggers a full refetch; the event payload is never
/// used to patch the snapshot. In-flight fetches are neither serialized nor
/// coalesced, so under event bursts whichever fetch completes last determines
/// the published snapshot. The one guard is a generation counter: a fetch
/// started before a deactivation or rebind can never publish its result into
/// the new lifecycle.
///
/// A failed fetch keeps the last good snapshot and does not notify the
/// listener.
pub struct LiveQuerySync {
    params: SyncParams,
    feed: Arc<dyn ChangeFeed>,
    inner: Arc<SyncInner>,
    active: Option<ActiveState>,
}

struct ActiveState {
    subscription: SubscriptionId,
    event_loop: JoinHandle<()>,
}

/// State shared with the spawned fetch and event-loop tasks.
struct SyncInner {
    fetcher: Arc<dyn RowFetcher>,
    listener: Arc<dyn SnapshotListener>,
    snapshot: Mutex<Arc<Vec<RowMap>>>,
    generation: AtomicU64,
}

impl LiveQuerySync {
    pub fn new(
        params: SyncParams,
        fetcher: Arc<dyn RowFetcher>,
        feed: Arc<dyn ChangeFeed>,
        listener: Arc<dyn SnapshotListener>,
    ) -> Self {
        Self {
            params,
            feed,
            inner: Arc::new(SyncInner {
                fetcher,
                listener,
                snapshot: Mutex::new(Arc::new(Vec::new())),
                generation: AtomicU64::new(0),
            }),
            active: None,
        }
    }

    /// Open the feed subscription and issue the initial fetch.
    ///
    /// No-op when already active. The initial fetch runs concurrently with
    /// event delivery; the snapshot stays empty (or stale, after a rebind)
    /// until it completes.
    pub async fn activate(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Ok(());
        }
        let generation = self.inner.generation.fetch_add(1, AtomicOrdering::SeqCst) + 1;

        let subscription = self
            .feed
            .subscribe(&self.params.channel, &self.params.scope)
            .await?;
        debug!(
            channel = %self.params.channel,
            subscription = %subscription.id,
            filter = ?self.params.scope.filter_expression(),
            "sync activated"
        );

        tokio::spawn(Arc::clone(&self.inner).refetch(self.params.query.clone(), generation));
        let event_loop = tokio::spawn(event_loop(
            Arc::clone(&self.inner),
            self.params.query.clone(),
            subscription.events,
            generation,
        ));

        self.active = Some(ActiveState {
            subscription: subscription.id,
            event_loop,
        });
        Ok(())
    }

    /// Close the feed subscription. No further snapshot updates are published
    /// for this instance, including from fetches still in flight.
    pub async fn deactivate(&mut self) -> Result<()> {
        if let Some(active) = self.active.take() {
            // Bump first: in-flight fetches see a stale generation and drop
            // their results before the subscription is even gone.
            self.inner.generation.fetch_add(1, AtomicOrdering::SeqCst);
            active.event_loop.abort();
            self.feed.remove_channel(active.subscription).await?;
            debug!(
                channel = %self.params.channel,
                subscription = %active.subscription,
                "sync deactivated"
            );
        }
        Ok(())
    }

    /// Swap the query parameters (key change, e.g. a different order id).
    ///
    /// Tears the old subscription down before establishing the new one. The
    /// previous snapshot stays visible until the first fetch of the new
    /// parameters completes.
    pub async fn rebind(&mut self, params: SyncParams) -> Result<()> {
        let was_active = self.active.is_some();
        self.deactivate().await?;
        self.params = params;
        if was_active {
            self.activate().await?;
        }
        Ok(())
    }

    /// The current published snapshot; empty before the first fetch completes.
    pub fn snapshot(&self) -> Arc<Vec<RowMap>> {
        self.inner
            .snapshot
            .lock()
            .map(|s| Arc::clone(&s))
            .unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn channel(&self) -> &str {
        &self.params.channel
    }

    pub fn params(&self) -> &SyncParams {
        &self.params
    }
}

impl Drop for LiveQuerySync {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            // Feed-side removal needs an async context; deactivate() is the
            // clean path. This only stops local processing.
            self.inner.generation.fetch_add(1, AtomicOrdering::SeqCst);
            active.event_loop.abort();
        }
    }
}

impl SyncInner {
    /// Re-run the query and publish the result, unless the generation moved
    /// on while the fetch was in flight.
    async fn refetch(self: Arc<Self>, query: QuerySpec, generation: u64) {
        match self.fetcher.fetch_rows(&query).await {
            Ok(rows) => {
                let rows = Arc::new(rows);
                {
                    let Ok(mut slot) = self.snapshot.lock() else {
                        return;
                    };
                    if self.generation.load(AtomicOrdering::SeqCst) != generation {
                        debug!(table = %query.table.0, "dropping stale fetch result");
                        return;
                    }
                    *slot = Arc::clone(&rows);
                }
                self.listener.snapshot_changed(&rows);
            }
            Err(err) => {
                // Keep the last good snapshot; the listener is not told.
                warn!(table = %query.table.0, error = %err, "fetch failed, snapshot unchanged");
            }
        }
    }
}

/// One independent refetch per delivered event — no coalescing, no ordering.
async fn event_loop(
    inner: Arc<SyncInner>,
    query: QuerySpec,
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
    generation: u64,
) {
    while let Some(event) = events.recv().await {
        debug!(table = %event.table.0, kind = ?event.kind, "change event, refetching");
        tokio::spawn(Arc::clone(&inner).refetch(query.clone(), generation));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
