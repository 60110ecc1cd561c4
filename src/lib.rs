#[cfg(feature = "postgres")]
use anyhow::Result;
#[cfg(feature = "postgres")]
use std::sync::Arc;

pub mod application;
pub mod domain;
pub mod infrastructure;
#[cfg(feature = "cli")]
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of livesync's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                              |
/// |---------|-----------------|------------------------------------------|
/// | `Error` | `error`         | `--quiet` / CI scripting                 |
/// | `Info`  | `info`          | Default — shows per-fetch timings        |
/// | `Debug` | `debug`         | `--verbose` — shows SQL and feed events  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

/// Initialise the global `tracing` subscriber for livesync.
///
/// This is a convenience wrapper around `tracing_subscriber`. It respects
/// `RUST_LOG` when set, falling back to `level` otherwise.
///
/// Call this **once** at application startup, before any livesync async
/// function. Library consumers who manage their own subscriber should skip
/// this and configure tracing themselves.
///
/// Only available when the `cli` feature is enabled (pulls in
/// `tracing-subscriber`).
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let default_filter = match level {
        LogLevel::Error => "livesync=error",
        LogLevel::Info => "livesync=info",
        LogLevel::Debug => "livesync=debug",
    };

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use application::contact::{ContactMessage, ContactService, CONTACTS_TABLE};
pub use application::monitoring::{FetchStats, MonitoringRowFetcher};
pub use application::orders::{
    order_tracking_params, order_tracking_sync, orders_params, orders_sync, ORDERS_TABLE,
    ORDER_UPDATES_TABLE,
};
pub use application::sync::LiveQuerySync;
pub use domain::event::{ChangeEvent, ChangeKind};
pub use domain::memory::{MemoryBackend, NullListener};
pub use domain::ports::{
    ChangeFeed, FeedSubscription, RowFetcher, RowWriter, SnapshotListener, SubscriptionId,
};
pub use domain::query::{FeedScope, QuerySpec, SyncParams};
pub use domain::row::RowMap;
pub use domain::value_objects::{
    ColumnName, EqFilter, OrderBy, OrderDirection, Schema, TableName,
};
pub use infrastructure::config::{AppConfig, DbConfig};

// ─── Public entry points ───

/// Watch the orders list, optionally narrowed to one creating user.
///
/// Connects, activates the sync and returns it running; every refresh is
/// delivered through `listener`. Call
/// [`LiveQuerySync::deactivate`] when done.
#[cfg(feature = "postgres")]
pub async fn watch_orders(
    cfg: &AppConfig,
    user_id: Option<&str>,
    listener: Arc<dyn SnapshotListener>,
) -> Result<LiveQuerySync> {
    let (fetcher, feed) = build_backend(cfg).await?;
    let schema = Schema(cfg.db.schema.clone());
    let mut sync = orders_sync(&schema, user_id, fetcher, feed, listener);
    sync.activate().await?;
    Ok(sync)
}

/// Watch the update log of a single order.
#[cfg(feature = "postgres")]
pub async fn watch_order_updates(
    cfg: &AppConfig,
    order_id: i64,
    listener: Arc<dyn SnapshotListener>,
) -> Result<LiveQuerySync> {
    let (fetcher, feed) = build_backend(cfg).await?;
    let schema = Schema(cfg.db.schema.clone());
    let mut sync = order_tracking_sync(&schema, order_id, fetcher, feed, listener);
    sync.activate().await?;
    Ok(sync)
}

/// Store one contact-form submission.
#[cfg(feature = "postgres")]
pub async fn submit_contact(cfg: &AppConfig, message: &ContactMessage) -> Result<()> {
    let pool = infrastructure::db::client::connect(&cfg.db).await?;
    let writer = Arc::new(infrastructure::db::client::PgBackend::new(pool));
    ContactService::new(Schema(cfg.db.schema.clone()), writer)
        .submit(message)
        .await
}

// ─── Private helpers ──────────────────────────────────────────────────────────

/// Connect and wrap the fetcher in the monitoring decorator, so every entry
/// point reports per-fetch timings through tracing.
#[cfg(feature = "postgres")]
async fn build_backend(cfg: &AppConfig) -> Result<(Arc<dyn RowFetcher>, Arc<dyn ChangeFeed>)> {
    use infrastructure::db::client::{connect, PgBackend};
    use infrastructure::db::listener::PgChangeFeed;

    let pool = connect(&cfg.db).await?;
    let backend = Arc::new(PgBackend::new(pool.clone()));
    let fetcher = Arc::new(MonitoringRowFetcher::new(backend, FetchStats::new()));
    let feed = Arc::new(PgChangeFeed::new(pool));
    Ok((fetcher, feed))
}
