use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument};

use crate::domain::ports::RowFetcher;
use crate::domain::query::QuerySpec;
use crate::domain::row::RowMap;

// ─── FetchStats ──────────────────────────────────────────────────────────────

/// Accumulated fetch counters for one sync instance.
///
/// Shared with the decorator via `Arc<Mutex<_>>`. Tests use the fetch count
/// to assert that properly scoped feeds cause no spurious refetches.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct FetchStats {
    pub fetches: usize,
    pub total_rows: usize,
    pub total_ms: u128,
}

impl FetchStats {
    pub fn new() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    fn record(stats: &Arc<Mutex<Self>>, rows: usize, duration_ms: u128) {
        if let Ok(mut s) = stats.lock() {
            s.fetches += 1;
            s.total_rows += rows;
            s.total_ms += duration_ms;
        }
    }
}

// ─── MonitoringRowFetcher ────────────────────────────────────────────────────

/// Decorator: wraps any `RowFetcher`, measures wall time per `fetch_rows`
/// call, and appends the result to the shared `FetchStats`.
pub struct MonitoringRowFetcher {
    inner: Arc<dyn RowFetcher>,
    stats: Arc<Mutex<FetchStats>>,
}

impl MonitoringRowFetcher {
    pub fn new(inner: Arc<dyn RowFetcher>, stats: Arc<Mutex<FetchStats>>) -> Self {
        Self { inner, stats }
    }
}

#[async_trait]
impl RowFetcher for MonitoringRowFetcher {
    #[instrument(
        name = "fetch_rows",
        skip(self, query),
        fields(db.schema = %query.schema.0, db.table = %query.table.0),
        level = "info"
    )]
    async fn fetch_rows(&self, query: &QuerySpec) -> Result<Vec<RowMap>> {
        let start = Instant::now();
        let rows = self.inner.fetch_rows(query).await?;
        let duration_ms = start.elapsed().as_millis();

        info!(table = %query.table.0, rows = rows.len(), duration_ms, "fetch_rows completed");

        FetchStats::record(&self.stats, rows.len(), duration_ms);
        Ok(rows)
    }
}
