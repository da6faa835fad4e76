use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::db;
use crate::error::{DashboardError, WarehouseError};
use crate::models::{AlertRow, CategoryRow, DashboardSnapshot, RiskScoreRow, TrendPoint};
use crate::warehouse::Warehouse;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Size of a cached result, reported when it is refreshed.
pub trait RowCount {
    fn row_count(&self) -> usize;
}

impl<R> RowCount for Vec<R> {
    fn row_count(&self) -> usize {
        self.len()
    }
}

struct CacheEntry<T> {
    value: Arc<T>,
    fetched_at: Instant,
}

struct RefreshState<E> {
    attempts: u64,
    last_failure: Option<Arc<E>>,
}

/// Memoizes the result of one query for a fixed time-to-live.
///
/// Fresh values are served under a read lock. Refreshes are serialized by a
/// separate guard. A caller that queued behind a refresh takes that refresh's
/// outcome, success or failure, instead of running the query again.
pub struct TtlCell<T, E> {
    name: &'static str,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry<T>>>,
    refresh: Mutex<RefreshState<E>>,
    attempts: AtomicU64,
}

impl<T: RowCount, E> TtlCell<T, E> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entry: RwLock::new(None),
            refresh: Mutex::new(RefreshState {
                attempts: 0,
                last_failure: None,
            }),
            attempts: AtomicU64::new(0),
        }
    }

    async fn fresh(&self) -> Option<Arc<T>> {
        let entry = self.entry.read().await;
        entry
            .as_ref()
            .filter(|e| e.fetched_at.elapsed() <= self.ttl)
            .map(|e| Arc::clone(&e.value))
    }

    pub async fn get_or_refresh<F, Fut>(&self, fetch: F) -> Result<Arc<T>, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.fresh().await {
            debug!(query = self.name, "cache hit");
            return Ok(value);
        }

        let observed = self.attempts.load(Ordering::Acquire);
        let mut state = self.refresh.lock().await;
        if let Some(value) = self.fresh().await {
            debug!(query = self.name, "cache refreshed by a concurrent caller");
            return Ok(value);
        }
        if state.attempts != observed {
            if let Some(err) = &state.last_failure {
                debug!(query = self.name, "sharing failure of a concurrent refresh");
                return Err(Arc::clone(err));
            }
        }

        let started = Instant::now();
        let outcome = fetch().await;
        state.attempts += 1;
        self.attempts.store(state.attempts, Ordering::Release);

        match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                let fetched_at = Instant::now();
                *self.entry.write().await = Some(CacheEntry {
                    value: Arc::clone(&value),
                    fetched_at,
                });
                state.last_failure = None;
                info!(
                    query = self.name,
                    rows = value.row_count(),
                    elapsed_ms = fetched_at.duration_since(started).as_millis() as u64,
                    "cache refreshed"
                );
                Ok(value)
            }
            Err(err) => {
                let err = Arc::new(err);
                state.last_failure = Some(Arc::clone(&err));
                warn!(query = self.name, "cache refresh failed");
                Err(err)
            }
        }
    }

    #[cfg(test)]
    async fn age(&self) -> Option<Duration> {
        self.entry.read().await.as_ref().map(|e| e.fetched_at.elapsed())
    }
}

/// The four dashboard queries, each with its own expiry clock.
pub struct DashboardCache {
    risk_scores: TtlCell<Vec<RiskScoreRow>, WarehouseError>,
    alerts: TtlCell<Vec<AlertRow>, WarehouseError>,
    trend: TtlCell<Vec<TrendPoint>, WarehouseError>,
    categories: TtlCell<Vec<CategoryRow>, WarehouseError>,
}

impl Default for DashboardCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl DashboardCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            risk_scores: TtlCell::new(db::RISK_SCORES, ttl),
            alerts: TtlCell::new(db::RECENT_ALERTS, ttl),
            trend: TtlCell::new(db::SENTIMENT_TREND, ttl),
            categories: TtlCell::new(db::CATEGORY_ANALYSIS, ttl),
        }
    }

    pub async fn risk_scores(
        &self,
        warehouse: &dyn Warehouse,
    ) -> Result<Arc<Vec<RiskScoreRow>>, Arc<WarehouseError>> {
        self.risk_scores
            .get_or_refresh(|| warehouse.risk_scores())
            .await
    }

    pub async fn recent_alerts(
        &self,
        warehouse: &dyn Warehouse,
    ) -> Result<Arc<Vec<AlertRow>>, Arc<WarehouseError>> {
        self.alerts.get_or_refresh(|| warehouse.recent_alerts()).await
    }

    pub async fn sentiment_trend(
        &self,
        warehouse: &dyn Warehouse,
    ) -> Result<Arc<Vec<TrendPoint>>, Arc<WarehouseError>> {
        self.trend.get_or_refresh(|| warehouse.sentiment_trend()).await
    }

    pub async fn category_analysis(
        &self,
        warehouse: &dyn Warehouse,
    ) -> Result<Arc<Vec<CategoryRow>>, Arc<WarehouseError>> {
        self.categories
            .get_or_refresh(|| warehouse.category_analysis())
            .await
    }

    /// Pulls all four snapshots for one render pass.
    pub async fn snapshot(
        &self,
        warehouse: &dyn Warehouse,
    ) -> Result<DashboardSnapshot, DashboardError> {
        Ok(DashboardSnapshot {
            risk_scores: self.risk_scores(warehouse).await?,
            alerts: self.recent_alerts(warehouse).await?,
            trend: self.sentiment_trend(warehouse).await?,
            categories: self.category_analysis(warehouse).await?,
        })
    }
}
