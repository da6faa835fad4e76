use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use supplier_risk_dashboard::cache::DashboardCache;
use supplier_risk_dashboard::config::PASSWORD_VAR;
use supplier_risk_dashboard::error::{ConfigError, WarehouseError};
use supplier_risk_dashboard::models::{
    AlertRow, CategoryRow, RiskCategory, RiskScoreRow, TrendPoint,
};
use supplier_risk_dashboard::report::ERROR_HINT;
use supplier_risk_dashboard::server::{render_pass, AppState};
use supplier_risk_dashboard::warehouse::{PgWarehouse, Warehouse, WarehouseConnector};

#[derive(Default)]
struct CountingWarehouse {
    risk_calls: AtomicUsize,
    alert_calls: AtomicUsize,
    trend_calls: AtomicUsize,
    category_calls: AtomicUsize,
}

impl CountingWarehouse {
    fn counts(&self) -> [usize; 4] {
        [
            self.risk_calls.load(Ordering::SeqCst),
            self.alert_calls.load(Ordering::SeqCst),
            self.trend_calls.load(Ordering::SeqCst),
            self.category_calls.load(Ordering::SeqCst),
        ]
    }
}

#[async_trait]
impl Warehouse for CountingWarehouse {
    async fn risk_scores(&self) -> Result<Vec<RiskScoreRow>, WarehouseError> {
        let generation = self.risk_calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(vec![
            RiskScoreRow {
                supplier_id: "1".to_string(),
                supplier_name: format!("Northwind gen{generation}"),
                avg_sentiment_score: Some(-0.5),
                total_communications: 14,
                negative_count: 6,
                risk_category: RiskCategory::High,
            },
            RiskScoreRow {
                supplier_id: "2".to_string(),
                supplier_name: "Contoso".to_string(),
                avg_sentiment_score: Some(0.4),
                total_communications: 9,
                negative_count: 1,
                risk_category: RiskCategory::Low,
            },
        ])
    }

    async fn recent_alerts(&self) -> Result<Vec<AlertRow>, WarehouseError> {
        self.alert_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![AlertRow {
            supplier_name: "Northwind".to_string(),
            subject: "Quality complaint".to_string(),
            communication_date: NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            sentiment_score: Some(-0.71),
            source_type: "EMAIL".to_string(),
            key_phrases: "defect rate, returns".to_string(),
        }])
    }

    async fn sentiment_trend(&self) -> Result<Vec<TrendPoint>, WarehouseError> {
        self.trend_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![TrendPoint {
            day: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            avg_sentiment: Some(-0.05),
            comm_count: 23,
        }])
    }

    async fn category_analysis(&self) -> Result<Vec<CategoryRow>, WarehouseError> {
        self.category_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![CategoryRow {
            category: "Logistics".to_string(),
            supplier_count: 2,
            avg_sentiment: Some(-0.05),
            negative_count: 7,
        }])
    }

    async fn supplier_count(&self) -> Result<i64, WarehouseError> {
        Ok(2)
    }
}

fn state_with(warehouse: Arc<CountingWarehouse>) -> AppState {
    AppState::new(warehouse, DashboardCache::new(Duration::from_secs(300)))
}

#[tokio::test(start_paused = true)]
async fn renders_within_ttl_share_one_execution_per_query() {
    let warehouse = Arc::new(CountingWarehouse::default());
    let state = state_with(Arc::clone(&warehouse));

    let first = render_pass(&state).await;
    tokio::time::advance(Duration::from_secs(120)).await;
    let second = render_pass(&state).await;

    assert_eq!(warehouse.counts(), [1, 1, 1, 1]);
    assert!(first.contains("Northwind gen1"));
    assert!(second.contains("Northwind gen1"));
    assert!(first.contains("High Risk Suppliers</div><div class=\"value\">1</div>"));
    assert!(first.contains("Avg Sentiment Score</div><div class=\"value\">-0.05</div>"));
}

#[tokio::test(start_paused = true)]
async fn expired_cache_refetches_once_and_shows_new_data() {
    let warehouse = Arc::new(CountingWarehouse::default());
    let state = state_with(Arc::clone(&warehouse));

    render_pass(&state).await;
    tokio::time::advance(Duration::from_secs(301)).await;
    let refreshed = render_pass(&state).await;
    let again = render_pass(&state).await;

    assert_eq!(warehouse.counts(), [2, 2, 2, 2]);
    assert!(refreshed.contains("Northwind gen2"));
    assert!(again.contains("Northwind gen2"));
}

#[tokio::test(start_paused = true)]
async fn each_query_expires_on_its_own_clock() {
    let warehouse = Arc::new(CountingWarehouse::default());
    let cache = DashboardCache::new(Duration::from_secs(300));

    cache.risk_scores(warehouse.as_ref()).await.unwrap();
    tokio::time::advance(Duration::from_secs(200)).await;
    cache.recent_alerts(warehouse.as_ref()).await.unwrap();
    tokio::time::advance(Duration::from_secs(150)).await;

    cache.risk_scores(warehouse.as_ref()).await.unwrap();
    cache.recent_alerts(warehouse.as_ref()).await.unwrap();

    assert_eq!(warehouse.counts(), [2, 1, 0, 0]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_sessions_observe_one_snapshot() {
    let warehouse = Arc::new(CountingWarehouse::default());
    let state = state_with(Arc::clone(&warehouse));
    let mut sessions = tokio::task::JoinSet::new();

    for _ in 0..8 {
        let state = state.clone();
        sessions.spawn(async move { render_pass(&state).await });
    }

    while let Some(page) = sessions.join_next().await {
        assert!(page.unwrap().contains("Northwind gen1"));
    }
    assert_eq!(warehouse.counts(), [1, 1, 1, 1]);
}

#[tokio::test]
async fn missing_password_renders_only_the_banner() {
    let connector =
        WarehouseConnector::with_config_loader(|| Err(ConfigError::Missing(PASSWORD_VAR)));
    let state = AppState::new(
        Arc::new(PgWarehouse::new(connector)),
        DashboardCache::default(),
    );

    let page = render_pass(&state).await;

    assert_eq!(page.matches("class=\"banner\"").count(), 1);
    assert!(page.contains("WAREHOUSE_PASSWORD"));
    assert!(page.contains(ERROR_HINT));
    assert!(!page.contains("<svg"));
    assert!(!page.contains("High Risk Suppliers"));
}
