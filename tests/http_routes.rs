use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use supplier_risk_dashboard::cache::DashboardCache;
use supplier_risk_dashboard::config::PASSWORD_VAR;
use supplier_risk_dashboard::error::{ConfigError, WarehouseError};
use supplier_risk_dashboard::models::{
    AlertRow, CategoryRow, RiskCategory, RiskScoreRow, TrendPoint,
};
use supplier_risk_dashboard::server::{build_router, AppState};
use supplier_risk_dashboard::warehouse::Warehouse;

/// Serves fixed rows, or fails every query when `broken` is set.
struct StubWarehouse {
    broken: bool,
    calls: AtomicUsize,
}

impl StubWarehouse {
    fn healthy() -> Arc<Self> {
        Arc::new(Self {
            broken: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            broken: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), WarehouseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(ConfigError::Missing(PASSWORD_VAR).into());
        }
        Ok(())
    }
}

#[async_trait]
impl Warehouse for StubWarehouse {
    async fn risk_scores(&self) -> Result<Vec<RiskScoreRow>, WarehouseError> {
        self.check()?;
        Ok(vec![RiskScoreRow {
            supplier_id: "7".to_string(),
            supplier_name: "Fabrikam".to_string(),
            avg_sentiment_score: Some(-0.42),
            total_communications: 11,
            negative_count: 4,
            risk_category: RiskCategory::High,
        }])
    }

    async fn recent_alerts(&self) -> Result<Vec<AlertRow>, WarehouseError> {
        self.check()?;
        Ok(vec![AlertRow {
            supplier_name: "Fabrikam".to_string(),
            subject: "Invoice dispute".to_string(),
            communication_date: NaiveDate::from_ymd_opt(2026, 4, 2)
                .unwrap()
                .and_hms_opt(14, 5, 0)
                .unwrap(),
            sentiment_score: None,
            source_type: "TICKET".to_string(),
            key_phrases: "overbilling".to_string(),
        }])
    }

    async fn sentiment_trend(&self) -> Result<Vec<TrendPoint>, WarehouseError> {
        self.check()?;
        Ok(vec![TrendPoint {
            day: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            avg_sentiment: Some(-0.42),
            comm_count: 11,
        }])
    }

    async fn category_analysis(&self) -> Result<Vec<CategoryRow>, WarehouseError> {
        self.check()?;
        Ok(vec![CategoryRow {
            category: "Packaging".to_string(),
            supplier_count: 1,
            avg_sentiment: None,
            negative_count: 4,
        }])
    }

    async fn supplier_count(&self) -> Result<i64, WarehouseError> {
        self.check()?;
        Ok(1)
    }
}

async fn spawn_app(warehouse: Arc<StubWarehouse>) -> SocketAddr {
    let state = AppState::new(warehouse, DashboardCache::new(Duration::from_secs(300)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let app = build_router(state);
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

async fn send_raw(addr: SocketAddr, path: &str) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let req = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    (status, head.to_ascii_lowercase(), body.to_string())
}

#[tokio::test]
async fn snapshot_endpoint_returns_metrics_and_row_sets() {
    let warehouse = StubWarehouse::healthy();
    let addr = spawn_app(Arc::clone(&warehouse)).await;

    let (status, head, body) = send_raw(addr, "/api/snapshot").await;
    assert_eq!(status, 200);
    assert!(head.contains("content-type: application/json"));

    let json: Value = serde_json::from_str(&body).expect("snapshot json");
    assert_eq!(json["metrics"]["high_risk_count"], 1);
    assert_eq!(json["metrics"]["total_communications"], 11);
    assert_eq!(json["metrics"]["negative_alerts"], 4);
    for key in ["risk_scores", "alerts", "trend", "categories"] {
        assert_eq!(
            json[key].as_array().map(Vec::len),
            Some(1),
            "{key} should hold one row"
        );
    }
    assert_eq!(json["risk_scores"][0]["risk_category"], "HIGH_RISK");
    assert_eq!(json["categories"][0]["avg_sentiment"], Value::Null);
    assert_eq!(json["alerts"][0]["sentiment_score"], Value::Null);
    assert_eq!(warehouse.calls(), 4);
}

#[tokio::test]
async fn snapshot_endpoint_reports_warehouse_failure_as_503() {
    let warehouse = StubWarehouse::broken();
    let addr = spawn_app(Arc::clone(&warehouse)).await;

    let (status, head, body) = send_raw(addr, "/api/snapshot").await;
    assert_eq!(status, 503);
    assert!(head.contains("content-type: application/json"));

    let json: Value = serde_json::from_str(&body).expect("error json");
    let message = json["error"].as_str().expect("error message");
    assert!(message.contains(PASSWORD_VAR));
    // the first failing query stops the pass
    assert_eq!(warehouse.calls(), 1);
}

#[tokio::test]
async fn health_check_never_touches_the_warehouse() {
    let warehouse = StubWarehouse::broken();
    let addr = spawn_app(Arc::clone(&warehouse)).await;

    let (status, _, body) = send_raw(addr, "/healthz").await;
    assert_eq!(status, 200);
    assert_eq!(body, "ok");
    assert_eq!(warehouse.calls(), 0);
}

#[tokio::test]
async fn root_serves_the_html_dashboard() {
    let addr = spawn_app(StubWarehouse::healthy()).await;

    let (status, head, body) = send_raw(addr, "/").await;
    assert_eq!(status, 200);
    assert!(head.contains("content-type: text/html"));
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains("Supplier Risk Intelligence Dashboard"));
    assert!(body.contains("Invoice dispute"));
    assert!(!body.contains("class=\"banner\""));
}

#[tokio::test]
async fn root_shows_the_banner_when_the_warehouse_fails() {
    let addr = spawn_app(StubWarehouse::broken()).await;

    let (status, head, body) = send_raw(addr, "/").await;
    assert_eq!(status, 200);
    assert!(head.contains("content-type: text/html"));
    assert_eq!(body.matches("class=\"banner\"").count(), 1);
    assert!(body.contains(PASSWORD_VAR));
    assert!(!body.contains("<svg"));
}
