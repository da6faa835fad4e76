use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::WarehouseConfig;
use crate::db;
use crate::error::{ConfigError, WarehouseError};
use crate::models::{AlertRow, CategoryRow, RiskScoreRow, TrendPoint};

/// Read-only query surface of the warehouse.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn risk_scores(&self) -> Result<Vec<RiskScoreRow>, WarehouseError>;
    async fn recent_alerts(&self) -> Result<Vec<AlertRow>, WarehouseError>;
    async fn sentiment_trend(&self) -> Result<Vec<TrendPoint>, WarehouseError>;
    async fn category_analysis(&self) -> Result<Vec<CategoryRow>, WarehouseError>;
    async fn supplier_count(&self) -> Result<i64, WarehouseError>;
}

type ConfigLoader = Box<dyn Fn() -> Result<WarehouseConfig, ConfigError> + Send + Sync>;

/// Owns the one connection handle of the process. The handle is opened on
/// first use and reused afterwards; a failed attempt leaves the slot empty.
pub struct WarehouseConnector {
    load_config: ConfigLoader,
    pool: OnceCell<PgPool>,
}

impl WarehouseConnector {
    pub fn from_env() -> Self {
        Self::with_config_loader(WarehouseConfig::from_env)
    }

    pub fn with_config_loader<F>(load_config: F) -> Self
    where
        F: Fn() -> Result<WarehouseConfig, ConfigError> + Send + Sync + 'static,
    {
        Self {
            load_config: Box::new(load_config),
            pool: OnceCell::new(),
        }
    }

    pub async fn get_connection(&self) -> Result<PgPool, WarehouseError> {
        let pool = self
            .pool
            .get_or_try_init(|| async {
                let config = (self.load_config)()?;
                let pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(config.connect_options())
                    .await
                    .map_err(WarehouseError::Connect)?;
                info!(
                    account = %config.account,
                    warehouse = %config.warehouse,
                    database = %config.database,
                    schema = %config.schema,
                    "warehouse connection established"
                );
                Ok::<_, WarehouseError>(pool)
            })
            .await?;
        Ok(pool.clone())
    }

    #[cfg(test)]
    fn is_connected(&self) -> bool {
        self.pool.initialized()
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

pub struct PgWarehouse {
    connector: WarehouseConnector,
}

impl PgWarehouse {
    pub fn new(connector: WarehouseConnector) -> Self {
        Self { connector }
    }

    /// Opens the connection now instead of on the first query.
    pub async fn connect(&self) -> Result<(), WarehouseError> {
        self.connector.get_connection().await.map(|_| ())
    }

    pub async fn close(&self) {
        self.connector.close().await;
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn risk_scores(&self) -> Result<Vec<RiskScoreRow>, WarehouseError> {
        let pool = self.connector.get_connection().await?;
        db::fetch_risk_scores(&pool).await
    }

    async fn recent_alerts(&self) -> Result<Vec<AlertRow>, WarehouseError> {
        let pool = self.connector.get_connection().await?;
        db::fetch_recent_alerts(&pool).await
    }

    async fn sentiment_trend(&self) -> Result<Vec<TrendPoint>, WarehouseError> {
        let pool = self.connector.get_connection().await?;
        db::fetch_sentiment_trend(&pool).await
    }

    async fn category_analysis(&self) -> Result<Vec<CategoryRow>, WarehouseError> {
        let pool = self.connector.get_connection().await?;
        db::fetch_category_analysis(&pool).await
    }

    async fn supplier_count(&self) -> Result<i64, WarehouseError> {
        let pool = self.connector.get_connection().await?;
        db::count_suppliers(&pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PASSWORD_VAR;

    #[tokio::test]
    async fn missing_password_fails_before_handshake() {
        let connector =
            WarehouseConnector::with_config_loader(|| Err(ConfigError::Missing(PASSWORD_VAR)));
        let err = connector.get_connection().await.unwrap_err();
        assert!(matches!(
            err,
            WarehouseError::Config(ConfigError::Missing(PASSWORD_VAR))
        ));
        assert!(!connector.is_connected());
    }

    #[tokio::test]
    async fn eager_connect_reports_config_error() {
        let warehouse = PgWarehouse::new(WarehouseConnector::with_config_loader(|| {
            Err(ConfigError::Missing(PASSWORD_VAR))
        }));
        let err = warehouse.connect().await.unwrap_err();
        assert!(matches!(err, WarehouseError::Config(_)));
        assert!(!warehouse.connector.is_connected());
        // closing an unopened warehouse is a no-op
        warehouse.close().await;
    }

    #[tokio::test]
    async fn failed_attempt_is_not_remembered() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let connector = WarehouseConnector::with_config_loader(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(ConfigError::Missing(PASSWORD_VAR))
        });
        let warehouse = PgWarehouse::new(connector);

        assert!(warehouse.risk_scores().await.is_err());
        assert!(warehouse.supplier_count().await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
