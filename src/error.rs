use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),
    #[error("environment variable {var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to connect to the warehouse: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("query {query} failed: {source}")]
    Query {
        query: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl WarehouseError {
    pub fn query(query: &'static str) -> impl FnOnce(sqlx::Error) -> WarehouseError {
        move |source| WarehouseError::Query { query, source }
    }
}

/// Failure of a render pass, surfaced to the reader as a single banner.
///
/// The warehouse error is shared because every session waiting on the same
/// failed refresh reports it.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Warehouse(#[from] Arc<WarehouseError>),
}

impl From<WarehouseError> for DashboardError {
    fn from(err: WarehouseError) -> Self {
        DashboardError::Warehouse(Arc::new(err))
    }
}
