use std::env;

use sqlx::postgres::PgConnectOptions;

use crate::error::ConfigError;

pub const ACCOUNT_VAR: &str = "WAREHOUSE_ACCOUNT";
pub const USER_VAR: &str = "WAREHOUSE_USER";
pub const PASSWORD_VAR: &str = "WAREHOUSE_PASSWORD";
pub const WAREHOUSE_VAR: &str = "WAREHOUSE_NAME";
pub const DATABASE_VAR: &str = "WAREHOUSE_DATABASE";
pub const SCHEMA_VAR: &str = "WAREHOUSE_SCHEMA";
pub const PORT_VAR: &str = "WAREHOUSE_PORT";

const DEFAULT_PORT: u16 = 5432;

/// Connection settings for the warehouse, read once when the first
/// connection is opened.
#[derive(Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    pub account: String,
    pub user: String,
    pub password: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub port: u16,
}

impl std::fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("port", &self.port)
            .finish()
    }
}

impl WarehouseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let port = match lookup(PORT_VAR).map(|v| v.trim().to_string()) {
            Some(raw) if !raw.is_empty() => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: PORT_VAR,
                value: raw,
            })?,
            _ => DEFAULT_PORT,
        };

        Ok(Self {
            account: required(ACCOUNT_VAR)?,
            user: required(USER_VAR)?,
            password: required(PASSWORD_VAR)?,
            warehouse: required(WAREHOUSE_VAR)?,
            database: required(DATABASE_VAR)?,
            schema: required(SCHEMA_VAR)?,
            port,
        })
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.account)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .application_name(&format!("supplier-risk-dashboard/{}", self.warehouse))
            .options([("search_path", self.schema.as_str())])
    }
}

pub fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}
