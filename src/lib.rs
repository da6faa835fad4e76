pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod models;
pub mod report;
pub mod server;
pub mod telemetry;
pub mod warehouse;
