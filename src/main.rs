use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use supplier_risk_dashboard::cache::DashboardCache;
use supplier_risk_dashboard::server::{self, AppState};
use supplier_risk_dashboard::telemetry;
use supplier_risk_dashboard::warehouse::{PgWarehouse, WarehouseConnector};

#[derive(Parser)]
#[command(name = "supplier-risk-dashboard")]
#[command(about = "Supplier risk intelligence dashboard served over HTTP", long_about = None)]
struct Cli {
    /// Address the dashboard listens on
    #[arg(long, env = "DASHBOARD_BIND", default_value = "127.0.0.1:8501")]
    bind: SocketAddr,
    /// How long each query result is reused before it is fetched again
    #[arg(long, env = "DASHBOARD_CACHE_TTL_SECS", default_value_t = 300)]
    cache_ttl_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing();

    // Credentials are read when the first page is rendered, so a bad
    // environment shows up as the error banner instead of a startup failure.
    let warehouse = Arc::new(PgWarehouse::new(WarehouseConnector::from_env()));
    let cache = DashboardCache::new(Duration::from_secs(cli.cache_ttl_secs));

    server::serve(cli.bind, AppState::new(warehouse, cache)).await
}
