use anyhow::Context;

use supplier_risk_dashboard::warehouse::{PgWarehouse, Warehouse, WarehouseConnector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let warehouse = PgWarehouse::new(WarehouseConnector::from_env());
    warehouse
        .connect()
        .await
        .context("failed to connect to the warehouse")?;
    println!("Connected to the warehouse successfully!");

    let suppliers = warehouse
        .supplier_count()
        .await
        .context("failed to count suppliers")?;
    println!("Number of suppliers in database: {suppliers}");

    warehouse.close().await;
    Ok(())
}
