use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use vda5050_tcp_bridge::config::{self, BrokerConfig};
use vda5050_tcp_bridge::supervisor::BridgeSupervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let broker_path = std::env::var("BRIDGE_BROKER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config/broker.yaml"));
    let agv_dir = std::env::var("BRIDGE_AGV_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config/agvs"));

    let broker = BrokerConfig::load(&broker_path)?;
    let agv_configs = config::load_agv_configs(&agv_dir)?;
    tracing::info!(count = agv_configs.len(), "loaded AGV configs");

    let supervisor = BridgeSupervisor::new(&broker)?;
    supervisor.start(&broker, agv_configs).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    supervisor.shutdown().await;

    Ok(())
}
