//! Signpost registry - tracks live service instances via heartbeats

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use signpost::{
    config::RegistryArgs,
    logging,
    registry::{spawn_sweep_task, RegistryConfig, ServiceRegistry},
    server::{self, RegistryServer},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = RegistryArgs::parse();
    logging::init(&args.log_level);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Signpost Registry");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Heartbeat timeout: {}s", args.heartbeat_timeout_secs);
    info!("Cleanup interval: {}s", args.cleanup_interval_secs);
    info!("======================================");

    let config = RegistryConfig::from(&args);
    let registry = Arc::new(ServiceRegistry::new(config.clone()));
    let sweep = spawn_sweep_task(Arc::clone(&registry), config.cleanup_interval);

    let handler = Arc::new(RegistryServer::new(Arc::clone(&registry), args.node_id));

    tokio::select! {
        result = server::registry::run(args.listen, handler) => {
            if let Err(e) = result {
                error!("Registry server failed: {}", e);
                sweep.abort();
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    sweep.abort();
    Ok(())
}
