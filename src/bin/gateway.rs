//! Signpost gateway - round-robin reverse proxy over the registry

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use signpost::{
    config::GatewayArgs,
    logging,
    server::{self, GatewayServer},
    Gateway,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = GatewayArgs::parse();
    logging::init(&args.log_level);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Signpost Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Discovery: {} (timeout {}ms)", args.discovery_url, args.discovery_timeout_ms);
    info!("Forward timeout: {}ms", args.forward_timeout_ms);
    info!("======================================");

    let gateway = Arc::new(Gateway::from_args(&args)?);
    let handler = Arc::new(GatewayServer::new(gateway, args.node_id));

    tokio::select! {
        result = server::gateway::run(args.listen, handler) => {
            if let Err(e) = result {
                error!("Gateway server failed: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
