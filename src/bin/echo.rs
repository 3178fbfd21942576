//! Signpost echo - demo downstream instance
//!
//! Serves `/{SERVICE_NAME}/*` with a JSON echo and keeps itself registered.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use signpost::{
    agent::{AgentConfig, RegistrationAgent},
    config::AgentArgs,
    logging,
    server::{self, EchoServer},
};

#[derive(Parser, Debug)]
#[command(name = "signpost-echo")]
#[command(about = "Echo instance that registers itself with the signpost registry")]
struct EchoArgs {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:9001")]
    listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(flatten)]
    agent: AgentArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = EchoArgs::parse();
    logging::init(&args.log_level);

    if let Err(e) = args.agent.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let config = AgentConfig::from(&args.agent);
    let instance = format!("{}:{}", config.host, config.port);
    info!(
        "Echo instance for '{}' on {} (advertised as {}, registry {})",
        config.service_name, args.listen, instance, config.discovery_url
    );

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    let handler = Arc::new(EchoServer::new(config.service_name.clone(), instance));

    let agent = Arc::new(RegistrationAgent::new(config)?);
    let heartbeat = Arc::clone(&agent).start().await;

    tokio::select! {
        result = server::serve(listener, handler) => {
            if let Err(e) = result {
                error!("Echo server failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    agent.stop().await;
    if let Some(heartbeat) = heartbeat {
        heartbeat.abort();
    }
    if let Err(e) = agent.deregister().await {
        warn!("Deregistration failed: {}", e);
    }

    Ok(())
}
