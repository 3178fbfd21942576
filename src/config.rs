//! Configuration for the registry, gateway and registration agent
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

/// Default heartbeat timeout (TTL) in seconds
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 15;

/// Default sweep period in seconds
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 5;

/// Signpost registry - tracks live service instances via heartbeats
#[derive(Parser, Debug, Clone)]
#[command(name = "signpost-registry")]
#[command(about = "Service registry with heartbeat TTL eviction")]
pub struct RegistryArgs {
    /// Unique node identifier for this registry process
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Seconds without a heartbeat after which an instance is dead
    #[arg(long, env = "HEARTBEAT_TIMEOUT_SECS", default_value_t = DEFAULT_HEARTBEAT_TIMEOUT_SECS)]
    pub heartbeat_timeout_secs: u64,

    /// Seconds between background sweeps
    #[arg(long, env = "CLEANUP_INTERVAL_SECS", default_value_t = DEFAULT_CLEANUP_INTERVAL_SECS)]
    pub cleanup_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl RegistryArgs {
    /// Heartbeat timeout as a duration
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Sweep period as a duration
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.heartbeat_timeout_secs == 0 {
            return Err("HEARTBEAT_TIMEOUT_SECS must be greater than zero".to_string());
        }
        if self.cleanup_interval_secs == 0 {
            return Err("CLEANUP_INTERVAL_SECS must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Signpost gateway - round-robin reverse proxy over the registry
#[derive(Parser, Debug, Clone)]
#[command(name = "signpost-gateway")]
#[command(about = "Reverse proxy that load-balances across registered instances")]
pub struct GatewayArgs {
    /// Unique node identifier for this gateway process
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Base URL of the registry
    #[arg(long, env = "DISCOVERY_URL", default_value = "http://localhost:8000")]
    pub discovery_url: String,

    /// Timeout for registry lookups in milliseconds
    #[arg(long, env = "DISCOVERY_TIMEOUT_MS", default_value = "3000")]
    pub discovery_timeout_ms: u64,

    /// Timeout for forwarded requests in milliseconds
    #[arg(long, env = "FORWARD_TIMEOUT_MS", default_value = "10000")]
    pub forward_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl GatewayArgs {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        validate_base_url("DISCOVERY_URL", &self.discovery_url)?;
        if self.discovery_timeout_ms == 0 || self.forward_timeout_ms == 0 {
            return Err("timeouts must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Registration settings for a downstream service instance
#[derive(Parser, Debug, Clone)]
pub struct AgentArgs {
    /// Base URL of the registry
    #[arg(long, env = "DISCOVERY_URL", default_value = "http://localhost:8000")]
    pub discovery_url: String,

    /// Logical service name to register under
    #[arg(long, env = "SERVICE_NAME")]
    pub service_name: String,

    /// Host other processes use to reach this instance
    #[arg(long, env = "ADVERTISE_HOST", default_value = "localhost")]
    pub advertise_host: String,

    /// Port other processes use to reach this instance
    #[arg(long, env = "ADVERTISE_PORT")]
    pub advertise_port: u16,

    /// Seconds between heartbeats
    #[arg(long, env = "HEARTBEAT_INTERVAL_SECS", default_value = "5")]
    pub heartbeat_interval_secs: u64,

    /// Timeout for each registry call in milliseconds
    #[arg(long, env = "AGENT_TIMEOUT_MS", default_value = "2000")]
    pub agent_timeout_ms: u64,
}

impl AgentArgs {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        validate_base_url("DISCOVERY_URL", &self.discovery_url)?;
        if self.service_name.is_empty() || self.service_name.contains('/') {
            return Err("SERVICE_NAME must be a non-empty path segment".to_string());
        }
        if self.heartbeat_interval_secs == 0 {
            return Err("HEARTBEAT_INTERVAL_SECS must be greater than zero".to_string());
        }
        Ok(())
    }
}

fn validate_base_url(var: &str, url: &str) -> Result<(), String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(format!("{var} must start with http:// or https://, got '{url}'"))
    }
}
