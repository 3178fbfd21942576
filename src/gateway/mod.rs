//! Gateway router
//!
//! Single-shot resolve-then-forward: look up alive instances of the first
//! path segment, pick one round-robin, forward, relay. The only state kept
//! between requests is the round-robin cursor table.
//!
//! ## Failure handling
//!
//! - Resolution failures (never registered, all dead, registry unreachable)
//!   collapse into one `503 Service Unavailable`; callers cannot tell them apart.
//! - A failed forward is not retried against another instance. This keeps the
//!   gateway simple and must be revisited before relying on it for
//!   non-idempotent traffic with strict availability needs.

pub mod balancer;
pub mod discovery;
pub mod forward;

pub use balancer::RoundRobin;
pub use discovery::{DiscoveryClient, InstanceSource};
pub use forward::{Forwarder, ProxiedResponse, ProxyRequest};

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::GatewayArgs;
use crate::registry::InstanceEndpoint;
use crate::types::{Result, SignpostError};

/// Resolves service names to instances and forwards requests
pub struct Gateway {
    source: Arc<dyn InstanceSource>,
    balancer: RoundRobin,
    forwarder: Forwarder,
}

impl Gateway {
    pub fn new(source: Arc<dyn InstanceSource>, forwarder: Forwarder) -> Self {
        Self {
            source,
            balancer: RoundRobin::new(),
            forwarder,
        }
    }

    /// Gateway backed by the HTTP discovery client
    pub fn from_args(args: &GatewayArgs) -> Result<Self> {
        let discovery = DiscoveryClient::new(&args.discovery_url, args.discovery_timeout())?;
        let forwarder = Forwarder::new(args.forward_timeout())?;
        Ok(Self::new(Arc::new(discovery), forwarder))
    }

    /// Resolve `service` and advance its round-robin cursor
    pub async fn select_instance(&self, service: &str) -> Result<InstanceEndpoint> {
        let instances = match self.source.list_alive(service).await {
            Ok(instances) => instances,
            Err(err) => {
                if err.is_resolution_failure() {
                    debug!(service = %service, error = %err, "Service not resolvable");
                } else {
                    warn!(service = %service, error = %err, "Discovery lookup failed");
                }
                self.balancer.forget(service);
                return Err(SignpostError::ServiceUnavailable(service.to_string()));
            }
        };

        self.balancer
            .select(service, &instances)
            .cloned()
            .ok_or_else(|| SignpostError::ServiceUnavailable(service.to_string()))
    }

    /// Forward `request` to one alive instance of `request.service`
    pub async fn route(&self, request: &ProxyRequest) -> Result<ProxiedResponse> {
        let instance = self.select_instance(&request.service).await?;
        debug!(
            service = %request.service,
            instance = %instance.authority(),
            "Selected instance"
        );
        self.forwarder.forward(&instance, request).await
    }

    /// Number of services with a round-robin cursor
    pub fn tracked_services(&self) -> usize {
        self.balancer.tracked()
    }
}
