//! Instance lookup for the gateway
//!
//! The gateway only needs "alive instances of X". In production that answer
//! comes from the registry over HTTP; an in-process [`ServiceRegistry`] can
//! answer it directly.

use async_trait::async_trait;
use hyper::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::registry::{InstanceEndpoint, ServiceRegistry};
use crate::types::{Result, SignpostError};

/// Source of alive instances for a service name
#[async_trait]
pub trait InstanceSource: Send + Sync {
    /// Alive instances in registry order.
    ///
    /// Errors keep the registry taxonomy (`UnknownService`,
    /// `NoAliveInstances`) or report `ServiceUnavailable` when the registry
    /// itself cannot be reached.
    async fn list_alive(&self, service: &str) -> Result<Vec<InstanceEndpoint>>;
}

#[async_trait]
impl InstanceSource for ServiceRegistry {
    async fn list_alive(&self, service: &str) -> Result<Vec<InstanceEndpoint>> {
        ServiceRegistry::list_alive(self, service)
    }
}

/// JSON error body produced by the registry server
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// HTTP client for `GET {discovery_url}/services/{name}`
pub struct DiscoveryClient {
    client: reqwest::Client,
    base_url: String,
}

impl DiscoveryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SignpostError::Config(format!("Failed to build discovery client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl InstanceSource for DiscoveryClient {
    async fn list_alive(&self, service: &str) -> Result<Vec<InstanceEndpoint>> {
        let url = format!("{}/services/{}", self.base_url, urlencoding::encode(service));
        debug!(url = %url, "Discovery lookup");

        let response = self.client.get(&url).send().await.map_err(|e| {
            SignpostError::ServiceUnavailable(format!("discovery lookup for '{service}' failed: {e}"))
        })?;

        match response.status() {
            StatusCode::OK => response.json::<Vec<InstanceEndpoint>>().await.map_err(|e| {
                SignpostError::ServiceUnavailable(format!("malformed discovery response: {e}"))
            }),
            StatusCode::NOT_FOUND => Err(SignpostError::UnknownService(service.to_string())),
            StatusCode::SERVICE_UNAVAILABLE => {
                Err(SignpostError::NoAliveInstances(service.to_string()))
            }
            other => Err(SignpostError::ServiceUnavailable(format!(
                "discovery returned {other} for '{service}'"
            ))),
        }
    }
}
