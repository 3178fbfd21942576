//! Registry HTTP surface
//!
//! - `POST /register?name=&host=&port=` (or JSON body)
//! - `POST /heartbeat/{name}?host=&port=` (or JSON body)
//! - `GET /services/{name}` - alive instances
//! - `DELETE /services/{name}?host=&port=` - deregister
//! - `GET /services` - unfiltered dump
//! - `GET /health`

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::{error_response, json_response, read_body, single_segment, HttpHandler};
use crate::registry::{InstanceParams, RegisterParams, ServiceRegistry, StatusResponse};
use crate::types::{Result, SignpostError};

/// Health payload for the registry
#[derive(Serialize)]
pub struct RegistryHealth {
    pub healthy: bool,
    pub version: &'static str,
    pub commit: &'static str,
    pub build_time: &'static str,
    pub node_id: String,
    /// Uptime in seconds
    pub uptime: u64,
    pub services: usize,
    pub instances: usize,
    pub heartbeat_timeout_secs: u64,
    pub cleanup_interval_secs: u64,
}

pub struct RegistryServer {
    registry: Arc<ServiceRegistry>,
    node_id: Uuid,
    started: Instant,
}

impl RegistryServer {
    pub fn new(registry: Arc<ServiceRegistry>, node_id: Uuid) -> Self {
        Self {
            registry,
            node_id,
            started: Instant::now(),
        }
    }

    fn health(&self) -> RegistryHealth {
        let stats = self.registry.stats();
        let config = self.registry.config();
        RegistryHealth {
            healthy: true,
            version: env!("CARGO_PKG_VERSION"),
            commit: env!("GIT_COMMIT_SHORT"),
            build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
            node_id: self.node_id.to_string(),
            uptime: self.started.elapsed().as_secs(),
            services: stats.services,
            instances: stats.instances,
            heartbeat_timeout_secs: config.heartbeat_timeout.as_secs(),
            cleanup_interval_secs: config.cleanup_interval.as_secs(),
        }
    }

    async fn route(&self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().map(str::to_string);

        match (&method, path.as_str()) {
            (&Method::POST, "/register") => {
                let params: RegisterParams = params(query.as_deref(), req).await?;
                if params.name.is_empty() || params.name.contains('/') {
                    return Err(SignpostError::BadRequest(
                        "name must be a non-empty path segment".to_string(),
                    ));
                }
                let status = self.registry.register(&params.name, &params.host, params.port);
                Ok(json_response(StatusCode::OK, &StatusResponse::from(status)))
            }

            (&Method::GET, "/services") => {
                Ok(json_response(StatusCode::OK, &self.registry.list_all()))
            }

            (&Method::GET, "/health") => Ok(json_response(StatusCode::OK, &self.health())),

            (m, p) if p.starts_with("/heartbeat/") => {
                if m != Method::POST {
                    return Err(SignpostError::MethodNotAllowed(m.to_string()));
                }
                let name = single_segment(p, "/heartbeat/")?;
                let instance: InstanceParams = params(query.as_deref(), req).await?;
                self.registry
                    .heartbeat(&name, &instance.host, instance.port)?;
                Ok(json_response(StatusCode::OK, &StatusResponse::new("alive")))
            }

            (m, p) if p.starts_with("/services/") => {
                let name = single_segment(p, "/services/")?;
                match *m {
                    Method::GET => {
                        let alive = self.registry.list_alive(&name)?;
                        Ok(json_response(StatusCode::OK, &alive))
                    }
                    Method::DELETE => {
                        let instance: InstanceParams = params(query.as_deref(), req).await?;
                        self.registry
                            .deregister(&name, &instance.host, instance.port)?;
                        Ok(json_response(
                            StatusCode::OK,
                            &StatusResponse::new("deregistered"),
                        ))
                    }
                    _ => Err(SignpostError::MethodNotAllowed(m.to_string())),
                }
            }

            _ => Err(SignpostError::NotFound(path)),
        }
    }
}

#[async_trait]
impl HttpHandler for RegistryServer {
    async fn handle(&self, addr: SocketAddr, req: Request<Incoming>) -> Response<Full<Bytes>> {
        debug!("[{}] {} {}", addr, req.method(), req.uri());
        match self.route(req).await {
            Ok(response) => response,
            Err(err) => {
                debug!(status = %err.status_code(), error = %err, "Registry request rejected");
                error_response(&err)
            }
        }
    }
}

/// Parameters from the query string, falling back to a JSON body
async fn params<T: DeserializeOwned>(query: Option<&str>, req: Request<Incoming>) -> Result<T> {
    match query {
        Some(q) if !q.is_empty() => Ok(serde_urlencoded::from_str(q)?),
        _ => {
            let body = read_body(req).await?;
            if body.is_empty() {
                return Err(SignpostError::BadRequest(
                    "missing parameters: provide a query string or JSON body".to_string(),
                ));
            }
            Ok(serde_json::from_slice(&body)?)
        }
    }
}

/// Bind `addr` and serve the registry
pub async fn run(addr: SocketAddr, server: Arc<RegistryServer>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Registry listening on {} as node {}", addr, server.node_id);
    super::serve(listener, server).await
}
