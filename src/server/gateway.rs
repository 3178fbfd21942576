//! Gateway HTTP surface
//!
//! `{GET,POST,PUT,DELETE,PATCH} /{service}/{path...}` is proxied;
//! `GET /_gateway/health` reports gateway status.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::{error_response, json_response, read_body, HttpHandler};
use crate::gateway::{Gateway, ProxiedResponse, ProxyRequest};
use crate::types::{Result, SignpostError};

/// Path reserved for the gateway's own endpoints
pub const HEALTH_PATH: &str = "/_gateway/health";

const PROXIED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
];

#[derive(Serialize)]
pub struct GatewayHealth {
    pub healthy: bool,
    pub version: &'static str,
    pub commit: &'static str,
    pub build_time: &'static str,
    pub node_id: String,
    /// Uptime in seconds
    pub uptime: u64,
    /// Services with a round-robin cursor
    pub tracked_services: usize,
}

pub struct GatewayServer {
    gateway: Arc<Gateway>,
    node_id: Uuid,
    started: Instant,
}

/// `/{service}/{rest}` split into its parts
#[derive(Debug, PartialEq, Eq)]
pub struct ServicePath {
    /// Percent-decoded service name
    pub service: String,
    /// Service segment as received
    pub segment: String,
    /// Raw remainder after `/{service}/`
    pub sub_path: String,
}

pub fn split_service_path(path: &str) -> Result<ServicePath> {
    let trimmed = path.trim_start_matches('/');
    let (segment, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
    if segment.is_empty() {
        return Err(SignpostError::NotFound(path.to_string()));
    }
    let service = urlencoding::decode(segment)
        .map_err(|e| SignpostError::BadRequest(format!("invalid service name: {e}")))?
        .into_owned();
    Ok(ServicePath {
        service,
        segment: segment.to_string(),
        sub_path: rest.to_string(),
    })
}

impl GatewayServer {
    pub fn new(gateway: Arc<Gateway>, node_id: Uuid) -> Self {
        Self {
            gateway,
            node_id,
            started: Instant::now(),
        }
    }

    fn health(&self) -> GatewayHealth {
        GatewayHealth {
            healthy: true,
            version: env!("CARGO_PKG_VERSION"),
            commit: env!("GIT_COMMIT_SHORT"),
            build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
            node_id: self.node_id.to_string(),
            uptime: self.started.elapsed().as_secs(),
            tracked_services: self.gateway.tracked_services(),
        }
    }

    async fn proxy(&self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>> {
        let path = req.uri().path().to_string();

        if req.method() == Method::GET && path == HEALTH_PATH {
            return Ok(json_response(StatusCode::OK, &self.health()));
        }

        let target = split_service_path(&path)?;
        if !PROXIED_METHODS.contains(req.method()) {
            return Err(SignpostError::MethodNotAllowed(req.method().to_string()));
        }

        let method = req.method().clone();
        let headers = req.headers().clone();
        let query = req.uri().query().map(str::to_string);
        let body = read_body(req).await?;

        let request = ProxyRequest {
            service: target.service,
            service_segment: target.segment,
            sub_path: target.sub_path,
            method,
            headers,
            query,
            body,
        };

        let proxied = self.gateway.route(&request).await?;
        Ok(into_response(proxied))
    }
}

fn into_response(proxied: ProxiedResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(proxied.body));
    *response.status_mut() = proxied.status;
    *response.headers_mut() = proxied.headers;
    response
}

#[async_trait]
impl HttpHandler for GatewayServer {
    async fn handle(&self, addr: SocketAddr, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match self.proxy(req).await {
            Ok(response) => {
                info!("[{}] {} {} -> {}", addr, method, path, response.status());
                response
            }
            Err(err) => {
                warn!("[{}] {} {} -> {} ({})", addr, method, path, err.status_code(), err);
                error_response(&err)
            }
        }
    }
}

/// Bind `addr` and serve the gateway
pub async fn run(addr: SocketAddr, server: Arc<GatewayServer>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Gateway listening on {} as node {}", addr, server.node_id);
    super::serve(listener, server).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(path: &str) -> (String, String, String) {
        let p = split_service_path(path).unwrap();
        (p.service, p.segment, p.sub_path)
    }

    #[test]
    fn test_split_service_path() {
        assert_eq!(
            parts("/orders/user/7"),
            ("orders".into(), "orders".into(), "user/7".into())
        );
        assert_eq!(parts("/orders"), ("orders".into(), "orders".into(), String::new()));
        assert_eq!(parts("/orders/"), ("orders".into(), "orders".into(), String::new()));
        assert!(split_service_path("/").is_err());
    }

    #[test]
    fn test_split_keeps_raw_segment_for_forwarding() {
        assert_eq!(
            parts("/order%20svc/x"),
            ("order svc".into(), "order%20svc".into(), "x".into())
        );
        assert_eq!(
            parts("/orders:v1/x"),
            ("orders:v1".into(), "orders:v1".into(), "x".into())
        );
    }

    #[test]
    fn test_into_response_relays_verbatim() {
        let mut headers = hyper::HeaderMap::new();
        headers.insert("x-downstream", "yes".parse().unwrap());
        let response = into_response(ProxiedResponse {
            status: StatusCode::CREATED,
            headers,
            body: Bytes::from_static(b"{}"),
        });

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-downstream").unwrap(), "yes");
    }
}
