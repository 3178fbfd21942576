//! Shared helpers for the in-process integration tests
//!
//! Every server binds `127.0.0.1:0` and runs on a spawned task for the
//! lifetime of the test runtime.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use signpost::gateway::{DiscoveryClient, Forwarder, Gateway};
use signpost::registry::{RegistryConfig, ServiceRegistry};
use signpost::server::{self, EchoServer, GatewayServer, HttpHandler, RegistryServer};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct Spawned {
    pub addr: SocketAddr,
    pub task: JoinHandle<()>,
}

impl Spawned {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Serve `handler` on an ephemeral local port
pub async fn spawn_handler<H: HttpHandler>(handler: Arc<H>) -> Spawned {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let _ = server::serve(listener, handler).await;
    });
    Spawned { addr, task }
}

pub fn registry_with_ttl(ttl: Duration) -> Arc<ServiceRegistry> {
    Arc::new(ServiceRegistry::new(RegistryConfig {
        heartbeat_timeout: ttl,
        cleanup_interval: Duration::from_millis(50),
    }))
}

pub async fn spawn_registry(registry: Arc<ServiceRegistry>) -> Spawned {
    spawn_handler(Arc::new(RegistryServer::new(registry, Uuid::new_v4()))).await
}

/// Echo instance for `service`; the reported instance is its real address
pub async fn spawn_echo(service: &str) -> Spawned {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(EchoServer::new(service, addr.to_string()));
    let task = tokio::spawn(async move {
        let _ = server::serve(listener, handler).await;
    });
    Spawned { addr, task }
}

/// Gateway resolving straight from an in-process registry
pub async fn spawn_gateway(registry: Arc<ServiceRegistry>, forward_timeout: Duration) -> Spawned {
    let forwarder = Forwarder::new(forward_timeout).unwrap();
    let gateway = Arc::new(Gateway::new(registry, forwarder));
    spawn_handler(Arc::new(GatewayServer::new(gateway, Uuid::new_v4()))).await
}

/// Gateway resolving through the registry's HTTP API, as the binary does
pub async fn spawn_discovery_gateway(registry_url: &str, forward_timeout: Duration) -> Spawned {
    let discovery = DiscoveryClient::new(registry_url, Duration::from_secs(2)).unwrap();
    let forwarder = Forwarder::new(forward_timeout).unwrap();
    let gateway = Arc::new(Gateway::new(Arc::new(discovery), forwarder));
    spawn_handler(Arc::new(GatewayServer::new(gateway, Uuid::new_v4()))).await
}

/// A local port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
