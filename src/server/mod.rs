//! HTTP servers
//!
//! hyper http1 with TokioIo, one task per connection. Each front-end
//! implements [`HttpHandler`] and is driven by [`serve`].

pub mod echo;
pub mod gateway;
pub mod registry;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error};

use crate::types::{Result, SignpostError};

pub use echo::EchoServer;
pub use gateway::GatewayServer;
pub use registry::RegistryServer;

/// A request handler that turns every outcome into a response
#[async_trait]
pub trait HttpHandler: Send + Sync + 'static {
    async fn handle(&self, addr: SocketAddr, req: Request<Incoming>) -> Response<Full<Bytes>>;
}

/// Accept connections forever, one task per connection
pub async fn serve<H: HttpHandler>(listener: TcpListener, handler: Arc<H>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let handler = Arc::clone(&handler);
                        async move { Ok::<_, Infallible>(handler.handle(addr, req).await) }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        debug!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Collect a request body into memory
pub async fn read_body(req: Request<Incoming>) -> Result<Bytes> {
    Ok(req.into_body().collect().await?.to_bytes())
}

/// Serialize `value` as a JSON response
pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|_| internal_error()),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            internal_error()
        }
    }
}

/// `{"error": "<code>", "message": "<text>"}` with the error's status
pub fn error_response(err: &SignpostError) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": err.error_code(),
        "message": err.to_string(),
    });
    json_response(err.status_code(), &body)
}

fn internal_error() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(
        br#"{"error":"internal","message":"failed to build response"}"#,
    )));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Strip `prefix` and return the single remaining path segment, percent-decoded
pub(crate) fn single_segment(path: &str, prefix: &str) -> Result<String> {
    let raw = path
        .strip_prefix(prefix)
        .ok_or_else(|| SignpostError::NotFound(path.to_string()))?;
    if raw.is_empty() || raw.contains('/') {
        return Err(SignpostError::NotFound(path.to_string()));
    }
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|e| SignpostError::BadRequest(format!("invalid path segment '{raw}': {e}")))
}
