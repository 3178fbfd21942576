//! Echo downstream
//!
//! Minimal instance used to exercise registration and proxying end to end.
//! Answers any request under `/{service}` with a JSON description of what it
//! received.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;

use super::{error_response, json_response, read_body, HttpHandler};
use crate::types::SignpostError;

/// What the echo instance saw
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoReply {
    /// `host:port` of the instance that answered
    pub instance: String,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub struct EchoServer {
    service: String,
    instance: String,
}

impl EchoServer {
    pub fn new(service: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            instance: instance.into(),
        }
    }

    fn owns(&self, path: &str) -> bool {
        path.strip_prefix('/')
            .and_then(|p| p.strip_prefix(self.service.as_str()))
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

#[async_trait]
impl HttpHandler for EchoServer {
    async fn handle(&self, _addr: SocketAddr, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();
        if !self.owns(&path) {
            return error_response(&SignpostError::NotFound(path));
        }

        let method = req.method().to_string();
        let query = req.uri().query().map(str::to_string);
        let headers = req
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = match read_body(req).await {
            Ok(body) => String::from_utf8_lossy(&body).into_owned(),
            Err(err) => return error_response(&err),
        };

        json_response(
            StatusCode::OK,
            &EchoReply {
                instance: self.instance.clone(),
                method,
                path,
                query,
                headers,
                body,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owns_only_its_prefix() {
        let echo = EchoServer::new("orders", "127.0.0.1:9001");
        assert!(echo.owns("/orders"));
        assert!(echo.owns("/orders/7"));
        assert!(!echo.owns("/ordersx"));
        assert!(!echo.owns("/users/1"));
    }
}
