//! Request forwarding to a selected instance
//!
//! Method, end-to-end headers, raw query string and raw body go out
//! unchanged. `Host` is never copied: the client derives it from the target
//! authority. Hop-by-hop headers and `Content-Length` are connection framing
//! and are re-derived for each leg.

use bytes::Bytes;
use hyper::header::{HeaderMap, HeaderName, CONNECTION, CONTENT_LENGTH, HOST};
use hyper::{Method, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::registry::InstanceEndpoint;
use crate::types::{Result, SignpostError};

/// Headers scoped to a single connection (RFC 9110 section 7.6.1)
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Inbound request as seen by the gateway
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Logical service name (first path segment, percent-decoded)
    pub service: String,
    /// First path segment exactly as received
    pub service_segment: String,
    /// Remainder of the path after `/{service}/`, raw; may be empty
    pub sub_path: String,
    pub method: Method,
    pub headers: HeaderMap,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    pub body: Bytes,
}

/// Downstream response relayed back to the caller
#[derive(Debug, Clone)]
pub struct ProxiedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// `http://{host}:{port}/{service_segment}[/{sub_path}][?{query}]`
///
/// Both path parts are used as received, without re-encoding.
pub fn target_url(
    instance: &InstanceEndpoint,
    service_segment: &str,
    sub_path: &str,
    query: Option<&str>,
) -> String {
    let mut url = format!("http://{}/{}", instance.authority(), service_segment);
    if !sub_path.is_empty() {
        url.push('/');
        url.push_str(sub_path);
    }
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(q);
    }
    url
}

/// Names listed in the `Connection` header are hop-by-hop as well
fn connection_listed(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect()
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let listed = connection_listed(headers);
    let mut out = headers.clone();
    for name in HOP_BY_HOP {
        out.remove(name);
    }
    for name in &listed {
        out.remove(name);
    }
    out
}

/// Headers sent downstream: everything end-to-end except `Host`
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = strip_hop_by_hop(headers);
    out.remove(HOST);
    out.remove(CONTENT_LENGTH);
    out
}

/// Headers relayed back to the caller
pub fn relayable_headers(headers: &HeaderMap) -> HeaderMap {
    strip_hop_by_hop(headers)
}

/// HTTP client that performs the single-shot forward
pub struct Forwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| SignpostError::Config(format!("Failed to build forward client: {e}")))?;

        Ok(Self { client, timeout })
    }

    /// Forward `request` to `instance`. No retry and no re-selection.
    ///
    /// A timeout surfaces as `ServiceUnavailable`; any other transport
    /// failure as `BadGateway`. Downstream HTTP errors are relayed as-is.
    pub async fn forward(
        &self,
        instance: &InstanceEndpoint,
        request: &ProxyRequest,
    ) -> Result<ProxiedResponse> {
        let url = target_url(
            instance,
            &request.service_segment,
            &request.sub_path,
            request.query.as_deref(),
        );
        debug!(method = %request.method, url = %url, "Forwarding request");

        let response = self
            .client
            .request(request.method.clone(), &url)
            .headers(forwardable_headers(&request.headers))
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        let headers = relayable_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        debug!(status = %status, size = body.len(), url = %url, "Relayed downstream response");
        Ok(ProxiedResponse {
            status,
            headers,
            body,
        })
    }

    fn transport_error(&self, url: &str, err: reqwest::Error) -> SignpostError {
        if err.is_timeout() {
            warn!(url = %url, timeout = ?self.timeout, "Downstream request timed out");
            SignpostError::ServiceUnavailable(format!("downstream timed out after {:?}", self.timeout))
        } else {
            warn!(url = %url, error = %err, "Downstream request failed");
            SignpostError::BadGateway(format!("downstream request failed: {err}"))
        }
    }
}
