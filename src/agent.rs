//! Registration agent for downstream service instances
//!
//! Registers the instance once, then heartbeats on a fixed interval. Every
//! registry call carries a timeout. Failures are soft: they are counted and
//! logged, never propagated, and the next tick simply tries again. If the
//! registry answers a heartbeat with 404 (it swept or restarted), the agent
//! registers again immediately.

use hyper::StatusCode;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::AgentArgs;
use crate::gateway::discovery::ErrorBody;
use crate::registry::{InstanceParams, RegisterParams, RegisterStatus};
use crate::types::{Result, SignpostError};

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub discovery_url: String,
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub heartbeat_interval: Duration,
    pub request_timeout: Duration,
}

impl From<&AgentArgs> for AgentConfig {
    fn from(args: &AgentArgs) -> Self {
        Self {
            discovery_url: args.discovery_url.trim_end_matches('/').to_string(),
            service_name: args.service_name.clone(),
            host: args.advertise_host.clone(),
            port: args.advertise_port,
            heartbeat_interval: Duration::from_secs(args.heartbeat_interval_secs),
            request_timeout: Duration::from_millis(args.agent_timeout_ms),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegisterReply {
    status: RegisterStatus,
}

/// Keeps one instance registered and heartbeating
pub struct RegistrationAgent {
    config: AgentConfig,
    client: reqwest::Client,
    registered: AtomicBool,
    soft_failures: AtomicU64,
    running: RwLock<bool>,
    /// Bumped on every successful start; a loop exits once it is stale
    epoch: AtomicU64,
}

impl RegistrationAgent {
    pub fn new(config: AgentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SignpostError::Config(format!("Failed to build agent client: {e}")))?;

        Ok(Self {
            config,
            client,
            registered: AtomicBool::new(false),
            soft_failures: AtomicU64::new(0),
            running: RwLock::new(false),
            epoch: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Whether the last register/heartbeat exchange succeeded
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Number of swallowed register/heartbeat failures so far
    pub fn soft_failures(&self) -> u64 {
        self.soft_failures.load(Ordering::SeqCst)
    }

    fn instance_query(&self) -> Result<String> {
        serde_urlencoded::to_string(InstanceParams {
            host: self.config.host.clone(),
            port: self.config.port,
        })
        .map_err(|e| SignpostError::Internal(e.to_string()))
    }

    fn unreachable(&self, e: reqwest::Error) -> SignpostError {
        SignpostError::ServiceUnavailable(format!(
            "registry at {} unreachable: {e}",
            self.config.discovery_url
        ))
    }

    /// Map a non-success registry reply onto the registry error taxonomy
    async fn rejection(&self, response: reqwest::Response) -> SignpostError {
        let status = response.status();
        let code = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_default();

        match (status, code.as_str()) {
            (StatusCode::NOT_FOUND, "unknown_service") => {
                SignpostError::UnknownService(self.config.service_name.clone())
            }
            (StatusCode::NOT_FOUND, _) => SignpostError::UnknownInstance {
                service: self.config.service_name.clone(),
                host: self.config.host.clone(),
                port: self.config.port,
            },
            (StatusCode::BAD_REQUEST, _) => {
                SignpostError::BadRequest(format!("registry rejected request ({code})"))
            }
            _ => SignpostError::ServiceUnavailable(format!("registry returned {status}")),
        }
    }

    /// `POST /register`
    pub async fn register(&self) -> Result<RegisterStatus> {
        let query = serde_urlencoded::to_string(RegisterParams {
            name: self.config.service_name.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
        })
        .map_err(|e| SignpostError::Internal(e.to_string()))?;
        let url = format!("{}/register?{}", self.config.discovery_url, query);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !response.status().is_success() {
            return Err(self.rejection(response).await);
        }

        let reply: RegisterReply = response
            .json()
            .await
            .map_err(|e| SignpostError::ServiceUnavailable(format!("malformed register reply: {e}")))?;
        self.registered.store(true, Ordering::SeqCst);
        Ok(reply.status)
    }

    /// `POST /heartbeat/{name}`
    pub async fn heartbeat(&self) -> Result<()> {
        let url = format!(
            "{}/heartbeat/{}?{}",
            self.config.discovery_url,
            urlencoding::encode(&self.config.service_name),
            self.instance_query()?
        );

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.rejection(response).await)
        }
    }

    /// `DELETE /services/{name}`
    pub async fn deregister(&self) -> Result<()> {
        let url = format!(
            "{}/services/{}?{}",
            self.config.discovery_url,
            urlencoding::encode(&self.config.service_name),
            self.instance_query()?
        );

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        self.registered.store(false, Ordering::SeqCst);
        if response.status().is_success() {
            info!(service = %self.config.service_name, "Deregistered from registry");
            Ok(())
        } else {
            Err(self.rejection(response).await)
        }
    }

    fn record_failure(&self, action: &str, err: &SignpostError) {
        let failures = self.soft_failures.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(
            service = %self.config.service_name,
            failures,
            error = %err,
            "{} failed, retrying next tick",
            action
        );
    }

    async fn register_soft(&self) {
        match self.register().await {
            Ok(status) => info!(
                service = %self.config.service_name,
                host = %self.config.host,
                port = self.config.port,
                status = ?status,
                "Registered with registry"
            ),
            Err(e) => self.record_failure("Register", &e),
        }
    }

    /// One loop iteration. Never fails.
    pub async fn tick(&self) {
        if !self.is_registered() {
            self.register_soft().await;
            return;
        }

        match self.heartbeat().await {
            Ok(()) => debug!(service = %self.config.service_name, "Heartbeat sent"),
            Err(e @ (SignpostError::UnknownService(_) | SignpostError::UnknownInstance { .. })) => {
                warn!(
                    service = %self.config.service_name,
                    error = %e,
                    "Registry no longer knows this instance, re-registering"
                );
                self.registered.store(false, Ordering::SeqCst);
                self.register_soft().await;
            }
            Err(e) => self.record_failure("Heartbeat", &e),
        }
    }

    /// Start the register/heartbeat loop.
    ///
    /// Returns `None` when the loop is already running.
    pub async fn start(self: Arc<Self>) -> Option<JoinHandle<()>> {
        let epoch = {
            let mut running = self.running.write().await;
            if *running {
                warn!(
                    "Registration agent for {} already running",
                    self.config.service_name
                );
                return None;
            }
            *running = true;
            self.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };

        info!(
            "Starting registration agent for {} at {}:{} (interval: {:?})",
            self.config.service_name, self.config.host, self.config.port, self.config.heartbeat_interval
        );

        let agent = Arc::clone(&self);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(agent.config.heartbeat_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                if !*agent.running.read().await || agent.epoch.load(Ordering::SeqCst) != epoch {
                    info!("Registration agent stopped");
                    break;
                }

                agent.tick().await;
            }
        }))
    }

    /// Stop the loop after its current tick
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        info!("Stopping registration agent for {}", self.config.service_name);
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
