//! Registry data model

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// One network-addressable copy of a logical service.
///
/// Identity is `(host, port)`; `last_heartbeat` is the only mutable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceEndpoint {
    pub host: String,
    pub port: u16,
    pub last_heartbeat: DateTime<Utc>,
}

impl InstanceEndpoint {
    pub fn new(host: impl Into<String>, port: u16, now: DateTime<Utc>) -> Self {
        Self {
            host: host.into(),
            port,
            last_heartbeat: now,
        }
    }

    /// Whether this endpoint has the given identity key
    pub fn is(&self, host: &str, port: u16) -> bool {
        self.port == port && self.host == host
    }

    /// Move `last_heartbeat` forward to `now`. Never moves it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_heartbeat {
            self.last_heartbeat = now;
        }
    }

    /// Liveness predicate shared by query-time filtering and the sweep:
    /// alive while `now - last_heartbeat < timeout`.
    pub fn is_alive_at(&self, now: DateTime<Utc>, timeout: TimeDelta) -> bool {
        now.signed_duration_since(self.last_heartbeat) < timeout
    }

    /// `host:port` authority string
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Outcome of a register call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterStatus {
    /// New endpoint inserted
    Registered,
    /// Existing endpoint refreshed
    Updated,
}

/// `{"status": "..."}` body returned by the mutating endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

impl From<RegisterStatus> for StatusResponse {
    fn from(status: RegisterStatus) -> Self {
        let s = match status {
            RegisterStatus::Registered => "registered",
            RegisterStatus::Updated => "updated",
        };
        Self::new(s)
    }
}

/// Instance identity as sent by clients (query string or JSON body)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceParams {
    pub host: String,
    pub port: u16,
}

/// Registration request: instance identity plus the service name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterParams {
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// Result of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub removed_instances: usize,
    pub removed_services: usize,
}

/// Point-in-time counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub services: usize,
    pub instances: usize,
}
