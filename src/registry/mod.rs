//! Service registry
//!
//! Tracks live instances per logical service name. Instances register once,
//! then heartbeat; anything silent for longer than the heartbeat timeout is
//! filtered out of queries immediately and evicted by the next sweep.
//!
//! ## Thread Safety
//!
//! State lives in a sharded `DashMap` keyed by service name. Every operation
//! holds a single shard lock for its in-memory scan+mutate and never across
//! an await point; the sweep uses `retain`, which locks shard by shard. A
//! sweep therefore never observes a half-applied `register`.

pub mod sweep;
pub mod types;

pub use sweep::spawn_sweep_task;
pub use types::*;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{RegistryArgs, DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_HEARTBEAT_TIMEOUT_SECS};
use crate::types::{Result, SignpostError};

/// Registry timing configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum silence before an instance is considered dead
    pub heartbeat_timeout: Duration,
    /// Period of the background sweep
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(DEFAULT_HEARTBEAT_TIMEOUT_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
        }
    }
}

impl From<&RegistryArgs> for RegistryConfig {
    fn from(args: &RegistryArgs) -> Self {
        Self {
            heartbeat_timeout: args.heartbeat_timeout(),
            cleanup_interval: args.cleanup_interval(),
        }
    }
}

/// In-memory registry of service name -> ordered instance list
pub struct ServiceRegistry {
    services: DashMap<String, Vec<InstanceEndpoint>>,
    ttl: TimeDelta,
    config: RegistryConfig,
}

impl ServiceRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let ttl = TimeDelta::from_std(config.heartbeat_timeout).unwrap_or(TimeDelta::MAX);
        Self {
            services: DashMap::new(),
            ttl,
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register an instance, or refresh it if `(host, port)` is already known
    pub fn register(&self, name: &str, host: &str, port: u16) -> RegisterStatus {
        self.register_at(name, host, port, Utc::now())
    }

    pub fn register_at(
        &self,
        name: &str,
        host: &str,
        port: u16,
        now: DateTime<Utc>,
    ) -> RegisterStatus {
        let mut instances = self.services.entry(name.to_string()).or_default();

        if let Some(existing) = instances.iter_mut().find(|e| e.is(host, port)) {
            existing.touch(now);
            debug!(service = %name, host = %host, port, "Refreshed instance on re-register");
            return RegisterStatus::Updated;
        }

        instances.push(InstanceEndpoint::new(host, port, now));
        info!(
            service = %name,
            host = %host,
            port,
            instances = instances.len(),
            "Registered instance"
        );
        RegisterStatus::Registered
    }

    /// Record a heartbeat for a known instance
    pub fn heartbeat(&self, name: &str, host: &str, port: u16) -> Result<()> {
        self.heartbeat_at(name, host, port, Utc::now())
    }

    pub fn heartbeat_at(&self, name: &str, host: &str, port: u16, now: DateTime<Utc>) -> Result<()> {
        let mut instances = self
            .services
            .get_mut(name)
            .ok_or_else(|| SignpostError::UnknownService(name.to_string()))?;

        let endpoint = instances
            .iter_mut()
            .find(|e| e.is(host, port))
            .ok_or_else(|| SignpostError::UnknownInstance {
                service: name.to_string(),
                host: host.to_string(),
                port,
            })?;

        endpoint.touch(now);
        debug!(service = %name, host = %host, port, "Heartbeat");
        Ok(())
    }

    /// Remove an instance. Drops the service name when it was the last one.
    pub fn deregister(&self, name: &str, host: &str, port: u16) -> Result<()> {
        let now_empty = {
            let mut instances = self
                .services
                .get_mut(name)
                .ok_or_else(|| SignpostError::UnknownService(name.to_string()))?;

            let before = instances.len();
            instances.retain(|e| !e.is(host, port));
            if instances.len() == before {
                return Err(SignpostError::UnknownInstance {
                    service: name.to_string(),
                    host: host.to_string(),
                    port,
                });
            }
            instances.is_empty()
        };

        if now_empty {
            self.services.remove_if(name, |_, instances| instances.is_empty());
        }

        info!(service = %name, host = %host, port, "Deregistered instance");
        Ok(())
    }

    /// Alive instances of `name`, in registration order
    pub fn list_alive(&self, name: &str) -> Result<Vec<InstanceEndpoint>> {
        self.list_alive_at(name, Utc::now())
    }

    pub fn list_alive_at(&self, name: &str, now: DateTime<Utc>) -> Result<Vec<InstanceEndpoint>> {
        let instances = self
            .services
            .get(name)
            .filter(|instances| !instances.is_empty())
            .ok_or_else(|| SignpostError::UnknownService(name.to_string()))?;

        let alive: Vec<InstanceEndpoint> = instances
            .iter()
            .filter(|e| e.is_alive_at(now, self.ttl))
            .cloned()
            .collect();

        if alive.is_empty() {
            return Err(SignpostError::NoAliveInstances(name.to_string()));
        }
        Ok(alive)
    }

    /// Unfiltered snapshot, including stale-but-not-yet-swept instances
    pub fn list_all(&self) -> BTreeMap<String, Vec<InstanceEndpoint>> {
        self.services
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Evict dead instances and emptied service names
    pub fn sweep(&self) -> SweepStats {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepStats {
        let ttl = self.ttl;
        let mut stats = SweepStats::default();

        self.services.retain(|name, instances| {
            let before = instances.len();
            instances.retain(|e| e.is_alive_at(now, ttl));
            let removed = before - instances.len();

            if removed > 0 {
                info!(service = %name, removed, remaining = instances.len(), "Evicted stale instances");
            }
            stats.removed_instances += removed;

            if instances.is_empty() {
                stats.removed_services += 1;
                false
            } else {
                true
            }
        });

        stats
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for entry in self.services.iter() {
            stats.services += 1;
            stats.instances += entry.value().len();
        }
        stats
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
