//! Signpost - service registry and round-robin gateway
//!
//! Two cooperating services:
//!
//! - **Registry**: tracks live instances per logical service name. Instances
//!   register once and heartbeat periodically; a background sweep evicts
//!   instances that stop heartbeating.
//! - **Gateway**: resolves `/{service}/{path}` to one live instance using a
//!   per-service round-robin cursor and forwards the request verbatim.
//!
//! Downstream services embed an [`agent::RegistrationAgent`] to take part in
//! the heartbeat protocol.

pub mod agent;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod registry;
pub mod server;
pub mod types;

pub use config::{AgentArgs, GatewayArgs, RegistryArgs};
pub use gateway::Gateway;
pub use registry::ServiceRegistry;
pub use types::{Result, SignpostError};
