//! Per-service round-robin selection
//!
//! Each service name owns a cursor `(position, generation)`. The generation is
//! a fingerprint of the ordered `(host, port)` list the cursor last rotated
//! over; when the list changes shape the cursor restarts at position 0. This
//! trades rotation fairness across membership changes for never indexing a
//! list the cursor was not built against.

use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::registry::InstanceEndpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    position: usize,
    generation: u64,
}

/// Round-robin cursor table, one entry per service name
#[derive(Default)]
pub struct RoundRobin {
    cursors: DashMap<String, Cursor>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next instance for `service` and advance its cursor
    pub fn select<'a>(
        &self,
        service: &str,
        instances: &'a [InstanceEndpoint],
    ) -> Option<&'a InstanceEndpoint> {
        if instances.is_empty() {
            return None;
        }

        let generation = fingerprint(instances);
        let mut cursor = self
            .cursors
            .entry(service.to_string())
            .or_insert(Cursor {
                position: 0,
                generation,
            });

        if cursor.generation != generation {
            debug!(
                service = %service,
                instances = instances.len(),
                "Instance list changed shape, resetting round-robin cursor"
            );
            cursor.position = 0;
            cursor.generation = generation;
        }

        let index = cursor.position % instances.len();
        cursor.position = (index + 1) % instances.len();
        Some(&instances[index])
    }

    /// Drop the cursor for `service`; the next selection starts fresh
    pub fn forget(&self, service: &str) {
        self.cursors.remove(service);
    }

    /// Number of services with a live cursor
    pub fn tracked(&self) -> usize {
        self.cursors.len()
    }
}

/// Order-sensitive fingerprint of instance identities (heartbeats excluded)
fn fingerprint(instances: &[InstanceEndpoint]) -> u64 {
    let mut hasher = DefaultHasher::new();
    instances.len().hash(&mut hasher);
    for instance in instances {
        instance.host.hash(&mut hasher);
        instance.port.hash(&mut hasher);
    }
    hasher.finish()
}
