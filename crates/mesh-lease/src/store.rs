//! # Lease Store Interface
//!
//! The seam between the registry and whatever TTL-capable key/value store
//! backs it. All mutation operations must be safe under concurrent access
//! from independent processes; implementations rely on their store's own
//! atomicity rather than re-implementing it.

use async_trait::async_trait;
use mesh_types::{DeviceId, TenantId};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Errors from lease store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LeaseError {
    /// No lease exists for the key. A renewal hitting this means the
    /// device must re-register, not merely re-heartbeat.
    #[error("no lease for key {key}")]
    NotFound { key: String },

    /// The store is unreachable. Liveness tracking cannot be trusted while
    /// this persists; callers surface it as a degraded-mode condition.
    #[error("lease store unavailable")]
    Unavailable,
}

/// A lease key, scoped to `(tenant, device_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeaseKey {
    /// The owning tenant.
    pub tenant: TenantId,
    /// The device within the tenant.
    pub device_id: DeviceId,
}

impl LeaseKey {
    /// Build a key from its parts.
    #[must_use]
    pub fn new(tenant: TenantId, device_id: DeviceId) -> Self {
        Self { tenant, device_id }
    }
}

impl std::fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tenant, self.device_id)
    }
}

/// An expiry notification delivered over the watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseExpiry {
    /// The key whose lease expired.
    pub key: LeaseKey,
    /// The lease generation that expired. Consumers dedup on this: the
    /// same generation never yields more than one offline event even if
    /// the store delivers duplicate notifications.
    pub generation: Uuid,
}

/// Interface over a TTL-capable key/value store.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Create or replace the lease for `key`, storing `value` with the
    /// given TTL. Replacing an existing lease is not an error; the new
    /// `generation` supersedes the old one (process restarts re-register
    /// without a prior deregistration).
    async fn put(
        &self,
        key: &LeaseKey,
        value: Vec<u8>,
        ttl: Duration,
        generation: Uuid,
    ) -> Result<(), LeaseError>;

    /// Renew the lease to `ttl` from now, never shortening the remaining
    /// life. Returns the remaining life after renewal.
    async fn renew(&self, key: &LeaseKey, ttl: Duration) -> Result<Duration, LeaseError>;

    /// Fetch the stored value, or `None` if the lease has expired or never
    /// existed.
    async fn get(&self, key: &LeaseKey) -> Result<Option<Vec<u8>>, LeaseError>;

    /// Replace the stored value without touching the lease TTL.
    async fn update_value(&self, key: &LeaseKey, value: Vec<u8>) -> Result<(), LeaseError>;

    /// Delete the lease (no expiry notification is emitted for explicit
    /// deletes).
    async fn delete(&self, key: &LeaseKey) -> Result<(), LeaseError>;

    /// All live leases for a tenant, in stable key order.
    async fn list_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<(LeaseKey, Vec<u8>)>, LeaseError>;

    /// Subscribe to expiry notifications.
    fn watch(&self) -> broadcast::Receiver<LeaseExpiry>;

    /// Whether the store is currently reachable.
    fn is_available(&self) -> bool;
}
