//! Per-device-id lock table.
//!
//! Heartbeat renewal and expiry reconciliation for the same device id must
//! never interleave, but a global lock would couple throughput to fleet
//! size. The table hands out one async mutex per lease key; distinct keys
//! contend on nothing but the short-lived table lookup.

use mesh_lease::LeaseKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Lock table keyed by `(tenant, device_id)`.
///
/// Entries are created on demand and kept for the life of the registry:
/// a lock must outlive the record it guards so that a late expiry
/// notification still serializes against a concurrent re-register.
#[derive(Default)]
pub struct LockTable {
    locks: Mutex<HashMap<LeaseKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl LockTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding a device id. Callers hold the returned mutex for
    /// the duration of the registry operation.
    #[must_use]
    pub fn key_lock(&self, key: &LeaseKey) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
