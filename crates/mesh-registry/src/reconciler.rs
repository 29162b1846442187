//! # Expiry Reconciliation
//!
//! Background watcher over lease expirations. On expiry the device record
//! is already gone from the store (the lease IS the record's existence);
//! what remains is publishing the offline event exactly once per lease
//! generation, serialized against any concurrent heartbeat or re-register
//! on the same device id.

use crate::registry::DeviceRegistry;
use mesh_bus::Subject;
use mesh_lease::{LeaseExpiry, LeaseStore};
use mesh_types::LifecyclePayload;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Upper bound on remembered lease generations. Old entries age out FIFO;
/// a duplicate notification older than this window would need the store to
/// replay thousands of expirations out of order.
const MAX_TRACKED_GENERATIONS: usize = 4096;

/// FIFO-bounded set of lease generations already reconciled.
#[derive(Default)]
pub struct GenerationLog {
    seen: HashSet<Uuid>,
    order: VecDeque<Uuid>,
}

impl GenerationLog {
    /// Record a generation. Returns `false` when it was already present
    /// (i.e. this expiry is a duplicate).
    pub fn insert(&mut self, generation: Uuid) -> bool {
        if !self.seen.insert(generation) {
            return false;
        }
        self.order.push_back(generation);
        while self.order.len() > MAX_TRACKED_GENERATIONS {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }

    /// Number of tracked generations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl DeviceRegistry {
    /// Process one expiry notification.
    ///
    /// Idempotent under duplicate notifications for the same lease
    /// generation: only the first publishes the offline event. Holding the
    /// per-device-id lock here guarantees a racing heartbeat either
    /// renewed before the lease expired or observes `UnknownDevice` after
    /// the expiry is fully processed — there is no half-removed state.
    pub async fn handle_expiry(&self, expiry: LeaseExpiry) {
        let lock = self.lock_for(&expiry.key);
        let _guard = lock.lock().await;

        if !self.seen_expirations.lock().insert(expiry.generation) {
            debug!(
                key = %expiry.key,
                generation = %expiry.generation,
                "Duplicate expiry notification ignored"
            );
            return;
        }

        info!(
            tenant = %expiry.key.tenant,
            device_id = %expiry.key.device_id,
            generation = %expiry.generation,
            "Device lease expired, going offline"
        );

        let offline = Subject::DeviceOffline {
            tenant: expiry.key.tenant.clone(),
        };
        let payload = LifecyclePayload {
            device_id: expiry.key.device_id.clone(),
            registration_id: expiry.generation,
        };
        match serde_json::to_value(&payload) {
            Ok(value) => {
                if let Err(e) = self.session().publish(&offline, value) {
                    error!(subject = %offline, error = %e, "Failed to publish offline event");
                }
            }
            Err(e) => error!(error = %e, "Failed to serialize lifecycle payload"),
        }
    }

    /// Spawn the reconciliation task consuming the store's expiry watch.
    ///
    /// Runs until the bus side of the watch channel closes.
    pub fn run_reconciler(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let mut watch = registry.store().watch();
        tokio::spawn(async move {
            loop {
                match watch.recv().await {
                    Ok(expiry) => registry.handle_expiry(expiry).await,
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        // Missed notifications mean missed offline events;
                        // the generation log keeps later duplicates safe,
                        // but the gap itself is worth shouting about.
                        warn!(lagged = count, "Expiry watch lagged, offline events lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Lease store watch closed, reconciler exiting");
                        return;
                    }
                }
            }
        })
    }
}
