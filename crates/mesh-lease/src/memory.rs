//! # In-Memory Lease Store
//!
//! Single-node implementation of [`LeaseStore`] with a background sweeper
//! standing in for the store's native expiry notification. The sweep
//! interval must be strictly smaller than the minimum allowed TTL so no
//! lease can expire and be re-created between two scans unobserved.

use crate::store::{LeaseError, LeaseExpiry, LeaseKey, LeaseStore};
use async_trait::async_trait;
use mesh_types::TenantId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Buffer for expiry notifications; a slow watcher lags rather than
/// blocking the sweeper.
const EXPIRY_CHANNEL_CAPACITY: usize = 256;

struct LeaseEntry {
    value: Vec<u8>,
    deadline: Instant,
    generation: Uuid,
}

/// In-memory TTL store.
///
/// Entries are swept by [`InMemoryLeaseStore::run_sweeper`]; between
/// sweeps, `get`/`list_tenant`/`renew` treat a past-deadline entry as
/// already gone, so reads never observe an expired lease.
pub struct InMemoryLeaseStore {
    /// BTreeMap keeps tenant listing in stable key order.
    entries: Mutex<BTreeMap<LeaseKey, LeaseEntry>>,
    expiry_tx: broadcast::Sender<LeaseExpiry>,
    /// Kill switch modeling store outage for degraded-mode paths.
    available: AtomicBool,
    sweep_interval: Duration,
}

impl InMemoryLeaseStore {
    /// Create a store sweeping at `sweep_interval`.
    #[must_use]
    pub fn new(sweep_interval: Duration) -> Arc<Self> {
        let (expiry_tx, _) = broadcast::channel(EXPIRY_CHANNEL_CAPACITY);
        Arc::new(Self {
            entries: Mutex::new(BTreeMap::new()),
            expiry_tx,
            available: AtomicBool::new(true),
            sweep_interval,
        })
    }

    /// Spawn the background sweeper task. Runs until the store is dropped
    /// by all other holders.
    pub fn run_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::downgrade(self);
        let interval = self.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("Lease store dropped, sweeper exiting");
                    return;
                };
                store.sweep_now();
            }
        })
    }

    /// Remove every past-deadline entry and emit one expiry notification
    /// per removed lease generation. Returns the number of expired leases.
    ///
    /// While the store is flagged unavailable the sweep is skipped: an
    /// unreachable store cannot observe expirations, and synthesizing them
    /// here would manufacture a false offline storm.
    pub fn sweep_now(&self) -> usize {
        if !self.is_available() {
            warn!("Lease store unavailable, skipping expiry sweep");
            return 0;
        }

        let now = Instant::now();
        let expired: Vec<(LeaseKey, Uuid)> = {
            let mut entries = self.entries.lock();
            let dead: Vec<LeaseKey> = entries
                .iter()
                .filter(|(_, entry)| entry.deadline <= now)
                .map(|(key, _)| key.clone())
                .collect();
            dead.into_iter()
                .filter_map(|key| entries.remove(&key).map(|entry| (key, entry.generation)))
                .collect()
        };

        for (key, generation) in &expired {
            info!(key = %key, generation = %generation, "Lease expired");
            // Send fails only when nobody watches; expiry is then simply
            // unobserved, same as plain pub/sub.
            let _ = self.expiry_tx.send(LeaseExpiry {
                key: key.clone(),
                generation: *generation,
            });
        }

        expired.len()
    }

    /// Flip the availability kill switch (models store outage).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        if available {
            info!("Lease store marked available");
        } else {
            warn!("Lease store marked unavailable");
        }
    }

    fn check_available(&self) -> Result<(), LeaseError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(LeaseError::Unavailable)
        }
    }

    /// Number of live (unexpired) leases.
    #[must_use]
    pub fn live_count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.deadline > now)
            .count()
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn put(
        &self,
        key: &LeaseKey,
        value: Vec<u8>,
        ttl: Duration,
        generation: Uuid,
    ) -> Result<(), LeaseError> {
        self.check_available()?;
        let entry = LeaseEntry {
            value,
            deadline: Instant::now() + ttl,
            generation,
        };
        let replaced = self.entries.lock().insert(key.clone(), entry).is_some();
        debug!(key = %key, ttl_secs = ttl.as_secs(), replaced, "Lease created");
        Ok(())
    }

    async fn renew(&self, key: &LeaseKey, ttl: Duration) -> Result<Duration, LeaseError> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(key)
            .filter(|entry| entry.deadline > now)
            .ok_or_else(|| LeaseError::NotFound {
                key: key.to_string(),
            })?;

        // Monotonic: never shorten remaining life below `ttl` from now.
        let renewed = now + ttl;
        if renewed > entry.deadline {
            entry.deadline = renewed;
        }
        Ok(entry.deadline - now)
    }

    async fn get(&self, key: &LeaseKey) -> Result<Option<Vec<u8>>, LeaseError> {
        self.check_available()?;
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .get(key)
            .filter(|entry| entry.deadline > now)
            .map(|entry| entry.value.clone()))
    }

    async fn update_value(&self, key: &LeaseKey, value: Vec<u8>) -> Result<(), LeaseError> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(key)
            .filter(|entry| entry.deadline > now)
            .ok_or_else(|| LeaseError::NotFound {
                key: key.to_string(),
            })?;
        entry.value = value;
        Ok(())
    }

    async fn delete(&self, key: &LeaseKey) -> Result<(), LeaseError> {
        self.check_available()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn list_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<(LeaseKey, Vec<u8>)>, LeaseError> {
        self.check_available()?;
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|(key, entry)| &key.tenant == tenant && entry.deadline > now)
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect())
    }

    fn watch(&self) -> broadcast::Receiver<LeaseExpiry> {
        self.expiry_tx.subscribe()
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
