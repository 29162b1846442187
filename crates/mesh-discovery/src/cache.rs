//! Per-tenant snapshot cache.
//!
//! Discovery is read-heavy while the registry's lease store is the write
//! path; caching the listing keeps query fan-out off the store. Staleness
//! is bounded: a snapshot older than the configured horizon is never
//! served, so a cached answer can lag the registry by at most that bound.

use mesh_types::{DeviceSummary, TenantId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct Snapshot {
    summaries: Arc<Vec<DeviceSummary>>,
    fetched_at: Instant,
}

/// Bounded-staleness cache of per-tenant device listings.
pub struct SnapshotCache {
    snapshots: Mutex<HashMap<TenantId, Snapshot>>,
    max_staleness: Duration,
}

impl SnapshotCache {
    /// Create a cache serving snapshots no older than `max_staleness`.
    #[must_use]
    pub fn new(max_staleness: Duration) -> Self {
        Self {
            snapshots: Mutex::new(HashMap::new()),
            max_staleness,
        }
    }

    /// The tenant's snapshot, if one exists within the staleness bound.
    #[must_use]
    pub fn get_fresh(&self, tenant: &TenantId) -> Option<Arc<Vec<DeviceSummary>>> {
        let snapshots = self.snapshots.lock();
        let snapshot = snapshots.get(tenant)?;
        if snapshot.fetched_at.elapsed() <= self.max_staleness {
            Some(Arc::clone(&snapshot.summaries))
        } else {
            None
        }
    }

    /// Replace the tenant's snapshot with a listing fetched just now.
    pub fn store(&self, tenant: TenantId, summaries: Vec<DeviceSummary>) -> Arc<Vec<DeviceSummary>> {
        let summaries = Arc::new(summaries);
        self.snapshots.lock().insert(
            tenant,
            Snapshot {
                summaries: Arc::clone(&summaries),
                fetched_at: Instant::now(),
            },
        );
        summaries
    }

    /// Drop the tenant's snapshot, forcing the next query to the registry.
    pub fn invalidate(&self, tenant: &TenantId) {
        self.snapshots.lock().remove(tenant);
    }
}
