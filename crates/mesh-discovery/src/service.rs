//! # Discovery Service
//!
//! Filtered queries over the registry's live listing, answered from a
//! bounded-staleness cache unless the caller bypasses it, plus the
//! request/reply loop on `{tenant}.discovery`.

use crate::cache::SnapshotCache;
use mesh_bus::{BusError, BusSession, Subject, SubjectPattern};
use mesh_registry::service::registry_error_reply;
use mesh_registry::DeviceRegistry;
use mesh_types::{
    DeviceSummary, DiscoveryQuery, DiscoveryReply, Envelope, RegistryError, TenantId, WireReply,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables for the discovery read path.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Upper bound on cached-listing age. Should not exceed the fleet's
    /// typical heartbeat interval, or cached answers can outlive leases.
    pub max_staleness_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_staleness_secs: 5,
        }
    }
}

fn matches_filter(candidate: &str, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(filter) => candidate.to_lowercase().contains(&filter.to_lowercase()),
    }
}

fn matches_query(summary: &DeviceSummary, query: &DiscoveryQuery) -> bool {
    if !matches_filter(&summary.device_type, query.device_type.as_deref()) {
        return false;
    }
    match (&query.location, &summary.location) {
        (None, _) => true,
        // A location filter only matches devices that report one.
        (Some(_), None) => false,
        (Some(filter), Some(location)) => matches_filter(location, Some(filter)),
    }
}

/// Filtered lookups over the device registry.
pub struct DiscoveryService {
    registry: Arc<DeviceRegistry>,
    session: BusSession,
    cache: SnapshotCache,
}

impl DiscoveryService {
    /// Create a discovery service over a registry, answering on `session`.
    #[must_use]
    pub fn new(registry: Arc<DeviceRegistry>, session: BusSession, config: DiscoveryConfig) -> Self {
        Self {
            registry,
            session,
            cache: SnapshotCache::new(Duration::from_secs(config.max_staleness_secs)),
        }
    }

    async fn snapshot(
        &self,
        tenant: &TenantId,
        bypass_cache: bool,
    ) -> Result<Arc<Vec<DeviceSummary>>, RegistryError> {
        if !bypass_cache {
            if let Some(cached) = self.cache.get_fresh(tenant) {
                return Ok(cached);
            }
        }
        let records = self.registry.list_records(tenant).await?;
        let summaries = records.iter().map(DeviceSummary::from).collect();
        Ok(self.cache.store(tenant.clone(), summaries))
    }

    /// Resolve a discovery query to the matching device summaries.
    ///
    /// A query that matches nothing yields an empty vec, never an error;
    /// only registry unavailability fails the call.
    pub async fn query(
        &self,
        tenant: &TenantId,
        query: &DiscoveryQuery,
    ) -> Result<Vec<DeviceSummary>, RegistryError> {
        let snapshot = self.snapshot(tenant, query.bypass_cache).await?;
        Ok(snapshot
            .iter()
            .filter(|summary| matches_query(summary, query))
            .cloned()
            .collect())
    }

    /// Drop the cached listing for a tenant.
    pub fn invalidate(&self, tenant: &TenantId) {
        self.cache.invalidate(tenant);
    }

    async fn handle_rpc(&self, envelope: Envelope) {
        let reply = match Subject::parse(&envelope.subject) {
            Ok(Subject::Discovery { tenant }) => {
                match serde_json::from_value::<DiscoveryQuery>(envelope.payload.clone()) {
                    Err(e) => registry_error_reply(&RegistryError::BadRequest {
                        reason: format!("unparseable discovery query: {e}"),
                    }),
                    Ok(query) => match self.query(&tenant, &query).await {
                        Ok(devices) => WireReply::ok(&DiscoveryReply { devices }),
                        Err(e) => registry_error_reply(&e),
                    },
                }
            }
            _ => registry_error_reply(&RegistryError::TenantRequired),
        };

        match serde_json::to_value(&reply) {
            Ok(value) => {
                if let Err(e) = self.session.respond(&envelope, value) {
                    debug!(error = %e, "Discovery reply not delivered");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize discovery reply"),
        }
    }

    /// Spawn a listener dropping a tenant's cached listing whenever its
    /// fleet changes.
    ///
    /// Lifecycle events tighten staleness below the configured bound; the
    /// bound still holds if this listener lags or is not running.
    pub fn spawn_lifecycle_invalidator(
        self: &Arc<Self>,
    ) -> Result<tokio::task::JoinHandle<()>, BusError> {
        let pattern = SubjectPattern::parse("*.device.*")?;
        let mut sub = self.session.subscribe(pattern)?;
        let service = Arc::clone(self);

        Ok(tokio::spawn(async move {
            while let Some(envelope) = sub.recv().await {
                if let Ok(Subject::DeviceOnline { tenant } | Subject::DeviceOffline { tenant }) =
                    Subject::parse(&envelope.subject)
                {
                    debug!(tenant = %tenant, "Fleet changed, cached listing dropped");
                    service.invalidate(&tenant);
                }
            }
        }))
    }

    /// Spawn the request/reply loop over `*.discovery`.
    pub fn spawn_rpc(self: &Arc<Self>) -> Result<tokio::task::JoinHandle<()>, BusError> {
        let pattern = SubjectPattern::parse("*.discovery")?;
        let mut sub = self.session.subscribe(pattern)?;
        let service = Arc::clone(self);

        Ok(tokio::spawn(async move {
            info!("Discovery RPC service started");
            while let Some(envelope) = sub.recv().await {
                service.handle_rpc(envelope).await;
            }
            info!("Discovery RPC service stopped");
        }))
    }
}
