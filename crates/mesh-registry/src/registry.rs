//! # Device Registry Core
//!
//! Registration, heartbeat renewal, and status updates against the lease
//! store, with lifecycle publication on the bus.

use crate::config::RegistryConfig;
use crate::locks::LockTable;
use crate::reconciler::GenerationLog;
use mesh_bus::{BusSession, Subject};
use mesh_lease::{LeaseError, LeaseKey, LeaseStore};
use mesh_types::{
    unix_now, DeviceId, DeviceRecord, DeviceStatus, HeartbeatAck, LifecyclePayload,
    RegisterRequest, RegistrationReceipt, RegistryError, TenantId,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The lease-backed device directory.
///
/// All record state lives in the lease store — the single source of truth
/// that multiple registry instances may share. This type holds only the
/// per-device lock table and the expiry dedup log.
pub struct DeviceRegistry {
    session: BusSession,
    store: Arc<dyn LeaseStore>,
    config: RegistryConfig,
    locks: LockTable,
    pub(crate) seen_expirations: Mutex<GenerationLog>,
}

impl DeviceRegistry {
    /// Create a registry over the given session (service-scoped) and store.
    #[must_use]
    pub fn new(session: BusSession, store: Arc<dyn LeaseStore>, config: RegistryConfig) -> Self {
        Self {
            session,
            store,
            config,
            locks: LockTable::new(),
            seen_expirations: Mutex::new(GenerationLog::default()),
        }
    }

    /// The session this registry publishes lifecycle events on.
    #[must_use]
    pub fn session(&self) -> &BusSession {
        &self.session
    }

    /// The lease store backing this registry.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LeaseStore> {
        &self.store
    }

    pub(crate) fn lock_for(&self, key: &LeaseKey) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.key_lock(key)
    }

    fn lease_err(key: &LeaseKey, e: LeaseError) -> RegistryError {
        match e {
            LeaseError::NotFound { .. } => RegistryError::UnknownDevice {
                device_id: key.device_id.to_string(),
            },
            LeaseError::Unavailable => RegistryError::DegradedMode {
                reason: "lease store unavailable".to_string(),
            },
        }
    }

    fn encode_record(record: &DeviceRecord) -> Result<Vec<u8>, RegistryError> {
        serde_json::to_vec(record).map_err(|e| RegistryError::BadRequest {
            reason: format!("record serialization failed: {e}"),
        })
    }

    pub(crate) fn decode_record(bytes: &[u8]) -> Result<DeviceRecord, RegistryError> {
        serde_json::from_slice(bytes).map_err(|e| RegistryError::BadRequest {
            reason: format!("stored record corrupt: {e}"),
        })
    }

    /// Create or replace the device record and its lease.
    ///
    /// Re-registration of an existing id overwrites the record
    /// (last-write-wins on capability/identity/status) and never fails
    /// merely because a prior lease exists — process restarts re-register
    /// without an explicit deregistration.
    pub async fn register(
        &self,
        tenant: &TenantId,
        request: RegisterRequest,
    ) -> Result<RegistrationReceipt, RegistryError> {
        request
            .capabilities
            .validate()
            .map_err(|reason| RegistryError::InvalidCapabilityDescriptor { reason })?;

        let ttl = self.config.clamp_ttl(request.ttl_secs);
        let key = LeaseKey::new(tenant.clone(), request.device_id.clone());
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let record = DeviceRecord {
            device_id: request.device_id,
            device_type: request.device_type,
            identity: request.identity,
            capabilities: request.capabilities,
            status: request.status,
            registration_id: Uuid::new_v4(),
            registered_at: unix_now(),
            ttl_secs: ttl.as_secs(),
        };

        let bytes = Self::encode_record(&record)?;
        self.store
            .put(&key, bytes, ttl, record.registration_id)
            .await
            .map_err(|e| Self::lease_err(&key, e))?;

        info!(
            tenant = %tenant,
            device_id = %record.device_id,
            device_type = %record.device_type,
            registration_id = %record.registration_id,
            ttl_secs = record.ttl_secs,
            "Device registered"
        );

        let online = Subject::DeviceOnline {
            tenant: tenant.clone(),
        };
        let payload = LifecyclePayload {
            device_id: record.device_id.clone(),
            registration_id: record.registration_id,
        };
        match serde_json::to_value(&payload) {
            Ok(value) => {
                if let Err(e) = self.session.publish(&online, value) {
                    error!(subject = %online, error = %e, "Failed to publish online event");
                }
            }
            Err(e) => error!(error = %e, "Failed to serialize lifecycle payload"),
        }

        Ok(RegistrationReceipt {
            registration_id: record.registration_id,
            registered_at: record.registered_at,
        })
    }

    /// Renew a device's lease to its configured TTL from now.
    ///
    /// Fails with `UnknownDevice` when no record/lease exists: a heartbeat
    /// can never resurrect an expired lease, the device must re-register
    /// with fresh capability data.
    pub async fn heartbeat(
        &self,
        tenant: &TenantId,
        device_id: &DeviceId,
    ) -> Result<HeartbeatAck, RegistryError> {
        let key = LeaseKey::new(tenant.clone(), device_id.clone());
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let bytes = self
            .store
            .get(&key)
            .await
            .map_err(|e| Self::lease_err(&key, e))?
            .ok_or_else(|| RegistryError::UnknownDevice {
                device_id: device_id.to_string(),
            })?;
        let record = Self::decode_record(&bytes)?;

        let remaining = self
            .store
            .renew(&key, std::time::Duration::from_secs(record.ttl_secs))
            .await
            .map_err(|e| Self::lease_err(&key, e))?;

        Ok(HeartbeatAck {
            expires_in_secs: remaining.as_secs(),
        })
    }

    /// Update the device-reported status without touching the lease.
    pub async fn update_status(
        &self,
        tenant: &TenantId,
        device_id: &DeviceId,
        status: DeviceStatus,
    ) -> Result<(), RegistryError> {
        let key = LeaseKey::new(tenant.clone(), device_id.clone());
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let bytes = self
            .store
            .get(&key)
            .await
            .map_err(|e| Self::lease_err(&key, e))?
            .ok_or_else(|| RegistryError::UnknownDevice {
                device_id: device_id.to_string(),
            })?;
        let mut record = Self::decode_record(&bytes)?;
        record.status = status;

        let bytes = Self::encode_record(&record)?;
        self.store
            .update_value(&key, bytes)
            .await
            .map_err(|e| Self::lease_err(&key, e))?;

        info!(tenant = %tenant, device_id = %device_id, "Device status updated");
        Ok(())
    }

    /// Fetch the live record for a device, or `None` if its lease has
    /// expired or it never registered.
    pub async fn get_record(
        &self,
        tenant: &TenantId,
        device_id: &DeviceId,
    ) -> Result<Option<DeviceRecord>, RegistryError> {
        let key = LeaseKey::new(tenant.clone(), device_id.clone());
        let bytes = self
            .store
            .get(&key)
            .await
            .map_err(|e| Self::lease_err(&key, e))?;
        bytes.as_deref().map(Self::decode_record).transpose()
    }

    /// All live records for a tenant, in stable key order.
    pub async fn list_records(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<DeviceRecord>, RegistryError> {
        let listed = self.store.list_tenant(tenant).await.map_err(|e| match e {
            LeaseError::Unavailable => RegistryError::DegradedMode {
                reason: "lease store unavailable".to_string(),
            },
            LeaseError::NotFound { key } => RegistryError::BadRequest {
                reason: format!("unexpected store error for {key}"),
            },
        })?;

        let mut records = Vec::with_capacity(listed.len());
        for (key, bytes) in listed {
            match Self::decode_record(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!(key = %key, error = %e, "Skipping corrupt record"),
            }
        }
        Ok(records)
    }
}
