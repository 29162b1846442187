//! # Registry RPC Service
//!
//! Bus-facing loops: the request/reply handler on `{tenant}.registry` and
//! the listener for fire-and-forget heartbeats on
//! `{tenant}.{device}.heartbeat`. The tenant is resolved from the subject
//! the message arrived on — the bus has already authorized it, so the
//! handlers never re-check scope.

use crate::registry::DeviceRegistry;
use mesh_bus::{BusError, Subject, SubjectPattern};
use mesh_types::{Envelope, RegistryError, RegistryRequest, TenantId, WireReply};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Build the wire form of a registry error, preserving its kind and the
/// detail `RegistryError::from_wire` needs to reconstruct it.
#[must_use]
pub fn registry_error_reply(error: &RegistryError) -> WireReply {
    let message = match error {
        RegistryError::UnknownDevice { device_id } => device_id.clone(),
        RegistryError::InvalidCapabilityDescriptor { reason }
        | RegistryError::DegradedMode { reason }
        | RegistryError::BadRequest { reason } => reason.clone(),
        RegistryError::TenantRequired => error.to_string(),
    };
    WireReply::err(error.wire_kind(), message)
}

/// The bus-facing registry service.
pub struct RegistryService {
    registry: Arc<DeviceRegistry>,
}

impl RegistryService {
    /// Wrap a registry for bus serving.
    #[must_use]
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self { registry }
    }

    /// The wrapped registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    fn resolve_tenant(envelope: &Envelope) -> Result<TenantId, RegistryError> {
        match Subject::parse(&envelope.subject) {
            Ok(Subject::Registry { tenant }) => Ok(tenant),
            _ => Err(RegistryError::TenantRequired),
        }
    }

    async fn dispatch(
        registry: &DeviceRegistry,
        tenant: &TenantId,
        request: RegistryRequest,
    ) -> WireReply {
        match request {
            RegistryRequest::Register(register) => {
                match registry.register(tenant, register).await {
                    Ok(receipt) => WireReply::ok(&receipt),
                    Err(e) => registry_error_reply(&e),
                }
            }
            RegistryRequest::Heartbeat(heartbeat) => {
                match registry.heartbeat(tenant, &heartbeat.device_id).await {
                    Ok(ack) => WireReply::ok(&ack),
                    Err(e) => registry_error_reply(&e),
                }
            }
            RegistryRequest::UpdateStatus(update) => {
                match registry
                    .update_status(tenant, &update.device_id, update.status)
                    .await
                {
                    Ok(()) => WireReply::ok(&serde_json::Value::Null),
                    Err(e) => registry_error_reply(&e),
                }
            }
        }
    }

    async fn handle_rpc(registry: &DeviceRegistry, envelope: Envelope) {
        let reply = match Self::resolve_tenant(&envelope) {
            Err(e) => registry_error_reply(&e),
            Ok(tenant) => {
                match serde_json::from_value::<RegistryRequest>(envelope.payload.clone()) {
                    Err(e) => registry_error_reply(&RegistryError::BadRequest {
                        reason: format!("unparseable registry request: {e}"),
                    }),
                    Ok(request) => Self::dispatch(registry, &tenant, request).await,
                }
            }
        };

        match serde_json::to_value(&reply) {
            Ok(value) => {
                if let Err(e) = registry.session().respond(&envelope, value) {
                    debug!(error = %e, "Registry reply not delivered");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize registry reply"),
        }
    }

    /// Spawn the request/reply loop over `*.registry`.
    pub fn spawn_rpc(&self) -> Result<tokio::task::JoinHandle<()>, BusError> {
        let pattern = SubjectPattern::parse("*.registry")?;
        let mut sub = self.registry.session().subscribe(pattern)?;
        let registry = Arc::clone(&self.registry);

        Ok(tokio::spawn(async move {
            info!("Registry RPC service started");
            while let Some(envelope) = sub.recv().await {
                // Replies land on inbox subjects, not here; everything on
                // this pattern is a request.
                Self::handle_rpc(&registry, envelope).await;
            }
            info!("Registry RPC service stopped");
        }))
    }

    /// Spawn the listener for published heartbeats on `*.*.heartbeat`.
    ///
    /// Failures are logged, not replied: a device whose lease already
    /// expired learns about it from its next registration attempt, not
    /// from a heartbeat it fired and forgot.
    pub fn spawn_heartbeat_listener(&self) -> Result<tokio::task::JoinHandle<()>, BusError> {
        let pattern = SubjectPattern::parse("*.*.heartbeat")?;
        let mut sub = self.registry.session().subscribe(pattern)?;
        let registry = Arc::clone(&self.registry);

        Ok(tokio::spawn(async move {
            info!("Heartbeat listener started");
            while let Some(envelope) = sub.recv().await {
                let Ok(Subject::Heartbeat { tenant, device_id }) =
                    Subject::parse(&envelope.subject)
                else {
                    continue;
                };

                match registry.heartbeat(&tenant, &device_id).await {
                    Ok(ack) => {
                        debug!(
                            tenant = %tenant,
                            device_id = %device_id,
                            expires_in_secs = ack.expires_in_secs,
                            "Heartbeat accepted"
                        );
                        if envelope.reply_to.is_some() {
                            if let Ok(value) = serde_json::to_value(&WireReply::ok(&ack)) {
                                let _ = registry.session().respond(&envelope, value);
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            tenant = %tenant,
                            device_id = %device_id,
                            error = %e,
                            "Heartbeat rejected"
                        );
                        if envelope.reply_to.is_some() {
                            if let Ok(value) = serde_json::to_value(&registry_error_reply(&e)) {
                                let _ = registry.session().respond(&envelope, value);
                            }
                        }
                    }
                }
            }
            info!("Heartbeat listener stopped");
        }))
    }
}
