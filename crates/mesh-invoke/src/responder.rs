//! Device-side command serving.
//!
//! A device process pairs its registration with a `CommandResponder` so
//! that calls routed to its command subject get answered in the uniform
//! reply shape.

use async_trait::async_trait;
use mesh_bus::{BusError, BusSession, Subject, SubjectPattern};
use mesh_types::{DeviceId, InvokeRequest, TenantId, WireReply};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Application logic behind a device's declared functions.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Execute one invocation. An `Err` becomes a `device_error` reply and
    /// is surfaced to the caller verbatim, never retried by the router.
    async fn handle(&self, request: InvokeRequest) -> Result<serde_json::Value, String>;
}

/// Serves a device's command subject.
pub struct CommandResponder {
    session: BusSession,
    tenant: TenantId,
    device_id: DeviceId,
    handler: Arc<dyn CommandHandler>,
}

impl CommandResponder {
    /// Create a responder for one device.
    #[must_use]
    pub fn new(
        session: BusSession,
        tenant: TenantId,
        device_id: DeviceId,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            session,
            tenant,
            device_id,
            handler,
        }
    }

    /// Spawn the serve loop on this device's command subject.
    pub fn spawn(self) -> Result<tokio::task::JoinHandle<()>, BusError> {
        let subject = Subject::Command {
            tenant: self.tenant.clone(),
            device_id: self.device_id.clone(),
        };
        let mut sub = self.session.subscribe(SubjectPattern::exact(&subject))?;

        Ok(tokio::spawn(async move {
            info!(tenant = %self.tenant, device_id = %self.device_id, "Command responder started");
            while let Some(envelope) = sub.recv().await {
                let reply = match serde_json::from_value::<InvokeRequest>(envelope.payload.clone())
                {
                    Err(e) => WireReply::err("device_error", format!("unparseable request: {e}")),
                    Ok(request) => match self.handler.handle(request).await {
                        Ok(result) => WireReply::ok(&result),
                        Err(message) => WireReply::err("device_error", message),
                    },
                };

                match serde_json::to_value(&reply) {
                    Ok(value) => {
                        if let Err(e) = self.session.respond(&envelope, value) {
                            debug!(error = %e, "Command reply not delivered");
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to serialize command reply"),
                }
            }
            info!(tenant = %self.tenant, device_id = %self.device_id, "Command responder stopped");
        }))
    }
}
