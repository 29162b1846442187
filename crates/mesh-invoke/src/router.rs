//! # Invocation Router
//!
//! Request/reply command dispatch to a single device, and the ordered
//! fallback strategy over a candidate list.

use mesh_bus::{BusError, BusSession, Subject};
use mesh_registry::DeviceRegistry;
use mesh_types::{
    DeviceId, FallbackAttempt, InvokeError, InvokeRequest, TenantId, WireError, WireReply,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Tunables for invocation dispatch.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InvokeConfig {
    /// Per-attempt reply deadline.
    pub timeout_ms: u64,
}

impl Default for InvokeConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

/// All candidates in an ordered fallback were tried and none succeeded.
///
/// `attempts` preserves try order, one entry per candidate actually
/// dispatched.
#[derive(Debug, Clone, Error)]
#[error("fallback exhausted after {} attempt(s)", attempts.len())]
pub struct FallbackExhausted {
    pub attempts: Vec<FallbackAttempt>,
}

/// A fallback invocation that eventually succeeded.
#[derive(Debug, Clone)]
pub struct FallbackSuccess {
    /// The candidate that served the call.
    pub device_id: DeviceId,
    /// The device's result body.
    pub result: serde_json::Value,
    /// Failed attempts that preceded the success, in try order.
    pub attempts: Vec<FallbackAttempt>,
}

/// Routes function invocations to devices over their command subjects.
pub struct InvocationRouter {
    registry: Arc<DeviceRegistry>,
    session: BusSession,
    timeout: Duration,
}

impl InvocationRouter {
    /// Create a router dispatching through `session` with pre-dispatch
    /// existence checks against `registry`.
    #[must_use]
    pub fn new(registry: Arc<DeviceRegistry>, session: BusSession, config: InvokeConfig) -> Self {
        Self {
            registry,
            session,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    fn bus_err(device_id: &DeviceId, e: BusError) -> InvokeError {
        match e {
            BusError::Timeout { timeout_ms, .. } => InvokeError::Timeout {
                device_id: device_id.to_string(),
                timeout_ms,
            },
            BusError::AuthorizationDenied { subject } => {
                InvokeError::AuthorizationDenied { subject }
            }
            BusError::Closed => InvokeError::BusClosed,
            // Subjects here are constructed from validated ids, so these
            // arms are not reachable through the public API.
            BusError::Subject(e) => InvokeError::DeviceError {
                message: format!("transport rejected subject: {e}"),
            },
            BusError::NoReplySubject => InvokeError::DeviceError {
                message: "transport rejected reply routing".to_string(),
            },
        }
    }

    /// Invoke a declared function on one device.
    ///
    /// The registry is consulted first: a device without a live lease fails
    /// as `UnknownDevice` without a wasted bus round trip. When the registry
    /// itself is degraded the check is skipped and the call dispatched
    /// anyway, since the device may well still be answering on the bus.
    pub async fn invoke(
        &self,
        tenant: &TenantId,
        device_id: &DeviceId,
        request: &InvokeRequest,
    ) -> Result<serde_json::Value, InvokeError> {
        match self.registry.get_record(tenant, device_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(InvokeError::UnknownDevice {
                    device_id: device_id.to_string(),
                })
            }
            Err(e) => {
                warn!(
                    tenant = %tenant,
                    device_id = %device_id,
                    error = %e,
                    "Registry lookup failed, dispatching unchecked"
                );
            }
        }

        let subject = Subject::Command {
            tenant: tenant.clone(),
            device_id: device_id.clone(),
        };
        let payload = serde_json::to_value(request).map_err(|e| InvokeError::DeviceError {
            message: format!("request serialization failed: {e}"),
        })?;

        let reply = self
            .session
            .request(&subject, payload, self.timeout)
            .await
            .map_err(|e| Self::bus_err(device_id, e))?;

        let wire: WireReply =
            serde_json::from_value(reply.payload).map_err(|e| InvokeError::DeviceError {
                message: format!("unparseable device reply: {e}"),
            })?;
        if wire.success {
            return Ok(wire.result.unwrap_or(serde_json::Value::Null));
        }
        let error = wire.error.unwrap_or_else(|| WireError {
            kind: "device_error".to_string(),
            message: "reply carried neither result nor error".to_string(),
        });
        Err(InvokeError::DeviceError {
            message: error.message,
        })
    }

    /// Try candidates strictly in order until one succeeds.
    ///
    /// At most one invocation is in flight at any time; candidate N+1 is
    /// dispatched only after candidate N has definitively failed. An empty
    /// candidate list exhausts immediately. Authorization denial aborts the
    /// chain early: the credential will not change between candidates.
    pub async fn invoke_with_fallback(
        &self,
        tenant: &TenantId,
        candidates: &[DeviceId],
        request: &InvokeRequest,
    ) -> Result<FallbackSuccess, FallbackExhausted> {
        let mut attempts = Vec::new();
        for device_id in candidates {
            match self.invoke(tenant, device_id, request).await {
                Ok(result) => {
                    return Ok(FallbackSuccess {
                        device_id: device_id.clone(),
                        result,
                        attempts,
                    })
                }
                Err(error) => {
                    debug!(
                        tenant = %tenant,
                        device_id = %device_id,
                        error = %error,
                        "Fallback candidate failed"
                    );
                    let abort = matches!(error, InvokeError::AuthorizationDenied { .. });
                    attempts.push(FallbackAttempt {
                        device_id: device_id.clone(),
                        error,
                    });
                    if abort {
                        break;
                    }
                }
            }
        }
        Err(FallbackExhausted { attempts })
    }
}
