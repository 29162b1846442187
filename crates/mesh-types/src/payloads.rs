//! # Wire Payloads
//!
//! Defines the request/reply bodies carried inside [`crate::Envelope`].
//!
//! ## Design Rules
//!
//! - Payloads never carry a tenant field; the tenant comes from the subject
//!   the message arrived on, which the bus has already authorized.
//! - Request/reply pairs correlate via the envelope's `correlation_id`.

use crate::entities::{
    CapabilityDescriptor, DeviceId, DeviceIdentity, DeviceStatus, DeviceSummary,
};
use crate::errors::RegistryError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// REGISTRY: {tenant}.registry (request/reply)
// =============================================================================

/// Registration request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Device id, unique within the tenant.
    pub device_id: DeviceId,
    /// Declared device type.
    pub device_type: String,
    /// Declared capabilities.
    pub capabilities: CapabilityDescriptor,
    /// Free-form identity block.
    #[serde(default)]
    pub identity: DeviceIdentity,
    /// Initial device-reported status.
    #[serde(default)]
    pub status: DeviceStatus,
    /// Requested lease TTL in seconds; defaulted and clamped by the registry
    /// when absent or out of bounds.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

/// Successful registration reply body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    /// Opaque registration id; also the lease generation.
    pub registration_id: Uuid,
    /// Unix timestamp of registration.
    pub registered_at: u64,
}

/// Heartbeat request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    /// The device renewing its lease.
    pub device_id: DeviceId,
}

/// Successful heartbeat reply body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatAck {
    /// Seconds until the renewed lease expires.
    pub expires_in_secs: u64,
}

/// Status update request body. Mutates only the status field; the lease is
/// untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    /// The device whose status changes.
    pub device_id: DeviceId,
    /// The new device-reported status.
    pub status: DeviceStatus,
}

/// The registry RPC operations, dispatched by the `op` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RegistryRequest {
    /// Create or replace a device record and its lease.
    Register(RegisterRequest),
    /// Renew a device's lease.
    Heartbeat(HeartbeatRequest),
    /// Update device-reported status without touching the lease.
    UpdateStatus(StatusUpdateRequest),
}

// =============================================================================
// DISCOVERY: {tenant}.discovery (request/reply)
// =============================================================================

/// Discovery query body. All filters optional; absent filters match all
/// devices in the tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryQuery {
    /// Case-insensitive substring match against the declared device type.
    #[serde(default)]
    pub device_type: Option<String>,
    /// Case-insensitive substring match against the device location.
    #[serde(default)]
    pub location: Option<String>,
    /// Force a direct registry read instead of the bounded-staleness cache.
    #[serde(default)]
    pub bypass_cache: bool,
}

// =============================================================================
// INVOCATION: {tenant}.{device}.cmd (request/reply)
// =============================================================================

/// Invocation request body sent to a device's command subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    /// The declared function to execute.
    pub function: String,
    /// Function parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

// =============================================================================
// EVENTS: {tenant}.{device}.event.{name} (publish)
// =============================================================================

/// A device-originated event as delivered to subscribers.
///
/// Never persisted by the registry; duplicate delivery across reconnect is
/// possible and consumers dedup by `event_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// The emitting device.
    pub device_id: DeviceId,
    /// Declared event name.
    pub event_name: String,
    /// Event payload per the device's declared schema.
    pub payload: serde_json::Value,
    /// Unix timestamp of emission.
    pub emitted_at: u64,
    /// Delivery-scoped event id, the dedup key for batched delivery.
    pub event_id: Uuid,
}

// =============================================================================
// LIFECYCLE: {tenant}.device.online / {tenant}.device.offline (publish)
// =============================================================================

/// Body of registry lifecycle publications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePayload {
    /// The device that came online or went offline.
    pub device_id: DeviceId,
    /// The registration (lease generation) this transition belongs to.
    pub registration_id: Uuid,
}

// =============================================================================
// GENERIC REPLY SHAPE: {success, result | error}
// =============================================================================

/// A typed failure on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    /// Stable error kind identifier (e.g. "unknown_device").
    pub kind: String,
    /// Human-readable detail; for some kinds this carries the payload
    /// needed to reconstruct the typed error (see `RegistryError::from_wire`).
    pub message: String,
}

/// The uniform reply body for every request/reply subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireReply {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Result body on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Typed failure on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl WireReply {
    /// Build a success reply carrying a serializable result.
    pub fn ok<T: Serialize>(result: &T) -> Self {
        Self {
            success: true,
            result: serde_json::to_value(result).ok(),
            error: None,
        }
    }

    /// Build a failure reply from kind and message.
    #[must_use]
    pub fn err(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(WireError {
                kind: kind.into(),
                message: message.into(),
            }),
        }
    }

    /// Interpret the reply as a registry outcome.
    pub fn into_registry_result(self) -> Result<serde_json::Value, RegistryError> {
        if self.success {
            return Ok(self.result.unwrap_or(serde_json::Value::Null));
        }
        let error = self.error.unwrap_or_else(|| WireError {
            kind: "bad_request".to_string(),
            message: "reply carried neither result nor error".to_string(),
        });
        Err(RegistryError::from_wire(&error.kind, error.message))
    }
}

/// Reply body for discovery queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReply {
    /// Matching devices, in registry iteration order. Callers must not
    /// depend on the order beyond stability within one query.
    pub devices: Vec<DeviceSummary>,
}
