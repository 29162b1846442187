//! # Core Domain Entities
//!
//! Defines the device-mesh entities shared across subsystems.
//!
//! ## Clusters
//!
//! - **Identity**: `TenantId`, `DeviceId`, `DeviceIdentity`
//! - **Capabilities**: `CapabilityDescriptor`, `FunctionDescriptor`, `EventDescriptor`
//! - **Status**: `Availability`, `DeviceStatus`
//! - **Records**: `DeviceRecord`, `DeviceSummary`

use crate::errors::IdError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters that can never appear in a subject segment.
///
/// `.` is the segment delimiter; `*` and `>` are subscription wildcards.
const FORBIDDEN_SEGMENT_CHARS: &[char] = &['.', '*', '>'];

/// Validate that a string forms a legal subject segment.
///
/// Shared by id construction, capability validation, and event emission;
/// anything that ends up as a dot-separated subject piece goes through
/// here.
pub fn validate_segment(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if let Some(c) = value
        .chars()
        .find(|c| FORBIDDEN_SEGMENT_CHARS.contains(c) || c.is_whitespace())
    {
        return Err(IdError::IllegalCharacter {
            value: value.to_string(),
            character: c,
        });
    }
    Ok(())
}

/// Isolation namespace for devices, credentials, and subjects.
///
/// Device ids are unique only within a tenant, never globally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant id, validating it forms a legal subject segment.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        validate_segment(&value)?;
        Ok(Self(value))
    }

    /// The raw tenant name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a device within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device id, validating it forms a legal subject segment.
    ///
    /// Ids starting with `_` are reserved for protocol subjects
    /// (e.g. the `_inbox` reply namespace).
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        validate_segment(&value)?;
        if value.starts_with('_') {
            return Err(IdError::IllegalCharacter {
                value,
                character: '_',
            });
        }
        Ok(Self(value))
    }

    /// The raw device id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-form identity block reported by the device at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Manufacturer name.
    pub manufacturer: Option<String>,
    /// Model designation.
    pub model: Option<String>,
    /// Firmware revision.
    pub firmware: Option<String>,
}

/// A function a device can execute on request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Function name, unique within the device.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Parameter schema (free-form JSON Schema fragment).
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// An event a device can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Event name, unique within the device. Forms the final subject segment
    /// of `{tenant}.{device}.event.{name}`, so it must be a legal segment.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Payload schema (free-form JSON Schema fragment).
    #[serde(default)]
    pub payload_schema: serde_json::Value,
}

/// The declared set of invocable functions and emittable events for a device.
///
/// Built explicitly at device startup and handed to the registry; the ordered
/// lists are preserved as declared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Invocable functions, in declaration order.
    #[serde(default)]
    pub functions: Vec<FunctionDescriptor>,
    /// Emittable events, in declaration order.
    #[serde(default)]
    pub events: Vec<EventDescriptor>,
}

impl CapabilityDescriptor {
    /// Validate the descriptor: names must be non-empty, legal subject
    /// segments, and must not collide within one device.
    ///
    /// Returns the reason string on failure; the registry wraps it into
    /// `RegistryError::InvalidCapabilityDescriptor`.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for f in &self.functions {
            validate_segment(&f.name).map_err(|e| format!("function name: {e}"))?;
            if !seen.insert(f.name.as_str()) {
                return Err(format!("duplicate function name: {}", f.name));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for e in &self.events {
            validate_segment(&e.name).map_err(|err| format!("event name: {err}"))?;
            if !seen.insert(e.name.as_str()) {
                return Err(format!("duplicate event name: {}", e.name));
            }
        }
        Ok(())
    }

    /// Look up a function descriptor by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Look up an event descriptor by name.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&EventDescriptor> {
        self.events.iter().find(|e| e.name == name)
    }
}

/// Device-reported availability.
///
/// Independent of lease validity: a leased device may still self-report
/// `Maintenance`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Ready to accept invocations.
    #[default]
    Available,
    /// Currently executing and not accepting new work.
    Busy,
    /// Device reports itself unavailable.
    Offline,
    /// Under maintenance.
    Maintenance,
}

/// Device-reported status: availability plus free-form location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Current availability.
    pub availability: Availability,
    /// Free-form location (e.g. "warehouse floor 2").
    pub location: Option<String>,
}

/// The authoritative, lease-backed record for a live device.
///
/// Invariant: a record exists in the registry if and only if its lease is
/// currently valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device id, unique within the tenant.
    pub device_id: DeviceId,
    /// Declared device type (e.g. "cleaning_robot").
    pub device_type: String,
    /// Free-form identity block.
    pub identity: DeviceIdentity,
    /// Declared capabilities.
    pub capabilities: CapabilityDescriptor,
    /// Device-reported status.
    pub status: DeviceStatus,
    /// Opaque registration id; doubles as the lease generation for
    /// exactly-once offline emission.
    pub registration_id: Uuid,
    /// Unix timestamp of registration.
    pub registered_at: u64,
    /// Lease TTL in seconds (device-supplied or defaulted, clamped).
    pub ttl_secs: u64,
}

/// Compact device view returned by discovery queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    /// Device id.
    pub device_id: DeviceId,
    /// Declared device type.
    pub device_type: String,
    /// Free-form location.
    pub location: Option<String>,
    /// Device-reported availability.
    pub status: Availability,
    /// Names of invocable functions, in declaration order.
    pub functions: Vec<String>,
    /// Names of emittable events, in declaration order.
    pub events: Vec<String>,
}

impl From<&DeviceRecord> for DeviceSummary {
    fn from(record: &DeviceRecord) -> Self {
        Self {
            device_id: record.device_id.clone(),
            device_type: record.device_type.clone(),
            location: record.status.location.clone(),
            status: record.status.availability,
            functions: record
                .capabilities
                .functions
                .iter()
                .map(|f| f.name.clone())
                .collect(),
            events: record
                .capabilities
                .events
                .iter()
                .map(|e| e.name.clone())
                .collect(),
        }
    }
}
