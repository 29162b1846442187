//! # Error Taxonomy
//!
//! Defines the error types shared across subsystems. Each outcome keeps its
//! distinct kind: callers (including automated agents) choose distinct
//! remediation for "re-register" vs. "retry" vs. "pick another device" vs.
//! "abort", so nothing here collapses into a generic failure.

use crate::entities::DeviceId;
use thiserror::Error;

/// Errors from tenant/device id validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdError {
    /// The id was empty.
    #[error("id must not be empty")]
    Empty,

    /// The id contained a character that cannot appear in a subject segment.
    #[error("illegal character {character:?} in id {value:?}")]
    IllegalCharacter { value: String, character: char },
}

/// Errors from registry operations (register, heartbeat, status update).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No tenant was resolvable for the operation.
    #[error("no tenant resolvable for this operation")]
    TenantRequired,

    /// No live record/lease exists for the device. The device must
    /// re-register; a heartbeat can never resurrect an expired lease.
    #[error("unknown device: {device_id}")]
    UnknownDevice { device_id: String },

    /// The registration carried a malformed capability descriptor.
    #[error("invalid capability descriptor: {reason}")]
    InvalidCapabilityDescriptor { reason: String },

    /// The lease store is unavailable, so liveness tracking cannot be
    /// trusted. Registrations are rejected rather than accepted with false
    /// confidence.
    #[error("registry degraded: {reason}")]
    DegradedMode { reason: String },

    /// The request body could not be interpreted.
    #[error("malformed request: {reason}")]
    BadRequest { reason: String },
}

impl RegistryError {
    /// Stable wire identifier for this error kind.
    #[must_use]
    pub fn wire_kind(&self) -> &'static str {
        match self {
            Self::TenantRequired => "tenant_required",
            Self::UnknownDevice { .. } => "unknown_device",
            Self::InvalidCapabilityDescriptor { .. } => "invalid_capability_descriptor",
            Self::DegradedMode { .. } => "degraded_mode",
            Self::BadRequest { .. } => "bad_request",
        }
    }

    /// Reconstruct the typed error from its wire form.
    #[must_use]
    pub fn from_wire(kind: &str, message: String) -> Self {
        match kind {
            "tenant_required" => Self::TenantRequired,
            "unknown_device" => Self::UnknownDevice { device_id: message },
            "invalid_capability_descriptor" => {
                Self::InvalidCapabilityDescriptor { reason: message }
            }
            "degraded_mode" => Self::DegradedMode { reason: message },
            _ => Self::BadRequest { reason: message },
        }
    }
}

/// Outcome of a failed invocation against a single device.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvokeError {
    /// No current registry record for the target; checked before dispatch
    /// so no round trip is wasted on a device that was never live.
    #[error("unknown device: {device_id}")]
    UnknownDevice { device_id: String },

    /// The device replied with an application-level failure. Surfaced
    /// verbatim and never retried by the router.
    #[error("device error: {message}")]
    DeviceError { message: String },

    /// No reply within the deadline. Distinct from `DeviceError` so callers
    /// can tell "device said no" from "device unreachable".
    #[error("invocation timed out after {timeout_ms}ms: {device_id}")]
    Timeout { device_id: String, timeout_ms: u64 },

    /// The transport rejected the call because the caller's credential is
    /// not scoped to this device/tenant. Never conflated with
    /// `UnknownDevice` and never retried.
    #[error("authorization denied for subject {subject}")]
    AuthorizationDenied { subject: String },

    /// The bus was shut down while the invocation was in flight.
    #[error("message bus closed")]
    BusClosed,
}

/// One failed attempt within an ordered fallback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackAttempt {
    /// The candidate that was tried.
    pub device_id: DeviceId,
    /// Why the attempt failed.
    pub error: InvokeError,
}
