//! # Mesh Types Crate
//!
//! This crate contains the domain entities, wire payloads, and the
//! `Envelope` carried by the message bus.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Tenant Scoping in the Subject**: Payloads never carry a tenant field;
//!   the tenant is resolved from the subject a message arrived on, which the
//!   bus has already authorized.
//! - **Typed Failures**: Every error keeps its distinct kind end to end so
//!   callers can choose distinct remediation (re-register vs. retry vs. pick
//!   another device vs. abort).

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod payloads;

pub use entities::{
    validate_segment, Availability, CapabilityDescriptor, DeviceId, DeviceIdentity, DeviceRecord,
    DeviceStatus, DeviceSummary, EventDescriptor, FunctionDescriptor, TenantId,
};
pub use envelope::{unix_now, Envelope, PROTOCOL_VERSION};
pub use errors::{FallbackAttempt, IdError, InvokeError, RegistryError};
pub use payloads::{
    DiscoveryQuery, DiscoveryReply, EventEnvelope, HeartbeatAck, HeartbeatRequest, InvokeRequest,
    LifecyclePayload, RegisterRequest, RegistrationReceipt, RegistryRequest, StatusUpdateRequest,
    WireError, WireReply,
};
