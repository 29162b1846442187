//! # Mesh Bus - Subject-Addressed Messaging for the Device Mesh
//!
//! The shared transport every other subsystem talks through.
//!
//! ## Architecture Rules
//!
//! - All inter-component communication goes via the bus; components never
//!   call each other directly.
//! - Every message is wrapped in the [`mesh_types::Envelope`].
//! - Tenant isolation is enforced HERE, at the transport seam: a
//!   [`BusSession`] holds a [`Credential`] and every publish, subscribe, and
//!   request is checked against its scope before it touches the wire. The
//!   registry and router never re-check authorization; they only react to
//!   requests they actually receive.
//!
//! ## Subjects
//!
//! ```text
//! {tenant}.{device_id}.cmd                 request/reply: invoke a function
//! {tenant}.{device_id}.event.{event_name}  publish/subscribe: device event
//! {tenant}.{device_id}.heartbeat           publish: liveness signal
//! {tenant}.registry                        request/reply: registration RPCs
//! {tenant}.discovery                       request/reply: discovery queries
//! {tenant}.device.online                   publish: registry lifecycle
//! {tenant}.device.offline                  publish: registry lifecycle
//! {tenant}._inbox.{token}                  reply subjects (internal)
//! ```
//!
//! Subscription patterns follow the usual conventions: `*` matches exactly
//! one segment, a trailing `>` matches one or more.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod credential;
pub mod session;
pub mod subject;

pub use bus::{EnvelopeStream, MessageBus, Subscription};
pub use credential::{Credential, Scope};
pub use session::BusSession;
pub use subject::{Subject, SubjectError, SubjectPattern};

use thiserror::Error;

/// Maximum messages to buffer per subscriber before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Errors from bus operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// The caller's credential is not scoped to this subject.
    #[error("authorization denied for subject {subject}")]
    AuthorizationDenied { subject: String },

    /// No reply arrived within the deadline.
    #[error("request on {subject} timed out after {timeout_ms}ms")]
    Timeout { subject: String, timeout_ms: u64 },

    /// The bus was dropped while the operation was in flight.
    #[error("message bus closed")]
    Closed,

    /// A subject or pattern failed to parse.
    #[error(transparent)]
    Subject(#[from] SubjectError),

    /// A request envelope carried no reply subject, so it cannot be
    /// responded to.
    #[error("request has no reply subject")]
    NoReplySubject,
}
