//! # Mesh Events - Device Event Fabric
//!
//! Fire-and-forget event distribution from devices to consumers, layered
//! on the bus's publish/subscribe subjects.
//!
//! ## Delivery Model
//!
//! Events are never persisted: a consumer that was not subscribed at
//! emission time never sees the event, and duplicate delivery across
//! reconnects is possible. Every event carries a delivery-scoped
//! `event_id`; the batcher collapses duplicates within one window, and
//! consumers needing stronger guarantees dedup across batches themselves.
//!
//! ## Consumption Modes
//!
//! - [`EventStream`] for immediate per-event delivery.
//! - [`spawn_batcher`] for windowed batches (fewer wakeups, bounded
//!   added latency).
//! - [`EventDispatcher`] with a [`HandlerTable`] for typed reaction
//!   keyed by `(device_type, event_name)`.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod emitter;
pub mod handlers;
pub mod stream;

pub use emitter::EventEmitter;
pub use handlers::{EventDispatcher, EventHandler, HandlerTable};
pub use stream::{spawn_batcher, BatchConfig, EventStream};

use mesh_bus::BusError;
use mesh_types::IdError;
use thiserror::Error;

/// Errors from event emission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    /// The event name cannot form a subject segment.
    #[error("invalid event name: {0}")]
    InvalidEventName(#[from] IdError),

    /// The event payload could not be serialized.
    #[error("event serialization failed: {reason}")]
    Serialization { reason: String },

    /// The transport refused or dropped the publication.
    #[error(transparent)]
    Bus(#[from] BusError),
}
