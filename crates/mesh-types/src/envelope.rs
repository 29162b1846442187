//! # Bus Message Envelope
//!
//! The universal wrapper for every message carried on the bus.
//!
//! - **Versioning**: all messages include a `version` field for forward
//!   compatibility.
//! - **Correlation**: request/reply flows use `correlation_id` and `reply_to`.
//! - **Subject Authority**: the subject a message was published on is the sole
//!   source of tenant identity; payloads never duplicate it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current protocol version for bus messages.
pub const PROTOCOL_VERSION: u16 = 1;

/// Seconds since the Unix epoch.
#[must_use]
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The message envelope carried by the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Protocol version for forward compatibility.
    pub version: u16,

    /// The encoded subject this message was published on.
    pub subject: String,

    /// Unique identifier correlating request/reply pairs.
    /// For requests: a freshly generated UUID.
    /// For replies: the UUID from the original request.
    pub correlation_id: Uuid,

    /// Reply subject for request messages expecting a response.
    pub reply_to: Option<String>,

    /// Unix timestamp (seconds) when the message was created.
    pub timestamp: u64,

    /// The message body.
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Create a fire-and-forget message (no reply expected).
    #[must_use]
    pub fn publish(subject: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            subject: subject.into(),
            correlation_id: Uuid::new_v4(),
            reply_to: None,
            timestamp: unix_now(),
            payload,
        }
    }

    /// Create a request expecting exactly one reply on `reply_to`.
    #[must_use]
    pub fn request(
        subject: impl Into<String>,
        reply_to: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            subject: subject.into(),
            correlation_id: Uuid::new_v4(),
            reply_to: Some(reply_to.into()),
            timestamp: unix_now(),
            payload,
        }
    }

    /// Create the reply to a request, preserving its correlation id.
    ///
    /// Returns `None` when the request carried no `reply_to` subject.
    #[must_use]
    pub fn reply(request: &Envelope, payload: serde_json::Value) -> Option<Self> {
        let reply_subject = request.reply_to.clone()?;
        Some(Self {
            version: PROTOCOL_VERSION,
            subject: reply_subject,
            correlation_id: request.correlation_id,
            reply_to: None,
            timestamp: unix_now(),
            payload,
        })
    }
}
