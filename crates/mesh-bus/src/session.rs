//! # Bus Sessions
//!
//! The explicitly-owned connection handle threaded through every component.
//! There is no ambient global connection: whoever needs the bus holds a
//! [`BusSession`], and the session's credential decides what it may touch.

use crate::bus::{MessageBus, Subscription};
use crate::credential::Credential;
use crate::subject::{Subject, SubjectPattern};
use crate::BusError;
use mesh_types::Envelope;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// A credential-scoped handle to the bus.
///
/// Cheap to clone; clones share the underlying bus and credential.
#[derive(Clone)]
pub struct BusSession {
    bus: Arc<MessageBus>,
    credential: Credential,
}

impl BusSession {
    /// Open a session with the given credential.
    #[must_use]
    pub fn new(bus: Arc<MessageBus>, credential: Credential) -> Self {
        Self { bus, credential }
    }

    /// The credential this session operates under.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// The underlying bus (for bookkeeping like subscriber counts).
    #[must_use]
    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    fn check_subject(&self, subject: &Subject) -> Result<(), BusError> {
        if self.credential.allows_subject(subject) {
            return Ok(());
        }
        warn!(
            credential = self.credential.name(),
            subject = %subject,
            "Publish/request denied by credential scope"
        );
        Err(BusError::AuthorizationDenied {
            subject: subject.encode(),
        })
    }

    /// Publish a fire-and-forget message.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(
        &self,
        subject: &Subject,
        payload: serde_json::Value,
    ) -> Result<usize, BusError> {
        self.check_subject(subject)?;
        let receivers = self.bus.publish(Envelope::publish(subject.encode(), payload));
        debug!(subject = %subject, receivers, "Published");
        Ok(receivers)
    }

    /// Subscribe with a pattern.
    pub fn subscribe(&self, pattern: SubjectPattern) -> Result<Subscription, BusError> {
        if !self.credential.allows_pattern(&pattern) {
            warn!(
                credential = self.credential.name(),
                pattern = %pattern,
                "Subscribe denied by credential scope"
            );
            return Err(BusError::AuthorizationDenied {
                subject: pattern.as_str().to_string(),
            });
        }
        Ok(self.bus.subscribe(pattern))
    }

    /// Send a correlated request and await exactly one reply.
    ///
    /// A fresh `{tenant}._inbox.{token}` subject is subscribed before the
    /// request goes out, so the reply cannot be missed. Dropping the
    /// returned future releases the inbox subscription; it cannot retract
    /// a request already delivered.
    pub async fn request(
        &self,
        subject: &Subject,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<Envelope, BusError> {
        self.check_subject(subject)?;

        let inbox = Subject::Inbox {
            tenant: subject.tenant().clone(),
            token: Uuid::new_v4().simple().to_string(),
        };
        // Inbox lives in the request's tenant, so the subject check above
        // already covers it; subscribe directly on the bus.
        let mut reply_sub = self.bus.subscribe(SubjectPattern::exact(&inbox));

        let request = Envelope::request(subject.encode(), inbox.encode(), payload);
        let correlation_id = request.correlation_id;
        self.bus.publish(request);

        let deadline = tokio::time::timeout(timeout, async {
            loop {
                match reply_sub.recv().await {
                    Some(envelope) if envelope.correlation_id == correlation_id => {
                        return Ok(envelope)
                    }
                    Some(envelope) => {
                        debug!(
                            subject = %inbox,
                            correlation_id = %envelope.correlation_id,
                            "Discarding uncorrelated reply"
                        );
                    }
                    None => return Err(BusError::Closed),
                }
            }
        });

        match deadline.await {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout {
                subject: subject.encode(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Reply to a request envelope, preserving its correlation id.
    pub fn respond(
        &self,
        request: &Envelope,
        payload: serde_json::Value,
    ) -> Result<(), BusError> {
        let reply = Envelope::reply(request, payload).ok_or(BusError::NoReplySubject)?;
        let reply_subject = Subject::parse(&reply.subject)?;
        self.check_subject(&reply_subject)?;
        self.bus.publish(reply);
        Ok(())
    }
}
