//! # Message Bus Core
//!
//! In-process implementation of the subject-addressed bus.
//!
//! Uses `tokio::sync::broadcast` for multi-producer, multi-consumer
//! semantics. Suitable for single-node operation; distributed deployments
//! would put a networked broker (e.g. NATS) behind the same session API.
//!
//! This type is deliberately scope-unaware: all credential checks live in
//! [`crate::BusSession`], the only public way to reach the bus.

use crate::subject::SubjectPattern;
use crate::DEFAULT_CHANNEL_CAPACITY;
use mesh_types::Envelope;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// The in-process message bus.
pub struct MessageBus {
    /// Broadcast sender for envelopes.
    sender: broadcast::Sender<Envelope>,

    /// Active subscription count by pattern.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total envelopes published.
    messages_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl MessageBus {
    /// Create a bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with the given per-subscriber buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            messages_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Publish an envelope to every subscriber whose pattern matches.
    ///
    /// Returns the number of broadcast receivers at publish time. Zero
    /// receivers means the message was dropped on the floor, which is
    /// normal pub/sub behavior.
    pub(crate) fn publish(&self, envelope: Envelope) -> usize {
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(envelope) {
            Ok(receiver_count) => receiver_count,
            Err(e) => {
                debug!(subject = %e.0.subject, "Message dropped (no subscribers)");
                0
            }
        }
    }

    /// Subscribe with a pre-authorized pattern.
    pub(crate) fn subscribe(&self, pattern: SubjectPattern) -> Subscription {
        let receiver = self.sender.subscribe();
        let pattern_key = pattern.as_str().to_string();

        {
            if let Ok(mut subs) = self.subscriptions.write() {
                *subs.entry(pattern_key.clone()).or_insert(0) += 1;
            }
        }

        debug!(pattern = %pattern_key, "New subscription created");

        Subscription {
            receiver,
            pattern,
            guard: SubscriptionGuard {
                subscriptions: self.subscriptions.clone(),
                pattern_key,
            },
        }
    }

    /// Number of active broadcast receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total envelopes published since creation.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// The per-subscriber buffer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Deregisters a subscription from the bus's tracking table on drop.
#[derive(Debug)]
struct SubscriptionGuard {
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    pattern_key: String,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        let Some(count) = subs.get_mut(&self.pattern_key) else {
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            subs.remove(&self.pattern_key);
        }
        debug!(pattern = %self.pattern_key, "Subscription dropped");
    }
}

/// A subscription handle for receiving envelopes.
///
/// When dropped, the subscription is automatically cleaned up, which is
/// also what releases a cancelled requester's waiting state.
#[derive(Debug)]
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<Envelope>,

    /// Pattern for this subscription.
    pattern: SubjectPattern,

    /// Cleanup handle for the bus's subscription tracking.
    guard: SubscriptionGuard,
}

impl Subscription {
    /// Receive the next envelope whose subject matches the pattern.
    ///
    /// Returns `None` when the bus has been dropped. A lagged subscriber
    /// skips the overwritten messages and keeps receiving; the bus is
    /// at-least-once, so consumers tolerate gaps and duplicates anyway.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            let envelope = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(
                        pattern = %self.guard.pattern_key,
                        lagged = count,
                        "Subscriber lagged, messages dropped"
                    );
                    continue;
                }
            };

            if self.pattern.matches(&envelope.subject) {
                return Some(envelope);
            }
        }
    }

    /// Try to receive the next matching envelope without blocking.
    ///
    /// Returns `Ok(None)` when no matching envelope is buffered.
    pub fn try_recv(&mut self) -> Result<Option<Envelope>, crate::BusError> {
        loop {
            let envelope = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(crate::BusError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.pattern.matches(&envelope.subject) {
                return Ok(Some(envelope));
            }
        }
    }

    /// The pattern this subscription filters on.
    #[must_use]
    pub fn pattern(&self) -> &SubjectPattern {
        &self.pattern
    }

    /// Convert into an [`EnvelopeStream`] for waker-driven consumption.
    #[must_use]
    pub fn into_stream(self) -> EnvelopeStream {
        EnvelopeStream {
            inner: BroadcastStream::new(self.receiver),
            pattern: self.pattern,
            _guard: self.guard,
        }
    }
}

/// A stream of matching envelopes, built on
/// `tokio_stream::wrappers::BroadcastStream`.
///
/// Polling is waker-driven; non-matching envelopes and lag gaps are
/// consumed inside a single `poll_next` call.
pub struct EnvelopeStream {
    inner: BroadcastStream<Envelope>,
    pattern: SubjectPattern,
    _guard: SubscriptionGuard,
}

impl EnvelopeStream {
    /// The pattern this stream filters on.
    #[must_use]
    pub fn pattern(&self) -> &SubjectPattern {
        &self.pattern
    }

    /// Next matching envelope, or `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<Envelope> {
        use tokio_stream::StreamExt;
        self.next().await
    }
}

impl tokio_stream::Stream for EnvelopeStream {
    type Item = Envelope;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match std::pin::Pin::new(&mut this.inner).poll_next(cx) {
                std::task::Poll::Ready(Some(Ok(envelope))) => {
                    if this.pattern.matches(&envelope.subject) {
                        return std::task::Poll::Ready(Some(envelope));
                    }
                }
                std::task::Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    warn!(
                        pattern = %this.pattern.as_str(),
                        lagged = count,
                        "Subscriber lagged, messages dropped"
                    );
                }
                std::task::Poll::Ready(None) => return std::task::Poll::Ready(None),
                std::task::Poll::Pending => return std::task::Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn envelope(subject: &str) -> Envelope {
        Envelope::publish(subject, serde_json::json!({"n": 1}))
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let bus = MessageBus::new();
        let receivers = bus.publish(envelope("factory.robot-001.heartbeat"));
        assert_eq!(receivers, 0);
        assert_eq!(bus.messages_published(), 1);
    }

    #[tokio::test]
    async fn test_subscription_receives_matching_subject() {
        let bus = MessageBus::new();
        let mut sub = bus.subscribe(SubjectPattern::parse("factory.*.heartbeat").unwrap());

        bus.publish(envelope("factory.robot-001.cmd"));
        bus.publish(envelope("factory.robot-001.heartbeat"));

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("envelope");
        assert_eq!(received.subject, "factory.robot-001.heartbeat");
    }

    #[tokio::test]
    async fn test_subscription_filters_other_tenants() {
        let bus = MessageBus::new();
        let mut sub = bus.subscribe(SubjectPattern::parse("factory.device.offline").unwrap());

        bus.publish(envelope("warehouse-east.device.offline"));
        bus.publish(envelope("factory.device.offline"));

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("envelope");
        assert_eq!(received.subject, "factory.device.offline");
        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_envelope_stream_yields_buffered_matches() {
        use tokio_stream::StreamExt;

        let bus = MessageBus::new();
        let sub = bus.subscribe(SubjectPattern::parse("factory.registry").unwrap());
        bus.publish(envelope("factory.discovery"));
        bus.publish(envelope("factory.registry"));

        let mut stream = sub.into_stream();
        let received = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("envelope");
        assert_eq!(received.subject, "factory.registry");
    }

    #[tokio::test]
    async fn test_envelope_stream_wakes_on_later_publish() {
        let bus = std::sync::Arc::new(MessageBus::new());
        let mut stream = bus
            .subscribe(SubjectPattern::parse("factory.registry").unwrap())
            .into_stream();

        let publisher = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish(envelope("factory.registry"));
        });

        // The stream is pending at first and must be woken by the publish,
        // not by polling in a loop.
        let received = timeout(Duration::from_millis(500), stream.recv())
            .await
            .expect("timeout")
            .expect("envelope");
        assert_eq!(received.subject, "factory.registry");

        drop(stream);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_drop_cleanup() {
        let bus = MessageBus::new();

        {
            let _sub1 = bus.subscribe(SubjectPattern::parse("factory.registry").unwrap());
            let _sub2 = bus.subscribe(SubjectPattern::parse("factory.registry").unwrap());
            assert_eq!(bus.subscriber_count(), 2);
        }

        assert_eq!(bus.subscriber_count(), 0);
    }
}
