//! Consumer-side event streams.
//!
//! Two delivery modes over the same subscription machinery: immediate
//! per-event delivery, and windowed batching for consumers that prefer
//! fewer wakeups over latency. Batching is purely a consumer-side
//! concern; the bus always delivers immediately.

use mesh_bus::{BusError, BusSession, EnvelopeStream, SubjectPattern};
use mesh_types::EventEnvelope;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// A subscription yielding decoded device events.
pub struct EventStream {
    stream: EnvelopeStream,
}

impl EventStream {
    /// Subscribe to events matching a pattern (typically
    /// `{tenant}.{device}.event.{name}` with wildcards).
    pub fn subscribe(session: &BusSession, pattern: SubjectPattern) -> Result<Self, BusError> {
        Ok(Self {
            stream: session.subscribe(pattern)?.into_stream(),
        })
    }

    /// Next event, or `None` once the bus is closed.
    ///
    /// Envelopes that do not decode as events are skipped, not fatal; a
    /// misbehaving publisher cannot wedge every consumer on its subject.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        while let Some(envelope) = self.stream.recv().await {
            match serde_json::from_value::<EventEnvelope>(envelope.payload) {
                Ok(event) => return Some(event),
                Err(e) => {
                    warn!(subject = %envelope.subject, error = %e, "Skipping undecodable event");
                }
            }
        }
        None
    }
}

/// Tunables for windowed batch delivery.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Window length, measured from the first event of each batch.
    pub window_ms: u64,
    /// Flush early once a batch reaches this many events.
    pub max_batch: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            window_ms: 250,
            max_batch: 64,
        }
    }
}

/// Turn an event stream into windowed batches.
///
/// A batch opens on its first event and flushes when the window elapses
/// or `max_batch` is reached, whichever comes first; an idle stream
/// produces no batches at all. Within one batch, events sharing an
/// `event_id` collapse to the first occurrence, in arrival order.
pub fn spawn_batcher(
    mut stream: EventStream,
    config: BatchConfig,
) -> (
    mpsc::Receiver<Vec<EventEnvelope>>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, rx) = mpsc::channel(16);
    let window = Duration::from_millis(config.window_ms);

    let handle = tokio::spawn(async move {
        'outer: loop {
            let first = match stream.recv().await {
                Some(event) => event,
                None => break,
            };
            let mut seen: HashSet<Uuid> = HashSet::new();
            seen.insert(first.event_id);
            let mut batch = vec![first];
            let deadline = Instant::now() + window;

            while batch.len() < config.max_batch {
                tokio::select! {
                    () = tokio::time::sleep_until(deadline) => break,
                    event = stream.recv() => match event {
                        Some(event) => {
                            if seen.insert(event.event_id) {
                                batch.push(event);
                            } else {
                                debug!(event_id = %event.event_id, "Duplicate event within batch window");
                            }
                        }
                        None => {
                            let _ = tx.send(batch).await;
                            break 'outer;
                        }
                    },
                }
            }

            if tx.send(batch).await.is_err() {
                break;
            }
        }
    });

    (rx, handle)
}
