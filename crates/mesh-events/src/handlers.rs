//! Typed event handling.
//!
//! Consumers that react to events rather than stream them register
//! handlers keyed by `(device_type, event_name)`. The dispatcher resolves
//! the emitting device's type through the registry, so a handler for
//! `("cleaning_robot", "battery_low")` never fires for a camera that
//! happens to emit the same event name.

use async_trait::async_trait;
use mesh_bus::{BusError, BusSession, Subject, SubjectPattern};
use mesh_registry::DeviceRegistry;
use mesh_types::{EventEnvelope, TenantId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Application logic reacting to one kind of event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// React to one event. Handlers run inline in the dispatch loop, so
    /// long work should be spawned off.
    async fn handle(&self, tenant: &TenantId, event: EventEnvelope);
}

/// Handler registrations keyed by `(device_type, event_name)`.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<(String, String), Arc<dyn EventHandler>>,
}

impl HandlerTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Replaces any previous registration for the
    /// same key.
    #[must_use]
    pub fn on(
        mut self,
        device_type: impl Into<String>,
        event_name: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        self.handlers
            .insert((device_type.into(), event_name.into()), handler);
        self
    }

    /// The handler for a `(device_type, event_name)` pair, if any.
    #[must_use]
    pub fn get(&self, device_type: &str, event_name: &str) -> Option<&Arc<dyn EventHandler>> {
        self.handlers
            .get(&(device_type.to_string(), event_name.to_string()))
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Routes incoming events to registered handlers.
pub struct EventDispatcher {
    registry: Arc<DeviceRegistry>,
    session: BusSession,
    table: HandlerTable,
}

impl EventDispatcher {
    /// Create a dispatcher consuming events on `session`.
    #[must_use]
    pub fn new(registry: Arc<DeviceRegistry>, session: BusSession, table: HandlerTable) -> Self {
        Self {
            registry,
            session,
            table,
        }
    }

    async fn dispatch(&self, envelope: mesh_types::Envelope) {
        let Ok(Subject::Event {
            tenant,
            device_id,
            event_name,
        }) = Subject::parse(&envelope.subject)
        else {
            return;
        };

        let event = match serde_json::from_value::<EventEnvelope>(envelope.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(subject = %envelope.subject, error = %e, "Skipping undecodable event");
                return;
            }
        };

        // The emitter's declared type comes from its live record; events
        // from a device whose lease already expired are dropped.
        let record = match self.registry.get_record(&tenant, &device_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(
                    tenant = %tenant,
                    device_id = %device_id,
                    "Event from unregistered device dropped"
                );
                return;
            }
            Err(e) => {
                warn!(tenant = %tenant, device_id = %device_id, error = %e, "Registry lookup failed");
                return;
            }
        };

        if let Some(handler) = self.table.get(&record.device_type, &event_name) {
            handler.handle(&tenant, event).await;
        }
    }

    /// Spawn the dispatch loop over a subscription pattern (e.g.
    /// `{tenant}.*.event.>`, or `*.*.event.>` with service scope).
    pub fn spawn(self, pattern: SubjectPattern) -> Result<tokio::task::JoinHandle<()>, BusError> {
        let mut sub = self.session.subscribe(pattern)?;
        Ok(tokio::spawn(async move {
            info!("Event dispatcher started");
            while let Some(envelope) = sub.recv().await {
                self.dispatch(envelope).await;
            }
            info!("Event dispatcher stopped");
        }))
    }
}
