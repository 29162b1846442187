//! Device-side event emission.

use crate::EventError;
use mesh_bus::{BusSession, Subject};
use mesh_types::{unix_now, validate_segment, DeviceId, EventEnvelope, TenantId};
use tracing::debug;
use uuid::Uuid;

/// Emits a device's events onto its event subjects.
///
/// Fire-and-forget: emission never waits for consumers and an event with
/// no subscriber is silently dropped by the bus.
pub struct EventEmitter {
    session: BusSession,
    tenant: TenantId,
    device_id: DeviceId,
}

impl EventEmitter {
    /// Create an emitter for one device.
    #[must_use]
    pub fn new(session: BusSession, tenant: TenantId, device_id: DeviceId) -> Self {
        Self {
            session,
            tenant,
            device_id,
        }
    }

    /// Publish one event. Returns the delivery-scoped event id consumers
    /// dedup by.
    pub fn emit(
        &self,
        event_name: &str,
        payload: serde_json::Value,
    ) -> Result<Uuid, EventError> {
        validate_segment(event_name)?;

        let event = EventEnvelope {
            device_id: self.device_id.clone(),
            event_name: event_name.to_string(),
            payload,
            emitted_at: unix_now(),
            event_id: Uuid::new_v4(),
        };
        let subject = Subject::Event {
            tenant: self.tenant.clone(),
            device_id: self.device_id.clone(),
            event_name: event_name.to_string(),
        };
        let value = serde_json::to_value(&event).map_err(|e| EventError::Serialization {
            reason: e.to_string(),
        })?;
        self.session.publish(&subject, value)?;

        debug!(
            tenant = %self.tenant,
            device_id = %self.device_id,
            event_name,
            event_id = %event.event_id,
            "Event emitted"
        );
        Ok(event.event_id)
    }
}
