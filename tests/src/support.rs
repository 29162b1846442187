//! Shared fixtures for the integration suite.

use mesh_types::{
    CapabilityDescriptor, DeviceId, DeviceIdentity, DeviceStatus, EventDescriptor,
    FunctionDescriptor, RegisterRequest, TenantId,
};

/// A tenant id, panicking on invalid input (test-only convenience).
pub fn tenant(name: &str) -> TenantId {
    TenantId::new(name).unwrap_or_else(|e| panic!("bad tenant {name:?}: {e}"))
}

/// A device id, panicking on invalid input (test-only convenience).
pub fn device(name: &str) -> DeviceId {
    DeviceId::new(name).unwrap_or_else(|e| panic!("bad device {name:?}: {e}"))
}

/// A capability descriptor declaring the given function and event names.
pub fn caps(functions: &[&str], events: &[&str]) -> CapabilityDescriptor {
    CapabilityDescriptor {
        functions: functions
            .iter()
            .map(|name| FunctionDescriptor {
                name: (*name).to_string(),
                description: String::new(),
                parameters: serde_json::Value::Null,
            })
            .collect(),
        events: events
            .iter()
            .map(|name| EventDescriptor {
                name: (*name).to_string(),
                description: String::new(),
                payload_schema: serde_json::Value::Null,
            })
            .collect(),
    }
}

/// A registration request for a device of the given type.
pub fn register_request(
    id: &str,
    device_type: &str,
    function_names: &[&str],
    ttl_secs: u64,
) -> RegisterRequest {
    RegisterRequest {
        device_id: device(id),
        device_type: device_type.to_string(),
        capabilities: caps(function_names, &["battery_low"]),
        identity: DeviceIdentity {
            manufacturer: Some("acme".to_string()),
            model: Some("mk-2".to_string()),
            firmware: Some("1.4.0".to_string()),
        },
        status: DeviceStatus::default(),
        ttl_secs: Some(ttl_secs),
    }
}
