//! # Event Fabric Flows
//!
//! Device emission through to both consumption modes: windowed batches
//! and typed handlers keyed by `(device_type, event_name)`.

#[cfg(test)]
mod tests {
    use crate::support::{device, register_request, tenant};
    use async_trait::async_trait;
    use mesh_bus::{BusSession, Credential, SubjectPattern};
    use mesh_events::{
        spawn_batcher, BatchConfig, EventEmitter, EventHandler, EventStream, HandlerTable,
    };
    use mesh_node::{MeshNode, NodeConfig};
    use mesh_types::{EventEnvelope, TenantId};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    fn emitter_for(node: &MeshNode, id: &str) -> EventEmitter {
        node.emitter(
            Credential::tenant(id, tenant("factory")),
            tenant("factory"),
            device(id),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_emission_reaches_batched_consumer() {
        let node = MeshNode::new(NodeConfig::default());
        node.start().unwrap();

        let consumer = BusSession::new(
            node.bus(),
            Credential::tenant("dashboard", tenant("factory")),
        );
        let stream = EventStream::subscribe(
            &consumer,
            SubjectPattern::parse("factory.*.event.>").unwrap(),
        )
        .unwrap();
        let (mut batches, _handle) = spawn_batcher(
            stream,
            BatchConfig {
                window_ms: 250,
                max_batch: 64,
            },
        );

        let emitter = emitter_for(&node, "robot-001");
        emitter
            .emit("battery_low", serde_json::json!({"percent": 7}))
            .unwrap();
        emitter.emit("bin_full", serde_json::Value::Null).unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        let batch = batches.recv().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].event_name, "battery_low");
        assert_eq!(batch[0].payload["percent"], 7);
        assert_eq!(batch[1].event_name, "bin_full");
    }

    #[derive(Default)]
    struct LowBatteryLog {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler for LowBatteryLog {
        async fn handle(&self, _tenant: &TenantId, event: EventEnvelope) {
            self.seen.lock().push(event.device_id.to_string());
        }
    }

    #[tokio::test]
    async fn test_typed_handler_keyed_by_device_type() {
        let node = MeshNode::new(NodeConfig::default());
        node.start().unwrap();

        node.registry()
            .register(
                &tenant("factory"),
                register_request("robot-001", "cleaning_robot", &["start_cleaning"], 30),
            )
            .await
            .unwrap();
        node.registry()
            .register(
                &tenant("factory"),
                register_request("cam-001", "vision_camera", &["capture"], 30),
            )
            .await
            .unwrap();

        let log = Arc::new(LowBatteryLog::default());
        let table = HandlerTable::new().on("cleaning_robot", "battery_low", log.clone());
        node.spawn_event_dispatcher(table).unwrap();

        // Both devices emit the same event name; only the robot's type has
        // a registered handler.
        emitter_for(&node, "robot-001")
            .emit("battery_low", serde_json::Value::Null)
            .unwrap();
        emitter_for(&node, "cam-001")
            .emit("battery_low", serde_json::Value::Null)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*log.seen.lock(), vec!["robot-001".to_string()]);
    }
}
