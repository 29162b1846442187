//! # Lease Lifecycle Flows
//!
//! The liveness contract, end to end: a device is discoverable exactly
//! while its lease is valid, heartbeats extend the lease, expiry is the
//! sole offline trigger, and each lease generation goes offline at most
//! once.

#[cfg(test)]
mod tests {
    use crate::support::{device, register_request, tenant};
    use mesh_bus::{BusSession, Credential, SubjectPattern};
    use mesh_node::{MeshNode, NodeConfig};
    use mesh_types::{DiscoveryQuery, LifecyclePayload, RegistryError};
    use std::time::Duration;

    fn fresh_query() -> DiscoveryQuery {
        DiscoveryQuery {
            device_type: None,
            location: None,
            bypass_cache: true,
        }
    }

    async fn online_count(node: &MeshNode) -> usize {
        node.discovery()
            .query(&tenant("factory"), &fresh_query())
            .await
            .unwrap()
            .len()
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_discoverable_exactly_while_leased() {
        let node = MeshNode::new(NodeConfig::default());
        node.start().unwrap();

        let observer = BusSession::new(
            node.bus(),
            Credential::tenant("observer", tenant("factory")),
        );
        let mut offline_sub = observer
            .subscribe(SubjectPattern::parse("factory.device.offline").unwrap())
            .unwrap();

        node.registry()
            .register(
                &tenant("factory"),
                register_request("robot-001", "cleaning_robot", &["start_cleaning"], 5),
            )
            .await
            .unwrap();
        assert_eq!(online_count(&node).await, 1);

        // Past the TTL with no heartbeat: the sweeper expires the lease.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(online_count(&node).await, 0);

        let event = offline_sub.recv().await.unwrap();
        let payload: LifecyclePayload = serde_json::from_value(event.payload).unwrap();
        assert_eq!(payload.device_id, device("robot-001"));

        // A heartbeat on the expired lease must not resurrect it.
        let err = node
            .registry()
            .heartbeat(&tenant("factory"), &device("robot-001"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownDevice { .. }));
        assert_eq!(online_count(&node).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_keep_device_alive_past_original_ttl() {
        let node = MeshNode::new(NodeConfig::default());
        node.start().unwrap();

        node.registry()
            .register(
                &tenant("factory"),
                register_request("robot-001", "cleaning_robot", &["start_cleaning"], 5),
            )
            .await
            .unwrap();

        // Three renewal cycles, each inside the TTL. Total elapsed time far
        // exceeds the original 5s lease.
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_secs(3)).await;
            let ack = node
                .registry()
                .heartbeat(&tenant("factory"), &device("robot-001"))
                .await
                .unwrap();
            assert_eq!(ack.expires_in_secs, 5);
        }
        assert_eq!(online_count(&node).await, 1);

        // Stop renewing and the lease finally lapses.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(online_count(&node).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_generation_goes_offline_exactly_once() {
        let node = MeshNode::new(NodeConfig::default());
        node.start().unwrap();

        let observer = BusSession::new(
            node.bus(),
            Credential::tenant("observer", tenant("factory")),
        );
        let mut offline_sub = observer
            .subscribe(SubjectPattern::parse("factory.device.offline").unwrap())
            .unwrap();

        let first = node
            .registry()
            .register(
                &tenant("factory"),
                register_request("robot-001", "cleaning_robot", &["start_cleaning"], 5),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        let second = node
            .registry()
            .register(
                &tenant("factory"),
                register_request("robot-001", "cleaning_robot", &["start_cleaning"], 5),
            )
            .await
            .unwrap();
        assert_ne!(first.registration_id, second.registration_id);
        tokio::time::sleep(Duration::from_secs(6)).await;

        // Exactly one offline event per generation, in order.
        let event = offline_sub.recv().await.unwrap();
        let payload: LifecyclePayload = serde_json::from_value(event.payload).unwrap();
        assert_eq!(payload.registration_id, first.registration_id);

        let event = offline_sub.recv().await.unwrap();
        let payload: LifecyclePayload = serde_json::from_value(event.payload).unwrap();
        assert_eq!(payload.registration_id, second.registration_id);

        assert!(matches!(offline_sub.try_recv(), Ok(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_update_does_not_renew_lease() {
        let node = MeshNode::new(NodeConfig::default());
        node.start().unwrap();

        node.registry()
            .register(
                &tenant("factory"),
                register_request("robot-001", "cleaning_robot", &["start_cleaning"], 5),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        node.registry()
            .update_status(
                &tenant("factory"),
                &device("robot-001"),
                mesh_types::DeviceStatus {
                    availability: mesh_types::Availability::Busy,
                    location: Some("floor-2".to_string()),
                },
            )
            .await
            .unwrap();

        // The update changed the record but not the lease deadline: the
        // device still expires on the original schedule.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(online_count(&node).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_published_heartbeat_renews_over_the_bus() {
        let node = MeshNode::new(NodeConfig::default());
        node.start().unwrap();

        node.registry()
            .register(
                &tenant("factory"),
                register_request("robot-001", "cleaning_robot", &["start_cleaning"], 5),
            )
            .await
            .unwrap();

        let robot = BusSession::new(
            node.bus(),
            Credential::tenant("robot-001", tenant("factory")),
        );
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_secs(3)).await;
            robot
                .publish(
                    &mesh_bus::Subject::Heartbeat {
                        tenant: tenant("factory"),
                        device_id: device("robot-001"),
                    },
                    serde_json::Value::Null,
                )
                .unwrap();
            // Let the heartbeat listener process before the clock jumps on.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(online_count(&node).await, 1);
    }
}
