//! # Discovery Flows
//!
//! Filtered queries over the bus and the bounded-staleness contract of
//! the read cache.

#[cfg(test)]
mod tests {
    use crate::support::{register_request, tenant};
    use mesh_bus::{BusSession, Credential, Subject};
    use mesh_node::{MeshNode, NodeConfig};
    use mesh_types::{DiscoveryQuery, DiscoveryReply, WireReply};
    use std::time::Duration;

    async fn query_over_bus(caller: &BusSession, query: serde_json::Value) -> DiscoveryReply {
        let reply = caller
            .request(
                &Subject::Discovery {
                    tenant: tenant("factory"),
                },
                query,
                Duration::from_millis(500),
            )
            .await
            .unwrap();
        let wire: WireReply = serde_json::from_value(reply.payload).unwrap();
        serde_json::from_value(wire.into_registry_result().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_type_filter_over_the_bus() {
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

        let caller = BusSession::new(node.bus(), Credential::tenant("app", tenant("factory")));

        let listing = query_over_bus(
            &caller,
            serde_json::json!({"device_type": "robot", "bypass_cache": true}),
        )
        .await;
        assert_eq!(listing.devices.len(), 1);
        assert_eq!(listing.devices[0].device_id.as_str(), "robot-001");
        assert_eq!(listing.devices[0].functions, vec!["start_cleaning"]);

        // No filter: both devices.
        let listing =
            query_over_bus(&caller, serde_json::json!({"bypass_cache": true})).await;
        assert_eq!(listing.devices.len(), 2);

        // Filter matching nothing: empty listing, not an error.
        let listing = query_over_bus(
            &caller,
            serde_json::json!({"device_type": "submarine", "bypass_cache": true}),
        )
        .await;
        assert!(listing.devices.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_listing_catches_up_after_fleet_change() {
        let node = MeshNode::new(NodeConfig::default());
        node.start().unwrap();

        let cached = DiscoveryQuery {
            device_type: None,
            location: None,
            bypass_cache: false,
        };

        // Prime the cache while the fleet is empty.
        assert!(node
            .discovery()
            .query(&tenant("factory"), &cached)
            .await
            .unwrap()
            .is_empty());

        node.registry()
            .register(
                &tenant("factory"),
                register_request("robot-001", "cleaning_robot", &["start_cleaning"], 30),
            )
            .await
            .unwrap();

        // The online event drops the cached snapshot, so even a cached
        // query sees the new device once the listener has run; the
        // staleness bound (default 5s) is the backstop, not the norm.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            node.discovery()
                .query(&tenant("factory"), &cached)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
