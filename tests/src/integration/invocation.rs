//! # Invocation Flows
//!
//! The full operator path: register over the bus, discover, invoke, and
//! fall back across candidates in order.

#[cfg(test)]
mod tests {
    use crate::support::{device, register_request, tenant};
    use async_trait::async_trait;
    use mesh_bus::{BusSession, Credential, Subject};
    use mesh_invoke::{CommandHandler, CommandResponder};
    use mesh_node::{MeshNode, NodeConfig};
    use mesh_types::{
        InvokeError, InvokeRequest, RegistrationReceipt, RegistryRequest, WireReply,
    };
    use std::sync::Arc;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        async fn handle(&self, request: InvokeRequest) -> Result<serde_json::Value, String> {
            Ok(serde_json::json!({"echoed": request.function}))
        }
    }

    struct Refuses;

    #[async_trait]
    impl CommandHandler for Refuses {
        async fn handle(&self, _request: InvokeRequest) -> Result<serde_json::Value, String> {
            Err("bin full".to_string())
        }
    }

    /// Register a device the way a real one would: an RPC over the bus.
    async fn register_over_bus(node: &MeshNode, id: &str) -> RegistrationReceipt {
        let session = BusSession::new(node.bus(), Credential::tenant(id, tenant("factory")));
        let request = RegistryRequest::Register(register_request(
            id,
            "cleaning_robot",
            &["start_cleaning"],
            30,
        ));
        let reply = session
            .request(
                &Subject::Registry {
                    tenant: tenant("factory"),
                },
                serde_json::to_value(&request).unwrap(),
                Duration::from_millis(500),
            )
            .await
            .unwrap();
        let wire: WireReply = serde_json::from_value(reply.payload).unwrap();
        serde_json::from_value(wire.into_registry_result().unwrap()).unwrap()
    }

    fn serve(node: &MeshNode, id: &str, handler: Arc<dyn CommandHandler>) {
        let session = BusSession::new(node.bus(), Credential::tenant(id, tenant("factory")));
        CommandResponder::new(session, tenant("factory"), device(id), handler)
            .spawn()
            .unwrap();
    }

    fn start_cleaning() -> InvokeRequest {
        InvokeRequest {
            function: "start_cleaning".to_string(),
            params: serde_json::json!({"zone": "loading-bay"}),
        }
    }

    #[tokio::test]
    async fn test_register_discover_invoke() {
        let node = MeshNode::new(NodeConfig::default());
        node.start().unwrap();

        register_over_bus(&node, "robot-001").await;
        serve(&node, "robot-001", Arc::new(Echo));

        let devices = node
            .discovery()
            .query(
                &tenant("factory"),
                &mesh_types::DiscoveryQuery {
                    device_type: Some("robot".to_string()),
                    location: None,
                    bypass_cache: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(devices.len(), 1);

        let router = node.router(Credential::tenant("operator", tenant("factory")));
        let result = router
            .invoke(&tenant("factory"), &devices[0].device_id, &start_cleaning())
            .await
            .unwrap();
        assert_eq!(result["echoed"], "start_cleaning");
    }

    #[tokio::test]
    async fn test_fallback_first_candidate_gone_second_serves() {
        let node = MeshNode::new(NodeConfig::default());
        node.start().unwrap();

        register_over_bus(&node, "robot-b").await;
        serve(&node, "robot-b", Arc::new(Echo));

        let router = node.router(Credential::tenant("operator", tenant("factory")));
        let success = router
            .invoke_with_fallback(
                &tenant("factory"),
                &[device("robot-a"), device("robot-b")],
                &start_cleaning(),
            )
            .await
            .unwrap();

        assert_eq!(success.device_id, device("robot-b"));
        assert_eq!(success.attempts.len(), 1);
        assert!(matches!(
            success.attempts[0].error,
            InvokeError::UnknownDevice { .. }
        ));
    }

    #[tokio::test]
    async fn test_fallback_exhaustion_aggregates_ordered_failures() {
        let node = MeshNode::new(NodeConfig::default());
        node.start().unwrap();

        register_over_bus(&node, "robot-a").await;
        serve(&node, "robot-a", Arc::new(Refuses));

        let router = node.router(Credential::tenant("operator", tenant("factory")));
        let err = router
            .invoke_with_fallback(
                &tenant("factory"),
                &[device("robot-a"), device("robot-b")],
                &start_cleaning(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.attempts.len(), 2);
        assert_eq!(err.attempts[0].device_id, device("robot-a"));
        assert_eq!(
            err.attempts[0].error,
            InvokeError::DeviceError {
                message: "bin full".to_string()
            }
        );
        assert_eq!(err.attempts[1].device_id, device("robot-b"));
        assert!(matches!(
            err.attempts[1].error,
            InvokeError::UnknownDevice { .. }
        ));
    }
}
