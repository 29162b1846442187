//! # Mesh Node Runtime
//!
//! Wires the in-process bus, the lease store, and the services into one
//! running node.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then environment)
//! 2. Create shared infrastructure (message bus, lease store)
//! 3. Start the lease sweeper and expiry reconciler
//! 4. Start service loops (registry RPC, heartbeat listener, discovery RPC)
//! 5. Signal ready
//!
//! Shutdown reverses it: signal the watch channel, abort service loops,
//! let the store drop.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;

pub use config::{LeaseConfig, NodeConfig};

use anyhow::{Context, Result};
use mesh_bus::{BusSession, Credential, MessageBus, SubjectPattern};
use mesh_discovery::DiscoveryService;
use mesh_events::{EventDispatcher, EventEmitter, HandlerTable};
use mesh_invoke::{InvocationRouter, InvokeConfig};
use mesh_lease::{InMemoryLeaseStore, LeaseStore};
use mesh_registry::{DeviceRegistry, RegistryService};
use mesh_types::{DeviceId, TenantId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// The running node: shared infrastructure plus its service tasks.
pub struct MeshNode {
    config: NodeConfig,
    bus: Arc<MessageBus>,
    store: Arc<InMemoryLeaseStore>,
    registry: Arc<DeviceRegistry>,
    discovery: Arc<DiscoveryService>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl MeshNode {
    /// Build the node's object graph. Nothing runs until [`Self::start`].
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        let bus = Arc::new(MessageBus::new());
        let store =
            InMemoryLeaseStore::new(Duration::from_millis(config.lease.sweep_interval_ms));
        let dyn_store: Arc<dyn LeaseStore> = store.clone();

        let registry = Arc::new(DeviceRegistry::new(
            BusSession::new(bus.clone(), Credential::service("registry")),
            dyn_store,
            config.registry.clone(),
        ));
        let discovery = Arc::new(DiscoveryService::new(
            registry.clone(),
            BusSession::new(bus.clone(), Credential::service("discovery")),
            config.discovery.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            bus,
            store,
            registry,
            discovery,
            shutdown_tx,
            shutdown_rx,
        }
    }

    fn supervise(&self, name: &'static str, mut handle: tokio::task::JoinHandle<()>) {
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = &mut handle => {
                    if let Err(e) = result {
                        if !e.is_cancelled() {
                            error!(task = name, error = %e, "Service task failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!(task = name, "Shutdown signal received");
                    handle.abort();
                }
            }
        });
    }

    /// Start the sweeper, reconciler, and service loops.
    pub fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Device-Mesh Node v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        self.supervise("lease-sweeper", self.store.run_sweeper());
        self.supervise("expiry-reconciler", self.registry.run_reconciler());

        let registry_service = RegistryService::new(self.registry.clone());
        self.supervise(
            "registry-rpc",
            registry_service
                .spawn_rpc()
                .context("failed to start registry RPC loop")?,
        );
        self.supervise(
            "heartbeat-listener",
            registry_service
                .spawn_heartbeat_listener()
                .context("failed to start heartbeat listener")?,
        );
        self.supervise(
            "discovery-rpc",
            self.discovery
                .spawn_rpc()
                .context("failed to start discovery RPC loop")?,
        );
        self.supervise(
            "discovery-invalidator",
            self.discovery
                .spawn_lifecycle_invalidator()
                .context("failed to start discovery invalidator")?,
        );

        info!(
            default_ttl_secs = self.config.registry.default_ttl_secs,
            sweep_interval_ms = self.config.lease.sweep_interval_ms,
            "All services running"
        );
        Ok(())
    }

    /// Signal shutdown and give service tasks a moment to wind down.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if self.shutdown_tx.send(true).is_err() {
            error!("No supervisors listening for shutdown");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        info!("Shutdown complete");
    }

    /// The shared bus, for opening additional sessions in-process.
    #[must_use]
    pub fn bus(&self) -> Arc<MessageBus> {
        self.bus.clone()
    }

    /// The registry core (direct API, bypassing the bus).
    #[must_use]
    pub fn registry(&self) -> Arc<DeviceRegistry> {
        self.registry.clone()
    }

    /// The discovery service (direct API, bypassing the bus).
    #[must_use]
    pub fn discovery(&self) -> Arc<DiscoveryService> {
        self.discovery.clone()
    }

    /// An event emitter for one device, publishing under the given
    /// credential.
    #[must_use]
    pub fn emitter(
        &self,
        credential: Credential,
        tenant: TenantId,
        device_id: DeviceId,
    ) -> EventEmitter {
        EventEmitter::new(
            BusSession::new(self.bus.clone(), credential),
            tenant,
            device_id,
        )
    }

    /// Spawn a supervised dispatch loop routing device events to `table`.
    pub fn spawn_event_dispatcher(&self, table: HandlerTable) -> Result<()> {
        let dispatcher = EventDispatcher::new(
            self.registry.clone(),
            BusSession::new(self.bus.clone(), Credential::service("events")),
            table,
        );
        let pattern =
            SubjectPattern::parse("*.*.event.>").context("event dispatch pattern")?;
        let handle = dispatcher
            .spawn(pattern)
            .context("failed to start event dispatcher")?;
        self.supervise("event-dispatcher", handle);
        Ok(())
    }

    /// An invocation router dispatching under the given credential.
    #[must_use]
    pub fn router(&self, credential: Credential) -> InvocationRouter {
        InvocationRouter::new(
            self.registry.clone(),
            BusSession::new(self.bus.clone(), credential),
            InvokeConfig {
                timeout_ms: self.config.invoke.timeout_ms,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::{
        CapabilityDescriptor, DeviceId, DeviceIdentity, DeviceStatus, DiscoveryQuery,
        RegisterRequest, TenantId,
    };

    #[tokio::test]
    async fn test_node_starts_and_serves_registration() {
        let node = MeshNode::new(NodeConfig::default());
        node.start().unwrap();

        let tenant = TenantId::new("factory").unwrap();
        node.registry()
            .register(
                &tenant,
                RegisterRequest {
                    device_id: DeviceId::new("robot-001").unwrap(),
                    device_type: "cleaning_robot".to_string(),
                    capabilities: CapabilityDescriptor::default(),
                    identity: DeviceIdentity::default(),
                    status: DeviceStatus::default(),
                    ttl_secs: None,
                },
            )
            .await
            .unwrap();

        let devices = node
            .discovery()
            .query(
                &tenant,
                &DiscoveryQuery {
                    device_type: None,
                    location: None,
                    bypass_cache: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(devices.len(), 1);

        node.shutdown().await;
    }
}
