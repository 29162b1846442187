//! Node configuration.
//!
//! Layered the usual way: built-in defaults, then an optional TOML file
//! (`MESH_CONFIG`, default `mesh.toml`), then environment overrides for
//! the handful of knobs operators actually flip per deployment.

use anyhow::{Context, Result};
use mesh_discovery::DiscoveryConfig;
use mesh_invoke::InvokeConfig;
use mesh_registry::RegistryConfig;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Lease store tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Expiry sweep cadence. Must stay strictly below the registry's
    /// minimum TTL or a minimum-TTL lease could expire a full sweep late.
    pub sweep_interval_ms: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 1_000,
        }
    }
}

/// Full node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub lease: LeaseConfig,
    pub registry: RegistryConfig,
    pub discovery: DiscoveryConfig,
    pub invoke: InvokeConfig,
}

impl NodeConfig {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var("MESH_CONFIG").unwrap_or_else(|_| "mesh.toml".to_string());
        let mut config = if Path::new(&path).exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {path}"))?;
            let config: Self =
                toml::from_str(&raw).with_context(|| format!("failed to parse {path}"))?;
            info!(path, "Loaded configuration file");
            config
        } else {
            info!("No configuration file, using defaults");
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("MESH_DEFAULT_TTL_SECS") {
            match value.parse() {
                Ok(secs) => self.registry.default_ttl_secs = secs,
                Err(_) => warn!(value, "Ignoring unparseable MESH_DEFAULT_TTL_SECS"),
            }
        }
        if let Ok(value) = std::env::var("MESH_SWEEP_INTERVAL_MS") {
            match value.parse() {
                Ok(ms) => self.lease.sweep_interval_ms = ms,
                Err(_) => warn!(value, "Ignoring unparseable MESH_SWEEP_INTERVAL_MS"),
            }
        }
    }

    /// Reject configurations whose timing makes liveness tracking unsound.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.lease.sweep_interval_ms < self.registry.min_ttl_secs * 1_000,
            "sweep interval ({}ms) must be below the minimum TTL ({}s)",
            self.lease.sweep_interval_ms,
            self.registry.min_ttl_secs,
        );
        anyhow::ensure!(
            self.registry.min_ttl_secs <= self.registry.max_ttl_secs,
            "min TTL ({}s) exceeds max TTL ({}s)",
            self.registry.min_ttl_secs,
            self.registry.max_ttl_secs,
        );
        Ok(())
    }
}
