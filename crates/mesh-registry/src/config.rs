//! Registry configuration.

use serde::Deserialize;
use std::time::Duration;

/// Tunables for lease TTL handling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// TTL applied when a registration does not supply one.
    pub default_ttl_secs: u64,
    /// Lower clamp for device-supplied TTLs. The lease store's sweep
    /// interval must stay strictly below this.
    pub min_ttl_secs: u64,
    /// Upper clamp for device-supplied TTLs.
    pub max_ttl_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 30,
            min_ttl_secs: 5,
            max_ttl_secs: 3600,
        }
    }
}

impl RegistryConfig {
    /// Clamp a requested TTL into the configured bounds.
    #[must_use]
    pub fn clamp_ttl(&self, requested: Option<u64>) -> Duration {
        let secs = requested
            .unwrap_or(self.default_ttl_secs)
            .clamp(self.min_ttl_secs, self.max_ttl_secs);
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_ttl() {
        let config = RegistryConfig::default();
        assert_eq!(config.clamp_ttl(None), Duration::from_secs(30));
        assert_eq!(config.clamp_ttl(Some(1)), Duration::from_secs(5));
        assert_eq!(config.clamp_ttl(Some(10_000)), Duration::from_secs(3600));
        assert_eq!(config.clamp_ttl(Some(60)), Duration::from_secs(60));
    }
}
