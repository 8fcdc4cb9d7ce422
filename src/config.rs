//! Service configuration
//!
//! Values consumed by the transport and the core: socket addresses for the
//! inbound multicast feed and the outbound emission, the emission period, the
//! bulk size, and the gap-cache capacity. Loaded from a JSON file when one is
//! given, otherwise defaults apply.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Configuration for the aggregator service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Local address the inbound socket binds to.
    pub listen_host: String,
    /// Local port the inbound socket binds to.
    pub listen_port: u16,
    /// Multicast group joined for the inbound feed.
    pub multicast_address: String,
    /// Destination address for aggregated bulks.
    pub emission_address: String,
    /// Destination port for aggregated bulks.
    pub emission_port: u16,
    /// Interval between aggregation cycles, in milliseconds.
    pub emission_period_ms: u64,
    /// Maximum products per outbound bulk.
    pub bulk_size: usize,
    /// Maximum gapped batches buffered before all-or-nothing eviction.
    pub cache_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            listen_port: 9050,
            multicast_address: "230.0.0.1".to_string(),
            emission_address: "230.0.0.2".to_string(),
            emission_port: 9051,
            emission_period_ms: 2000,
            bulk_size: 5,
            cache_capacity: 100,
        }
    }
}

impl ServiceConfig {
    /// Load and validate configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configured values can actually drive the service.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bulk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "bulkSize",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "cacheCapacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.emission_period_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "emissionPeriodMs",
                reason: "must be at least 1".to_string(),
            });
        }
        self.multicast_address
            .parse::<std::net::IpAddr>()
            .map_err(|e| ConfigError::Invalid {
                field: "multicastAddress",
                reason: e.to_string(),
            })?;
        self.emission_address
            .parse::<std::net::IpAddr>()
            .map_err(|e| ConfigError::Invalid {
                field: "emissionAddress",
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
