//! Configuration structures for Canopy.

use serde::{Deserialize, Serialize};

use crate::error::{CanopyError, Result};

/// Smallest branching factor a tree accepts.
const MIN_ORDER: usize = 2;

/// Configuration for the sample driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Branching factor of the index (maximum records per node).
    pub order: usize,
    /// Log filter for the driver's stderr logger ("off", "error", "warn",
    /// "info", "debug", "trace").
    pub log_filter: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            order: 3,
            log_filter: "info".to_string(),
        }
    }
}

impl DriverConfig {
    /// Builds a configuration from defaults plus environment overrides.
    ///
    /// Recognised variables: `CANOPY_ORDER`, `CANOPY_LOG`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("CANOPY_ORDER") {
            config.order = raw
                .parse()
                .map_err(|_| CanopyError::InvalidParameter {
                    name: "CANOPY_ORDER".to_string(),
                    value: raw.clone(),
                })?;
        }

        if let Ok(raw) = std::env::var("CANOPY_LOG") {
            config.log_filter = raw;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for internally consistent values.
    pub fn validate(&self) -> Result<()> {
        if self.order < MIN_ORDER {
            return Err(CanopyError::InvalidParameter {
                name: "order".to_string(),
                value: self.order.to_string(),
            });
        }

        match self.log_filter.as_str() {
            "off" | "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            other => Err(CanopyError::InvalidParameter {
                name: "log_filter".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_config_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.order, 3);
        assert_eq!(config.log_filter, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_small_order() {
        let config = DriverConfig {
            order: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_filter() {
        let config = DriverConfig {
            log_filter: "loud".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_all_filters() {
        for filter in ["off", "error", "warn", "info", "debug", "trace"] {
            let config = DriverConfig {
                log_filter: filter.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "filter {filter} rejected");
        }
    }
}
