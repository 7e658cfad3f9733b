//! Oracle configuration.
//!
//! Built once at construction and never mutated afterwards.

use serde::{Deserialize, Serialize};
use sextant_types::{SECONDS_PER_DAY, WAD};

use crate::{OracleError, Result};

/// Basis points in 100%.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Largest supported output precision.
pub const MAX_PRICE_DECIMALS: u8 = 36;

/// Configuration frozen into a [`GeomeanOracle`](crate::GeomeanOracle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Largest fractional move of the recorded price per time-step, in basis points.
    #[serde(default = "default_max_delta_bps")]
    pub max_delta_bps: u32,
    /// Longest queryable window in seconds.
    #[serde(default = "default_max_window")]
    pub max_window: u64,
    /// Observations retained per asset before the oldest is dropped.
    #[serde(default = "default_max_observations")]
    pub max_observations: usize,
    /// Decimal precision of query results.
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u8,
}

fn default_max_delta_bps() -> u32 {
    1_000
}

fn default_max_window() -> u64 {
    30 * SECONDS_PER_DAY
}

fn default_max_observations() -> usize {
    // Thirty days of 12-second steps, rounded up to a power of two.
    262_144
}

fn default_price_decimals() -> u8 {
    18
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_delta_bps: default_max_delta_bps(),
            max_window: default_max_window(),
            max_observations: default_max_observations(),
            price_decimals: default_price_decimals(),
        }
    }
}

impl OracleConfig {
    /// Check the configuration for values the oracle cannot operate with.
    ///
    /// # Errors
    ///
    /// - [`OracleError::InvalidConfig`] naming the first offending field
    pub fn validate(&self) -> Result<()> {
        if self.max_delta_bps >= BPS_DENOMINATOR {
            return Err(OracleError::InvalidConfig(format!(
                "max_delta_bps must be below {BPS_DENOMINATOR}, got {}",
                self.max_delta_bps
            )));
        }
        if self.max_window == 0 {
            return Err(OracleError::InvalidConfig(
                "max_window must be non-zero".to_string(),
            ));
        }
        if self.max_observations < 2 {
            return Err(OracleError::InvalidConfig(format!(
                "max_observations must be at least 2, got {}",
                self.max_observations
            )));
        }
        if self.price_decimals > MAX_PRICE_DECIMALS {
            return Err(OracleError::InvalidConfig(format!(
                "price_decimals must be at most {MAX_PRICE_DECIMALS}, got {}",
                self.price_decimals
            )));
        }
        Ok(())
    }

    /// The clamp fraction as a WAD value.
    pub fn max_price_delta(&self) -> u128 {
        u128::from(self.max_delta_bps) * (WAD / u128::from(BPS_DENOMINATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OracleConfig::default();
        assert_eq!(config.max_delta_bps, 1_000);
        assert_eq!(config.max_window, 2_592_000);
        assert_eq!(config.price_decimals, 18);
        assert_eq!(config.max_price_delta(), WAD / 10);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: OracleConfig = toml::from_str("max_delta_bps = 500").expect("parse");
        assert_eq!(config.max_delta_bps, 500);
        assert_eq!(config.max_window, default_max_window());
    }

    #[test]
    fn test_config_serialization() {
        let config = OracleConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let parsed: OracleConfig = toml::from_str(&toml_str).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_full_delta() {
        let config = OracleConfig {
            max_delta_bps: BPS_DENOMINATOR,
            ..OracleConfig::default()
        };
        assert!(matches!(config.validate(), Err(OracleError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_window_and_tiny_log() {
        let zero_window = OracleConfig {
            max_window: 0,
            ..OracleConfig::default()
        };
        assert!(zero_window.validate().is_err());

        let tiny_log = OracleConfig {
            max_observations: 1,
            ..OracleConfig::default()
        };
        assert!(tiny_log.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_excess_decimals() {
        let config = OracleConfig {
            price_decimals: 37,
            ..OracleConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
