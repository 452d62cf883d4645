//! Cascade limiter settings
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::limiters::TierSet;

/// Most tiers a single limiter may be configured with
pub const MAX_TIERS: usize = 10;
/// Heaviest single request accepted by `allow_request`
pub const MAX_WEIGHT: u32 = 10_000;

pub const DEFAULT_TIERS: &str = "100:10,1000:5";
pub const STANDARD_SWEEP_INTERVAL_SECONDS: u64 = 60 * 60;
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: &str = "3600";
pub const STANDARD_IDLE_TIMEOUT_SECONDS: u64 = 24 * 60 * 60;
pub const DEFAULT_IDLE_TIMEOUT_SECONDS: &str = "86400";
/// Longest accepted sweep interval (30 days)
pub const MAX_SWEEP_INTERVAL_SECONDS: u64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    // Ordered tier template shared by every client
    pub tiers: TierSet,

    // How often the sweeper looks for idle clients
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,

    // Clients untouched for this long are evicted
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,
}

fn default_sweep_interval_seconds() -> u64 {
    STANDARD_SWEEP_INTERVAL_SECONDS
}

fn default_idle_timeout_seconds() -> u64 {
    STANDARD_IDLE_TIMEOUT_SECONDS
}

impl Settings {
    /// Settings for `tiers` with the standard hourly sweep and 24h idle timeout
    pub fn new(tiers: TierSet) -> Self {
        Self {
            tiers,
            sweep_interval_seconds: STANDARD_SWEEP_INTERVAL_SECONDS,
            idle_timeout_seconds: STANDARD_IDLE_TIMEOUT_SECONDS,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_seconds == 0 {
            return Err(crate::config_error!(ConfigError::InvalidSweepSettings(
                "sweep interval must be at least one second".to_string()
            )));
        }
        if self.sweep_interval_seconds > MAX_SWEEP_INTERVAL_SECONDS {
            return Err(crate::config_error!(ConfigError::InvalidSweepSettings(format!(
                "sweep interval of {}s exceeds the maximum of {}s",
                self.sweep_interval_seconds, MAX_SWEEP_INTERVAL_SECONDS
            ))));
        }
        if self.idle_timeout_seconds == 0 {
            return Err(crate::config_error!(ConfigError::InvalidSweepSettings(
                "idle timeout must be at least one second".to_string()
            )));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}
