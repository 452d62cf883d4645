//! Tier templates: the ordered capacity/refill-rate pairs every client's
//! buckets are built from.
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::settings::MAX_TIERS;

/// One level of the cascade
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TierConfig {
    // Most tokens this tier can hold
    pub capacity: u32,
    // Tokens added per second
    pub refill_rate: u32,
}

impl TierConfig {
    pub fn new(capacity: u32, refill_rate: u32) -> Self {
        Self {
            capacity,
            refill_rate,
        }
    }

    pub fn token_rate_seconds(&self) -> f64 {
        f64::from(self.refill_rate)
    }

    pub fn token_rate_milliseconds(&self) -> f64 {
        self.token_rate_seconds() / 1000.0
    }
}

/// Validated, ordered set of tiers, smallest capacity first.
///
/// The only way to get one is through `TierSet::new` (or parsing /
/// deserializing, which go through it), so holders can rely on the
/// ordering and bounds.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "Vec<TierConfig>", into = "Vec<TierConfig>")]
pub struct TierSet {
    tiers: Vec<TierConfig>,
}

impl TierSet {
    pub fn new(tiers: Vec<TierConfig>) -> Result<Self> {
        validate(&tiers)?;
        Ok(Self { tiers })
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TierConfig> {
        self.tiers.iter()
    }

    pub fn as_slice(&self) -> &[TierConfig] {
        &self.tiers
    }

    /// Sum of every tier's capacity: the most a fresh client can spend at once
    pub fn total_capacity(&self) -> u64 {
        self.tiers.iter().map(|t| u64::from(t.capacity)).sum()
    }
}

fn validate(tiers: &[TierConfig]) -> std::result::Result<(), ConfigError> {
    if tiers.is_empty() {
        return Err(ConfigError::EmptyTiers);
    }
    if tiers.len() > MAX_TIERS {
        return Err(ConfigError::TooManyTiers {
            count: tiers.len(),
            max: MAX_TIERS,
        });
    }
    let mut previous: Option<u32> = None;
    for (index, tier) in tiers.iter().enumerate() {
        if tier.capacity == 0 {
            return Err(ConfigError::ZeroCapacity { index });
        }
        if tier.refill_rate == 0 {
            return Err(ConfigError::ZeroRefillRate { index });
        }
        if let Some(previous) = previous {
            if tier.capacity <= previous {
                return Err(ConfigError::NonIncreasingCapacity {
                    index,
                    previous,
                    capacity: tier.capacity,
                });
            }
        }
        previous = Some(tier.capacity);
    }
    Ok(())
}

impl TryFrom<Vec<TierConfig>> for TierSet {
    type Error = ConfigError;

    fn try_from(tiers: Vec<TierConfig>) -> std::result::Result<Self, Self::Error> {
        validate(&tiers)?;
        Ok(Self { tiers })
    }
}

impl From<TierSet> for Vec<TierConfig> {
    fn from(set: TierSet) -> Self {
        set.tiers
    }
}

impl FromStr for TierConfig {
    type Err = ConfigError;

    /// Parse `capacity:refill_rate`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (capacity, refill_rate) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| ConfigError::Parse(format!("expected capacity:refill_rate, got '{}'", s)))?;
        let capacity = capacity
            .trim()
            .parse::<u32>()
            .map_err(|e| ConfigError::Parse(format!("capacity '{}': {}", capacity, e)))?;
        let refill_rate = refill_rate
            .trim()
            .parse::<u32>()
            .map_err(|e| ConfigError::Parse(format!("refill rate '{}': {}", refill_rate, e)))?;
        Ok(TierConfig::new(capacity, refill_rate))
    }
}

impl FromStr for TierSet {
    type Err = ConfigError;

    /// Parse a comma separated list such as `100:10,1000:5`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let tiers = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(TierConfig::from_str)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::try_from(tiers)
    }
}

impl std::fmt::Display for TierSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .tiers
            .iter()
            .map(|t| format!("{}:{}", t.capacity, t.refill_rate))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}
