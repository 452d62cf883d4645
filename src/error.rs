use std::fmt;

/// Main error type for the cascade rate limiter
#[derive(Debug)]
pub enum CascadeError {
    /// Tier set or sweeper configuration errors
    Config(ConfigError),

    /// Internal lock poisoning or concurrency errors
    Concurrency(String),

    /// Background sweeper lifecycle errors
    Sweeper(String),
}

/// Reasons a tier set or limiter configuration is rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No tiers were given
    EmptyTiers,

    /// More than `MAX_TIERS` tiers were given
    TooManyTiers { count: usize, max: usize },

    /// A tier has a capacity of zero
    ZeroCapacity { index: usize },

    /// A tier has a refill rate of zero
    ZeroRefillRate { index: usize },

    /// A tier's capacity is not larger than the one before it
    NonIncreasingCapacity {
        index: usize,
        previous: u32,
        capacity: u32,
    },

    /// A tier could not be parsed from its `capacity:refill_rate` form
    Parse(String),

    /// Sweep interval or idle timeout of zero
    InvalidSweepSettings(String),
}

impl fmt::Display for CascadeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CascadeError::Config(err) => write!(f, "Configuration error: {}", err),
            CascadeError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
            CascadeError::Sweeper(msg) => write!(f, "Sweeper error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyTiers => write!(f, "at least one tier is required"),
            ConfigError::TooManyTiers { count, max } => {
                write!(f, "{} tiers given, at most {} allowed", count, max)
            }
            ConfigError::ZeroCapacity { index } => {
                write!(f, "tier {} must have a capacity greater than zero", index)
            }
            ConfigError::ZeroRefillRate { index } => {
                write!(f, "tier {} must have a refill rate greater than zero", index)
            }
            ConfigError::NonIncreasingCapacity {
                index,
                previous,
                capacity,
            } => write!(
                f,
                "tier {} capacity {} must be greater than previous capacity {}",
                index, capacity, previous
            ),
            ConfigError::Parse(msg) => write!(f, "invalid tier: {}", msg),
            ConfigError::InvalidSweepSettings(msg) => write!(f, "invalid sweeper settings: {}", msg),
        }
    }
}

impl std::error::Error for CascadeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CascadeError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, CascadeError>;

impl CascadeError {
    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            CascadeError::Config(_) => "configuration_error",
            CascadeError::Concurrency(_) => "concurrency_error",
            CascadeError::Sweeper(_) => "sweeper_error",
        }
    }

    /// Configuration problems are the caller's to fix; nothing else is
    pub fn is_config(&self) -> bool {
        matches!(self, CascadeError::Config(_))
    }
}

impl From<ConfigError> for CascadeError {
    fn from(err: ConfigError) -> Self {
        CascadeError::Config(err)
    }
}

impl From<tokio::task::JoinError> for CascadeError {
    fn from(err: tokio::task::JoinError) -> Self {
        CascadeError::Sweeper(format!("Sweeper task failed: {}", err))
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($variant:expr) => {
        $crate::error::CascadeError::Config($variant)
    };
}

#[macro_export]
macro_rules! concurrency_error {
    ($msg:expr) => {
        $crate::error::CascadeError::Concurrency($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::CascadeError::Concurrency(format!($fmt, $($arg)*))
    };
}
