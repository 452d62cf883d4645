//! Tiered, weighted token-bucket rate limiting.
//!
//! A [`Limiter`] holds an ordered set of nested quotas ([`TierSet`]) and a
//! set of buckets per client. Requests carry a weight which is drawn from
//! the smallest tier first, spilling into larger ones, and is only ever
//! taken in full.
pub mod cli;
pub mod error;
pub mod limiter;
pub mod limiters;
pub mod settings;
pub mod sweeper;

pub use error::{CascadeError, ConfigError, Result};
pub use limiter::Limiter;
pub use limiters::{ClientSnapshot, TierConfig, TierSet, TieredRateLimiter};
pub use settings::Settings;
