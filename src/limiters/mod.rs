pub mod rate_limit;
pub mod tiered_bucket;
pub mod tiers;
pub use rate_limit::TieredRateLimiter;
pub use tiered_bucket::{BucketState, ClientSnapshot, ClientState};
pub use tiers::{TierConfig, TierSet};
