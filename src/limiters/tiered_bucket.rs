//! Token bucket rate limiting algorithm, one bucket per tier.
//! For inspiration see: https://en.wikipedia.org/wiki/Token_bucket
use serde::{Deserialize, Serialize};

use super::tiers::{TierConfig, TierSet};

/// A single tier's token bucket for one client
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BucketState {
    // Count of tokens
    pub tokens: f64,
    // timestamp in unix milliseconds
    pub last_refill: i64,
}

impl BucketState {
    /// A full bucket for `tier`
    pub fn new(tier: &TierConfig, now_ms: i64) -> Self {
        Self {
            tokens: f64::from(tier.capacity),
            last_refill: now_ms,
        }
    }

    /// Add tokens at `refill_rate * elapsed`, capped at the tier's capacity.
    /// A clock that moved backwards adds nothing.
    pub fn add_tokens_to_bucket(&mut self, tier: &TierConfig, now_ms: i64) -> &mut Self {
        let diff_ms = now_ms.saturating_sub(self.last_refill).max(0);
        let tokens_to_add = tier.token_rate_milliseconds() * diff_ms as f64;
        self.tokens = (self.tokens + tokens_to_add).clamp(0.0, f64::from(tier.capacity));
        self.last_refill = self.last_refill.max(now_ms);
        self
    }
}

/// Every bucket a single client owns, in tier order
#[derive(Clone, Debug, PartialEq)]
pub struct ClientState {
    pub buckets: Vec<BucketState>,
    // timestamp in unix milliseconds of the last allowed request
    pub last_access: i64,
    // Set once the sweeper has removed this state from the client map
    pub evicted: bool,
}

impl ClientState {
    /// Full buckets for every tier in `tiers`
    pub fn new(tiers: &TierSet, now_ms: i64) -> Self {
        Self {
            buckets: tiers.iter().map(|tier| BucketState::new(tier, now_ms)).collect(),
            last_access: now_ms,
            evicted: false,
        }
    }

    pub fn refill(&mut self, tiers: &TierSet, now_ms: i64) -> &mut Self {
        for (bucket, tier) in self.buckets.iter_mut().zip(tiers.iter()) {
            bucket.add_tokens_to_bucket(tier, now_ms);
        }
        self
    }

    pub fn total_tokens(&self) -> f64 {
        self.buckets.iter().map(|b| b.tokens).sum()
    }

    /// Draw `weight` tokens, smallest tier first.
    ///
    /// All or nothing: when the tiers together cannot cover `weight` no
    /// bucket is touched and `false` is returned.
    pub fn try_consume(&mut self, weight: u32, now_ms: i64) -> bool {
        let requested = f64::from(weight);
        if self.total_tokens() < requested {
            return false;
        }
        let mut remaining = requested;
        for bucket in self.buckets.iter_mut() {
            if remaining <= 0.0 {
                break;
            }
            let take = bucket.tokens.min(remaining);
            bucket.tokens = (bucket.tokens - take).max(0.0);
            remaining -= take;
        }
        self.last_access = now_ms;
        true
    }

    /// Refill then consume under whatever lock the caller holds
    pub fn allow(&mut self, tiers: &TierSet, weight: u32, now_ms: i64) -> bool {
        self.refill(tiers, now_ms);
        self.try_consume(weight, now_ms)
    }

    pub fn is_idle(&self, cutoff_ms: i64) -> bool {
        self.last_access < cutoff_ms
    }
}

/// Point-in-time view of a client's buckets
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ClientSnapshot {
    pub client_id: String,
    pub tokens: Vec<f64>,
    pub total_tokens: f64,
    pub last_access: i64,
}

impl ClientSnapshot {
    /// Snapshot with refill applied as of `now_ms`, leaving `state` untouched
    pub fn from_state(client_id: &str, state: &ClientState, tiers: &TierSet, now_ms: i64) -> Self {
        let mut refilled = state.clone();
        refilled.refill(tiers, now_ms);
        Self {
            client_id: client_id.to_string(),
            tokens: refilled.buckets.iter().map(|b| b.tokens).collect(),
            total_tokens: refilled.total_tokens(),
            last_access: state.last_access,
        }
    }

    /// A client the limiter has never seen holds full buckets
    pub fn full(client_id: &str, tiers: &TierSet, now_ms: i64) -> Self {
        Self::from_state(client_id, &ClientState::new(tiers, now_ms), tiers, now_ms)
    }

    pub fn tokens_to_u32(&self) -> u32 {
        self.total_tokens.trunc().clamp(0.0, u32::MAX.into()) as u32
    }
}
