use std::sync::{Arc, Mutex};

use chrono::Utc;
use papaya::HashMap;
use tracing::{debug, event, trace, Level};

use super::tiered_bucket::{ClientSnapshot, ClientState};
use super::tiers::TierSet;
use crate::error::Result;
use crate::settings::MAX_WEIGHT;

/// Each rate-limited client will be stored in here.
/// To check if a request is allowed we ask that client's `ClientState`.
///
/// The map itself is lock-free; every entry carries its own mutex so
/// requests for different clients never contend once their state exists.
#[derive(Debug)]
pub struct TieredRateLimiter {
    tiers: TierSet,
    clients: HashMap<String, Arc<Mutex<ClientState>>>,
}

impl TieredRateLimiter {
    pub fn new(tiers: TierSet) -> Self {
        Self {
            tiers,
            clients: HashMap::new(),
        }
    }

    pub fn tiers(&self) -> &TierSet {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Decide whether `client_id` may spend `weight` tokens now
    pub fn allow_request(&self, client_id: &str, weight: u32) -> bool {
        self.allow_request_at(client_id, weight, Utc::now().timestamp_millis())
    }

    /// `allow_request` against an explicit clock (unix milliseconds).
    ///
    /// Bad input and internal failures are denials, never errors.
    pub fn allow_request_at(&self, client_id: &str, weight: u32, now_ms: i64) -> bool {
        if client_id.is_empty() || weight == 0 || weight > MAX_WEIGHT {
            trace!(client_id, weight, "Rejecting malformed request");
            return false;
        }
        match self.limit_calls_for_client(client_id, weight, now_ms) {
            Ok(allowed) => allowed,
            Err(err) => {
                event!(
                    Level::ERROR,
                    message = "Failed applying rate limit",
                    client_id,
                    err = format!("{:?}", err)
                );
                false
            }
        }
    }

    fn limit_calls_for_client(&self, client_id: &str, weight: u32, now_ms: i64) -> Result<bool> {
        loop {
            let entry = self
                .clients
                .pin()
                .get_or_insert_with(client_id.to_string(), || {
                    trace!(client_id, "Creating buckets for new client");
                    Arc::new(Mutex::new(ClientState::new(&self.tiers, now_ms)))
                })
                .clone();

            let mut state = entry.lock().map_err(|e| {
                crate::concurrency_error!("Failed to acquire client {} lock: {}", client_id, e)
            })?;
            // Lost a race with the sweeper: this entry is on its way out of the map
            if state.evicted {
                drop(state);
                std::thread::yield_now();
                continue;
            }
            return Ok(state.allow(&self.tiers, weight, now_ms));
        }
    }

    /// Buckets for `client_id` as of now, without spending anything.
    /// Unknown clients report full buckets.
    pub fn check_tokens_remaining(&self, client_id: &str) -> Result<ClientSnapshot> {
        self.check_tokens_remaining_at(client_id, Utc::now().timestamp_millis())
    }

    pub fn check_tokens_remaining_at(&self, client_id: &str, now_ms: i64) -> Result<ClientSnapshot> {
        let entry = self.clients.pin().get(client_id).cloned();
        match entry {
            Some(entry) => {
                let state = entry.lock().map_err(|e| {
                    crate::concurrency_error!("Failed to acquire client {} lock: {}", client_id, e)
                })?;
                Ok(ClientSnapshot::from_state(client_id, &state, &self.tiers, now_ms))
            }
            None => Ok(ClientSnapshot::full(client_id, &self.tiers, now_ms)),
        }
    }

    /// Drop every client idle for longer than `idle_timeout_ms`.
    /// Returns the number of clients removed.
    pub fn expire_idle_clients(&self, idle_timeout_ms: i64, now_ms: i64) -> usize {
        let cutoff = now_ms.saturating_sub(idle_timeout_ms);
        let mut removed = 0usize;
        self.clients.pin().retain(|client_id, entry| {
            let keep = match entry.lock() {
                Ok(mut state) => {
                    if state.is_idle(cutoff) {
                        state.evicted = true;
                        false
                    } else {
                        true
                    }
                }
                Err(err) => {
                    event!(
                        Level::WARN,
                        message = "Evicting client with poisoned lock",
                        client_id = client_id.as_str(),
                        err = format!("{:?}", err)
                    );
                    false
                }
            };
            if !keep {
                removed += 1;
            }
            keep
        });
        debug!("Expired {} idle clients, {} remain", removed, self.clients.len());
        removed
    }

    /// Get all client keys currently tracked (for debugging/monitoring)
    pub fn get_all_client_keys(&self) -> Vec<String> {
        let guard = self.clients.pin();
        guard.iter().map(|(key, _)| key.clone()).collect()
    }
}
