use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use crate::error::Result;
use crate::limiters::{ClientSnapshot, TierSet, TieredRateLimiter};
use crate::settings::Settings;
use crate::sweeper::Sweeper;

/// A tiered rate limiter together with the sweeper that evicts its idle
/// clients. Share it between threads behind an `Arc`.
#[derive(Debug)]
pub struct Limiter {
    settings: Settings,
    rate_limiter: Arc<TieredRateLimiter>,
    sweeper: Sweeper,
}

impl Limiter {
    /// Validate `settings`, build the limiter and start its sweeper.
    /// Must be awaited inside a tokio runtime.
    #[instrument(skip_all, fields(tiers = %settings.tiers), level = "debug")]
    pub async fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let rate_limiter = Arc::new(TieredRateLimiter::new(settings.tiers.clone()));
        let sweeper = Sweeper::start(
            rate_limiter.clone(),
            settings.sweep_interval(),
            settings.idle_timeout(),
        );
        info!(
            "Started limiter with {} tiers (total capacity {})",
            settings.tiers.len(),
            settings.tiers.total_capacity()
        );
        Ok(Self {
            settings,
            rate_limiter,
            sweeper,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tiers(&self) -> &TierSet {
        self.rate_limiter.tiers()
    }

    pub fn client_count(&self) -> usize {
        self.rate_limiter.len()
    }

    pub fn allow_request(&self, client_id: &str, weight: u32) -> bool {
        self.rate_limiter.allow_request(client_id, weight)
    }

    pub fn allow_request_at(&self, client_id: &str, weight: u32, now_ms: i64) -> bool {
        self.rate_limiter.allow_request_at(client_id, weight, now_ms)
    }

    pub fn check_tokens_remaining(&self, client_id: &str) -> Result<ClientSnapshot> {
        self.rate_limiter.check_tokens_remaining(client_id)
    }

    /// Run a sweep now instead of waiting for the next tick
    pub fn expire_idle_clients(&self) -> usize {
        let idle_timeout_ms =
            i64::try_from(self.settings.idle_timeout().as_millis()).unwrap_or(i64::MAX);
        self.rate_limiter
            .expire_idle_clients(idle_timeout_ms, Utc::now().timestamp_millis())
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }

    /// Stop the background sweeper. Requests keep working afterwards,
    /// idle clients are just no longer evicted automatically.
    #[instrument(skip_all, level = "debug")]
    pub async fn shutdown(&mut self) -> Result<()> {
        self.sweeper.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CascadeError, ConfigError};

    #[tokio::test]
    async fn new_starts_sweeper_and_shutdown_stops_it() {
        let settings = Settings::new("100:10,1000:5".parse().unwrap());
        let mut limiter = Limiter::new(settings).await.unwrap();
        assert!(limiter.is_sweeping());
        assert!(limiter.allow_request("c1", 150));
        assert_eq!(limiter.client_count(), 1);

        limiter.shutdown().await.unwrap();
        assert!(!limiter.is_sweeping());
        assert!(limiter.allow_request("c1", 1));
    }

    #[tokio::test]
    async fn invalid_sweep_settings_fail_construction() {
        let mut settings = Settings::new("100:10".parse().unwrap());
        settings.sweep_interval_seconds = 0;
        let err = Limiter::new(settings).await.unwrap_err();
        assert!(matches!(
            err,
            CascadeError::Config(ConfigError::InvalidSweepSettings(_))
        ));
    }

    #[tokio::test]
    async fn oversized_sweep_interval_fails_construction() {
        let mut settings = Settings::new("100:10".parse().unwrap());
        settings.sweep_interval_seconds = u64::MAX;
        let err = Limiter::new(settings).await.unwrap_err();
        assert!(matches!(
            err,
            CascadeError::Config(ConfigError::InvalidSweepSettings(_))
        ));
    }

    #[tokio::test]
    async fn huge_idle_timeout_keeps_sweeping() {
        let mut settings = Settings::new("100:10".parse().unwrap());
        settings.idle_timeout_seconds = u64::MAX;
        let mut limiter = Limiter::new(settings).await.unwrap();
        assert!(limiter.allow_request("c1", 1));
        assert_eq!(limiter.expire_idle_clients(), 0);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(limiter.is_sweeping());
        limiter.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn on_demand_sweep_keeps_recent_clients() {
        let limiter = Limiter::new(Settings::new("10:1".parse().unwrap()))
            .await
            .unwrap();
        let two_days_ago = Utc::now().timestamp_millis() - 2 * 24 * 60 * 60 * 1000;
        assert!(limiter.allow_request_at("stale", 1, two_days_ago));
        assert!(limiter.allow_request("recent", 1));
        assert_eq!(limiter.expire_idle_clients(), 1);
        assert_eq!(limiter.client_count(), 1);
    }
}
