//! Command-line and environment configuration for embedding applications.
//!
//! `LimiterArgs` is meant to be `#[command(flatten)]`-ed into a host
//! program's own `clap` parser.
use crate::limiters::TierSet;
use crate::settings;

#[derive(Clone, Debug, clap::Args)]
pub struct LimiterArgs {
    // Tier template: comma separated capacity:refill_rate pairs
    #[clap(
        long,
        default_value = settings::DEFAULT_TIERS,
        env("CASCADE_TIERS"),
        help = "Tiers as capacity:refill_rate pairs in increasing capacity (e.g., 100:10,1000:5)"
    )]
    pub tiers: TierSet,

    // Seconds between idle-client sweeps
    #[clap(
        long,
        default_value = settings::DEFAULT_SWEEP_INTERVAL_SECONDS,
        env("CASCADE_SWEEP_INTERVAL_SECONDS"),
        help = "Seconds between idle-client sweeps"
    )]
    pub sweep_interval_seconds: u64,

    // Seconds of inactivity before a client is evicted
    #[clap(
        long,
        default_value = settings::DEFAULT_IDLE_TIMEOUT_SECONDS,
        env("CASCADE_IDLE_TIMEOUT_SECONDS"),
        help = "Seconds of inactivity before a client's buckets are dropped"
    )]
    pub idle_timeout_seconds: u64,
}

impl LimiterArgs {
    pub fn into_settings(self) -> settings::Settings {
        settings::Settings {
            tiers: self.tiers,
            sweep_interval_seconds: self.sweep_interval_seconds,
            idle_timeout_seconds: self.idle_timeout_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct HostCli {
        #[command(flatten)]
        limiter: LimiterArgs,
    }

    #[test]
    fn defaults_parse() {
        let cli = HostCli::try_parse_from(["host"]).unwrap();
        let settings = cli.limiter.into_settings();
        assert_eq!(settings.tiers.len(), 2);
        assert_eq!(settings.sweep_interval_seconds, 3600);
        assert_eq!(settings.idle_timeout_seconds, 86400);
    }

    #[test]
    fn explicit_tiers_parse() {
        let cli = HostCli::try_parse_from([
            "host",
            "--tiers",
            "5:1,50:2,500:3",
            "--idle-timeout-seconds",
            "60",
        ])
        .unwrap();
        let settings = cli.limiter.into_settings();
        let capacities: Vec<u32> = settings.tiers.iter().map(|t| t.capacity).collect();
        assert_eq!(capacities, vec![5, 50, 500]);
        assert_eq!(settings.idle_timeout_seconds, 60);
    }

    #[test]
    fn invalid_tiers_are_rejected() {
        assert!(HostCli::try_parse_from(["host", "--tiers", "50:1,5:1"]).is_err());
        assert!(HostCli::try_parse_from(["host", "--tiers", "0:1"]).is_err());
        assert!(HostCli::try_parse_from(["host", "--tiers", "ten"]).is_err());
    }
}
