use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use rust_decimal::Decimal;

use crate::model::Ms;

const MINUTE: Ms = 60_000;
const HOUR: Ms = 60 * MINUTE;

/// Time and money rules applied by the booking engine.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Unpaid non-matchmaking bookings are deleted this long after creation.
    pub unpaid_grace_ms: Ms,
    /// An open matchmaking seat is cancelled this long before kickoff.
    pub matchmaking_cutoff_ms: Ms,
    /// Cancellation is refused once kickoff is this close.
    pub cancel_cutoff_ms: Ms,
    /// Slots starting within this window of now count as past.
    pub lookahead_ms: Ms,
    pub default_price: Decimal,
    /// Bound on waiting for a slot lock in client-facing operations.
    pub txn_timeout: Duration,
    /// Court-local time zone.
    pub utc_offset: FixedOffset,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            unpaid_grace_ms: 8 * MINUTE,
            matchmaking_cutoff_ms: 2 * HOUR,
            cancel_cutoff_ms: HOUR,
            lookahead_ms: 15 * MINUTE,
            default_price: Decimal::from(1000),
            txn_timeout: Duration::from_secs(5),
            utc_offset: Utc.fix(),
        }
    }
}

/// Process configuration, read from `COURTSLOT_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub prices_file: Option<PathBuf>,
    pub sweep_interval: Duration,
    pub cleanup_interval: Duration,
    pub compact_threshold: u64,
    pub policy: Policy,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// A periodic-task interval in seconds. Zero is not a valid period and falls back to the default.
fn interval_secs(raw: Option<u64>, default_secs: u64) -> Duration {
    Duration::from_secs(raw.filter(|s| *s > 0).unwrap_or(default_secs))
}

impl Config {
    pub fn from_env() -> Self {
        let mut policy = Policy::default();
        if let Some(offset) = env_parse::<i32>("COURTSLOT_UTC_OFFSET_MINUTES")
            .and_then(|m| FixedOffset::east_opt(m * 60))
        {
            policy.utc_offset = offset;
        }
        if let Some(ms) = env_parse::<u64>("COURTSLOT_TXN_TIMEOUT_MS") {
            policy.txn_timeout = Duration::from_millis(ms);
        }

        Self {
            bind: std::env::var("COURTSLOT_BIND").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("COURTSLOT_PORT").unwrap_or(8080),
            data_dir: std::env::var("COURTSLOT_DATA_DIR")
                .unwrap_or_else(|_| "./data".into())
                .into(),
            metrics_port: env_parse("COURTSLOT_METRICS_PORT"),
            prices_file: std::env::var("COURTSLOT_PRICES_FILE").ok().map(PathBuf::from),
            sweep_interval: interval_secs(env_parse("COURTSLOT_SWEEP_INTERVAL_SECS"), 30 * 60),
            cleanup_interval: interval_secs(env_parse("COURTSLOT_CLEANUP_INTERVAL_SECS"), 2 * 60),
            compact_threshold: env_parse("COURTSLOT_COMPACT_THRESHOLD").unwrap_or(1000),
            policy,
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.wal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_house_rules() {
        let p = Policy::default();
        assert_eq!(p.unpaid_grace_ms, 480_000);
        assert_eq!(p.matchmaking_cutoff_ms, 7_200_000);
        assert_eq!(p.cancel_cutoff_ms, 3_600_000);
        assert_eq!(p.lookahead_ms, 900_000);
        assert_eq!(p.default_price, Decimal::from(1000));
    }

    #[test]
    fn zero_interval_falls_back_to_default() {
        assert_eq!(interval_secs(Some(0), 120), Duration::from_secs(120));
        assert_eq!(interval_secs(None, 1800), Duration::from_secs(1800));
        assert_eq!(interval_secs(Some(5), 120), Duration::from_secs(5));
    }
}
