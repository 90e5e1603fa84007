//! Config for league orchestration behaviors.
//!
//! Configuration can be created programmatically using [`LeagueConfig::new()`]
//! or by reading environment variables using [`LeagueConfig::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Durations are given in milliseconds.
//!
//! - `LEAGUE_LOG` — Enable logging to a file (default: `false`)
//! - `LEAGUE_JOIN_ACK_TIMEOUT_MS` — Per-player join-ack timeout (default: `1000`)
//! - `LEAGUE_PARITY_CHOICE_TIMEOUT_MS` — Per-player choice timeout (default: `1000`)
//! - `LEAGUE_REGISTER_TIMEOUT_MS` — Registration handshake timeout (default: `2000`)
//! - `LEAGUE_HTTP_REQUEST_TIMEOUT_MS` — Generic request timeout (default: `2000`)
//! - `LEAGUE_AGENT_STARTUP_TIMEOUT_MS` — Agent startup timeout (default: `5000`)
//! - `LEAGUE_MATCH_DEADLINE_MS` — Watchdog deadline for a whole match slot (default: `10000`)
//! - `LEAGUE_SHUTDOWN_GRACE_MS` — Grace period for shutdown acks (default: `1000`)
//! - `LEAGUE_REPORT_RETRY_LIMIT` — Result-report attempts before giving up (default: `3`)

use std::collections::HashMap;
use std::time::Duration;

use crate::protocol::TimeoutKey;

/// Configuration for league orchestration behaviors.
#[derive(Debug, Clone)]
pub struct LeagueConfig {
    pub(crate) log: bool,
    pub(crate) timeouts: HashMap<TimeoutKey, Duration>,
    pub(crate) report_retry_limit: u32,
    pub(crate) match_deadline: Duration,
    pub(crate) shutdown_grace: Duration,
    pub(crate) draw_range: (u32, u32),
}

impl LeagueConfig {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Logging to file is disabled.
    /// - Join acks and parity choices time out after one second.
    /// - Registration and generic requests time out after two seconds.
    /// - A match slot with no record after ten seconds is written off.
    /// - Result reports are retried up to three attempts.
    /// - Drawn values fall in `1..=100`.
    pub fn new() -> Self {
        let timeouts = HashMap::from([
            (TimeoutKey::GameJoinAck, Duration::from_millis(1000)),
            (TimeoutKey::ParityChoice, Duration::from_millis(1000)),
            (TimeoutKey::LeagueRegister, Duration::from_millis(2000)),
            (TimeoutKey::HttpRequest, Duration::from_millis(2000)),
            (TimeoutKey::AgentStartup, Duration::from_millis(5000)),
        ]);
        Self {
            log: false,
            timeouts,
            report_retry_limit: 3,
            match_deadline: Duration::from_millis(10_000),
            shutdown_grace: Duration::from_millis(1000),
            draw_range: (1, 100),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// See the module documentation for the recognized variables. Any other
    /// value (including unset) results in the default for that field.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }
        fn get_env_ms(var: &str, default: Duration) -> Duration {
            std::env::var(var)
                .ok()
                .and_then(|val| val.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        }
        fn get_env_u32(var: &str, default: u32) -> u32 {
            std::env::var(var)
                .ok()
                .and_then(|val| val.parse().ok())
                .unwrap_or(default)
        }

        let base = Self::new();
        let mut config = base.clone();
        config.log = get_env_flag("LEAGUE_LOG", false);
        config.report_retry_limit = get_env_u32("LEAGUE_REPORT_RETRY_LIMIT", base.report_retry_limit);
        config.match_deadline = get_env_ms("LEAGUE_MATCH_DEADLINE_MS", base.match_deadline);
        config.shutdown_grace = get_env_ms("LEAGUE_SHUTDOWN_GRACE_MS", base.shutdown_grace);
        for (key, var) in [
            (TimeoutKey::GameJoinAck, "LEAGUE_JOIN_ACK_TIMEOUT_MS"),
            (TimeoutKey::ParityChoice, "LEAGUE_PARITY_CHOICE_TIMEOUT_MS"),
            (TimeoutKey::LeagueRegister, "LEAGUE_REGISTER_TIMEOUT_MS"),
            (TimeoutKey::HttpRequest, "LEAGUE_HTTP_REQUEST_TIMEOUT_MS"),
            (TimeoutKey::AgentStartup, "LEAGUE_AGENT_STARTUP_TIMEOUT_MS"),
        ] {
            let default = base.timeouts[&key];
            config.timeouts.insert(key, get_env_ms(var, default));
        }
        config
    }

    /// Duration configured for a timeout class.
    pub fn timeout(&self, key: TimeoutKey) -> Duration {
        // every key is seeded in new(), the lookup cannot miss
        self.timeouts[&key]
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Override the duration of one timeout class.
    pub fn with_timeout(mut self, key: TimeoutKey, duration: Duration) -> Self {
        self.timeouts.insert(key, duration);
        self
    }

    /// Set how many times a result report is attempted before the match is
    /// written off.
    pub fn with_report_retry_limit(mut self, attempts: u32) -> Self {
        self.report_retry_limit = attempts.max(1);
        self
    }

    /// Set the watchdog deadline after which an unreported match slot is
    /// recorded as errored.
    pub fn with_match_deadline(mut self, deadline: Duration) -> Self {
        self.match_deadline = deadline;
        self
    }

    /// Set the grace period granted to agents when shutting down.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the inclusive range drawn values are taken from.
    pub fn with_draw_range(mut self, min: u32, max: u32) -> Self {
        assert!(min <= max, "empty draw range");
        self.draw_range = (min, max);
        self
    }
}

impl Default for LeagueConfig {
    fn default() -> Self {
        Self::new()
    }
}
