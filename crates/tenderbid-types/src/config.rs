//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{AuctionError, Result, UserId, constants};

/// Runtime configuration of the auction engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay after the last accepted bid before the winner is declared.
    pub quiet_period: Duration,
    /// Bound applied to every tender-store call.
    pub store_timeout: Duration,
    /// Bound applied to every notification send.
    pub send_timeout: Duration,
    /// Pause between message deletions when disposing a session.
    pub delete_interval: Duration,
    /// Ledger entries kept after a confirmed bid.
    pub keep_after_confirm: usize,
    /// Receive closing reports with winner contacts.
    pub organizer_ids: Vec<UserId>,
    /// Receive closing reports with winner contacts.
    pub admin_ids: Vec<UserId>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_secs(constants::DEFAULT_QUIET_PERIOD_SECS),
            store_timeout: Duration::from_millis(constants::DEFAULT_STORE_TIMEOUT_MS),
            send_timeout: Duration::from_millis(constants::DEFAULT_SEND_TIMEOUT_MS),
            delete_interval: Duration::from_millis(constants::DEFAULT_DELETE_INTERVAL_MS),
            keep_after_confirm: constants::DEFAULT_KEEP_AFTER_CONFIRM,
            organizer_ids: Vec::new(),
            admin_ids: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load from process environment variables.
    ///
    /// | Variable             | Meaning                               |
    /// |----------------------|---------------------------------------|
    /// | `QUIET_PERIOD_SECS`  | quiet period in seconds               |
    /// | `STORE_TIMEOUT_MS`   | store call bound in milliseconds      |
    /// | `SEND_TIMEOUT_MS`    | notification send bound               |
    /// | `DELETE_INTERVAL_MS` | pause between deletions               |
    /// | `ORGANIZER_IDS`      | comma-separated organizer user ids    |
    /// | `ADMIN_IDS`          | comma-separated admin user ids        |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(secs) = parse_u64(&lookup, "QUIET_PERIOD_SECS")? {
            cfg.quiet_period = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_u64(&lookup, "STORE_TIMEOUT_MS")? {
            cfg.store_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, "SEND_TIMEOUT_MS")? {
            cfg.send_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, "DELETE_INTERVAL_MS")? {
            cfg.delete_interval = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("ORGANIZER_IDS") {
            cfg.organizer_ids = parse_id_list("ORGANIZER_IDS", &raw);
        }
        if let Some(raw) = lookup("ADMIN_IDS") {
            cfg.admin_ids = parse_id_list("ADMIN_IDS", &raw);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.quiet_period.is_zero() {
            return Err(AuctionError::Configuration(
                "quiet_period must be > 0".to_string(),
            ));
        }
        if self.store_timeout.is_zero() {
            return Err(AuctionError::Configuration(
                "store_timeout must be > 0".to_string(),
            ));
        }
        if self.send_timeout.is_zero() {
            return Err(AuctionError::Configuration(
                "send_timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Organizers followed by admins, without duplicates.
    #[must_use]
    pub fn report_recipients(&self) -> Vec<UserId> {
        let mut out: Vec<UserId> = Vec::with_capacity(self.organizer_ids.len() + self.admin_ids.len());
        for id in self.organizer_ids.iter().chain(&self.admin_ids) {
            if !out.contains(id) {
                out.push(*id);
            }
        }
        out
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| AuctionError::Configuration(format!("{key}={raw:?}: {e}"))),
    }
}

// Malformed entries are skipped, not fatal.
fn parse_id_list(key: &str, raw: &str) -> Vec<UserId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<UserId>() {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(key, entry = s, %err, "Skipping malformed user id");
                None
            }
        })
        .collect()
}
