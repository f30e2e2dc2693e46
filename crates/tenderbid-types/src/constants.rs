//! System-wide constants for the tenderbid engine.

/// Quiet period after the last accepted bid before the winner is declared.
pub const DEFAULT_QUIET_PERIOD_SECS: u64 = 300;

/// Upper bound on any single tender-store call.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Upper bound on delivering one notification.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 10_000;

/// Pause between consecutive message deletions (transport rate limit).
pub const DEFAULT_DELETE_INTERVAL_MS: u64 = 100;

/// Messages kept in a bidder's session ledger after a confirmed bid.
pub const DEFAULT_KEEP_AFTER_CONFIRM: usize = 2;

/// Bid ceiling as a fraction of the current price: 1 / 100.
pub const BID_CEILING_NUMERATOR: i64 = 1;
pub const BID_CEILING_SCALE: u32 = 2;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "tenderbid";
