//! # tenderbid-engine
//!
//! Reverse-auction engine for tenders: suppliers bid the price down, and
//! the lowest bid standing after a quiet period wins.
//!
//! ## Components
//!
//! - [`validator`]: pure bid checks (ceiling, own duplicates)
//! - [`BidSessions`]: per-user two-step bid entry
//! - [`AuctionTimerRegistry`]: one debounced timer per tender
//! - [`WinnerDeclarator`]: idempotent finalization on timer fire
//! - [`SessionLedger`]: per-user transient messages and their cleanup
//! - [`fan_out`]: best-effort notification broadcast
//! - [`AuctionEngine`]: the operations exposed to a front-end

pub mod bid_session;
mod deadline;
pub mod declarator;
pub mod engine;
pub mod fanout;
pub mod ledger;
pub mod timer;
pub mod validator;

pub use bid_session::{BidSession, BidSessions, BidStage};
pub use declarator::{Declaration, DeclareOutcome, WinnerDeclarator};
pub use engine::{AuctionEngine, BidPrompt, BidReceipt};
pub use fanout::{FanoutReport, fan_out};
pub use ledger::SessionLedger;
pub use timer::{AuctionTimerRegistry, QuietPeriodHandler, TimerSnapshot};
pub use validator::{bid_ceiling, validate_bid_amount};
