//! # tenderbid-store
//!
//! Contracts for the collaborators the auction engine talks to, plus
//! in-memory reference implementations.
//!
//! - [`TenderStore`]: tenders, bids, participants, archive
//! - [`NotificationSink`]: outbound delivery and message deletion
//! - [`InMemoryTenderStore`]: reference store with a unique `(tender, amount)`
//!   constraint and status checks
//! - [`LogSink`]: sink that writes to the log
//! - `RecordingSink` (feature `test-helpers`): sink that records and can fail

pub mod memory;
pub mod sink;
pub mod store;

pub use memory::InMemoryTenderStore;
pub use sink::{LogSink, NotificationSink};
#[cfg(any(test, feature = "test-helpers"))]
pub use sink::RecordingSink;
pub use store::TenderStore;
