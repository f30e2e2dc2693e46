//! # tenderbid-types
//!
//! Shared types, errors, and configuration for the **tenderbid**
//! reverse-auction engine.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`TenderId`], [`UserId`], [`BidId`], [`MessageId`]
//! - **Tender model**: [`Tender`], [`TenderStatus`] (lifecycle state machine)
//! - **Bid model**: [`Bid`]
//! - **Archive**: [`HistoryRecord`], [`UserProfile`]
//! - **Notifications**: [`Notification`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`AuctionError`] with `AU_ERR_` prefix codes
//! - **Constants**: defaults and limits

pub mod bid;
pub mod config;
pub mod constants;
pub mod error;
pub mod history;
pub mod ids;
pub mod notification;
pub mod tender;

pub use bid::*;
pub use config::*;
pub use error::*;
pub use history::*;
pub use ids::*;
pub use notification::*;
pub use tender::*;

// Constants are accessed via `tenderbid_types::constants::FOO`.
