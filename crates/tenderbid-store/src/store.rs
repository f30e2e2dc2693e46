//! The tender-store contract consumed by the auction engine.
//!
//! Storage itself is external. Implementations must enforce two things at
//! the storage layer, independent of the engine's own checks:
//!
//! - `create_bid` is a conditional insert: it fails with
//!   [`AuctionError::BidAlreadyTaken`] if the amount already exists in the
//!   tender (a unique constraint on `(tender_id, amount)`), and with
//!   [`AuctionError::TenderNotActive`] if the tender stopped accepting bids.
//! - `set_status` only applies transitions allowed by
//!   [`TenderStatus::can_transition_to`], failing with
//!   [`AuctionError::InvalidStatusTransition`] otherwise.
//!
//! [`AuctionError::BidAlreadyTaken`]: tenderbid_types::AuctionError::BidAlreadyTaken
//! [`AuctionError::TenderNotActive`]: tenderbid_types::AuctionError::TenderNotActive
//! [`AuctionError::InvalidStatusTransition`]: tenderbid_types::AuctionError::InvalidStatusTransition

use async_trait::async_trait;
use rust_decimal::Decimal;
use tenderbid_types::{Bid, HistoryRecord, Result, Tender, TenderId, TenderStatus, UserId, UserProfile};

/// Query interface over tenders, bids, participants and the archive.
#[async_trait]
pub trait TenderStore: Send + Sync {
    async fn get_tender(&self, tender_id: TenderId) -> Result<Tender>;

    /// Set `current_price` unconditionally.
    async fn update_current_price(&self, tender_id: TenderId, amount: Decimal) -> Result<()>;

    /// Conditional insert; see module docs.
    async fn create_bid(&self, bid: Bid) -> Result<()>;

    async fn bid_amount_exists(&self, tender_id: TenderId, amount: Decimal) -> Result<bool>;

    /// The user's bids in submission order.
    async fn get_bids_for_user(&self, tender_id: TenderId, user_id: UserId) -> Result<Vec<Bid>>;

    /// Every bid of the tender in submission order.
    async fn get_bids(&self, tender_id: TenderId) -> Result<Vec<Bid>>;

    /// Participants in join order.
    async fn get_participants(&self, tender_id: TenderId) -> Result<Vec<UserId>>;

    async fn is_participant(&self, tender_id: TenderId, user_id: UserId) -> Result<bool>;

    /// Add a membership and return the participant number.
    async fn add_participant(&self, tender_id: TenderId, user_id: UserId) -> Result<u32>;

    async fn remove_participant(&self, tender_id: TenderId, user_id: UserId) -> Result<()>;

    /// Drop every membership of the tender; returns how many were removed.
    async fn remove_participants(&self, tender_id: TenderId) -> Result<usize>;

    /// 1-based number assigned at join time, if the user participates.
    async fn participant_number(&self, tender_id: TenderId, user_id: UserId) -> Result<Option<u32>>;

    async fn set_status(&self, tender_id: TenderId, status: TenderStatus) -> Result<()>;

    async fn archive_history(&self, record: HistoryRecord) -> Result<()>;

    async fn get_user_profile(&self, user_id: UserId) -> Result<Option<UserProfile>>;
}
