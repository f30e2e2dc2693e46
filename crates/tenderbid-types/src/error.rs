//! Error types for the tenderbid auction engine.
//!
//! All errors use the `AU_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Bid entry / validation errors (user-recoverable)
//! - 2xx: Tender lifecycle errors
//! - 3xx: Participation errors
//! - 4xx: Store errors
//! - 5xx: Notification errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{TenderId, TenderStatus, UserId};

/// Central error enum for all tenderbid operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuctionError {
    // =================================================================
    // Bid Errors (1xx)
    // =================================================================
    /// The entered text is not a usable amount.
    #[error("AU_ERR_100: Invalid amount: {input:?}")]
    InvalidAmount { input: String },

    /// The amount exceeds the allowed ceiling for the current price.
    #[error("AU_ERR_101: Bid {amount} exceeds ceiling {ceiling}")]
    BidTooHigh { amount: Decimal, ceiling: Decimal },

    /// The bidder already bid this amount in this tender.
    #[error("AU_ERR_102: Duplicate bid: {amount} was already submitted by this bidder")]
    DuplicateBid { amount: Decimal },

    /// Another bidder claimed this amount first.
    #[error("AU_ERR_103: Bid amount {amount} already taken")]
    BidAlreadyTaken { amount: Decimal },

    /// No bid entry is in progress in the required step.
    #[error("AU_ERR_104: No pending bid for user {0}")]
    NoPendingBid(UserId),

    // =================================================================
    // Lifecycle Errors (2xx)
    // =================================================================
    /// The tender is not in a state that allows this action.
    #[error("AU_ERR_200: Tender {tender_id} is not active (status: {status})")]
    TenderNotActive {
        tender_id: TenderId,
        status: TenderStatus,
    },

    /// The requested tender does not exist.
    #[error("AU_ERR_201: Tender not found: {0}")]
    TenderNotFound(TenderId),

    /// A status change that the lifecycle does not allow.
    #[error("AU_ERR_202: Invalid status transition {from} -> {to}")]
    InvalidStatusTransition {
        from: TenderStatus,
        to: TenderStatus,
    },

    // =================================================================
    // Participation Errors (3xx)
    // =================================================================
    /// The user is not a participant of the tender.
    #[error("AU_ERR_300: User {user_id} is not a participant of {tender_id}")]
    NotAParticipant {
        tender_id: TenderId,
        user_id: UserId,
    },

    /// The user already joined the tender.
    #[error("AU_ERR_301: User {user_id} already participates in {tender_id}")]
    AlreadyParticipating {
        tender_id: TenderId,
        user_id: UserId,
    },

    // =================================================================
    // Store Errors (4xx)
    // =================================================================
    /// The tender store timed out or failed.
    #[error("AU_ERR_400: Store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    // =================================================================
    // Notification Errors (5xx)
    // =================================================================
    /// The notification sink failed to deliver or delete a message.
    #[error("AU_ERR_500: Notification failed: {reason}")]
    NotificationFailed { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("AU_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Configuration error (bad environment value, missing field, etc.).
    #[error("AU_ERR_901: Configuration error: {0}")]
    Configuration(String),
}

impl AuctionError {
    /// Validation failures the user can fix by entering another amount.
    #[must_use]
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount { .. }
                | Self::BidTooHigh { .. }
                | Self::DuplicateBid { .. }
                | Self::BidAlreadyTaken { .. }
        )
    }

    /// Numeric code, e.g. `103` for [`AuctionError::BidAlreadyTaken`].
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidAmount { .. } => 100,
            Self::BidTooHigh { .. } => 101,
            Self::DuplicateBid { .. } => 102,
            Self::BidAlreadyTaken { .. } => 103,
            Self::NoPendingBid(_) => 104,
            Self::TenderNotActive { .. } => 200,
            Self::TenderNotFound(_) => 201,
            Self::InvalidStatusTransition { .. } => 202,
            Self::NotAParticipant { .. } => 300,
            Self::AlreadyParticipating { .. } => 301,
            Self::StoreUnavailable { .. } => 400,
            Self::NotificationFailed { .. } => 500,
            Self::Internal(_) => 900,
            Self::Configuration(_) => 901,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, AuctionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bid_too_high_display() {
        let err = AuctionError::BidTooHigh {
            amount: Decimal::new(1001, 0),
            ceiling: Decimal::new(1000, 0),
        };
        let msg = format!("{err}");
        assert!(msg.starts_with("AU_ERR_101"), "Got: {msg}");
        assert!(msg.contains("1001"));
        assert!(msg.contains("1000"));
    }

    #[test]
    fn tender_not_active_display() {
        let err = AuctionError::TenderNotActive {
            tender_id: TenderId::new(),
            status: TenderStatus::Completed,
        };
        let msg = format!("{err}");
        assert!(msg.contains("AU_ERR_200"));
        assert!(msg.contains("completed"));
    }

    #[test]
    fn display_code_matches_code() {
        let errors = vec![
            AuctionError::InvalidAmount { input: "abc".into() },
            AuctionError::DuplicateBid { amount: Decimal::ONE },
            AuctionError::BidAlreadyTaken { amount: Decimal::ONE },
            AuctionError::NoPendingBid(UserId::new()),
            AuctionError::TenderNotFound(TenderId::new()),
            AuctionError::NotAParticipant {
                tender_id: TenderId::new(),
                user_id: UserId::new(),
            },
            AuctionError::StoreUnavailable { reason: "timeout".into() },
            AuctionError::NotificationFailed { reason: "blocked".into() },
            AuctionError::Internal("x".into()),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with(&format!("AU_ERR_{}", err.code())),
                "Code mismatch: {msg}"
            );
        }
    }

    #[test]
    fn recoverable_classification() {
        assert!(AuctionError::InvalidAmount { input: String::new() }.is_user_recoverable());
        assert!(AuctionError::BidAlreadyTaken { amount: Decimal::ONE }.is_user_recoverable());
        assert!(!AuctionError::StoreUnavailable { reason: String::new() }.is_user_recoverable());
        assert!(
            !AuctionError::TenderNotActive {
                tender_id: TenderId::new(),
                status: TenderStatus::Cancelled,
            }
            .is_user_recoverable()
        );
    }
}
