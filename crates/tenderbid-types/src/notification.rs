//! Typed notifications handed to the notification sink.
//!
//! The engine decides *what* to tell whom; rendering and transport belong
//! to the sink.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Bid, TenderId, UserProfile};

/// A message the engine asks the sink to deliver to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Another participant placed a bid.
    BidPlaced {
        tender_id: TenderId,
        title: String,
        /// Anonymised number of the bidder within the tender.
        bidder_number: u32,
        /// Number of the recipient within the tender.
        recipient_number: u32,
        amount: Decimal,
        current_price: Decimal,
    },
    /// The recipient won the tender.
    YouWon {
        tender_id: TenderId,
        title: String,
        amount: Decimal,
    },
    /// The tender closed and someone else won.
    TenderClosed {
        tender_id: TenderId,
        title: String,
        winner_name: String,
        amount: Decimal,
    },
    /// Closing report for organizers and admins with winner contacts.
    TenderClosedReport {
        tender_id: TenderId,
        title: String,
        winner: UserProfile,
        amount: Decimal,
        start_price: Decimal,
        bids: Vec<Bid>,
    },
    /// The user's pending bid entry was cancelled.
    BidCancelled,
}

impl Notification {
    /// Tender this notification concerns, if any.
    #[must_use]
    pub fn tender_id(&self) -> Option<TenderId> {
        match self {
            Self::BidPlaced { tender_id, .. }
            | Self::YouWon { tender_id, .. }
            | Self::TenderClosed { tender_id, .. }
            | Self::TenderClosedReport { tender_id, .. } => Some(*tender_id),
            Self::BidCancelled => None,
        }
    }

    /// Short stable label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BidPlaced { .. } => "bid_placed",
            Self::YouWon { .. } => "you_won",
            Self::TenderClosed { .. } => "tender_closed",
            Self::TenderClosedReport { .. } => "tender_closed_report",
            Self::BidCancelled => "bid_cancelled",
        }
    }
}
