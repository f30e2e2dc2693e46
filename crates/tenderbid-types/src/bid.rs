//! Accepted bids.
//!
//! Bids are append-only. Within one tender no two bids share an `amount`:
//! every price point can be claimed by exactly one supplier.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BidId, TenderId, UserId};

/// A bid accepted into a tender's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub tender_id: TenderId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub submitted_at: DateTime<Utc>,
}

impl Bid {
    #[must_use]
    pub fn new(tender_id: TenderId, user_id: UserId, amount: Decimal, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: BidId::new(),
            tender_id,
            user_id,
            amount,
            submitted_at,
        }
    }
}

impl std::fmt::Display for Bid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bid[{}] {} by {} @ {}",
            self.id,
            self.amount,
            self.user_id,
            self.submitted_at.format("%d.%m.%Y %H:%M"),
        )
    }
}
