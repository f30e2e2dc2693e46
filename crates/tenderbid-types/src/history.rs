//! Supplier contact cards and the archived outcome of completed tenders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Bid, TenderId, UserId};

/// Contact details of a registered supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub organization_name: String,
    pub contact_name: String,
    pub phone_number: String,
    /// Taxpayer identification number.
    pub tax_id: String,
}

impl UserProfile {
    /// Placeholder used when the store has no profile for a winner.
    #[must_use]
    pub fn unknown(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    /// Human-facing name: the organization, falling back to the user id.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.organization_name.is_empty() {
            self.user_id.to_string()
        } else {
            self.organization_name.clone()
        }
    }
}

/// Archived result of a tender, written once when the winner is declared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub tender_id: TenderId,
    pub title: String,
    pub winner: UserProfile,
    pub winning_amount: Decimal,
    pub start_price: Decimal,
    /// Every accepted bid, in submission order.
    pub bids: Vec<Bid>,
    /// SHA-256 commitment over `bids`.
    pub bid_root: [u8; 32],
    pub completed_at: DateTime<Utc>,
}

impl HistoryRecord {
    #[must_use]
    pub fn new(
        tender_id: TenderId,
        title: impl Into<String>,
        winner: UserProfile,
        winning_amount: Decimal,
        start_price: Decimal,
        bids: Vec<Bid>,
    ) -> Self {
        let bid_root = Self::compute_bid_root(tender_id, &bids);
        Self {
            tender_id,
            title: title.into(),
            winner,
            winning_amount,
            start_price,
            bids,
            bid_root,
            completed_at: Utc::now(),
        }
    }

    /// `SHA-256(domain_sep || tender_id || num_bids || for each bid: id || user || amount || ts)`
    fn compute_bid_root(tender_id: TenderId, bids: &[Bid]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"tenderbid:history:v1:");
        hasher.update(tender_id.0.as_bytes());
        hasher.update((bids.len() as u64).to_le_bytes());
        for bid in bids {
            hasher.update(bid.id.0.as_bytes());
            hasher.update(bid.user_id.0.as_bytes());
            hasher.update(bid.amount.normalize().to_string().as_bytes());
            hasher.update(bid.submitted_at.timestamp_micros().to_le_bytes());
        }
        hasher.finalize().into()
    }

    /// Recompute the commitment and compare it with the stored one.
    #[must_use]
    pub fn verify(&self) -> bool {
        Self::compute_bid_root(self.tender_id, &self.bids) == self.bid_root
    }

    #[must_use]
    pub fn bid_root_hex(&self) -> String {
        hex::encode(self.bid_root)
    }

    /// How far the auction drove the price down from the start.
    #[must_use]
    pub fn savings(&self) -> Decimal {
        self.start_price - self.winning_amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> HistoryRecord {
        let tender_id = TenderId::new();
        let winner = UserId::new();
        let bids = vec![
            Bid::new(tender_id, UserId::new(), Decimal::new(900, 0), Utc::now()),
            Bid::new(tender_id, winner, Decimal::new(8, 0), Utc::now()),
        ];
        HistoryRecord::new(
            tender_id,
            "Office paper",
            UserProfile::unknown(winner),
            Decimal::new(8, 0),
            Decimal::new(100_000, 0),
            bids,
        )
    }

    #[test]
    fn bid_root_verifies() {
        let record = make_record();
        assert!(record.verify());
        assert_eq!(record.bid_root_hex().len(), 64);
    }

    #[test]
    fn tampered_bid_list_fails_verification() {
        let mut record = make_record();
        record.bids[0].amount = Decimal::new(7, 0);
        assert!(!record.verify());
    }

    #[test]
    fn savings_is_start_minus_winning() {
        let record = make_record();
        assert_eq!(record.savings(), Decimal::new(99_992, 0));
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let user = UserId::new();
        assert_eq!(UserProfile::unknown(user).display_name(), user.to_string());
        let named = UserProfile {
            organization_name: "Paper Co".into(),
            ..UserProfile::unknown(user)
        };
        assert_eq!(named.display_name(), "Paper Co");
    }
}
