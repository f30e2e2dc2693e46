//! Tender model and lifecycle state machine.
//!
//! ```text
//!   pending_approval ──▶ active_pending ──▶ active ──▶ completed
//!          │                   │              │
//!          └───────────────────┴──────────────┴──▶ cancelled
//! ```
//!
//! Transitions are monotonic. `completed` and `cancelled` are terminal.
//! `active_pending → active` is driven by an external scheduler; the engine
//! only checks that a tender is `active` before touching bids.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::TenderId;

/// Category tag (e.g. an OKPD-style classification code).
pub type Classification = String;

/// Lifecycle status of a tender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenderStatus {
    /// Created by an organizer, awaiting moderation.
    PendingApproval,
    /// Approved, start time in the future.
    ActivePending,
    /// Bidding open.
    Active,
    /// Winner declared.
    Completed,
    /// Removed before completion.
    Cancelled,
}

impl TenderStatus {
    /// Can a tender in this status move to `target`?
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::PendingApproval, Self::ActivePending | Self::Cancelled)
                | (Self::ActivePending, Self::Active | Self::Cancelled)
                | (Self::Active, Self::Completed | Self::Cancelled)
        )
    }

    /// `completed` and `cancelled` accept nothing further.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Only `active` tenders accept bids.
    #[must_use]
    pub fn accepts_bids(self) -> bool {
        self == Self::Active
    }
}

impl std::fmt::Display for TenderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingApproval => write!(f, "pending_approval"),
            Self::ActivePending => write!(f, "active_pending"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A tender record as held by the tender store.
///
/// The engine reads a fresh copy for every operation and never caches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tender {
    pub id: TenderId,
    pub title: String,
    pub description: String,
    /// Price the auction opened at.
    pub start_price: Decimal,
    /// Price of the last accepted bid, or `start_price` before any bid.
    pub current_price: Decimal,
    pub status: TenderStatus,
    pub start_at: Option<DateTime<Utc>>,
    pub classification: Classification,
    pub participants_count: u32,
}

impl Tender {
    /// Build a tender awaiting approval, priced at `start_price`.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        start_price: Decimal,
        start_at: Option<DateTime<Utc>>,
        classification: impl Into<Classification>,
    ) -> Self {
        Self {
            id: TenderId::new(),
            title: title.into(),
            description: description.into(),
            start_price,
            current_price: start_price,
            status: TenderStatus::PendingApproval,
            start_at,
            classification: classification.into(),
            participants_count: 0,
        }
    }

    /// Active and, if a start time is set, already started.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status.accepts_bids() && self.start_at.is_none_or(|start| now >= start)
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Tender {
    pub fn dummy_active(start_price: Decimal) -> Self {
        let mut tender = Self::new("Office paper", "A4, 500 sheets", start_price, None, "17.12");
        tender.status = TenderStatus::Active;
        tender
    }
}
