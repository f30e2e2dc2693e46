//! Per-user bid-entry state.
//!
//! A session only remembers *which* tender the user is bidding in and how
//! far the entry got. Prices and bid history are always re-read from the
//! store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use tenderbid_types::{AuctionError, Result, TenderId, UserId};

/// Step of the two-step bid entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidStage {
    /// Waiting for the user to type an amount.
    EnteringPrice,
    /// Amount validated, waiting for confirmation.
    ConfirmingPrice { amount: Decimal },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidSession {
    pub tender_id: TenderId,
    pub stage: BidStage,
}

/// All in-progress bid entries, one per user.
#[derive(Debug, Default)]
pub struct BidSessions {
    inner: Mutex<HashMap<UserId, BidSession>>,
}

impl BidSessions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, BidSession>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start entering a price for `tender_id`, replacing any previous entry.
    pub fn begin(&self, user: UserId, tender_id: TenderId) -> Option<BidSession> {
        self.lock().insert(
            user,
            BidSession {
                tender_id,
                stage: BidStage::EnteringPrice,
            },
        )
    }

    #[must_use]
    pub fn get(&self, user: UserId) -> Option<BidSession> {
        self.lock().get(&user).copied()
    }

    /// Tender the user is entering a price for.
    ///
    /// # Errors
    /// `NoPendingBid` unless the user is in `EnteringPrice`.
    pub fn entering(&self, user: UserId) -> Result<TenderId> {
        match self.get(user) {
            Some(BidSession {
                tender_id,
                stage: BidStage::EnteringPrice,
            }) => Ok(tender_id),
            _ => Err(AuctionError::NoPendingBid(user)),
        }
    }

    /// Move `EnteringPrice` → `ConfirmingPrice` for the same tender.
    ///
    /// # Errors
    /// `NoPendingBid` if the entry was cancelled or replaced meanwhile.
    pub fn await_confirmation(&self, user: UserId, tender_id: TenderId, amount: Decimal) -> Result<()> {
        let mut sessions = self.lock();
        match sessions.get_mut(&user) {
            Some(session) if session.tender_id == tender_id && session.stage == BidStage::EnteringPrice => {
                session.stage = BidStage::ConfirmingPrice { amount };
                Ok(())
            }
            _ => Err(AuctionError::NoPendingBid(user)),
        }
    }

    /// Remove a `ConfirmingPrice` entry and hand back what to persist.
    ///
    /// Taking the entry is the claim: a second confirm by the same user
    /// finds nothing.
    ///
    /// # Errors
    /// `NoPendingBid` unless the user is in `ConfirmingPrice`.
    pub fn take_confirmation(&self, user: UserId) -> Result<(TenderId, Decimal)> {
        let mut sessions = self.lock();
        match sessions.get(&user) {
            Some(&BidSession {
                tender_id,
                stage: BidStage::ConfirmingPrice { amount },
            }) => {
                sessions.remove(&user);
                Ok((tender_id, amount))
            }
            _ => Err(AuctionError::NoPendingBid(user)),
        }
    }

    /// Drop the user's entry, whatever its stage.
    pub fn clear(&self, user: UserId) -> Option<BidSession> {
        self.lock().remove(&user)
    }

    /// Drop the user's entry if it belongs to `tender_id`.
    pub fn clear_for_tender(&self, user: UserId, tender_id: TenderId) -> bool {
        let mut sessions = self.lock();
        if sessions.get(&user).is_some_and(|s| s.tender_id == tender_id) {
            sessions.remove(&user);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
