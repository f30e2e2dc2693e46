//! In-memory [`TenderStore`] reference implementation.
//!
//! Every operation runs in one short critical section over the whole
//! state, which gives `create_bid` the conditional-insert semantics the
//! contract requires: the uniqueness check, the status check and the
//! insert are observed atomically by concurrent callers.
//!
//! Latency, outages and failures of single operations can be injected to
//! exercise the engine's error handling.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tenderbid_types::{
    AuctionError, Bid, HistoryRecord, Result, Tender, TenderId, TenderStatus, UserId, UserProfile,
};

use crate::store::TenderStore;

#[derive(Debug, Clone, Copy)]
struct Membership {
    user_id: UserId,
    number: u32,
}

#[derive(Debug, Default)]
struct StoreState {
    tenders: HashMap<TenderId, Tender>,
    bids: HashMap<TenderId, Vec<Bid>>,
    participants: HashMap<TenderId, Vec<Membership>>,
    /// Next participant number per tender. Numbers are never reused.
    next_number: HashMap<TenderId, u32>,
    profiles: HashMap<UserId, UserProfile>,
    history: Vec<HistoryRecord>,
}

impl StoreState {
    fn tender(&self, tender_id: TenderId) -> Result<&Tender> {
        self.tenders
            .get(&tender_id)
            .ok_or(AuctionError::TenderNotFound(tender_id))
    }

    fn tender_mut(&mut self, tender_id: TenderId) -> Result<&mut Tender> {
        self.tenders
            .get_mut(&tender_id)
            .ok_or(AuctionError::TenderNotFound(tender_id))
    }

    fn sync_participant_count(&mut self, tender_id: TenderId) {
        let count = self.participants.get(&tender_id).map_or(0, Vec::len);
        if let Some(tender) = self.tenders.get_mut(&tender_id) {
            tender.participants_count = u32::try_from(count).unwrap_or(u32::MAX);
        }
    }
}

/// Tender store kept entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryTenderStore {
    state: Mutex<StoreState>,
    /// Artificial delay applied to every call, in milliseconds (0 = none).
    latency_ms: AtomicU64,
    unavailable: AtomicBool,
    /// Operations that fail with `StoreUnavailable` while listed.
    failing_ops: Mutex<HashSet<&'static str>>,
}

impl InMemoryTenderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn io(&self, op: &'static str) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(AuctionError::StoreUnavailable {
                reason: "connection refused".to_string(),
            });
        }
        if self.failing_ops().contains(op) {
            return Err(AuctionError::StoreUnavailable {
                reason: format!("{op} failed"),
            });
        }
        Ok(())
    }

    // =================================================================
    // Seeding / administration (outside the engine contract)
    // =================================================================

    /// Insert or replace a tender record.
    pub fn insert_tender(&self, tender: Tender) -> TenderId {
        let id = tender.id;
        let mut state = self.lock();
        state.tenders.insert(id, tender);
        state.sync_participant_count(id);
        id
    }

    pub fn insert_profile(&self, profile: UserProfile) {
        self.lock().profiles.insert(profile.user_id, profile);
    }

    /// Scheduler stand-in: activate every `active_pending` tender whose start
    /// time has passed. Returns the activated ids.
    pub fn activate_due(&self, now: DateTime<Utc>) -> Vec<TenderId> {
        let mut state = self.lock();
        let mut activated = Vec::new();
        for tender in state.tenders.values_mut() {
            if tender.status == TenderStatus::ActivePending
                && tender.start_at.is_none_or(|start| start <= now)
            {
                tender.status = TenderStatus::Active;
                activated.push(tender.id);
            }
        }
        if !activated.is_empty() {
            tracing::info!(count = activated.len(), "Activated due tenders");
        }
        activated
    }

    /// Archived records, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.lock().history.clone()
    }

    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::Relaxed);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Make every call of the named trait method fail, e.g.
    /// `"update_current_price"`, until [`restore_op`](Self::restore_op).
    pub fn fail_op(&self, op: &'static str) {
        self.failing_ops().insert(op);
    }

    pub fn restore_op(&self, op: &'static str) {
        self.failing_ops().remove(op);
    }

    fn failing_ops(&self) -> MutexGuard<'_, HashSet<&'static str>> {
        self.failing_ops.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TenderStore for InMemoryTenderStore {
    async fn get_tender(&self, tender_id: TenderId) -> Result<Tender> {
        self.io("get_tender").await?;
        self.lock().tender(tender_id).cloned()
    }

    async fn update_current_price(&self, tender_id: TenderId, amount: Decimal) -> Result<()> {
        self.io("update_current_price").await?;
        let mut state = self.lock();
        let tender = state.tender_mut(tender_id)?;
        if amount > tender.start_price || amount.is_sign_negative() {
            return Err(AuctionError::Internal(format!(
                "price {amount} outside [0, {}] for {tender_id}",
                tender.start_price
            )));
        }
        tender.current_price = amount;
        Ok(())
    }

    async fn create_bid(&self, bid: Bid) -> Result<()> {
        self.io("create_bid").await?;
        let mut state = self.lock();
        let status = state.tender(bid.tender_id)?.status;
        if !status.accepts_bids() {
            return Err(AuctionError::TenderNotActive {
                tender_id: bid.tender_id,
                status,
            });
        }
        let bids = state.bids.entry(bid.tender_id).or_default();
        if bids.iter().any(|b| b.amount == bid.amount) {
            return Err(AuctionError::BidAlreadyTaken { amount: bid.amount });
        }
        bids.push(bid);
        Ok(())
    }

    async fn bid_amount_exists(&self, tender_id: TenderId, amount: Decimal) -> Result<bool> {
        self.io("bid_amount_exists").await?;
        let state = self.lock();
        state.tender(tender_id)?;
        Ok(state
            .bids
            .get(&tender_id)
            .is_some_and(|bids| bids.iter().any(|b| b.amount == amount)))
    }

    async fn get_bids_for_user(&self, tender_id: TenderId, user_id: UserId) -> Result<Vec<Bid>> {
        self.io("get_bids_for_user").await?;
        let state = self.lock();
        state.tender(tender_id)?;
        Ok(state
            .bids
            .get(&tender_id)
            .map(|bids| bids.iter().filter(|b| b.user_id == user_id).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_bids(&self, tender_id: TenderId) -> Result<Vec<Bid>> {
        self.io("get_bids").await?;
        let state = self.lock();
        state.tender(tender_id)?;
        Ok(state.bids.get(&tender_id).cloned().unwrap_or_default())
    }

    async fn get_participants(&self, tender_id: TenderId) -> Result<Vec<UserId>> {
        self.io("get_participants").await?;
        let state = self.lock();
        state.tender(tender_id)?;
        Ok(state
            .participants
            .get(&tender_id)
            .map(|members| members.iter().map(|m| m.user_id).collect())
            .unwrap_or_default())
    }

    async fn is_participant(&self, tender_id: TenderId, user_id: UserId) -> Result<bool> {
        self.io("is_participant").await?;
        let state = self.lock();
        state.tender(tender_id)?;
        Ok(state
            .participants
            .get(&tender_id)
            .is_some_and(|members| members.iter().any(|m| m.user_id == user_id)))
    }

    async fn add_participant(&self, tender_id: TenderId, user_id: UserId) -> Result<u32> {
        self.io("add_participant").await?;
        let mut state = self.lock();
        state.tender(tender_id)?;
        let members = state.participants.entry(tender_id).or_default();
        if members.iter().any(|m| m.user_id == user_id) {
            return Err(AuctionError::AlreadyParticipating { tender_id, user_id });
        }
        let next = state.next_number.entry(tender_id).or_insert(1);
        let number = *next;
        *next += 1;
        state
            .participants
            .entry(tender_id)
            .or_default()
            .push(Membership { user_id, number });
        state.sync_participant_count(tender_id);
        Ok(number)
    }

    async fn remove_participant(&self, tender_id: TenderId, user_id: UserId) -> Result<()> {
        self.io("remove_participant").await?;
        let mut state = self.lock();
        state.tender(tender_id)?;
        let members = state.participants.entry(tender_id).or_default();
        let before = members.len();
        members.retain(|m| m.user_id != user_id);
        if members.len() == before {
            return Err(AuctionError::NotAParticipant { tender_id, user_id });
        }
        state.sync_participant_count(tender_id);
        Ok(())
    }

    async fn remove_participants(&self, tender_id: TenderId) -> Result<usize> {
        self.io("remove_participants").await?;
        let mut state = self.lock();
        state.tender(tender_id)?;
        let removed = state.participants.remove(&tender_id).map_or(0, |m| m.len());
        state.sync_participant_count(tender_id);
        Ok(removed)
    }

    async fn participant_number(&self, tender_id: TenderId, user_id: UserId) -> Result<Option<u32>> {
        self.io("participant_number").await?;
        let state = self.lock();
        state.tender(tender_id)?;
        Ok(state.participants.get(&tender_id).and_then(|members| {
            members
                .iter()
                .find(|m| m.user_id == user_id)
                .map(|m| m.number)
        }))
    }

    async fn set_status(&self, tender_id: TenderId, status: TenderStatus) -> Result<()> {
        self.io("set_status").await?;
        let mut state = self.lock();
        let tender = state.tender_mut(tender_id)?;
        if !tender.status.can_transition_to(status) {
            return Err(AuctionError::InvalidStatusTransition {
                from: tender.status,
                to: status,
            });
        }
        tracing::debug!(tender = %tender_id, from = %tender.status, to = %status, "Status changed");
        tender.status = status;
        Ok(())
    }

    async fn archive_history(&self, record: HistoryRecord) -> Result<()> {
        self.io("archive_history").await?;
        self.lock().history.push(record);
        Ok(())
    }

    async fn get_user_profile(&self, user_id: UserId) -> Result<Option<UserProfile>> {
        self.io("get_user_profile").await?;
        Ok(self.lock().profiles.get(&user_id).cloned())
    }
}
