//! The auction engine: the operations a front-end calls.
//!
//! Shared structures (bid sessions, ledger, timers) each own a narrow lock.
//! No lock is held across store I/O, and every store call is bounded by
//! `store_timeout`.
//!
//! Bid flow per user:
//! ```text
//! begin_bid ──> EnteringPrice ──submit_bid_amount──> ConfirmingPrice ──confirm_bid──> (none)
//!                     ^                │ invalid: stays           │
//!                     └── cancel_bid / begin_bid ───────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tenderbid_store::{NotificationSink, TenderStore};
use tenderbid_types::{
    AuctionError, Bid, EngineConfig, Notification, Result, Tender, TenderId, UserId, constants,
};
use tokio::task::JoinHandle;

use crate::bid_session::BidSessions;
use crate::deadline::bounded;
use crate::declarator::WinnerDeclarator;
use crate::fanout::{FanoutReport, fan_out, send_bounded};
use crate::ledger::SessionLedger;
use crate::timer::{AuctionTimerRegistry, TimerSnapshot};
use crate::validator::{bid_ceiling, validate_bid_amount};

/// What a bidder sees when opening bid entry.
#[derive(Debug, Clone)]
pub struct BidPrompt {
    pub tender_id: TenderId,
    pub title: String,
    pub start_price: Decimal,
    pub current_price: Decimal,
    /// Highest amount accepted right now.
    pub ceiling: Decimal,
    pub previous_bids: Vec<Bid>,
}

/// Synchronous answer to a confirmed bid.
#[derive(Debug)]
pub struct BidReceipt {
    pub bid: Bid,
    pub current_price: Decimal,
    /// All of the bidder's bids in this tender, including this one.
    pub own_bids: Vec<Bid>,
    /// Delivery of the "new bid" notice to the other participants, still
    /// running when the receipt is returned.
    pub notified: JoinHandle<FanoutReport>,
}

pub struct AuctionEngine {
    config: Arc<EngineConfig>,
    store: Arc<dyn TenderStore>,
    sink: Arc<dyn NotificationSink>,
    sessions: BidSessions,
    ledger: Arc<SessionLedger>,
    declarator: Arc<WinnerDeclarator>,
    timers: AuctionTimerRegistry,
}

impl AuctionEngine {
    /// Wire the engine. Operations must run inside a tokio runtime.
    ///
    /// # Errors
    /// `Configuration` if `config` does not validate.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn TenderStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let ledger = Arc::new(SessionLedger::new(Arc::clone(&sink), config.delete_interval));
        let declarator = Arc::new(WinnerDeclarator::new(
            Arc::clone(&store),
            Arc::clone(&sink),
            Arc::clone(&ledger),
            Arc::clone(&config),
        ));
        let timers = AuctionTimerRegistry::new(config.quiet_period, declarator.clone());

        tracing::info!(
            engine = constants::ENGINE_NAME,
            version = constants::VERSION,
            quiet_period_secs = config.quiet_period.as_secs(),
            store_timeout_ms = u64::try_from(config.store_timeout.as_millis()).unwrap_or(u64::MAX),
            report_recipients = config.report_recipients().len(),
            "Auction engine ready"
        );

        Ok(Self {
            config,
            store,
            sink,
            sessions: BidSessions::new(),
            ledger,
            declarator,
            timers,
        })
    }

    // =================================================================
    // Bid entry
    // =================================================================

    /// Open bid entry for `tender_id`, replacing any entry in progress, and
    /// start a fresh message session for the user.
    ///
    /// # Errors
    /// `TenderNotFound`, `NotAParticipant`, `TenderNotActive`,
    /// `StoreUnavailable`.
    pub async fn begin_bid(&self, user: UserId, tender_id: TenderId) -> Result<BidPrompt> {
        let tender = self.tender(tender_id).await?;
        if !bounded(self.limit(), "is_participant", self.store.is_participant(tender_id, user)).await? {
            return Err(AuctionError::NotAParticipant { tender_id, user_id: user });
        }
        ensure_active(&tender)?;
        let previous_bids = self.own_bids(tender_id, user).await?;

        self.sessions.begin(user, tender_id);
        self.ledger.rotate_session(user);
        tracing::debug!(%user, tender = %tender_id, "Bid entry started");

        Ok(BidPrompt {
            tender_id,
            title: tender.title,
            start_price: tender.start_price,
            ceiling: bid_ceiling(tender.current_price),
            current_price: tender.current_price,
            previous_bids,
        })
    }

    /// Validate typed input and move to confirmation. Returns the amount to
    /// confirm. On a validation error the entry stays in `EnteringPrice`.
    ///
    /// # Errors
    /// `NoPendingBid`, `InvalidAmount`, `BidTooHigh`, `DuplicateBid`,
    /// `TenderNotActive` (entry dropped), `StoreUnavailable`.
    pub async fn submit_bid_amount(&self, user: UserId, text: &str) -> Result<Decimal> {
        let tender_id = self.sessions.entering(user)?;
        let tender = self.tender(tender_id).await?;
        if let Err(err) = ensure_active(&tender) {
            self.sessions.clear_for_tender(user, tender_id);
            return Err(err);
        }
        let own = self.own_bids(tender_id, user).await?;

        let amount = validate_bid_amount(text, tender.current_price, &own).inspect_err(|err| {
            tracing::debug!(%user, tender = %tender_id, %err, "Bid amount rejected");
        })?;
        self.sessions.await_confirmation(user, tender_id, amount)?;
        Ok(amount)
    }

    /// Persist the pending bid, restart the tender's timer and tell the
    /// other participants in the background.
    ///
    /// Once the bid is stored it stands: a failed price update is logged
    /// and the timer is armed anyway.
    ///
    /// The entry is consumed whatever the outcome; after an error the user
    /// starts again with [`begin_bid`](Self::begin_bid).
    ///
    /// # Errors
    /// `NoPendingBid`, `BidAlreadyTaken`, `BidTooHigh` (price moved since
    /// entry), `TenderNotActive`, `StoreUnavailable`.
    pub async fn confirm_bid(&self, user: UserId) -> Result<BidReceipt> {
        let (tender_id, amount) = self.sessions.take_confirmation(user)?;
        let limit = self.limit();

        let tender = self.tender(tender_id).await?;
        ensure_active(&tender)?;
        if bounded(limit, "bid_amount_exists", self.store.bid_amount_exists(tender_id, amount)).await? {
            tracing::info!(%user, tender = %tender_id, %amount, "Bid amount already taken");
            return Err(AuctionError::BidAlreadyTaken { amount });
        }
        let ceiling = bid_ceiling(tender.current_price);
        if amount > ceiling {
            return Err(AuctionError::BidTooHigh { amount, ceiling });
        }

        let bid = Bid::new(tender_id, user, amount, Utc::now());
        bounded(limit, "create_bid", self.store.create_bid(bid.clone()))
            .await
            .inspect_err(|err| {
                tracing::info!(%user, tender = %tender_id, %amount, %err, "Bid insert refused");
            })?;
        if let Err(err) = bounded(
            limit,
            "update_current_price",
            self.store.update_current_price(tender_id, amount),
        )
        .await
        {
            tracing::error!(%user, tender = %tender_id, %amount, %err, "Bid stored but current price not updated");
        }
        tracing::info!(%user, tender = %tender_id, %amount, "Bid accepted");

        self.timers.arm(TimerSnapshot {
            tender_id,
            last_bid_user: user,
            last_bid_amount: amount,
            tender_title: tender.title.clone(),
            start_price: tender.start_price,
        });

        let notices = BidNotices {
            store: Arc::clone(&self.store),
            sink: Arc::clone(&self.sink),
            ledger: Arc::clone(&self.ledger),
            config: Arc::clone(&self.config),
        };
        let placed = bid.clone();
        let notified = tokio::spawn(async move { notices.deliver(&tender, &placed).await });

        let own_bids = match self.own_bids(tender_id, user).await {
            Ok(bids) => bids,
            Err(err) => {
                tracing::warn!(%user, tender = %tender_id, %err, "Could not reload own bids for receipt");
                vec![bid.clone()]
            }
        };
        self.ledger.cleanup_old_messages(user, self.config.keep_after_confirm);

        Ok(BidReceipt {
            bid,
            current_price: amount,
            own_bids,
            notified,
        })
    }

    /// Abandon bid entry and delete the session's messages. Returns whether
    /// an entry was in progress.
    pub async fn cancel_bid(&self, user: UserId) -> bool {
        let had_entry = self.sessions.clear(user).is_some();
        self.ledger.cleanup_session_messages(user);
        if had_entry {
            match send_bounded(self.sink.as_ref(), user, Notification::BidCancelled, self.config.send_timeout).await {
                Ok(message_id) => self.ledger.add_message(user, message_id),
                Err(err) => tracing::warn!(%user, %err, "Cancel notice not delivered"),
            }
            tracing::debug!(%user, "Bid entry cancelled");
        }
        had_entry
    }

    // =================================================================
    // Participation
    // =================================================================

    /// Join a tender that has not finished. Returns the participant number.
    ///
    /// # Errors
    /// `TenderNotFound`, `TenderNotActive` (terminal tender),
    /// `AlreadyParticipating`, `StoreUnavailable`.
    pub async fn join_tender(&self, tender_id: TenderId, user: UserId) -> Result<u32> {
        let tender = self.tender(tender_id).await?;
        if tender.status.is_terminal() {
            return Err(AuctionError::TenderNotActive {
                tender_id,
                status: tender.status,
            });
        }
        let number = bounded(self.limit(), "add_participant", self.store.add_participant(tender_id, user)).await?;
        tracing::info!(%user, tender = %tender_id, number, "Joined tender");
        Ok(number)
    }

    /// # Errors
    /// `TenderNotFound`, `NotAParticipant`, `StoreUnavailable`.
    pub async fn leave_tender(&self, tender_id: TenderId, user: UserId) -> Result<()> {
        self.tender(tender_id).await?;
        bounded(
            self.limit(),
            "remove_participant",
            self.store.remove_participant(tender_id, user),
        )
        .await?;
        self.sessions.clear_for_tender(user, tender_id);
        tracing::info!(%user, tender = %tender_id, "Left tender");
        Ok(())
    }

    /// The user's own bids in a tender, oldest first.
    ///
    /// # Errors
    /// `TenderNotFound`, `StoreUnavailable`.
    pub async fn view_bids(&self, user: UserId, tender_id: TenderId) -> Result<Vec<Bid>> {
        self.tender(tender_id).await?;
        self.own_bids(tender_id, user).await
    }

    // =================================================================
    // Accessors
    // =================================================================

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    #[must_use]
    pub fn timers(&self) -> &AuctionTimerRegistry {
        &self.timers
    }

    #[must_use]
    pub fn sessions(&self) -> &BidSessions {
        &self.sessions
    }

    #[must_use]
    pub fn declarator(&self) -> &WinnerDeclarator {
        &self.declarator
    }

    /// Disarm all timers. Pending quiet periods never fire afterwards.
    pub fn shutdown(&self) {
        self.timers.shutdown();
    }

    // =================================================================
    // Internals
    // =================================================================

    fn limit(&self) -> std::time::Duration {
        self.config.store_timeout
    }

    async fn tender(&self, tender_id: TenderId) -> Result<Tender> {
        bounded(self.limit(), "get_tender", self.store.get_tender(tender_id)).await
    }

    async fn own_bids(&self, tender_id: TenderId, user: UserId) -> Result<Vec<Bid>> {
        bounded(
            self.limit(),
            "get_bids_for_user",
            self.store.get_bids_for_user(tender_id, user),
        )
        .await
    }
}

/// Everything the background "new bid" broadcast needs.
struct BidNotices {
    store: Arc<dyn TenderStore>,
    sink: Arc<dyn NotificationSink>,
    ledger: Arc<SessionLedger>,
    config: Arc<EngineConfig>,
}

impl BidNotices {
    /// Best-effort; only a failure to list participants skips the notices.
    async fn deliver(&self, tender: &Tender, bid: &Bid) -> FanoutReport {
        let participants = match bounded(
            self.config.store_timeout,
            "get_participants",
            self.store.get_participants(tender.id),
        )
        .await
        {
            Ok(participants) => participants,
            Err(err) => {
                tracing::warn!(tender = %tender.id, %err, "Skipping bid notifications");
                return FanoutReport::default();
            }
        };

        let bidder_number = self.number_or_zero(tender.id, bid.user_id).await;
        let mut messages = Vec::with_capacity(participants.len());
        for recipient in participants.into_iter().filter(|u| *u != bid.user_id) {
            let recipient_number = self.number_or_zero(tender.id, recipient).await;
            messages.push((
                recipient,
                Notification::BidPlaced {
                    tender_id: tender.id,
                    title: tender.title.clone(),
                    bidder_number,
                    recipient_number,
                    amount: bid.amount,
                    current_price: bid.amount,
                },
            ));
        }

        let report = fan_out(&self.sink, messages, self.config.send_timeout).await;
        for (user, message_id) in &report.delivered {
            self.ledger.add_message(*user, *message_id);
        }
        report
    }

    async fn number_or_zero(&self, tender_id: TenderId, user: UserId) -> u32 {
        match bounded(
            self.config.store_timeout,
            "participant_number",
            self.store.participant_number(tender_id, user),
        )
        .await
        {
            Ok(number) => number.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(tender = %tender_id, %user, %err, "Participant number unavailable");
                0
            }
        }
    }
}

fn ensure_active(tender: &Tender) -> Result<()> {
    if tender.is_open_at(Utc::now()) {
        Ok(())
    } else {
        Err(AuctionError::TenderNotActive {
            tender_id: tender.id,
            status: tender.status,
        })
    }
}

impl std::fmt::Debug for AuctionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuctionEngine")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tenderbid_store::{InMemoryTenderStore, RecordingSink};
    use tenderbid_types::TenderStatus;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn engine() -> (Arc<InMemoryTenderStore>, Arc<RecordingSink>, AuctionEngine) {
        let store = Arc::new(InMemoryTenderStore::new());
        let sink = Arc::new(RecordingSink::new());
        let engine = AuctionEngine::new(EngineConfig::default(), store.clone(), sink.clone()).unwrap();
        (store, sink, engine)
    }

    #[tokio::test]
    async fn invalid_config_rejected() {
        let config = EngineConfig {
            quiet_period: Duration::ZERO,
            ..EngineConfig::default()
        };
        let err = AuctionEngine::new(
            config,
            Arc::new(InMemoryTenderStore::new()),
            Arc::new(RecordingSink::new()),
        )
        .unwrap_err();
        assert!(matches!(err, AuctionError::Configuration(_)));
    }

    #[tokio::test]
    async fn begin_requires_membership() {
        let (store, _, engine) = engine();
        let tender_id = store.insert_tender(Tender::dummy_active(dec(1000)));
        let user = UserId::new();
        let err = engine.begin_bid(user, tender_id).await.unwrap_err();
        assert!(matches!(err, AuctionError::NotAParticipant { .. }));
        assert!(engine.sessions().get(user).is_none());
    }

    #[tokio::test]
    async fn begin_requires_active_tender() {
        let (store, _, engine) = engine();
        let tender_id = store.insert_tender(Tender::new("Sand", "", dec(1000), None, "08.12"));
        let user = UserId::new();
        engine.join_tender(tender_id, user).await.unwrap();
        let err = engine.begin_bid(user, tender_id).await.unwrap_err();
        assert!(matches!(
            err,
            AuctionError::TenderNotActive {
                status: TenderStatus::PendingApproval,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn begin_refused_before_start_time() {
        let (store, _, engine) = engine();
        let mut tender = Tender::dummy_active(dec(1000));
        tender.start_at = Some(Utc::now() + chrono::Duration::hours(1));
        let tender_id = store.insert_tender(tender);
        let user = UserId::new();
        engine.join_tender(tender_id, user).await.unwrap();

        let err = engine.begin_bid(user, tender_id).await.unwrap_err();
        assert!(matches!(
            err,
            AuctionError::TenderNotActive {
                status: TenderStatus::Active,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn prompt_shows_ceiling_and_history() {
        let (store, _, engine) = engine();
        let tender_id = store.insert_tender(Tender::dummy_active(dec(100_000)));
        let user = UserId::new();
        engine.join_tender(tender_id, user).await.unwrap();

        let prompt = engine.begin_bid(user, tender_id).await.unwrap();
        assert_eq!(prompt.ceiling, dec(1000));
        assert!(prompt.previous_bids.is_empty());

        engine.submit_bid_amount(user, "900").await.unwrap();
        engine.confirm_bid(user).await.unwrap();

        let prompt = engine.begin_bid(user, tender_id).await.unwrap();
        assert_eq!(prompt.current_price, dec(900));
        assert_eq!(prompt.ceiling, dec(9));
        assert_eq!(prompt.previous_bids.len(), 1);
        engine.shutdown();
    }

    #[tokio::test]
    async fn invalid_input_keeps_entry() {
        let (store, _, engine) = engine();
        let tender_id = store.insert_tender(Tender::dummy_active(dec(100_000)));
        let user = UserId::new();
        engine.join_tender(tender_id, user).await.unwrap();
        engine.begin_bid(user, tender_id).await.unwrap();

        assert!(matches!(
            engine.submit_bid_amount(user, "cheap").await.unwrap_err(),
            AuctionError::InvalidAmount { .. }
        ));
        assert!(matches!(
            engine.submit_bid_amount(user, "5000").await.unwrap_err(),
            AuctionError::BidTooHigh { .. }
        ));
        assert_eq!(engine.submit_bid_amount(user, "999").await.unwrap(), dec(999));
    }

    #[tokio::test]
    async fn submit_and_confirm_need_matching_stage() {
        let (_, _, engine) = engine();
        let user = UserId::new();
        assert_eq!(
            engine.submit_bid_amount(user, "1").await.unwrap_err(),
            AuctionError::NoPendingBid(user)
        );
        assert_eq!(
            engine.confirm_bid(user).await.unwrap_err(),
            AuctionError::NoPendingBid(user)
        );
    }

    #[tokio::test]
    async fn cancel_clears_entry_and_keeps_data() {
        let (store, sink, engine) = engine();
        let tender_id = store.insert_tender(Tender::dummy_active(dec(100_000)));
        let user = UserId::new();
        engine.join_tender(tender_id, user).await.unwrap();
        engine.begin_bid(user, tender_id).await.unwrap();
        engine.submit_bid_amount(user, "900").await.unwrap();

        assert!(engine.cancel_bid(user).await);
        assert!(engine.sessions().get(user).is_none());
        assert!(store.get_bids(tender_id).await.unwrap().is_empty());
        assert!(store.is_participant(tender_id, user).await.unwrap());
        assert!(matches!(sink.sent_to(user).as_slice(), [Notification::BidCancelled]));

        assert!(!engine.cancel_bid(user).await);
    }

    #[tokio::test]
    async fn join_rules() {
        let (store, _, engine) = engine();
        let tender_id = store.insert_tender(Tender::dummy_active(dec(100)));
        let a = UserId::new();
        let b = UserId::new();
        assert_eq!(engine.join_tender(tender_id, a).await.unwrap(), 1);
        assert_eq!(engine.join_tender(tender_id, b).await.unwrap(), 2);
        assert!(matches!(
            engine.join_tender(tender_id, a).await.unwrap_err(),
            AuctionError::AlreadyParticipating { .. }
        ));

        store.set_status(tender_id, TenderStatus::Cancelled).await.unwrap();
        assert!(matches!(
            engine.join_tender(tender_id, UserId::new()).await.unwrap_err(),
            AuctionError::TenderNotActive { .. }
        ));
        assert!(matches!(
            engine.join_tender(TenderId::new(), a).await.unwrap_err(),
            AuctionError::TenderNotFound(_)
        ));
    }

    #[tokio::test]
    async fn leave_drops_entry_for_that_tender() {
        let (store, _, engine) = engine();
        let tender_id = store.insert_tender(Tender::dummy_active(dec(100_000)));
        let user = UserId::new();
        engine.join_tender(tender_id, user).await.unwrap();
        engine.begin_bid(user, tender_id).await.unwrap();

        engine.leave_tender(tender_id, user).await.unwrap();
        assert!(engine.sessions().get(user).is_none());
        assert!(matches!(
            engine.leave_tender(tender_id, user).await.unwrap_err(),
            AuctionError::NotAParticipant { .. }
        ));
    }

    #[tokio::test]
    async fn stale_confirm_cannot_raise_price() {
        let (store, _, engine) = engine();
        let tender_id = store.insert_tender(Tender::dummy_active(dec(100_000)));
        let a = UserId::new();
        let b = UserId::new();
        engine.join_tender(tender_id, a).await.unwrap();
        engine.join_tender(tender_id, b).await.unwrap();

        engine.begin_bid(a, tender_id).await.unwrap();
        engine.submit_bid_amount(a, "500").await.unwrap();
        engine.begin_bid(b, tender_id).await.unwrap();
        engine.submit_bid_amount(b, "900").await.unwrap();
        engine.confirm_bid(b).await.unwrap();

        // A's 500 was valid at 100000 but is above 1% of 900.
        assert!(matches!(
            engine.confirm_bid(a).await.unwrap_err(),
            AuctionError::BidTooHigh { .. }
        ));
        assert_eq!(store.get_tender(tender_id).await.unwrap().current_price, dec(900));
        engine.shutdown();
    }

    #[tokio::test]
    async fn view_bids_lists_own_only() {
        let (store, _, engine) = engine();
        let tender_id = store.insert_tender(Tender::dummy_active(dec(100_000)));
        let a = UserId::new();
        let b = UserId::new();
        engine.join_tender(tender_id, a).await.unwrap();
        engine.join_tender(tender_id, b).await.unwrap();
        engine.begin_bid(a, tender_id).await.unwrap();
        engine.submit_bid_amount(a, "900").await.unwrap();
        engine.confirm_bid(a).await.unwrap();

        assert_eq!(engine.view_bids(a, tender_id).await.unwrap().len(), 1);
        assert!(engine.view_bids(b, tender_id).await.unwrap().is_empty());
        engine.shutdown();
    }
}
