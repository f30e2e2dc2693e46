//! Winner declaration.
//!
//! Runs when a tender's quiet period elapses. Everything is re-read from
//! the store; the timer snapshot is only a hint. Moving the tender to
//! `completed` is the claim: whoever loses that transition does nothing,
//! so a second or late firing is harmless.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tenderbid_store::{NotificationSink, TenderStore};
use tenderbid_types::{
    AuctionError, Bid, EngineConfig, HistoryRecord, Notification, Result, TenderId, TenderStatus,
    UserId, UserProfile,
};

use crate::deadline::bounded;
use crate::fanout::{FanoutReport, fan_out};
use crate::ledger::SessionLedger;
use crate::timer::{QuietPeriodHandler, TimerSnapshot};

/// Result of a completed declaration.
#[derive(Debug)]
pub struct Declaration {
    pub tender_id: TenderId,
    pub winner: UserId,
    pub amount: Decimal,
    pub bid_count: usize,
    pub participants_removed: usize,
    pub bid_root: [u8; 32],
    pub notifications: FanoutReport,
}

#[derive(Debug)]
pub enum DeclareOutcome {
    Declared(Declaration),
    /// The tender was no longer active, or another declarator claimed it.
    Skipped { tender_id: TenderId, status: TenderStatus },
}

impl DeclareOutcome {
    #[must_use]
    pub fn is_declared(&self) -> bool {
        matches!(self, Self::Declared(_))
    }
}

pub struct WinnerDeclarator {
    store: Arc<dyn TenderStore>,
    sink: Arc<dyn NotificationSink>,
    ledger: Arc<SessionLedger>,
    config: Arc<EngineConfig>,
}

impl WinnerDeclarator {
    #[must_use]
    pub fn new(
        store: Arc<dyn TenderStore>,
        sink: Arc<dyn NotificationSink>,
        ledger: Arc<SessionLedger>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            store,
            sink,
            ledger,
            config,
        }
    }

    /// Finalize the tender named by `snapshot`.
    ///
    /// # Errors
    /// Store failures before the tender is claimed. After the claim, store
    /// and delivery failures are logged and the declaration completes.
    pub async fn declare(&self, snapshot: &TimerSnapshot) -> Result<DeclareOutcome> {
        let limit = self.config.store_timeout;
        let tender_id = snapshot.tender_id;

        let tender = bounded(limit, "get_tender", self.store.get_tender(tender_id)).await?;
        if tender.status != TenderStatus::Active {
            tracing::debug!(tender = %tender_id, status = %tender.status, "Declaration skipped");
            return Ok(DeclareOutcome::Skipped {
                tender_id,
                status: tender.status,
            });
        }

        let participants =
            bounded(limit, "get_participants", self.store.get_participants(tender_id)).await?;
        let bids = bounded(limit, "get_bids", self.store.get_bids(tender_id)).await?;
        let (winner, amount) = winning_bid(&bids).unwrap_or((snapshot.last_bid_user, snapshot.last_bid_amount));
        if winner != snapshot.last_bid_user || amount != snapshot.last_bid_amount {
            tracing::warn!(
                tender = %tender_id,
                snapshot_amount = %snapshot.last_bid_amount,
                %amount,
                "Timer snapshot differs from stored bids, using stored"
            );
        }
        let profile = bounded(limit, "get_user_profile", self.store.get_user_profile(winner))
            .await?
            .unwrap_or_else(|| UserProfile::unknown(winner));

        match bounded(limit, "set_status", self.store.set_status(tender_id, TenderStatus::Completed)).await {
            Ok(()) => {}
            Err(AuctionError::InvalidStatusTransition { from, .. }) => {
                tracing::debug!(tender = %tender_id, status = %from, "Lost completion claim");
                return Ok(DeclareOutcome::Skipped {
                    tender_id,
                    status: from,
                });
            }
            Err(err) => return Err(err),
        }
        tracing::info!(tender = %tender_id, %winner, %amount, bids = bids.len(), "Tender completed");

        let participants_removed =
            match bounded(limit, "remove_participants", self.store.remove_participants(tender_id)).await {
                Ok(n) => n,
                Err(err) => {
                    tracing::error!(tender = %tender_id, %err, "Failed to remove participants");
                    0
                }
            };

        let record = HistoryRecord::new(
            tender_id,
            tender.title.clone(),
            profile.clone(),
            amount,
            tender.start_price,
            bids.clone(),
        );
        let bid_root = record.bid_root;
        if let Err(err) = bounded(limit, "archive_history", self.store.archive_history(record)).await {
            tracing::error!(tender = %tender_id, %err, "Failed to archive tender history");
        }

        let report_recipients = self.config.report_recipients();
        // Only current participants are notified.
        let mut messages = Vec::with_capacity(participants.len() + report_recipients.len());
        for user in &participants {
            let notification = if *user == winner {
                Notification::YouWon {
                    tender_id,
                    title: tender.title.clone(),
                    amount,
                }
            } else {
                Notification::TenderClosed {
                    tender_id,
                    title: tender.title.clone(),
                    winner_name: profile.display_name(),
                    amount,
                }
            };
            messages.push((*user, notification));
        }
        for recipient in &report_recipients {
            messages.push((
                *recipient,
                Notification::TenderClosedReport {
                    tender_id,
                    title: tender.title.clone(),
                    winner: profile.clone(),
                    amount,
                    start_price: tender.start_price,
                    bids: bids.clone(),
                },
            ));
        }

        let notifications = fan_out(&self.sink, messages, self.config.send_timeout).await;
        for (user, message_id) in &notifications.delivered {
            if !report_recipients.contains(user) {
                self.ledger.add_message(*user, *message_id);
            }
        }

        Ok(DeclareOutcome::Declared(Declaration {
            tender_id,
            winner,
            amount,
            bid_count: bids.len(),
            participants_removed,
            bid_root,
            notifications,
        }))
    }
}

/// Lowest bid of the tender. Amounts are unique, so there is no tie.
fn winning_bid(bids: &[Bid]) -> Option<(UserId, Decimal)> {
    bids.iter()
        .min_by(|a, b| a.amount.cmp(&b.amount))
        .map(|bid| (bid.user_id, bid.amount))
}

#[async_trait]
impl QuietPeriodHandler for WinnerDeclarator {
    async fn on_quiet_period(&self, snapshot: TimerSnapshot) {
        match self.declare(&snapshot).await {
            Ok(DeclareOutcome::Declared(declaration)) => tracing::info!(
                tender = %declaration.tender_id,
                winner = %declaration.winner,
                amount = %declaration.amount,
                notified = declaration.notifications.delivered.len(),
                failed = declaration.notifications.failed.len(),
                "Winner declared"
            ),
            Ok(DeclareOutcome::Skipped { tender_id, status }) => {
                tracing::debug!(tender = %tender_id, %status, "Nothing to declare");
            }
            Err(err) => {
                tracing::error!(tender = %snapshot.tender_id, %err, "Winner declaration failed");
            }
        }
    }
}

impl std::fmt::Debug for WinnerDeclarator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WinnerDeclarator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
