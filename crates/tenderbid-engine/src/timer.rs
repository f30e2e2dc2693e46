//! Auction timer registry.
//!
//! One debounced timer per tender. Every accepted bid re-arms the tender's
//! timer; when a quiet period passes with no new bid, the registered
//! [`QuietPeriodHandler`] runs with the snapshot of the last bid.
//!
//! Arming is a single take-and-replace on the tender's slot under the
//! registry lock. The lock is held only for the swap. Each timer carries
//! a generation; a fired timer proceeds only if its generation is still
//! registered, removing itself under the lock. A timer that lost a race
//! with a re-arm or cancel therefore does nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tenderbid_types::{TenderId, UserId};
use tokio::task::JoinHandle;

/// State captured when a bid is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub tender_id: TenderId,
    pub last_bid_user: UserId,
    pub last_bid_amount: Decimal,
    pub tender_title: String,
    pub start_price: Decimal,
}

/// Action run when a tender's quiet period elapses.
#[async_trait]
pub trait QuietPeriodHandler: Send + Sync {
    async fn on_quiet_period(&self, snapshot: TimerSnapshot);
}

struct Slot {
    generation: u64,
    snapshot: TimerSnapshot,
    handle: JoinHandle<()>,
}

type Slots = Arc<Mutex<HashMap<TenderId, Slot>>>;

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<TenderId, Slot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct AuctionTimerRegistry {
    quiet_period: Duration,
    handler: Arc<dyn QuietPeriodHandler>,
    slots: Slots,
    next_generation: AtomicU64,
}

impl AuctionTimerRegistry {
    #[must_use]
    pub fn new(quiet_period: Duration, handler: Arc<dyn QuietPeriodHandler>) -> Self {
        Self {
            quiet_period,
            handler,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Arm or restart the timer of `snapshot.tender_id`.
    ///
    /// Returns the generation of the new timer.
    pub fn arm(&self, snapshot: TimerSnapshot) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let tender_id = snapshot.tender_id;
        let slots = Arc::clone(&self.slots);
        let handler = Arc::clone(&self.handler);
        let quiet_period = self.quiet_period;

        let mut guard = lock(&self.slots);
        // Spawned under the lock: the task cannot look up its slot before
        // the insert below is visible.
        let handle = tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            let claimed = {
                let mut slots = lock(&slots);
                if slots.get(&tender_id).map(|slot| slot.generation) == Some(generation) {
                    slots.remove(&tender_id).map(|slot| slot.snapshot)
                } else {
                    None
                }
            };
            match claimed {
                Some(snapshot) => {
                    tracing::info!(tender = %tender_id, generation, "Quiet period elapsed");
                    handler.on_quiet_period(snapshot).await;
                }
                None => tracing::debug!(tender = %tender_id, generation, "Stale timer ignored"),
            }
        });
        let previous = guard.insert(
            tender_id,
            Slot {
                generation,
                snapshot,
                handle,
            },
        );
        drop(guard);

        if let Some(previous) = previous {
            previous.handle.abort();
            tracing::debug!(
                tender = %tender_id,
                replaced = previous.generation,
                generation,
                "Timer restarted"
            );
        } else {
            tracing::debug!(tender = %tender_id, generation, "Timer armed");
        }
        generation
    }

    /// Disarm the tender's timer. Returns whether one was armed.
    pub fn cancel(&self, tender_id: TenderId) -> bool {
        let removed = lock(&self.slots).remove(&tender_id);
        match removed {
            Some(slot) => {
                slot.handle.abort();
                tracing::debug!(tender = %tender_id, generation = slot.generation, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_armed(&self, tender_id: TenderId) -> bool {
        lock(&self.slots).contains_key(&tender_id)
    }

    /// Snapshot the armed timer of `tender_id` will fire with.
    #[must_use]
    pub fn pending_snapshot(&self, tender_id: TenderId) -> Option<TimerSnapshot> {
        lock(&self.slots).get(&tender_id).map(|slot| slot.snapshot.clone())
    }

    #[must_use]
    pub fn armed_count(&self) -> usize {
        lock(&self.slots).len()
    }

    /// Disarm every timer.
    pub fn shutdown(&self) {
        let drained: Vec<Slot> = lock(&self.slots).drain().map(|(_, slot)| slot).collect();
        for slot in &drained {
            slot.handle.abort();
        }
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "Timers cancelled on shutdown");
        }
    }
}

impl Drop for AuctionTimerRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AuctionTimerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuctionTimerRegistry")
            .field("quiet_period", &self.quiet_period)
            .field("armed", &self.armed_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Fired(Mutex<Vec<TimerSnapshot>>);

    #[async_trait]
    impl QuietPeriodHandler for Fired {
        async fn on_quiet_period(&self, snapshot: TimerSnapshot) {
            self.0.lock().unwrap().push(snapshot);
        }
    }

    impl Fired {
        fn all(&self) -> Vec<TimerSnapshot> {
            self.0.lock().unwrap().clone()
        }
    }

    fn snapshot(tender_id: TenderId, amount: i64) -> TimerSnapshot {
        TimerSnapshot {
            tender_id,
            last_bid_user: UserId::new(),
            last_bid_amount: Decimal::new(amount, 0),
            tender_title: "Cement".into(),
            start_price: Decimal::new(100_000, 0),
        }
    }

    fn registry() -> (Arc<Fired>, AuctionTimerRegistry) {
        let fired = Arc::new(Fired::default());
        let registry = AuctionTimerRegistry::new(Duration::from_secs(300), fired.clone());
        (fired, registry)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_quiet_period() {
        let (fired, registry) = registry();
        let tender = TenderId::new();
        registry.arm(snapshot(tender, 900));

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(fired.all().is_empty());
        assert!(registry.is_armed(tender));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.all().len(), 1);
        assert!(!registry.is_armed(tender));
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_fires_once_with_last_snapshot() {
        let (fired, registry) = registry();
        let tender = TenderId::new();
        registry.arm(snapshot(tender, 900));
        tokio::time::sleep(Duration::from_secs(200)).await;
        let last = snapshot(tender, 8);
        registry.arm(last.clone());
        assert_eq!(registry.armed_count(), 1);

        // The first timer's deadline passes without firing.
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert!(fired.all().is_empty());

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(fired.all(), vec![last]);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_arms_fire_once() {
        let (fired, registry) = registry();
        let tender = TenderId::new();
        let first = registry.arm(snapshot(tender, 900));
        let second = registry.arm(snapshot(tender, 800));
        assert!(second > first);
        assert_eq!(registry.pending_snapshot(tender).unwrap().last_bid_amount, Decimal::new(800, 0));

        tokio::time::sleep(Duration::from_secs(301)).await;
        let all = fired.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].last_bid_amount, Decimal::new(800, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_fire() {
        let (fired, registry) = registry();
        let tender = TenderId::new();
        registry.arm(snapshot(tender, 900));
        assert!(registry.cancel(tender));
        assert!(!registry.cancel(tender));
        tokio::time::sleep(Duration::from_secs(400)).await;
        assert!(fired.all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tenders_are_independent() {
        let (fired, registry) = registry();
        let a = TenderId::new();
        let b = TenderId::new();
        registry.arm(snapshot(a, 1));
        registry.arm(snapshot(b, 2));
        registry.arm(snapshot(a, 3));
        tokio::time::sleep(Duration::from_secs(301)).await;
        let mut amounts: Vec<_> = fired.all().into_iter().map(|s| s.last_bid_amount).collect();
        amounts.sort();
        assert_eq!(amounts, vec![Decimal::new(2, 0), Decimal::new(3, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_disarms_everything() {
        let (fired, registry) = registry();
        registry.arm(snapshot(TenderId::new(), 1));
        registry.arm(snapshot(TenderId::new(), 2));
        registry.shutdown();
        assert_eq!(registry.armed_count(), 0);
        tokio::time::sleep(Duration::from_secs(400)).await;
        assert!(fired.all().is_empty());
    }
}
