//! Session message ledger.
//!
//! Tracks, per user, the transient UI messages of the current bidding
//! session so they can be deleted in bulk when the session is superseded
//! or trimmed.
//!
//! Swaps and appends share one lock, so an id added concurrently with
//! [`SessionLedger::start_new_session`] lands either in the returned list
//! or in the fresh one, never in neither.
//!
//! Deletion runs on a spawned task with a pause between messages to stay
//! under transport rate limits. Failed deletions are logged and skipped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tenderbid_store::NotificationSink;
use tenderbid_types::{MessageId, UserId};
use tokio::task::JoinHandle;

pub struct SessionLedger {
    sink: Arc<dyn NotificationSink>,
    delete_interval: Duration,
    sessions: Mutex<HashMap<UserId, Vec<MessageId>>>,
}

impl SessionLedger {
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>, delete_interval: Duration) -> Self {
        Self {
            sink,
            delete_interval,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, Vec<MessageId>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a message shown to `user` in the current session.
    pub fn add_message(&self, user: UserId, message_id: MessageId) {
        self.lock().entry(user).or_default().push(message_id);
    }

    /// Swap in an empty session and return the previous message list.
    pub fn start_new_session(&self, user: UserId) -> Vec<MessageId> {
        self.lock().insert(user, Vec::new()).unwrap_or_default()
    }

    /// Snapshot of the user's current session.
    #[must_use]
    pub fn messages(&self, user: UserId) -> Vec<MessageId> {
        self.lock().get(&user).cloned().unwrap_or_default()
    }

    /// Start a new session and delete everything from the old one.
    pub fn rotate_session(&self, user: UserId) -> Option<JoinHandle<usize>> {
        let previous = self.start_new_session(user);
        self.dispose(user, previous)
    }

    /// Delete the whole current session.
    pub fn cleanup_session_messages(&self, user: UserId) -> Option<JoinHandle<usize>> {
        let taken = self.lock().remove(&user).unwrap_or_default();
        self.dispose(user, taken)
    }

    /// Keep the last `keep_last` messages and delete the rest.
    pub fn cleanup_old_messages(&self, user: UserId, keep_last: usize) -> Option<JoinHandle<usize>> {
        let stale = {
            let mut sessions = self.lock();
            match sessions.get_mut(&user) {
                Some(ids) if ids.len() > keep_last => {
                    let cut = ids.len() - keep_last;
                    ids.drain(..cut).collect::<Vec<_>>()
                }
                _ => Vec::new(),
            }
        };
        self.dispose(user, stale)
    }

    /// Delete `ids` in the background. Resolves to the number deleted.
    ///
    /// Returns `None` when there is nothing to delete.
    pub fn dispose(&self, user: UserId, ids: Vec<MessageId>) -> Option<JoinHandle<usize>> {
        if ids.is_empty() {
            return None;
        }
        let sink = Arc::clone(&self.sink);
        let interval = self.delete_interval;
        Some(tokio::spawn(async move {
            let total = ids.len();
            let mut deleted = 0;
            for (i, message_id) in ids.into_iter().enumerate() {
                if i > 0 && !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                match sink.delete_message(user, message_id).await {
                    Ok(()) => deleted += 1,
                    Err(err) => {
                        tracing::warn!(%user, message = %message_id, %err, "Failed to delete message");
                    }
                }
            }
            tracing::debug!(%user, deleted, total, "Session messages disposed");
            deleted
        }))
    }
}

impl std::fmt::Debug for SessionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLedger")
            .field("delete_interval", &self.delete_interval)
            .field("users", &self.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tenderbid_store::RecordingSink;

    use super::*;

    fn ledger() -> (Arc<RecordingSink>, SessionLedger) {
        let sink = Arc::new(RecordingSink::new());
        let ledger = SessionLedger::new(sink.clone(), Duration::from_millis(100));
        (sink, ledger)
    }

    #[tokio::test(start_paused = true)]
    async fn trim_keeps_newest() {
        let (sink, ledger) = ledger();
        let user = UserId::new();
        for i in 1..=5 {
            ledger.add_message(user, MessageId(i));
        }
        let handle = ledger.cleanup_old_messages(user, 2).unwrap();
        assert_eq!(ledger.messages(user), vec![MessageId(4), MessageId(5)]);
        assert_eq!(handle.await.unwrap(), 3);
        assert_eq!(sink.deleted_for(user), vec![MessageId(1), MessageId(2), MessageId(3)]);
    }

    #[tokio::test]
    async fn trim_below_limit_is_noop() {
        let (_, ledger) = ledger();
        let user = UserId::new();
        ledger.add_message(user, MessageId(1));
        assert!(ledger.cleanup_old_messages(user, 2).is_none());
        assert!(ledger.cleanup_old_messages(UserId::new(), 0).is_none());
        assert_eq!(ledger.messages(user), vec![MessageId(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_deletes_previous_session() {
        let (sink, ledger) = ledger();
        let user = UserId::new();
        ledger.add_message(user, MessageId(10));
        ledger.add_message(user, MessageId(11));
        let handle = ledger.rotate_session(user).unwrap();
        ledger.add_message(user, MessageId(12));

        assert_eq!(handle.await.unwrap(), 2);
        assert_eq!(sink.deleted_for(user), vec![MessageId(10), MessageId(11)]);
        assert_eq!(ledger.messages(user), vec![MessageId(12)]);
    }

    #[tokio::test(start_paused = true)]
    async fn deletions_are_spaced() {
        let (_, ledger) = ledger();
        let user = UserId::new();
        for i in 0..4 {
            ledger.add_message(user, MessageId(i));
        }
        let started = tokio::time::Instant::now();
        ledger.cleanup_session_messages(user).unwrap().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(ledger.messages(user).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_deletions_are_skipped() {
        let (sink, ledger) = ledger();
        let user = UserId::new();
        ledger.add_message(user, MessageId(1));
        sink.fail_for(user);
        assert_eq!(ledger.cleanup_session_messages(user).unwrap().await.unwrap(), 0);
    }
}
