//! Notification sink contract and its implementations.
//!
//! The sink owns rendering and transport. The engine only hands it typed
//! [`Notification`]s and, when tearing down a session, the ids of messages
//! to delete.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tenderbid_types::{MessageId, Notification, Result, UserId};

/// Outbound delivery channel to users.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification; returns the transport's message id.
    async fn send(&self, user: UserId, notification: Notification) -> Result<MessageId>;

    /// Remove a previously delivered message from the user's view.
    async fn delete_message(&self, user: UserId, message_id: MessageId) -> Result<()>;
}

/// Sink that only writes every notification to the log.
#[derive(Debug, Default)]
pub struct LogSink {
    next_id: AtomicI64,
}

impl LogSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, user: UserId, notification: Notification) -> Result<MessageId> {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        tracing::info!(
            %user,
            message = %id,
            kind = notification.kind(),
            ?notification,
            "Notification sent"
        );
        Ok(id)
    }

    async fn delete_message(&self, user: UserId, message_id: MessageId) -> Result<()> {
        tracing::debug!(%user, message = %message_id, "Message deleted");
        Ok(())
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use recording::RecordingSink;

#[cfg(any(test, feature = "test-helpers"))]
mod recording {
    use std::collections::HashSet;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use tenderbid_types::AuctionError;

    use super::*;

    #[derive(Debug, Default)]
    struct Recorded {
        sent: Vec<(UserId, MessageId, Notification)>,
        deleted: Vec<(UserId, MessageId)>,
        failing: HashSet<UserId>,
        stalled: HashSet<UserId>,
    }

    /// Sink that records everything and can be told to fail, or never
    /// answer, for some users.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        next_id: AtomicI64,
        inner: Mutex<Recorded>,
    }

    impl RecordingSink {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> MutexGuard<'_, Recorded> {
            self.inner.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Every send and delete for `user` fails from now on.
        pub fn fail_for(&self, user: UserId) {
            self.lock().failing.insert(user);
        }

        /// Every send to `user` hangs forever from now on.
        pub fn stall_for(&self, user: UserId) {
            self.lock().stalled.insert(user);
        }

        #[must_use]
        pub fn sent(&self) -> Vec<(UserId, MessageId, Notification)> {
            self.lock().sent.clone()
        }

        #[must_use]
        pub fn sent_to(&self, user: UserId) -> Vec<Notification> {
            self.lock()
                .sent
                .iter()
                .filter(|(u, _, _)| *u == user)
                .map(|(_, _, n)| n.clone())
                .collect()
        }

        #[must_use]
        pub fn deleted(&self) -> Vec<(UserId, MessageId)> {
            self.lock().deleted.clone()
        }

        #[must_use]
        pub fn deleted_for(&self, user: UserId) -> Vec<MessageId> {
            self.lock()
                .deleted
                .iter()
                .filter(|(u, _)| *u == user)
                .map(|(_, id)| *id)
                .collect()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, user: UserId, notification: Notification) -> Result<MessageId> {
            let stalled = self.lock().stalled.contains(&user);
            if stalled {
                std::future::pending::<()>().await;
            }
            let mut inner = self.lock();
            if inner.failing.contains(&user) {
                return Err(AuctionError::NotificationFailed {
                    reason: format!("user {user} blocked the bot"),
                });
            }
            let id = MessageId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
            inner.sent.push((user, id, notification));
            Ok(id)
        }

        async fn delete_message(&self, user: UserId, message_id: MessageId) -> Result<()> {
            let mut inner = self.lock();
            if inner.failing.contains(&user) {
                return Err(AuctionError::NotificationFailed {
                    reason: format!("cannot delete {message_id} for {user}"),
                });
            }
            inner.deleted.push((user, message_id));
            Ok(())
        }
    }
}
