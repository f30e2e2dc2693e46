//! Best-effort notification fan-out.
//!
//! One task per recipient. A slow or failing recipient never delays or
//! fails the others; failures are collected into the report and logged,
//! never retried. Each send is bounded, so a fan-out always finishes.

use std::sync::Arc;
use std::time::Duration;

use tenderbid_store::NotificationSink;
use tenderbid_types::{AuctionError, MessageId, Notification, UserId};
use tokio::task::JoinSet;

/// Per-recipient outcome of one fan-out.
#[derive(Debug, Default)]
pub struct FanoutReport {
    pub delivered: Vec<(UserId, MessageId)>,
    pub failed: Vec<(UserId, AuctionError)>,
}

impl FanoutReport {
    #[must_use]
    pub fn delivered_to(&self, user: UserId) -> Option<MessageId> {
        self.delivered.iter().find(|(u, _)| *u == user).map(|(_, id)| *id)
    }

    #[must_use]
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Send every `(recipient, notification)` pair concurrently, giving each
/// send at most `send_timeout`.
pub async fn fan_out(
    sink: &Arc<dyn NotificationSink>,
    messages: Vec<(UserId, Notification)>,
    send_timeout: Duration,
) -> FanoutReport {
    let mut tasks = JoinSet::new();
    for (user, notification) in messages {
        let sink = Arc::clone(sink);
        tasks.spawn(async move {
            let kind = notification.kind();
            (user, kind, send_bounded(sink.as_ref(), user, notification, send_timeout).await)
        });
    }

    let mut report = FanoutReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((user, _, Ok(message_id))) => report.delivered.push((user, message_id)),
            Ok((user, kind, Err(err))) => {
                tracing::warn!(%user, kind, %err, "Notification not delivered");
                report.failed.push((user, err));
            }
            Err(join_err) => {
                tracing::error!(%join_err, "Notification task aborted");
            }
        }
    }

    tracing::debug!(
        delivered = report.delivered.len(),
        failed = report.failed.len(),
        "Fan-out finished"
    );
    report
}

/// One send, failing with `NotificationFailed` once `limit` elapses.
pub async fn send_bounded(
    sink: &dyn NotificationSink,
    user: UserId,
    notification: Notification,
    limit: Duration,
) -> Result<MessageId, AuctionError> {
    match tokio::time::timeout(limit, sink.send(user, notification)).await {
        Ok(sent) => sent,
        Err(_) => {
            let limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            Err(AuctionError::NotificationFailed {
                reason: format!("send to {user} timed out after {limit_ms} ms"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use tenderbid_store::RecordingSink;

    use super::*;

    #[tokio::test]
    async fn failing_recipient_does_not_block_others() {
        let recording = Arc::new(RecordingSink::new());
        let sink: Arc<dyn NotificationSink> = recording.clone();
        let ok_a = UserId::new();
        let ok_b = UserId::new();
        let blocked = UserId::new();
        recording.fail_for(blocked);

        let report = fan_out(
            &sink,
            vec![
                (ok_a, Notification::BidCancelled),
                (blocked, Notification::BidCancelled),
                (ok_b, Notification::BidCancelled),
            ],
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.delivered.len(), 2);
        assert!(report.delivered_to(ok_a).is_some());
        assert!(report.delivered_to(ok_b).is_some());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, blocked);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_recipient_times_out() {
        let recording = Arc::new(RecordingSink::new());
        let sink: Arc<dyn NotificationSink> = recording.clone();
        let ok = UserId::new();
        let hung = UserId::new();
        recording.stall_for(hung);

        let report = fan_out(
            &sink,
            vec![(hung, Notification::BidCancelled), (ok, Notification::BidCancelled)],
            Duration::from_secs(10),
        )
        .await;

        assert!(report.delivered_to(ok).is_some());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, hung);
        assert!(matches!(report.failed[0].1, AuctionError::NotificationFailed { .. }));
    }

    #[tokio::test]
    async fn empty_fan_out() {
        let sink: Arc<dyn NotificationSink> = Arc::new(RecordingSink::new());
        let report = fan_out(&sink, Vec::new(), Duration::from_secs(1)).await;
        assert_eq!(report.attempted(), 0);
    }
}
