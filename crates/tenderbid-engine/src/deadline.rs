//! Bounded store calls.

use std::future::Future;
use std::time::Duration;

use tenderbid_types::{AuctionError, Result};

/// Await a store call for at most `limit`.
///
/// An elapsed deadline becomes `StoreUnavailable`. Store failures are
/// logged with the operation name and passed through unchanged.
pub(crate) async fn bounded<T>(
    limit: Duration,
    op: &'static str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            if matches!(err, AuctionError::StoreUnavailable { .. }) {
                tracing::warn!(op, %err, "Store call failed");
            }
            Err(err)
        }
        Err(_) => {
            let limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(op, limit_ms, "Store call timed out");
            Err(AuctionError::StoreUnavailable {
                reason: format!("{op} timed out after {limit_ms} ms"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_is_store_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(1u8)
        };
        let err = bounded(Duration::from_secs(5), "get_tender", slow).await.unwrap_err();
        match err {
            AuctionError::StoreUnavailable { reason } => assert!(reason.contains("get_tender")),
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn errors_pass_through() {
        let failing = async { Err::<u8, _>(AuctionError::Internal("boom".into())) };
        let err = bounded(Duration::from_secs(1), "create_bid", failing).await.unwrap_err();
        assert_eq!(err, AuctionError::Internal("boom".into()));
    }
}
