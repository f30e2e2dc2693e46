//! Scripted auction against the in-memory store.
//!
//! ```text
//! RUST_LOG=debug QUIET_PERIOD_SECS=2 cargo run --bin tenderbid-demo
//! ```
//!
//! `LOG_FORMAT=json` switches to JSON log lines.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tenderbid_engine::AuctionEngine;
use tenderbid_store::{InMemoryTenderStore, LogSink, TenderStore};
use tenderbid_types::{AuctionError, EngineConfig, Tender, TenderStatus, UserId, UserProfile};
use tracing_subscriber::EnvFilter;

const DEMO_QUIET_PERIOD: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<(), AuctionError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut config = EngineConfig::from_env()?;
    if std::env::var_os("QUIET_PERIOD_SECS").is_none() {
        config.quiet_period = DEMO_QUIET_PERIOD;
    }
    let organizer = UserId::new();
    config.organizer_ids.push(organizer);

    let store = Arc::new(InMemoryTenderStore::new());
    let engine = AuctionEngine::new(config, store.clone(), Arc::new(LogSink::new()))?;

    let mut tender = Tender::new(
        "Office paper",
        "A4, 80 g/m2, 500 boxes",
        Decimal::new(100_000, 0),
        Some(Utc::now()),
        "17.12.14",
    );
    tender.status = TenderStatus::ActivePending;
    let tender_id = store.insert_tender(tender);

    let alpha = UserId::new();
    let beta = UserId::new();
    for (user, org) in [(alpha, "Alpha Supply"), (beta, "Beta Trade")] {
        store.insert_profile(UserProfile {
            user_id: user,
            organization_name: org.to_string(),
            contact_name: "Sales desk".to_string(),
            phone_number: "+7 900 000-00-00".to_string(),
            tax_id: "7700000000".to_string(),
        });
        engine.join_tender(tender_id, user).await?;
    }
    store.activate_due(Utc::now());

    // Both enter 900 while the price is still 100000.
    engine.begin_bid(alpha, tender_id).await?;
    engine.submit_bid_amount(alpha, "900").await?;
    engine.begin_bid(beta, tender_id).await?;
    engine.submit_bid_amount(beta, "900").await?;

    let receipt = engine.confirm_bid(alpha).await?;
    tracing::info!(amount = %receipt.bid.amount, "Alpha holds the lowest price");

    match engine.confirm_bid(beta).await {
        Err(err @ AuctionError::BidAlreadyTaken { .. }) => tracing::info!(%err, "Beta lost the race"),
        other => tracing::warn!(?other, "Unexpected outcome for Beta"),
    }

    engine.begin_bid(beta, tender_id).await?;
    if let Err(err) = engine.submit_bid_amount(beta, "10").await {
        tracing::info!(%err, "Beta re-prompted");
    }
    engine.submit_bid_amount(beta, "8").await?;
    engine.confirm_bid(beta).await?;

    let wait = engine.config().quiet_period + Duration::from_millis(500);
    tracing::info!(wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX), "Waiting for quiet period");
    tokio::time::sleep(wait).await;

    let final_state = store.get_tender(tender_id).await?;
    for record in store.history() {
        tracing::info!(
            tender = %record.tender_id,
            status = %final_state.status,
            winner = %record.winner.display_name(),
            amount = %record.winning_amount,
            savings = %record.savings(),
            bid_root = %record.bid_root_hex(),
            "Archived"
        );
    }
    engine.shutdown();
    Ok(())
}
