//! Two-participant lifecycle tests against the in-memory ledger and the
//! simulated room. Time is tokio's paused clock, so every window and unit
//! boundary lands deterministically.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use counsel_ledger_core::{
    ChargeKind, Credits, EndReason, InMemoryLedger, Modality, SessionLedger, SessionRecord,
    SessionStatus, UserId,
};
use counsel_session_core::adapters::{SimulatedRoom, SimulatedTransport, StaticTokenIssuer};
use counsel_session_core::{Role, SessionConfig, SessionController};
use pretty_assertions::assert_eq;

async fn seeded_session(ledger: &InMemoryLedger, balance: Credits) -> SessionRecord {
    let client = UserId::new("client-1");
    let provider = UserId::new("provider-1");
    ledger.deposit(&client, balance).await;
    ledger
        .create_session(&client, &provider, Modality::Video)
        .await
        .unwrap()
}

fn controller(
    config: SessionConfig,
    role: Role,
    record: &SessionRecord,
    ledger: &Arc<InMemoryLedger>,
    transport: &Arc<SimulatedTransport>,
) -> SessionController {
    SessionController::new(
        config,
        role,
        record.clone(),
        ledger.clone(),
        transport.clone(),
        Arc::new(StaticTokenIssuer::default()),
    )
}

#[test_log::test(tokio::test(start_paused = true))]
async fn two_party_session_bills_whole_units_and_settles_once() -> Result<()> {
    let ledger = Arc::new(InMemoryLedger::new());
    let record = seeded_session(&ledger, 100).await;
    let (client_room, provider_room) = SimulatedRoom::pair();
    let client_room = Arc::new(client_room);
    let provider_room = Arc::new(provider_room);

    // Debounce 3s, 60s units at 5 credits, no initial fee.
    let config = SessionConfig::default();
    let client = controller(config.clone(), Role::Client, &record, &ledger, &client_room);
    let provider = controller(config, Role::Provider, &record, &ledger, &provider_room);

    let hangup = client.handle();
    let client_task = tokio::spawn(client.run());
    let provider_task = tokio::spawn(provider.run());
    tokio::spawn(async move {
        // Established at t=3; units complete at t=63 and t=123. Hanging up
        // at t=125.5 leaves the third unit partial and unbilled.
        tokio::time::sleep(Duration::from_millis(125_500)).await;
        hangup.hangup();
    });

    let client_summary = client_task.await??;
    let provider_summary = provider_task.await??;

    // Both sides converge on the identical committed settlement.
    assert_eq!(client_summary, provider_summary);
    assert_eq!(client_summary.status, SessionStatus::Completed);
    assert_eq!(client_summary.end_reason, EndReason::Hangup);
    assert_eq!(client_summary.duration_seconds, 125);
    assert_eq!(client_summary.total_credits, 10);
    assert!(client_summary.authoritative);

    // Two whole units, deduplicated across both participants' tickers.
    let events = ledger.billing_events(&record.id).await?;
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.kind == ChargeKind::PerUnit));
    assert_eq!(ledger.balance(&record.client).await?, 90);
    assert_eq!(ledger.balance(&record.provider).await?, 10);

    // Media released exactly once per endpoint.
    assert_eq!(client_room.leave_calls().await, 1);
    assert_eq!(provider_room.leave_calls().await, 1);
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn rejected_unit_ends_the_session_with_nothing_debited() -> Result<()> {
    let ledger = Arc::new(InMemoryLedger::new());
    // 4 credits cannot cover a single 5-credit unit.
    let record = seeded_session(&ledger, 4).await;
    let (client_room, provider_room) = SimulatedRoom::pair();
    let client_room = Arc::new(client_room);
    let provider_room = Arc::new(provider_room);

    let config = SessionConfig::default();
    let client = controller(config.clone(), Role::Client, &record, &ledger, &client_room);
    let provider = controller(config, Role::Provider, &record, &ledger, &provider_room);

    let client_summary = tokio::spawn(client.run());
    let provider_summary = tokio::spawn(provider.run());
    let client_summary = client_summary.await??;
    let provider_summary = provider_summary.await??;

    assert_eq!(client_summary, provider_summary);
    assert_eq!(client_summary.status, SessionStatus::Completed);
    assert_eq!(client_summary.end_reason, EndReason::InsufficientFunds);
    // First unit boundary at t=63 triggered the rejection.
    assert_eq!(client_summary.duration_seconds, 63);
    assert_eq!(client_summary.total_credits, 0);
    assert!(client_summary.authoritative);

    // The rejected unit was never partially applied.
    assert!(ledger.billing_events(&record.id).await?.is_empty());
    assert_eq!(ledger.balance(&record.client).await?, 4);
    assert_eq!(ledger.balance(&record.provider).await?, 0);
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn counterpart_no_show_cancels_without_billing() -> Result<()> {
    let ledger = Arc::new(InMemoryLedger::new());
    let record = seeded_session(&ledger, 100).await;
    let (client_room, _provider_room) = SimulatedRoom::pair();
    let client_room = Arc::new(client_room);

    // The provider never joins; the 60s no-show window expires.
    let config = SessionConfig::default();
    let client = controller(config, Role::Client, &record, &ledger, &client_room);
    let summary = tokio::spawn(client.run()).await??;

    assert_eq!(summary.status, SessionStatus::Cancelled);
    assert_eq!(summary.end_reason, EndReason::CounterpartTimeout);
    assert_eq!(summary.duration_seconds, 0);
    assert_eq!(summary.total_credits, 0);
    assert!(summary.authoritative);

    assert!(ledger.billing_events(&record.id).await?.is_empty());
    assert_eq!(ledger.balance(&record.client).await?, 100);
    assert_eq!(client_room.leave_calls().await, 1);

    let stored = ledger.get_session(&record.id).await?;
    assert_eq!(stored.status, SessionStatus::Cancelled);
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn hangup_before_stabilization_is_a_cancellation() -> Result<()> {
    let ledger = Arc::new(InMemoryLedger::new());
    let record = seeded_session(&ledger, 100).await;
    let (client_room, provider_room) = SimulatedRoom::pair();
    let client_room = Arc::new(client_room);
    let provider_room = Arc::new(provider_room);

    let config = SessionConfig::default();
    let client = controller(config.clone(), Role::Client, &record, &ledger, &client_room);
    let provider = controller(config, Role::Provider, &record, &ledger, &provider_room);

    let hangup = client.handle();
    let client_task = tokio::spawn(client.run());
    let provider_task = tokio::spawn(provider.run());
    tokio::spawn(async move {
        // Inside the 3s debounce window; nothing ever established.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        hangup.hangup();
    });

    let client_summary = client_task.await??;
    let provider_summary = provider_task.await??;

    assert_eq!(client_summary, provider_summary);
    assert_eq!(client_summary.status, SessionStatus::Cancelled);
    assert_eq!(client_summary.end_reason, EndReason::CancelledBeforeConnect);
    assert_eq!(client_summary.total_credits, 0);
    assert_eq!(ledger.balance(&record.client).await?, 100);
    Ok(())
}

#[test_log::test(tokio::test(start_paused = true))]
async fn media_toggle_survives_a_short_session() -> Result<()> {
    let ledger = Arc::new(InMemoryLedger::new());
    let record = seeded_session(&ledger, 100).await;
    let (client_room, provider_room) = SimulatedRoom::pair();
    let client_room = Arc::new(client_room);
    let provider_room = Arc::new(provider_room);

    let config = SessionConfig::default();
    let client = controller(config.clone(), Role::Client, &record, &ledger, &client_room);
    let provider = controller(config, Role::Provider, &record, &ledger, &provider_room);

    let handle = client.handle();
    let client_task = tokio::spawn(client.run());
    let provider_task = tokio::spawn(provider.run());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        handle.toggle_media();
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.toggle_media();
        tokio::time::sleep(Duration::from_secs(4)).await;
        handle.hangup();
    });

    let client_summary = client_task.await??;
    let provider_summary = provider_task.await??;

    assert_eq!(client_summary, provider_summary);
    assert_eq!(client_summary.status, SessionStatus::Completed);
    assert_eq!(client_summary.end_reason, EndReason::Hangup);
    // Hung up at t=10.5, well inside the first 60s unit.
    assert_eq!(client_summary.duration_seconds, 10);
    assert_eq!(client_summary.total_credits, 0);
    Ok(())
}
