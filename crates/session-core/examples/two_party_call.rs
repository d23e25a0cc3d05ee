//! Two participants run a short metered consultation over the simulated
//! room, then both print the identical settled summary.
//!
//! ```bash
//! cargo run -p counsel-session-core --example two_party_call
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use counsel_infra_common::logging::LoggingConfig;
use counsel_ledger_core::{InMemoryLedger, Modality, SessionLedger, UserId};
use counsel_session_core::adapters::{SimulatedRoom, StaticTokenIssuer};
use counsel_session_core::{Role, SessionConfig, SessionController, UiEvent};

#[tokio::main]
async fn main() -> Result<()> {
    counsel_infra_common::logging::init_logging(&LoggingConfig::default())?;

    let ledger = Arc::new(InMemoryLedger::new());
    let client = UserId::new("alice");
    let provider = UserId::new("dr-bob");
    ledger.deposit(&client, 50).await;
    let record = ledger
        .create_session(&client, &provider, Modality::Video)
        .await?;
    println!("created {} ({} consulting {})", record.id, client, provider);

    // Short windows so the demo finishes in seconds: 2s debounce, 5s units
    // at 3 credits, a 2-credit connection fee.
    let config = SessionConfig::default()
        .with_debounce_window(Duration::from_secs(2))
        .with_billing_unit(Duration::from_secs(5))
        .with_unit_cost(3)
        .with_initial_fee(2)
        .with_low_balance_threshold(45);

    let (client_room, provider_room) = SimulatedRoom::pair();
    let issuer = Arc::new(StaticTokenIssuer::default());

    let mut client_side = SessionController::new(
        config.clone(),
        Role::Client,
        record.clone(),
        ledger.clone(),
        Arc::new(client_room),
        issuer.clone(),
    );
    let provider_side = SessionController::new(
        config,
        Role::Provider,
        record.clone(),
        ledger.clone(),
        Arc::new(provider_room),
        issuer,
    );

    let mut ui = client_side
        .take_ui_events()
        .ok_or_else(|| anyhow::anyhow!("ui events already taken"))?;
    tokio::spawn(async move {
        while let Some(event) = ui.recv().await {
            match event {
                UiEvent::Established => println!("[client] connected, billing started"),
                UiEvent::Tick { elapsed_seconds } => {
                    if elapsed_seconds % 5 == 0 {
                        println!("[client] {elapsed_seconds}s on the clock");
                    }
                }
                UiEvent::LowBalanceWarning { balance } => {
                    println!("[client] low balance: {balance} credits left");
                }
                UiEvent::Terminal(summary) => {
                    println!("[client] session over: {:?}", summary.end_reason);
                }
            }
        }
    });

    let handle = client_side.handle();
    let client_task = tokio::spawn(client_side.run());
    let provider_task = tokio::spawn(provider_side.run());

    // Let a couple of units complete, then the client hangs up.
    tokio::time::sleep(Duration::from_millis(13_500)).await;
    handle.hangup();

    let client_summary = client_task.await??;
    let provider_summary = provider_task.await??;
    assert_eq!(client_summary, provider_summary);

    println!(
        "settled: {} after {}s, {} credits to the provider",
        client_summary.status, client_summary.duration_seconds, client_summary.total_credits
    );
    println!(
        "balances: {} has {}, {} has {}",
        client,
        ledger.balance(&client).await?,
        provider,
        ledger.balance(&provider).await?
    );
    Ok(())
}
