use std::time::Duration;

use aerie::prelude::*;

// ---------------------------------------------------------------------------
// Host stand-ins
// ---------------------------------------------------------------------------

/// Prints every notice the way a chat line would look.
struct ChatNotifier;

impl Notifier for ChatNotifier {
    fn notify(&self, player: PlayerId, notice: &Notice) {
        if matches!(notice, Notice::StatusBar { .. }) {
            tracing::debug!(%player, "{notice}");
        } else {
            tracing::info!(%player, "{notice}");
        }
    }
}

// Short tiers so the whole script runs in a few seconds.
const CONFIG: &str = r#"
cooldown_ms = 2000
worlds = ["overworld"]
reconcile_interval_ms = 250
status_interval_ms = 1000

[tiers.1]
cost = 100
duration = 3

[tiers.2]
cost = 250
duration = 6

[speeds]
1 = 0.1
2 = 0.25
"#;

#[tokio::main]
async fn main() -> Result<(), AerieError> {
    aerie::init_tracing();

    let mut config = AerieConfig::from_toml_str(CONFIG)?;
    config.data_dir = std::env::temp_dir().join("aerie-flight-sim");
    let store = JsonFileStore::open(&config.data_dir)?;

    let ledger = InMemoryLedger::new("¤");
    let alice = PlayerId::new_v4();
    let bob = PlayerId::new_v4();
    ledger.credit(alice, 1_000.0);

    let caps = CapabilitySet::new();
    let flight = FlightService::builder(config).start(store, ledger, caps.clone(), ChatNotifier);

    // Deposit, overshoot, then top up to the exact shortfall.
    flight.join(alice, "overworld").await?;
    flight.deposit(alice, 120.0).await?;
    if let Err(AerieError::Session(SessionError::DepositOvershoot { shortfall })) =
        flight.deposit(alice, 500.0).await
    {
        flight.deposit(alice, shortfall).await?;
    }

    // Fly, get interrupted by combat, continue.
    flight.activate(alice, "overworld").await?;
    flight.set_speed(alice, "overworld", 2).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    flight.combat(bob, alice).await?;
    tracing::info!(granted = caps.is_granted(alice), "after combat");

    flight.continue_flight(alice, "overworld").await?;

    // Leave mid-flight and come back in a zone without flight.
    tokio::time::sleep(Duration::from_secs(1)).await;
    flight.quit(alice).await?;
    flight.join(alice, "nether").await?;
    flight.world_change(alice, "overworld").await?;
    flight.continue_flight(alice, "overworld").await?;

    // Let it run out.
    tokio::time::sleep(Duration::from_secs(6)).await;

    let status = flight.info(alice).await?;
    tracing::info!(
        balance = status.balance,
        level = status.level,
        cooldown = %aerie::protocol::format_duration(status.cooldown_remaining),
        "final status"
    );

    flight.stop().await;
    Ok(())
}
