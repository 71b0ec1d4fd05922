//! End-to-end tests for the flight service.
//!
//! Every test runs the real actor with in-memory collaborators. Flight
//! timestamps come from a `ManualClock`; tick timing from Tokio's paused
//! clock, which auto-advances whenever the runtime is idle.

use std::sync::Arc;
use std::time::Duration;

use aerie::prelude::*;

// =========================================================================
// Helpers
// =========================================================================

const T0: Timestamp = Timestamp(1_700_000_000_000);
const ALLOWED: &str = "world";
const FORBIDDEN: &str = "world_the_end";

struct Harness {
    handle: FlightHandle,
    clock: ManualClock,
    store: MemoryStore,
    ledger: Arc<InMemoryLedger>,
    caps: CapabilitySet,
    notices: NoticeLog,
}

fn pid(n: u128) -> PlayerId {
    PlayerId::from_u128(n)
}

fn config() -> AerieConfig {
    AerieConfig {
        zones: ZonePolicy::only([ALLOWED]),
        status_interval: Duration::ZERO,
        ..AerieConfig::default()
    }
}

fn start_with(config: AerieConfig) -> Harness {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let ledger = Arc::new(InMemoryLedger::new("$"));
    let caps = CapabilitySet::new();
    let notices = NoticeLog::new();

    let handle = FlightService::builder(config).clock(clock.clone()).start(
        store.clone(),
        ledger.clone(),
        caps.clone(),
        notices.clone(),
    );

    Harness {
        handle,
        clock,
        store,
        ledger,
        caps,
        notices,
    }
}

fn start() -> Harness {
    start_with(config())
}

/// Player 1 funded with 60 000 (level 1: 120 s flights) and joined.
async fn funded() -> Harness {
    let h = start();
    h.ledger.credit(pid(1), 1_000_000.0);
    h.handle.join(pid(1), ALLOWED).await.unwrap();
    h.handle.deposit(pid(1), 60_000.0).await.unwrap();
    h.notices.take();
    h
}

/// Long enough for at least one reconciliation tick.
async fn let_reconcile_run() {
    tokio::time::sleep(Duration::from_millis(1_100)).await;
}

// =========================================================================
// Deposit and activation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_deposit_then_activate_then_cooldown() {
    let h = start();
    h.ledger.credit(pid(1), 1_000_000.0);

    let receipt = h.handle.deposit(pid(1), 60_000.0).await.unwrap();
    assert_eq!(receipt.level, 1);
    assert_eq!(
        h.notices.for_player(pid(1)),
        vec![
            Notice::Deposited {
                amount: 60_000.0,
                balance: 60_000.0,
                level: 1,
                currency: "$".into(),
            },
            Notice::LevelUp { level: 1 },
        ]
    );
    h.notices.take();

    let activation = h.handle.activate(pid(1), ALLOWED).await.unwrap();
    assert_eq!(activation.duration, Duration::from_secs(120));
    assert_eq!(activation.ends_at, T0 + Duration::from_secs(120));
    assert_eq!(
        activation.cooldown_end,
        T0 + Duration::from_secs(120) + Duration::from_millis(600_000)
    );
    assert!(h.caps.is_granted(pid(1)));

    let again = h.handle.activate(pid(1), ALLOWED).await;
    assert!(matches!(
        again,
        Err(AerieError::Session(SessionError::CooldownActive { .. }))
    ));
    assert_eq!(
        h.notices.for_player(pid(1)),
        vec![
            Notice::Activated {
                level: 1,
                duration: Duration::from_secs(120)
            },
            Notice::CooldownActive {
                remaining: Duration::from_secs(720)
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_deposit_overshoot_suggests_shortfall() {
    let h = start();
    h.ledger.credit(pid(1), 1_000_000.0);

    let result = h.handle.deposit(pid(1), 250_000.0).await;

    assert!(matches!(
        result,
        Err(AerieError::Session(SessionError::DepositOvershoot { shortfall })) if shortfall == 200_000.0
    ));
    assert_eq!(
        h.notices.last(pid(1)),
        Some(Notice::DepositSuggestion {
            shortfall: 200_000.0,
            currency: "$".into()
        })
    );

    let receipt = h.handle.deposit(pid(1), 200_000.0).await.unwrap();
    assert_eq!(receipt.level, 3);
}

#[tokio::test(start_paused = true)]
async fn test_activate_in_forbidden_zone_refused() {
    let h = funded().await;

    let result = h.handle.activate(pid(1), FORBIDDEN).await;

    assert!(matches!(
        result,
        Err(AerieError::Session(SessionError::ZoneNotAllowed))
    ));
    assert!(!h.caps.is_granted(pid(1)));
    assert_eq!(h.notices.last(pid(1)), Some(Notice::ZoneNotAllowed));
}

#[tokio::test(start_paused = true)]
async fn test_activate_without_deposit_reports_no_balance() {
    let h = start();

    let result = h.handle.activate(pid(1), ALLOWED).await;

    assert!(matches!(result, Err(AerieError::Session(SessionError::NoBalance))));
    assert_eq!(h.notices.last(pid(1)), Some(Notice::NoBalance));
}

// =========================================================================
// Interruptions
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_combat_banks_time_and_continue_restores_it() {
    let h = funded().await;
    h.handle.activate(pid(1), ALLOWED).await.unwrap();
    h.clock.advance(Duration::from_secs(30));

    h.handle.combat(pid(2), pid(1)).await.unwrap();

    assert!(!h.caps.is_granted(pid(1)));
    assert_eq!(
        h.notices.last(pid(1)),
        Some(Notice::Paused {
            reason: PauseReason::Combat,
            remaining: Duration::from_secs(90)
        })
    );
    let record = h.store.get(pid(1)).unwrap();
    assert!(!record.flight_active);
    assert_eq!(record.paused_duration_remaining, 90_000);
    assert!(h.notices.for_player(pid(2)).is_empty(), "attacker was not flying");

    h.clock.advance(Duration::from_secs(100));
    let resumed = h.handle.continue_flight(pid(1), ALLOWED).await.unwrap();

    assert_eq!(resumed.ends_at, T0 + Duration::from_secs(220));
    assert!(h.caps.is_granted(pid(1)));
    assert_eq!(
        h.notices.last(pid(1)),
        Some(Notice::Continued {
            remaining: Duration::from_secs(90)
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_continue_without_banked_time() {
    let h = funded().await;

    let result = h.handle.continue_flight(pid(1), ALLOWED).await;

    assert!(matches!(result, Err(AerieError::Session(SessionError::NoBankedTime))));
    assert_eq!(h.notices.last(pid(1)), Some(Notice::NoBankedTime));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_continues_only_one_wins() {
    let h = funded().await;
    h.handle.activate(pid(1), ALLOWED).await.unwrap();
    h.handle.combat(pid(1), pid(1)).await.unwrap();

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let handle = h.handle.clone();
            tokio::spawn(async move { handle.continue_flight(pid(1), ALLOWED).await })
        })
        .collect();

    let mut wins = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => wins += 1,
            Err(AerieError::Session(SessionError::AlreadyActive)) => {}
            Err(other) => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(wins, 1);
    assert!(matches!(
        h.handle.state(pid(1)).await.unwrap(),
        FlightState::Active { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_world_change_to_forbidden_zone_pauses() {
    let h = funded().await;
    h.handle.activate(pid(1), ALLOWED).await.unwrap();
    h.clock.advance(Duration::from_secs(20));

    let outcome = h.handle.world_change(pid(1), FORBIDDEN).await.unwrap();

    assert_eq!(outcome, Some(PauseOutcome::Banked(Duration::from_secs(100))));
    assert!(!h.caps.is_granted(pid(1)));
    assert_eq!(
        h.notices.last(pid(1)),
        Some(Notice::Paused {
            reason: PauseReason::WorldChange,
            remaining: Duration::from_secs(100)
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_world_change_to_allowed_zone_does_nothing() {
    let h = funded().await;
    h.handle.activate(pid(1), ALLOWED).await.unwrap();

    let outcome = h.handle.world_change(pid(1), ALLOWED).await.unwrap();

    assert_eq!(outcome, None);
    assert!(h.caps.is_granted(pid(1)));
}

#[tokio::test(start_paused = true)]
async fn test_world_change_with_open_zone_policy_does_nothing() {
    let h = start_with(AerieConfig {
        zones: ZonePolicy::allow_all(),
        ..config()
    });
    h.ledger.credit(pid(1), 100_000.0);
    h.handle.deposit(pid(1), 60_000.0).await.unwrap();
    h.handle.activate(pid(1), "anywhere").await.unwrap();

    assert_eq!(h.handle.world_change(pid(1), "elsewhere").await.unwrap(), None);
    assert!(h.caps.is_granted(pid(1)));
}

#[tokio::test(start_paused = true)]
async fn test_world_change_revokes_raw_capability() {
    let h = start();
    h.caps.grant(pid(1));

    let outcome = h.handle.world_change(pid(1), FORBIDDEN).await.unwrap();

    assert_eq!(outcome, Some(PauseOutcome::Cleared));
    assert!(!h.caps.is_granted(pid(1)));
    assert_eq!(
        h.notices.last(pid(1)),
        Some(Notice::Disabled {
            reason: PauseReason::WorldChange
        })
    );
}

// =========================================================================
// Join / quit
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_quit_then_join_restores_banked_time() {
    let h = funded().await;
    h.handle.activate(pid(1), ALLOWED).await.unwrap();
    h.clock.advance(Duration::from_secs(45));

    let outcome = h.handle.quit(pid(1)).await.unwrap();
    assert_eq!(outcome, Some(PauseOutcome::Banked(Duration::from_secs(75))));
    assert_eq!(h.handle.state(pid(1)).await.unwrap(), FlightState::Idle);
    assert!(h.notices.for_player(pid(1)).iter().all(|n| !matches!(n, Notice::Paused { .. })));

    h.clock.advance(Duration::from_secs(3_600));
    let joined = h.handle.join(pid(1), ALLOWED).await.unwrap();

    let JoinOutcome::Restored(resumed) = joined else {
        panic!("expected restore, got {joined:?}");
    };
    assert_eq!(resumed.remaining, Duration::from_secs(75));
    assert!(h.caps.is_granted(pid(1)));
    assert_eq!(
        h.notices.last(pid(1)),
        Some(Notice::Restored {
            remaining: Duration::from_secs(75)
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_join_in_forbidden_zone_waits_and_revokes() {
    let h = start();
    h.store.insert(
        pid(1),
        FlightRecord {
            paused_duration_remaining: 50_000,
            ..FlightRecord::default()
        },
    );
    h.caps.grant(pid(1));

    let joined = h.handle.join(pid(1), FORBIDDEN).await.unwrap();

    assert_eq!(joined, JoinOutcome::Waiting(Duration::from_secs(50)));
    assert!(!h.caps.is_granted(pid(1)));
    assert_eq!(
        h.notices.last(pid(1)),
        Some(Notice::SavedComeBack {
            remaining: Duration::from_secs(50)
        })
    );
    assert_eq!(
        h.handle.state(pid(1)).await.unwrap(),
        FlightState::Paused {
            banked: Duration::from_secs(50)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_join_in_forbidden_zone_banks_running_flight() {
    let h = funded().await;
    h.handle.activate(pid(1), ALLOWED).await.unwrap();
    h.clock.advance(Duration::from_secs(20));

    let joined = h.handle.join(pid(1), FORBIDDEN).await.unwrap();

    assert_eq!(joined, JoinOutcome::Waiting(Duration::from_secs(100)));
    assert!(!h.caps.is_granted(pid(1)));
    assert_eq!(
        h.handle.state(pid(1)).await.unwrap(),
        FlightState::Paused {
            banked: Duration::from_secs(100)
        }
    );
    assert_eq!(
        h.notices.last(pid(1)),
        Some(Notice::SavedComeBack {
            remaining: Duration::from_secs(100)
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_join_recovers_record_left_active() {
    let h = start();
    h.store.insert(
        pid(1),
        FlightRecord {
            balance: 60_000.0,
            flight_active: true,
            flight_end_time: T0 + Duration::from_secs(40),
            ..FlightRecord::default()
        },
    );

    let joined = h.handle.join(pid(1), ALLOWED).await.unwrap();

    let JoinOutcome::Restored(resumed) = joined else {
        panic!("expected restore, got {joined:?}");
    };
    assert_eq!(resumed.remaining, Duration::from_secs(40));
}

#[tokio::test(start_paused = true)]
async fn test_join_with_nothing_banked_is_idle() {
    let h = start();
    assert_eq!(h.handle.join(pid(1), ALLOWED).await.unwrap(), JoinOutcome::Idle);
    assert!(h.notices.take().is_empty());
}

// =========================================================================
// Periodic jobs
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_reconcile_tick_expires_flight() {
    let h = funded().await;
    h.handle.activate(pid(1), ALLOWED).await.unwrap();

    h.clock.advance(Duration::from_secs(120));
    let_reconcile_run().await;

    assert_eq!(h.handle.state(pid(1)).await.unwrap(), FlightState::Idle);
    assert!(!h.caps.is_granted(pid(1)));
    assert_eq!(h.notices.last(pid(1)), Some(Notice::Expired));
    assert!(!h.store.get(pid(1)).unwrap().flight_active);

    let saves = h.store.save_count();
    let_reconcile_run().await;
    assert_eq!(h.store.save_count(), saves, "second pass writes nothing");
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_tick_leaves_running_flight() {
    let h = funded().await;
    h.handle.activate(pid(1), ALLOWED).await.unwrap();

    h.clock.advance(Duration::from_secs(119));
    let_reconcile_run().await;

    assert!(matches!(
        h.handle.state(pid(1)).await.unwrap(),
        FlightState::Active { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_status_refresh_reports_remaining_time() {
    let h = start_with(AerieConfig {
        status_interval: Duration::from_millis(500),
        ..config()
    });
    h.ledger.credit(pid(1), 100_000.0);
    h.handle.deposit(pid(1), 60_000.0).await.unwrap();
    h.handle.activate(pid(1), ALLOWED).await.unwrap();
    h.clock.advance(Duration::from_secs(10));
    h.notices.take();

    tokio::time::sleep(Duration::from_millis(600)).await;

    assert!(h.notices.for_player(pid(1)).contains(&Notice::StatusBar {
        remaining: Duration::from_secs(110)
    }));
}

// =========================================================================
// Info, speed, reload
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_info_reports_balance_and_levels() {
    let h = funded().await;

    let status = h.handle.info(pid(1)).await.unwrap();

    assert_eq!(status.balance, 60_000.0);
    assert_eq!(status.level, 1);
    assert_eq!(status.next_level_amount, Some(40_000.0));
    assert_eq!(status.tiers.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_set_speed_applies_configured_speed() {
    let h = start();

    let speed = h.handle.set_speed(pid(1), ALLOWED, 2).await.unwrap();

    assert_eq!(speed, 0.2);
    assert_eq!(h.caps.speed(pid(1)), Some(0.2));
    assert_eq!(
        h.notices.last(pid(1)),
        Some(Notice::SpeedSet { level: 2, speed: 0.2 })
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_speed_unknown_level_lists_available() {
    let h = start();

    let result = h.handle.set_speed(pid(1), ALLOWED, 9).await;

    assert!(matches!(result, Err(AerieError::UnknownSpeed { level: 9, .. })));
    assert_eq!(
        h.notices.last(pid(1)),
        Some(Notice::UnknownSpeed {
            level: 9,
            available: vec![1, 2, 3]
        })
    );
    assert_eq!(h.caps.speed(pid(1)), None);
}

#[tokio::test(start_paused = true)]
async fn test_set_speed_in_forbidden_zone_refused() {
    let h = start();

    let result = h.handle.set_speed(pid(1), FORBIDDEN, 1).await;

    assert!(matches!(
        result,
        Err(AerieError::Session(SessionError::ZoneNotAllowed))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reload_keeps_running_sessions() {
    let h = funded().await;
    let activation = h.handle.activate(pid(1), ALLOWED).await.unwrap();

    let reloaded = AerieConfig::from_toml_str(
        r#"
        cooldown_ms = 0
        status_interval_ms = 0

        [tiers.1]
        cost = 10
        duration = 5
        "#,
    )
    .unwrap();
    h.handle.reload(reloaded).await.unwrap();

    assert_eq!(
        h.handle.state(pid(1)).await.unwrap(),
        FlightState::Active {
            ends_at: activation.ends_at
        }
    );
    let status = h.handle.info(pid(1)).await.unwrap();
    assert_eq!(status.max_level, 1);
    // Every zone is allowed after the reload.
    assert!(h.handle.set_speed(pid(1), FORBIDDEN, 1).await.is_ok());
}

// =========================================================================
// Persistence
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_writes_keep_service_running() {
    let h = funded().await;
    h.store.set_fail_saves(true);

    h.handle.activate(pid(1), ALLOWED).await.unwrap();

    assert!(h.caps.is_granted(pid(1)));
    assert!(matches!(
        h.handle.state(pid(1)).await.unwrap(),
        FlightState::Active { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_quit_after_failed_write_keeps_banked_time() {
    let h = funded().await;
    h.handle.activate(pid(1), ALLOWED).await.unwrap();
    h.clock.advance(Duration::from_secs(30));
    h.store.set_fail_saves(true);

    let outcome = h.handle.quit(pid(1)).await.unwrap();
    assert_eq!(outcome, Some(PauseOutcome::Banked(Duration::from_secs(90))));
    assert_eq!(
        h.handle.state(pid(1)).await.unwrap(),
        FlightState::Paused {
            banked: Duration::from_secs(90)
        }
    );

    h.store.set_fail_saves(false);
    h.clock.advance(Duration::from_secs(600));
    let joined = h.handle.join(pid(1), ALLOWED).await.unwrap();

    let JoinOutcome::Restored(resumed) = joined else {
        panic!("expected restore, got {joined:?}");
    };
    assert_eq!(resumed.remaining, Duration::from_secs(90));
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_record_reports_unavailable() {
    let h = funded().await;
    h.store.set_fail_loads(true);

    let result = h.handle.activate(pid(1), ALLOWED).await;

    assert!(matches!(
        result,
        Err(AerieError::Session(SessionError::Persistence(_)))
    ));
    assert_eq!(h.notices.last(pid(1)), Some(Notice::Unavailable));
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_banks_every_active_flight() {
    let h = funded().await;
    h.handle.activate(pid(1), ALLOWED).await.unwrap();
    h.clock.advance(Duration::from_secs(20));

    h.handle.stop().await;

    let record = h.store.get(pid(1)).unwrap();
    assert!(!record.flight_active);
    assert_eq!(record.paused_duration_remaining, 100_000);
    assert!(!h.caps.is_granted(pid(1)));
    assert_eq!(
        h.notices.last(pid(1)),
        Some(Notice::Paused {
            reason: PauseReason::Shutdown,
            remaining: Duration::from_secs(100)
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_twice_is_harmless() {
    let h = start();

    h.handle.stop().await;
    h.handle.stop().await;

    assert!(h.handle.is_closed());
    assert!(matches!(
        h.handle.info(pid(1)).await,
        Err(AerieError::ServiceUnavailable)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_flushes_flights() {
    let h = funded().await;
    h.handle.activate(pid(1), ALLOWED).await.unwrap();
    let Harness { handle, store, .. } = h;

    drop(handle);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let record = store.get(pid(1)).unwrap();
    assert!(!record.flight_active);
    assert_eq!(record.paused_duration_remaining, 120_000);
}
