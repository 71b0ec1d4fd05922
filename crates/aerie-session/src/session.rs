//! Session types: configuration, per-player state, and operation results.
//!
//! A flight "session" is the server's view of one player's purchased
//! flight. It tracks:
//! - WHETHER flight is running, banked, or neither ([`FlightState`])
//! - WHEN a running countdown ends
//! - HOW MUCH time is banked after an interruption

use std::time::Duration;

use aerie_protocol::Timestamp;
use aerie_tier::FlightTier;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// What to do with a deposit that would pass the top tier's threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OvershootPolicy {
    /// Refuse the deposit and report the exact amount that reaches the
    /// top tier, so the player can retry with it.
    #[default]
    Reject,
    /// Take only the amount that reaches the top tier.
    Clamp,
}

/// Tunables for the session state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Wait after a fresh activation's end before another fresh
    /// activation is allowed. Resuming banked time never starts one.
    ///
    /// Default: 10 minutes.
    pub cooldown: Duration,

    /// Handling of deposits past the top tier. Default: reject.
    pub overshoot: OvershootPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(600_000),
            overshoot: OvershootPolicy::Reject,
        }
    }
}

// ---------------------------------------------------------------------------
// FlightState
// ---------------------------------------------------------------------------

/// Where a player is in the flight lifecycle.
///
/// ```text
///          activate()              pause(reason)
///   Idle ─────────────→ Active ─────────────────→ Paused
///    ↑                   │  ↑                        │
///    │   expire (tick)   │  └────── resume() ────────┘
///    └───────────────────┘
/// ```
///
/// Cooldown is not a state: it is a timestamp gate on `activate()` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    /// No countdown, nothing banked.
    Idle,
    /// Flight is granted until `ends_at`.
    Active { ends_at: Timestamp },
    /// Flight was interrupted; `banked` is waiting to be resumed.
    Paused { banked: Duration },
}

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

/// A fresh activation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Activation {
    pub level: u32,
    pub duration: Duration,
    pub ends_at: Timestamp,
    pub cooldown_end: Timestamp,
}

/// Banked time put back on the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resumed {
    pub remaining: Duration,
    pub ends_at: Timestamp,
}

/// What `pause` did with the interrupted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    /// Remaining time was banked.
    Banked(Duration),
    /// Nothing was left to bank; the player is idle.
    Cleared,
}

/// An accepted deposit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepositReceipt {
    /// Amount actually taken (smaller than requested under `Clamp`).
    pub amount: f64,
    pub balance: f64,
    pub level: u32,
    /// `true` when this deposit raised the highest level ever reached.
    pub level_up: bool,
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Players whose running countdown reached its end.
    pub expired: Vec<aerie_protocol::PlayerId>,
    /// Players whose banked entry was empty and got dropped.
    pub cleared: Vec<aerie_protocol::PlayerId>,
}

impl Reconciliation {
    /// `true` when the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.cleared.is_empty()
    }
}

/// One row of the tier overview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierStatus {
    pub tier: FlightTier,
    pub unlocked: bool,
    pub current: bool,
}

/// Everything the info command shows.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightStatus {
    pub balance: f64,
    pub level: u32,
    pub max_level: u32,
    /// Amount still needed for the next tier; `None` at the top.
    pub next_level_amount: Option<f64>,
    pub tiers: Vec<TierStatus>,
    /// Time left on a running countdown.
    pub active_remaining: Option<Duration>,
    /// Time banked from an interruption.
    pub banked: Duration,
    /// Time until a fresh activation is allowed.
    pub cooldown_remaining: Duration,
}
