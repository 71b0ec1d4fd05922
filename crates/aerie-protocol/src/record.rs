//! The durable per-player flight record.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::time::duration_to_millis;
use crate::Timestamp;

/// Everything the server remembers about a player's flight between
/// restarts.
///
/// Field names on the wire are camelCase to match the persisted layout:
///
/// ```text
/// balance: f64, maxUnlockedLevel: u32, cooldownEnd: i64 (epoch ms),
/// flightActive: bool, flightEndTime: i64 (epoch ms),
/// pausedDurationRemaining: i64 (ms)
/// ```
///
/// Every field has a default so a partially-written or older record still
/// loads; a player who has never been seen gets `FlightRecord::default()`.
///
/// Invariant: `flight_active` and a positive `paused_duration_remaining`
/// are never both set. A session is running, banked, or neither.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlightRecord {
    /// Currency deposited so far. Only deposits change it.
    pub balance: f64,
    /// Highest tier level this player has ever reached.
    pub max_unlocked_level: u32,
    /// Fresh activations are refused before this instant.
    pub cooldown_end: Timestamp,
    /// Whether a countdown was running when the record was last written.
    pub flight_active: bool,
    /// When the running countdown ends. `Timestamp::ZERO` when inactive.
    pub flight_end_time: Timestamp,
    /// Banked milliseconds from an interrupted session.
    pub paused_duration_remaining: i64,
}

impl FlightRecord {
    /// Banked time as a `Duration`. Negative stored values read as zero.
    pub fn banked(&self) -> Duration {
        if self.paused_duration_remaining > 0 {
            Duration::from_millis(self.paused_duration_remaining as u64)
        } else {
            Duration::ZERO
        }
    }

    /// Stores banked time and clears the running countdown.
    pub fn bank(&mut self, remaining: Duration) {
        self.flight_active = false;
        self.flight_end_time = Timestamp::ZERO;
        self.paused_duration_remaining = duration_to_millis(remaining);
    }

    /// Starts a countdown ending at `end` and drops any banked time.
    pub fn start_countdown(&mut self, end: Timestamp) {
        self.flight_active = true;
        self.flight_end_time = end;
        self.paused_duration_remaining = 0;
    }

    /// Clears the running countdown without banking anything.
    pub fn stop_countdown(&mut self) {
        self.flight_active = false;
        self.flight_end_time = Timestamp::ZERO;
    }

    /// `true` when the running/banked invariant holds.
    pub fn is_consistent(&self) -> bool {
        !(self.flight_active && self.paused_duration_remaining > 0)
    }
}
