//! The session manager: every player's flight state in one place.
//!
//! This is the central piece of the session layer. It's responsible for:
//! - Turning deposits into unlocked tiers (and refusing overshoots)
//! - Starting fresh flights and stamping their cooldown
//! - Banking the remaining time when a flight is interrupted
//! - Putting banked time back on the clock
//! - Expiring finished flights during reconciliation
//! - Writing every change through to the durable record
//!
//! # Concurrency note
//!
//! `SessionManager` is NOT thread-safe by itself: it holds two plain
//! `HashMap`s and takes `&mut self` for every transition. It is owned by a
//! single task (the service actor) that receives commands and ticks one
//! at a time, so each "read record → mutate map → write record" sequence
//! runs to completion before anything else can observe the player.

use std::collections::HashMap;
use std::time::Duration;

use aerie_protocol::{FlightRecord, PlayerId, Timestamp};
use aerie_store::{SessionStore, StoreError};
use aerie_tier::TierTable;
use tracing::{debug, info, warn};

use crate::{
    Activation, BalanceLedger, DepositReceipt, FlightState, FlightStatus, OvershootPolicy,
    PauseOutcome, Reconciliation, Resumed, SessionConfig, SessionError, TierStatus,
};

/// Tracks running and banked flight for every online player.
///
/// ## Lifecycle
///
/// ```text
/// deposit() ──→ activate() ──→ pause() ──→ resume()/continue_flight()
///                   │             │               │
///                   ▼             ▼               ▼
///               [Active]      [Paused]        [Active]
///                   │                             │
///                   └──── reconcile() (end) ──────┘
///                                 │
///                                 ▼
///                              [Idle]
/// ```
pub struct SessionManager<S: SessionStore> {
    /// Running countdowns: player → absolute end time.
    ///
    /// Authoritative for "is flight granted right now". A player is in
    /// at most one of `active` and `paused`.
    active: HashMap<PlayerId, Timestamp>,

    /// Banked time from interrupted flights: player → remaining duration.
    paused: HashMap<PlayerId, Duration>,

    /// Tier thresholds and durations. Replaced whole on reload.
    tiers: TierTable,

    /// Cooldown and overshoot handling.
    config: SessionConfig,

    /// Durable records, written through on every transition.
    store: S,
}

impl<S: SessionStore> SessionManager<S> {
    /// Creates a manager with no sessions.
    pub fn new(store: S, tiers: TierTable, config: SessionConfig) -> Self {
        Self {
            active: HashMap::new(),
            paused: HashMap::new(),
            tiers,
            config,
            store,
        }
    }

    /// Swaps in a new tier table. Running and banked sessions keep their
    /// times; only future deposits and activations see the new tiers.
    pub fn set_tiers(&mut self, tiers: TierTable) {
        self.tiers = tiers;
    }

    /// Swaps in new tunables.
    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    /// The tier table in use.
    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    /// The tunables in use.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The durable store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // =====================================================================
    // Queries
    // =====================================================================

    /// The player's current state.
    pub fn state(&self, player_id: PlayerId) -> FlightState {
        if let Some(ends_at) = self.active.get(&player_id) {
            FlightState::Active { ends_at: *ends_at }
        } else if let Some(banked) = self.paused.get(&player_id) {
            FlightState::Paused { banked: *banked }
        } else {
            FlightState::Idle
        }
    }

    /// `true` if a countdown is running for the player.
    pub fn is_active(&self, player_id: PlayerId) -> bool {
        self.active.contains_key(&player_id)
    }

    /// Time left on the player's running countdown; zero if none.
    pub fn remaining(&self, player_id: PlayerId, now: Timestamp) -> Duration {
        self.active
            .get(&player_id)
            .map(|end| end.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Banked time held in memory for the player.
    pub fn banked(&self, player_id: PlayerId) -> Option<Duration> {
        self.paused.get(&player_id).copied()
    }

    /// Every running countdown with its remaining time, sorted by player.
    pub fn active_sessions(&self, now: Timestamp) -> Vec<(PlayerId, Duration)> {
        let mut sessions: Vec<_> = self
            .active
            .iter()
            .map(|(p, end)| (*p, end.saturating_duration_since(now)))
            .collect();
        sessions.sort_by_key(|(p, _)| *p);
        sessions
    }

    /// Number of running countdowns.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of banked sessions held in memory.
    pub fn paused_count(&self) -> usize {
        self.paused.len()
    }

    /// Snapshot for the info command.
    ///
    /// # Errors
    /// [`SessionError::Persistence`] if the record cannot be read.
    pub fn status(&self, player_id: PlayerId, now: Timestamp) -> Result<FlightStatus, SessionError> {
        let record = self.load(player_id)?;
        let level = self.tiers.level_for_balance(record.balance);

        let tiers = self
            .tiers
            .iter()
            .map(|tier| TierStatus {
                tier: *tier,
                unlocked: record.balance >= tier.min_balance,
                current: tier.level == level,
            })
            .collect();

        Ok(FlightStatus {
            balance: record.balance,
            level,
            max_level: self.tiers.max_level(),
            next_level_amount: self.tiers.amount_for_next_level(record.balance),
            tiers,
            active_remaining: self
                .active
                .get(&player_id)
                .map(|end| end.saturating_duration_since(now)),
            banked: self
                .paused
                .get(&player_id)
                .copied()
                .unwrap_or_else(|| record.banked()),
            cooldown_remaining: record.cooldown_end.saturating_duration_since(now),
        })
    }

    // =====================================================================
    // Transitions
    // =====================================================================

    /// Loads a joining player's banked time into memory.
    ///
    /// A record still marked active (the process stopped without a clean
    /// shutdown) is first converted into banked time for whatever was
    /// left of it at `now`.
    ///
    /// A banked entry still held in memory (see [`Self::release`]) wins
    /// over the record and is written back.
    ///
    /// Returns the banked time now held in memory, if any.
    ///
    /// # Errors
    /// [`SessionError::Persistence`] if the record cannot be read.
    pub fn hydrate(
        &mut self,
        player_id: PlayerId,
        now: Timestamp,
    ) -> Result<Option<Duration>, SessionError> {
        if self.active.contains_key(&player_id) {
            return Ok(None);
        }

        // Kept by a `release` whose write failed; newer than the record.
        if let Some(banked) = self.paused.get(&player_id).copied() {
            if !banked.is_zero() {
                self.write_banked(player_id, banked);
                debug!(%player_id, banked_ms = banked.as_millis() as u64, "banked flight kept in memory");
                return Ok(Some(banked));
            }
        }

        let mut record = self.load(player_id)?;

        if record.flight_active {
            let left = record.flight_end_time.saturating_duration_since(now);
            if left.is_zero() {
                record.stop_countdown();
            } else {
                record.bank(left.max(record.banked()));
            }
            warn!(
                %player_id,
                banked_ms = record.paused_duration_remaining,
                "recovered flight record left active by an unclean shutdown"
            );
            self.persist(player_id, &record);
        }

        let banked = record.banked();
        if banked.is_zero() {
            self.paused.remove(&player_id);
            return Ok(None);
        }

        self.paused.insert(player_id, banked);
        debug!(%player_id, banked_ms = banked.as_millis() as u64, "banked flight hydrated");
        Ok(Some(banked))
    }

    /// Starts a fresh flight at the player's current tier.
    ///
    /// Checks run in this order, and the first failure is returned:
    /// economy available, balance deposited, a tier unlocked, nothing
    /// banked, cooldown over, zone allowed, not already active.
    ///
    /// On success the countdown ends at `now + tier duration` and the
    /// cooldown at that end plus the configured cooldown window.
    ///
    /// # Errors
    /// Any of the expected [`SessionError`] outcomes above, or
    /// [`SessionError::Persistence`] if the record cannot be read.
    pub fn activate(
        &mut self,
        player_id: PlayerId,
        zone_allowed: bool,
        ledger: &dyn BalanceLedger,
        now: Timestamp,
    ) -> Result<Activation, SessionError> {
        if !ledger.is_available() {
            return Err(SessionError::EconomyUnavailable);
        }

        let mut record = self.load(player_id)?;

        if record.balance <= 0.0 {
            return Err(SessionError::NoBalance);
        }

        let level = self.tiers.level_for_balance(record.balance);
        let tier = match self.tiers.tier(level) {
            Some(tier) if level > 0 => *tier,
            _ => return Err(SessionError::InsufficientFunds),
        };

        let banked = self
            .paused
            .get(&player_id)
            .copied()
            .unwrap_or_else(|| record.banked());
        if !banked.is_zero() {
            return Err(SessionError::BankedTimeAvailable { remaining: banked });
        }

        if now < record.cooldown_end {
            return Err(SessionError::CooldownActive {
                remaining: record.cooldown_end.saturating_duration_since(now),
            });
        }

        if !zone_allowed {
            return Err(SessionError::ZoneNotAllowed);
        }

        if self.active.contains_key(&player_id) {
            return Err(SessionError::AlreadyActive);
        }

        let duration = tier.duration();
        let ends_at = now + duration;
        let cooldown_end = ends_at + self.config.cooldown;

        self.active.insert(player_id, ends_at);
        record.start_countdown(ends_at);
        record.cooldown_end = cooldown_end;
        self.persist(player_id, &record);

        info!(%player_id, level, duration_s = duration.as_secs(), "flight activated");
        Ok(Activation {
            level,
            duration,
            ends_at,
            cooldown_end,
        })
    }

    /// Interrupts the player's flight.
    ///
    /// Whatever is left of a running countdown is banked. If nothing is
    /// left (the countdown already hit its end, or there was none) the
    /// player goes straight to idle; any time banked earlier is kept.
    ///
    /// The in-memory transition always happens. A record that cannot be
    /// read or written is logged and left for the next write to fix.
    pub fn pause(&mut self, player_id: PlayerId, now: Timestamp) -> PauseOutcome {
        let remaining = self
            .active
            .remove(&player_id)
            .map(|end| end.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);

        let outcome = if remaining.is_zero() {
            PauseOutcome::Cleared
        } else {
            self.paused.insert(player_id, remaining);
            PauseOutcome::Banked(remaining)
        };

        match self.load(player_id) {
            Ok(mut record) => {
                let before = record.clone();
                match outcome {
                    PauseOutcome::Banked(left) => record.bank(left),
                    PauseOutcome::Cleared => record.stop_countdown(),
                }
                if record != before {
                    self.persist(player_id, &record);
                }
            }
            Err(e) => warn!(
                %player_id,
                error = %e,
                "could not read flight record while pausing; in-memory state kept"
            ),
        }

        info!(
            %player_id,
            banked_ms = remaining.as_millis() as u64,
            "flight paused"
        );
        outcome
    }

    /// Puts the player's banked time back on the clock.
    ///
    /// The cooldown is left alone: resuming is not a fresh activation.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyActive`] — a countdown is running (a
    ///   repeated resume is a no-op)
    /// - [`SessionError::NoBankedTime`] — nothing to resume
    /// - [`SessionError::Persistence`] — record unreadable, nothing changed
    pub fn resume(&mut self, player_id: PlayerId, now: Timestamp) -> Result<Resumed, SessionError> {
        if self.active.contains_key(&player_id) {
            return Err(SessionError::AlreadyActive);
        }

        let mut record = self.load(player_id)?;
        let banked = match self.paused.get(&player_id) {
            Some(banked) => *banked,
            None => record.banked(),
        };
        if banked.is_zero() {
            return Err(SessionError::NoBankedTime);
        }

        let ends_at = now + banked;
        self.paused.remove(&player_id);
        self.active.insert(player_id, ends_at);
        record.start_countdown(ends_at);
        self.persist(player_id, &record);

        info!(%player_id, remaining_ms = banked.as_millis() as u64, "flight resumed");
        Ok(Resumed {
            remaining: banked,
            ends_at,
        })
    }

    /// The player-issued "continue": resume, but only in an allowed zone.
    ///
    /// # Errors
    /// [`SessionError::ZoneNotAllowed`], then anything [`resume`](Self::resume)
    /// returns.
    pub fn continue_flight(
        &mut self,
        player_id: PlayerId,
        zone_allowed: bool,
        now: Timestamp,
    ) -> Result<Resumed, SessionError> {
        if !zone_allowed {
            return Err(SessionError::ZoneNotAllowed);
        }
        self.resume(player_id, now)
    }

    /// Moves currency from the ledger into the player's flight balance.
    ///
    /// A deposit that would carry the balance past the top tier's
    /// threshold is refused with the exact shortfall (or clamped to it,
    /// under [`OvershootPolicy::Clamp`]). Deposits never change whether a
    /// flight is running or banked.
    ///
    /// # Errors
    /// - [`SessionError::InvalidAmount`] — not a positive number
    /// - [`SessionError::EconomyUnavailable`] — no currency backend
    /// - [`SessionError::MaxLevelReached`] — the top tier is unlocked
    /// - [`SessionError::DepositOvershoot`] — too much, retry with `shortfall`
    /// - [`SessionError::InsufficientFunds`] — the ledger refused
    /// - [`SessionError::Persistence`] — record unreadable, nothing changed
    pub fn deposit(
        &mut self,
        player_id: PlayerId,
        amount: f64,
        ledger: &dyn BalanceLedger,
    ) -> Result<DepositReceipt, SessionError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(SessionError::InvalidAmount(amount));
        }
        if !ledger.is_available() {
            return Err(SessionError::EconomyUnavailable);
        }

        let mut record = self.load(player_id)?;
        let current_level = self.tiers.level_for_balance(record.balance);
        let max_level = self.tiers.max_level();

        if current_level >= max_level {
            return Err(SessionError::MaxLevelReached { level: max_level });
        }

        let shortfall = self
            .tiers
            .shortfall_to_max(record.balance)
            .unwrap_or(0.0);
        if shortfall <= 0.0 {
            return Err(SessionError::MaxLevelReached { level: max_level });
        }

        let amount = if amount > shortfall {
            match self.config.overshoot {
                OvershootPolicy::Reject => {
                    return Err(SessionError::DepositOvershoot { shortfall });
                }
                OvershootPolicy::Clamp => shortfall,
            }
        } else {
            amount
        };

        if !ledger.has_funds(player_id, amount) || !ledger.withdraw(player_id, amount) {
            return Err(SessionError::InsufficientFunds);
        }

        // `x + (top - x)` can round just below `top`.
        record.balance = match self.tiers.top_tier() {
            Some(top) if amount >= shortfall => top.min_balance,
            _ => record.balance + amount,
        };
        let level = self.tiers.level_for_balance(record.balance);
        let level_up = level > record.max_unlocked_level;
        if level_up {
            record.max_unlocked_level = level;
        }
        self.persist(player_id, &record);

        info!(%player_id, amount, balance = record.balance, level, "flight deposit accepted");
        Ok(DepositReceipt {
            amount,
            balance: record.balance,
            level,
            level_up,
        })
    }

    /// Drops a departing player's banked entry from memory once the
    /// durable record holds the same banked time.
    ///
    /// If the record cannot be brought up to date (an earlier write
    /// failed and the retry fails too), the entry is kept so the next
    /// join restores it. Returns `true` if nothing is left in memory.
    pub fn release(&mut self, player_id: PlayerId) -> bool {
        let Some(banked) = self.paused.get(&player_id).copied() else {
            return true;
        };
        if !self.write_banked(player_id, banked) {
            warn!(
                %player_id,
                banked_ms = banked.as_millis() as u64,
                "banked flight not durable, kept in memory"
            );
            return false;
        }
        self.paused.remove(&player_id);
        debug!(%player_id, "banked flight released from memory");
        true
    }

    /// One reconciliation pass.
    ///
    /// 1. Every countdown at or past its end is removed and its record
    ///    marked inactive.
    /// 2. Every banked entry holding zero time is removed and its record's
    ///    banked field zeroed.
    ///
    /// Records already in the target shape are not rewritten, so running
    /// the pass twice changes nothing the second time.
    pub fn reconcile(&mut self, now: Timestamp) -> Reconciliation {
        let mut expired: Vec<PlayerId> = self
            .active
            .iter()
            .filter(|(_, end)| now >= **end)
            .map(|(p, _)| *p)
            .collect();
        expired.sort();

        for player_id in &expired {
            self.active.remove(player_id);
            self.rewrite_if(*player_id, |record| {
                if record.flight_active || record.flight_end_time != Timestamp::ZERO {
                    record.stop_countdown();
                    true
                } else {
                    false
                }
            });
            info!(%player_id, "flight expired");
        }

        let mut cleared: Vec<PlayerId> = self
            .paused
            .iter()
            .filter(|(_, banked)| banked.is_zero())
            .map(|(p, _)| *p)
            .collect();
        cleared.sort();

        for player_id in &cleared {
            self.paused.remove(player_id);
            self.rewrite_if(*player_id, |record| {
                if record.paused_duration_remaining != 0 {
                    record.paused_duration_remaining = 0;
                    true
                } else {
                    false
                }
            });
            debug!(%player_id, "empty banked flight cleared");
        }

        Reconciliation { expired, cleared }
    }

    /// Pauses every running countdown. Used on shutdown so no flight
    /// outlives the process.
    pub fn suspend_all(&mut self, now: Timestamp) -> Vec<(PlayerId, PauseOutcome)> {
        let mut players: Vec<PlayerId> = self.active.keys().copied().collect();
        players.sort();
        players
            .into_iter()
            .map(|player_id| (player_id, self.pause(player_id, now)))
            .collect()
    }

    // =====================================================================
    // Record access
    // =====================================================================

    fn load(&self, player_id: PlayerId) -> Result<FlightRecord, StoreError> {
        self.store.load(player_id)
    }

    /// Writes a record; a failed write is logged and the in-memory
    /// transition stands. Returns `true` if the write landed.
    fn persist(&self, player_id: PlayerId, record: &FlightRecord) -> bool {
        debug_assert!(record.is_consistent(), "record both active and banked");
        match self.store.save(player_id, record) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    %player_id,
                    error = %e,
                    "failed to persist flight record; in-memory state stays authoritative"
                );
                false
            }
        }
    }

    /// Makes the record hold exactly `banked`. Returns `true` once the
    /// record on disk matches.
    fn write_banked(&self, player_id: PlayerId, banked: Duration) -> bool {
        match self.load(player_id) {
            Ok(mut record) => {
                if !record.flight_active && record.banked() == banked {
                    return true;
                }
                record.bank(banked);
                self.persist(player_id, &record)
            }
            Err(e) => {
                warn!(%player_id, error = %e, "could not read flight record to bank time");
                false
            }
        }
    }

    /// Loads, applies `edit`, and saves only if `edit` reports a change.
    fn rewrite_if(&self, player_id: PlayerId, edit: impl FnOnce(&mut FlightRecord) -> bool) {
        match self.load(player_id) {
            Ok(mut record) => {
                if edit(&mut record) {
                    self.persist(player_id, &record);
                }
            }
            Err(e) => warn!(
                %player_id,
                error = %e,
                "could not read flight record during reconciliation"
            ),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
