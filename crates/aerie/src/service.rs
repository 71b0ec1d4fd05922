//! Flight service actor: one Tokio task that owns every flight session.
//!
//! Host events (join, quit, combat, zone change), player commands
//! (activate, continue, deposit, info, speed) and the two periodic jobs
//! all reach the [`SessionManager`] through this actor. Commands arrive
//! over a bounded channel and the schedulers are branches of the same
//! `select!` loop, so every read-modify-persist sequence for a player
//! finishes before the next message is looked at.

use std::sync::Arc;
use std::time::Duration;

use aerie_protocol::{Clock, Notice, PauseReason, PlayerId, SystemClock, ZoneId};
use aerie_session::{
    Activation, BalanceLedger, DepositReceipt, FlightState, FlightStatus, PauseOutcome, Resumed,
    SessionError, SessionManager,
};
use aerie_store::SessionStore;
use aerie_tick::{TickConfig, TickScheduler};
use aerie_tier::SpeedTable;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{AerieConfig, AerieError, FlightCapability, Notifier, ZonePolicy};

/// Default bound of the command channel.
pub const DEFAULT_CHANNEL_SIZE: usize = 256;

type Reply<T> = oneshot::Sender<Result<T, AerieError>>;

/// What happened to a player's banked time when they joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Nothing banked.
    Idle,
    /// Banked time was put back on the clock.
    Restored(Resumed),
    /// Banked time is waiting for the player to reach an allowed zone.
    Waiting(Duration),
    /// Banked time exists but resuming it failed.
    RestoreFailed,
}

/// Commands sent to the service actor.
///
/// Every variant carries a reply channel; the caller awaits the outcome.
pub(crate) enum FlightCommand {
    Join {
        player_id: PlayerId,
        zone: ZoneId,
        reply: Reply<JoinOutcome>,
    },
    Quit {
        player_id: PlayerId,
        reply: Reply<Option<PauseOutcome>>,
    },
    Combat {
        attacker: PlayerId,
        victim: PlayerId,
        reply: Reply<()>,
    },
    WorldChange {
        player_id: PlayerId,
        zone: ZoneId,
        reply: Reply<Option<PauseOutcome>>,
    },
    Activate {
        player_id: PlayerId,
        zone: ZoneId,
        reply: Reply<Activation>,
    },
    Continue {
        player_id: PlayerId,
        zone: ZoneId,
        reply: Reply<Resumed>,
    },
    Deposit {
        player_id: PlayerId,
        amount: f64,
        reply: Reply<DepositReceipt>,
    },
    Info {
        player_id: PlayerId,
        reply: Reply<FlightStatus>,
    },
    SetSpeed {
        player_id: PlayerId,
        zone: ZoneId,
        level: u32,
        reply: Reply<f32>,
    },
    State {
        player_id: PlayerId,
        reply: Reply<FlightState>,
    },
    Reload {
        config: Box<AerieConfig>,
        reply: Reply<()>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running flight service.
///
/// Cheap to clone: it is an `mpsc::Sender` wrapper. When the last handle
/// is dropped the service pauses every running flight and exits.
#[derive(Clone)]
pub struct FlightHandle {
    sender: mpsc::Sender<FlightCommand>,
}

impl FlightHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> FlightCommand,
    ) -> Result<T, AerieError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| AerieError::ServiceUnavailable)?;
        reply_rx.await.map_err(|_| AerieError::ServiceUnavailable)?
    }

    /// A player connected in `zone`. Banked time is restored if the zone
    /// allows flight.
    pub async fn join(&self, player_id: PlayerId, zone: impl Into<ZoneId>) -> Result<JoinOutcome, AerieError> {
        let zone = zone.into();
        self.request(|reply| FlightCommand::Join { player_id, zone, reply })
            .await
    }

    /// A player disconnected. A running flight is banked.
    pub async fn quit(&self, player_id: PlayerId) -> Result<Option<PauseOutcome>, AerieError> {
        self.request(|reply| FlightCommand::Quit { player_id, reply })
            .await
    }

    /// Two players fought. Each one who is flying is paused.
    pub async fn combat(&self, attacker: PlayerId, victim: PlayerId) -> Result<(), AerieError> {
        self.request(|reply| FlightCommand::Combat {
            attacker,
            victim,
            reply,
        })
        .await
    }

    /// A player moved to `zone`. Flight is paused if the zone forbids it.
    pub async fn world_change(
        &self,
        player_id: PlayerId,
        zone: impl Into<ZoneId>,
    ) -> Result<Option<PauseOutcome>, AerieError> {
        let zone = zone.into();
        self.request(|reply| FlightCommand::WorldChange { player_id, zone, reply })
            .await
    }

    /// Starts a fresh flight.
    pub async fn activate(&self, player_id: PlayerId, zone: impl Into<ZoneId>) -> Result<Activation, AerieError> {
        let zone = zone.into();
        self.request(|reply| FlightCommand::Activate { player_id, zone, reply })
            .await
    }

    /// Resumes banked time.
    pub async fn continue_flight(
        &self,
        player_id: PlayerId,
        zone: impl Into<ZoneId>,
    ) -> Result<Resumed, AerieError> {
        let zone = zone.into();
        self.request(|reply| FlightCommand::Continue { player_id, zone, reply })
            .await
    }

    /// Deposits currency toward the next tier.
    pub async fn deposit(&self, player_id: PlayerId, amount: f64) -> Result<DepositReceipt, AerieError> {
        self.request(|reply| FlightCommand::Deposit {
            player_id,
            amount,
            reply,
        })
        .await
    }

    /// Balance, tiers and timers for the info command.
    pub async fn info(&self, player_id: PlayerId) -> Result<FlightStatus, AerieError> {
        self.request(|reply| FlightCommand::Info { player_id, reply })
            .await
    }

    /// Applies the fly speed configured for `level`.
    pub async fn set_speed(
        &self,
        player_id: PlayerId,
        zone: impl Into<ZoneId>,
        level: u32,
    ) -> Result<f32, AerieError> {
        let zone = zone.into();
        self.request(|reply| FlightCommand::SetSpeed {
            player_id,
            zone,
            level,
            reply,
        })
        .await
    }

    /// The player's in-memory state.
    pub async fn state(&self, player_id: PlayerId) -> Result<FlightState, AerieError> {
        self.request(|reply| FlightCommand::State { player_id, reply })
            .await
    }

    /// Swaps tiers, speeds, zones, session tunables and tick periods.
    /// Running and banked sessions are untouched.
    pub async fn reload(&self, config: AerieConfig) -> Result<(), AerieError> {
        self.request(|reply| FlightCommand::Reload {
            config: Box::new(config),
            reply,
        })
        .await
    }

    /// Pauses every running flight and stops the service.
    ///
    /// Idempotent: stopping a stopped service returns immediately.
    pub async fn stop(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .sender
            .send(FlightCommand::Stop { reply: reply_tx })
            .await
            .is_err()
        {
            return;
        }
        let _ = reply_rx.await;
    }

    /// `true` once the service has exited.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Entry point for starting a flight service.
///
/// # Example
///
/// ```rust,ignore
/// let handle = FlightService::builder(config)
///     .clock(clock)
///     .start(store, ledger, capability, notifier);
/// handle.join(player, "world").await?;
/// ```
pub struct FlightService;

impl FlightService {
    pub fn builder(config: AerieConfig) -> FlightServiceBuilder {
        FlightServiceBuilder::new(config)
    }
}

/// Builder for a [`FlightService`].
pub struct FlightServiceBuilder {
    config: AerieConfig,
    clock: Arc<dyn Clock>,
    channel_size: usize,
}

impl FlightServiceBuilder {
    pub fn new(config: AerieConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }

    /// Replaces the wall clock used for flight timestamps.
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Bound of the command channel. Senders wait when it is full.
    pub fn channel_size(mut self, size: usize) -> Self {
        self.channel_size = size.max(1);
        self
    }

    /// Spawns the service actor on the current Tokio runtime.
    pub fn start<S: SessionStore>(
        self,
        store: S,
        ledger: impl BalanceLedger,
        capability: impl FlightCapability,
        notifier: impl Notifier,
    ) -> FlightHandle {
        let (tx, rx) = mpsc::channel(self.channel_size);
        let config = self.config;

        let actor = FlightActor {
            manager: SessionManager::new(store, config.tiers, config.session),
            speeds: config.speeds,
            zones: config.zones,
            ledger: Box::new(ledger),
            capability: Box::new(capability),
            notifier: Box::new(notifier),
            clock: self.clock,
            reconcile: TickScheduler::new(TickConfig::with_period(config.reconcile_interval)),
            status: TickScheduler::new(TickConfig::with_period(config.status_interval)),
            receiver: rx,
        };

        tokio::spawn(actor.run());

        FlightHandle { sender: tx }
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct FlightActor<S: SessionStore> {
    manager: SessionManager<S>,
    speeds: SpeedTable,
    zones: ZonePolicy,
    ledger: Box<dyn BalanceLedger>,
    capability: Box<dyn FlightCapability>,
    notifier: Box<dyn Notifier>,
    clock: Arc<dyn Clock>,
    reconcile: TickScheduler,
    status: TickScheduler,
    receiver: mpsc::Receiver<FlightCommand>,
}

impl<S: SessionStore> FlightActor<S> {
    async fn run(mut self) {
        info!(tiers = self.manager.tiers().len(), "flight service started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(FlightCommand::Stop { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.handle(cmd),
                    None => {
                        debug!("all flight handles dropped");
                        self.shutdown();
                        break;
                    }
                },
                _ = self.reconcile.wait_for_tick() => {
                    self.reconcile_tick();
                    self.reconcile.record_tick_end();
                }
                _ = self.status.wait_for_tick() => {
                    self.refresh_status();
                    self.status.record_tick_end();
                }
            }
        }

        info!("flight service stopped");
    }

    fn handle(&mut self, cmd: FlightCommand) {
        match cmd {
            FlightCommand::Join { player_id, zone, reply } => {
                let _ = reply.send(self.handle_join(player_id, &zone));
            }
            FlightCommand::Quit { player_id, reply } => {
                let _ = reply.send(Ok(self.handle_quit(player_id)));
            }
            FlightCommand::Combat {
                attacker,
                victim,
                reply,
            } => {
                self.handle_combat(attacker, victim);
                let _ = reply.send(Ok(()));
            }
            FlightCommand::WorldChange { player_id, zone, reply } => {
                let _ = reply.send(Ok(self.handle_world_change(player_id, &zone)));
            }
            FlightCommand::Activate { player_id, zone, reply } => {
                let _ = reply.send(self.handle_activate(player_id, &zone));
            }
            FlightCommand::Continue { player_id, zone, reply } => {
                let _ = reply.send(self.handle_continue(player_id, &zone));
            }
            FlightCommand::Deposit {
                player_id,
                amount,
                reply,
            } => {
                let _ = reply.send(self.handle_deposit(player_id, amount));
            }
            FlightCommand::Info { player_id, reply } => {
                let now = self.clock.now();
                let _ = reply.send(self.manager.status(player_id, now).map_err(AerieError::from));
            }
            FlightCommand::SetSpeed {
                player_id,
                zone,
                level,
                reply,
            } => {
                let _ = reply.send(self.handle_set_speed(player_id, &zone, level));
            }
            FlightCommand::State { player_id, reply } => {
                let _ = reply.send(Ok(self.manager.state(player_id)));
            }
            FlightCommand::Reload { config, reply } => {
                self.apply_config(*config);
                let _ = reply.send(Ok(()));
            }
            // Handled by the run loop.
            FlightCommand::Stop { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn notify(&self, player_id: PlayerId, notice: Notice) {
        self.notifier.notify(player_id, &notice);
    }

    fn notify_error(&self, player_id: PlayerId, err: &AerieError) {
        let notice = match err {
            AerieError::Session(e) => e.notice(self.ledger.currency_symbol()),
            AerieError::UnknownSpeed { level, available } => Notice::UnknownSpeed {
                level: *level,
                available: available.clone(),
            },
            _ => Notice::Unavailable,
        };
        self.notify(player_id, notice);
    }

    // -- Host events ---------------------------------------------------------

    fn handle_join(&mut self, player_id: PlayerId, zone: &ZoneId) -> Result<JoinOutcome, AerieError> {
        let now = self.clock.now();
        let allowed = self.zones.is_allowed(zone);

        if !allowed {
            // Banks a countdown still running from before the join; the
            // "come back" notice below reports it.
            if self.manager.is_active(player_id) {
                self.interrupt(player_id, PauseReason::WorldChange, false);
            } else {
                self.capability.revoke(player_id);
            }
        }

        let banked = match self.manager.hydrate(player_id, now) {
            Ok(banked) => banked,
            Err(e) => {
                warn!(%player_id, error = %e, "could not load flight record on join");
                self.notify(player_id, Notice::RestoreFailed);
                return Err(e.into());
            }
        };

        let Some(banked) = banked else {
            return Ok(JoinOutcome::Idle);
        };

        if !allowed {
            self.notify(player_id, Notice::SavedComeBack { remaining: banked });
            return Ok(JoinOutcome::Waiting(banked));
        }

        match self.manager.resume(player_id, now) {
            Ok(resumed) => {
                self.capability.grant(player_id);
                self.notify(
                    player_id,
                    Notice::Restored {
                        remaining: resumed.remaining,
                    },
                );
                Ok(JoinOutcome::Restored(resumed))
            }
            Err(e) => {
                warn!(%player_id, error = %e, "banked flight could not be restored on join");
                self.notify(player_id, Notice::RestoreFailed);
                Ok(JoinOutcome::RestoreFailed)
            }
        }
    }

    fn handle_quit(&mut self, player_id: PlayerId) -> Option<PauseOutcome> {
        let outcome = self.interrupt(player_id, PauseReason::Quit, false);
        if !self.manager.release(player_id) {
            debug!(%player_id, "banked flight kept in memory until its record is written");
        }
        outcome
    }

    fn handle_combat(&mut self, attacker: PlayerId, victim: PlayerId) {
        self.interrupt(attacker, PauseReason::Combat, true);
        if victim != attacker {
            self.interrupt(victim, PauseReason::Combat, true);
        }
    }

    fn handle_world_change(&mut self, player_id: PlayerId, zone: &ZoneId) -> Option<PauseOutcome> {
        if self.zones.is_allowed(zone) {
            return None;
        }
        self.interrupt(player_id, PauseReason::WorldChange, true)
    }

    /// Pauses a flying player, revokes the capability and, if `notify`,
    /// tells them why. Players neither active nor granted are left alone.
    fn interrupt(&mut self, player_id: PlayerId, reason: PauseReason, notify: bool) -> Option<PauseOutcome> {
        if !self.manager.is_active(player_id) && !self.capability.is_granted(player_id) {
            return None;
        }

        let outcome = self.manager.pause(player_id, self.clock.now());
        self.capability.revoke(player_id);

        if notify {
            let notice = match outcome {
                PauseOutcome::Banked(remaining) => Notice::Paused { reason, remaining },
                PauseOutcome::Cleared => Notice::Disabled { reason },
            };
            self.notify(player_id, notice);
        }
        Some(outcome)
    }

    // -- Player commands -----------------------------------------------------

    fn handle_activate(&mut self, player_id: PlayerId, zone: &ZoneId) -> Result<Activation, AerieError> {
        let now = self.clock.now();
        let allowed = self.zones.is_allowed(zone);
        let result = self
            .manager
            .activate(player_id, allowed, self.ledger.as_ref(), now)
            .map_err(AerieError::from);

        match &result {
            Ok(activation) => {
                self.capability.grant(player_id);
                self.notify(
                    player_id,
                    Notice::Activated {
                        level: activation.level,
                        duration: activation.duration,
                    },
                );
            }
            Err(e) => self.notify_error(player_id, e),
        }
        result
    }

    fn handle_continue(&mut self, player_id: PlayerId, zone: &ZoneId) -> Result<Resumed, AerieError> {
        let now = self.clock.now();
        let allowed = self.zones.is_allowed(zone);
        let result = self
            .manager
            .continue_flight(player_id, allowed, now)
            .map_err(AerieError::from);

        match &result {
            Ok(resumed) => {
                self.capability.grant(player_id);
                self.notify(
                    player_id,
                    Notice::Continued {
                        remaining: resumed.remaining,
                    },
                );
            }
            Err(e) => self.notify_error(player_id, e),
        }
        result
    }

    fn handle_deposit(&mut self, player_id: PlayerId, amount: f64) -> Result<DepositReceipt, AerieError> {
        let result = self
            .manager
            .deposit(player_id, amount, self.ledger.as_ref())
            .map_err(AerieError::from);

        match &result {
            Ok(receipt) => {
                let currency = self.ledger.currency_symbol().to_string();
                self.notify(
                    player_id,
                    Notice::Deposited {
                        amount: receipt.amount,
                        balance: receipt.balance,
                        level: receipt.level,
                        currency,
                    },
                );
                if receipt.level_up {
                    self.notify(player_id, Notice::LevelUp { level: receipt.level });
                }
            }
            Err(e) => self.notify_error(player_id, e),
        }
        result
    }

    fn handle_set_speed(&mut self, player_id: PlayerId, zone: &ZoneId, level: u32) -> Result<f32, AerieError> {
        let result = if !self.zones.is_allowed(zone) {
            Err(SessionError::ZoneNotAllowed.into())
        } else {
            self.speeds.speed(level).ok_or_else(|| AerieError::UnknownSpeed {
                level,
                available: self.speeds.levels(),
            })
        };

        match &result {
            Ok(speed) => {
                self.capability.set_speed(player_id, *speed);
                self.notify(player_id, Notice::SpeedSet { level, speed: *speed });
            }
            Err(e) => self.notify_error(player_id, e),
        }
        result
    }

    // -- Periodic jobs -------------------------------------------------------

    fn reconcile_tick(&mut self) {
        let pass = self.manager.reconcile(self.clock.now());
        for player_id in pass.expired {
            self.capability.revoke(player_id);
            self.notify(player_id, Notice::Expired);
        }
    }

    fn refresh_status(&mut self) {
        for (player_id, remaining) in self.manager.active_sessions(self.clock.now()) {
            if !remaining.is_zero() {
                self.notify(player_id, Notice::StatusBar { remaining });
            }
        }
    }

    // -- Lifecycle -----------------------------------------------------------

    fn apply_config(&mut self, config: AerieConfig) {
        self.manager.set_tiers(config.tiers);
        self.manager.set_config(config.session);
        self.speeds = config.speeds;
        self.zones = config.zones;
        if self.reconcile.period() != Some(config.reconcile_interval) {
            self.reconcile.set_period(config.reconcile_interval);
        }
        if self.status.period().unwrap_or(Duration::ZERO) != config.status_interval {
            self.status.set_period(config.status_interval);
        }
        info!(tiers = self.manager.tiers().len(), "flight configuration reloaded");
    }

    /// Banks every running flight so nothing outlives the service.
    fn shutdown(&mut self) {
        let suspended = self.manager.suspend_all(self.clock.now());
        for (player_id, outcome) in &suspended {
            self.capability.revoke(*player_id);
            if let PauseOutcome::Banked(remaining) = outcome {
                self.notify(
                    *player_id,
                    Notice::Paused {
                        reason: PauseReason::Shutdown,
                        remaining: *remaining,
                    },
                );
            }
        }
        info!(suspended = suspended.len(), "flight sessions suspended for shutdown");
    }
}
