//! Fixed-period tick scheduler for Aerie.
//!
//! Drives the two periodic jobs of the flight service: the reconciliation
//! pass that expires finished flights, and the status refresh that
//! re-renders each flying player's remaining time. Periods are in
//! milliseconds, usually between 100 ms and a few seconds.
//!
//! # Disabled mode
//!
//! A zero period disables the scheduler: [`TickScheduler::wait_for_tick`]
//! pends forever. The status refresh uses this when it is switched off.
//!
//! # Integration
//!
//! The scheduler sits inside the service actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         cmd = cmd_rx.recv() => { /* handle commands */ }
//!         _ = reconcile.wait_for_tick() => {
//!             manager.reconcile(clock.now());
//!             reconcile.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the loop wakes up late for a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TickPolicy {
    /// Forget the missed ticks and schedule the next one a full period
    /// from now.
    #[default]
    Skip,
    /// Keep the original cadence: the next tick fires at its originally
    /// scheduled time, even if that is already in the past.
    Drop,
}

/// Full configuration for a tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. `Duration::ZERO` disables the scheduler.
    pub period: Duration,
    /// Late-wakeup handling.
    pub policy: TickPolicy,
    /// Fraction of the period (0.0–1.0) a tick's work may take before a
    /// warning is logged. Default: 0.80.
    pub budget_warn_threshold: f64,
    /// Whether to keep timing metrics for each tick.
    pub metrics_enabled: bool,
    /// Upper bound of the random delay added to the first tick, so two
    /// schedulers started together do not fire in lockstep.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: Duration::ZERO,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            metrics_enabled: true,
            initial_jitter: Duration::from_millis(20),
        }
    }
}

impl TickConfig {
    /// Shortest period accepted. Anything shorter is raised to this.
    pub const MIN_PERIOD: Duration = Duration::from_millis(10);

    /// A config with the given period and defaults elsewhere.
    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// A config with the period given in milliseconds.
    pub fn with_period_ms(period_ms: u64) -> Self {
        Self::with_period(Duration::from_millis(period_ms))
    }

    /// Fixes out-of-range values. Called by [`TickScheduler::new`].
    ///
    /// - A nonzero `period` below [`Self::MIN_PERIOD`] is raised to it.
    /// - `budget_warn_threshold` is clamped to `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if !self.period.is_zero() && self.period < Self::MIN_PERIOD {
            warn!(
                period_ms = self.period.as_millis() as u64,
                min_ms = Self::MIN_PERIOD.as_millis() as u64,
                "tick period below minimum, raising"
            );
            self.period = Self::MIN_PERIOD;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// The tick period, or `None` when disabled.
    pub fn tick_period(&self) -> Option<Duration> {
        if self.period.is_zero() {
            None
        } else {
            Some(self.period)
        }
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// One fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// The configured period.
    pub period: Duration,
    /// `true` if the loop woke up more than 10% of a period late.
    pub overrun: bool,
    /// Whole periods skipped because of the late wakeup.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Timing metrics, updated after each tick.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Exponential moving average of the work time per tick (α = 0.1).
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Last tick's work time as a fraction of the period.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-period tick scheduler. One per periodic job.
pub struct TickScheduler {
    config: TickConfig,
    period: Option<Duration>,
    tick_count: u64,
    /// When the next tick fires.
    next_tick: Option<TokioInstant>,
    /// When the current tick's work started; consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    paused: bool,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Creates a scheduler. The first tick fires one period from now plus
    /// a random jitter up to `initial_jitter`.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let period = config.tick_period();
        let next_tick = period.map(|p| TokioInstant::now() + p + Self::jitter(&config));

        match period {
            None => debug!("tick scheduler created disabled"),
            Some(p) => debug!(
                period_ms = p.as_millis() as u64,
                policy = ?config.policy,
                "tick scheduler created"
            ),
        }

        Self {
            config,
            period,
            tick_count: 0,
            next_tick,
            tick_start: None,
            paused: false,
            metrics: TickMetrics::default(),
        }
    }

    /// A scheduler with the given period in milliseconds and defaults.
    pub fn with_period_ms(period_ms: u64) -> Self {
        Self::new(TickConfig::with_period_ms(period_ms))
    }

    fn jitter(config: &TickConfig) -> Duration {
        let max_us = config.initial_jitter.as_micros() as u64;
        if max_us == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(rand::rng().random_range(0..max_us))
        }
    }

    /// Waits for the next tick.
    ///
    /// Pends forever while disabled or paused; `tokio::select!` keeps
    /// serving its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, period) = match (self.next_tick, self.period) {
            (Some(next), Some(period)) if !self.paused => (next, period),
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > period / 10;
        let mut ticks_skipped = 0u64;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / period.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_millis() as u64,
                            "tick overrun, skipping ahead"
                        );
                    }
                }
                now + period
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_millis() as u64,
                        "tick overrun, keeping original schedule"
                    );
                }
                next + period
            }
        });

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            period,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the current tick's work as done, for budget warnings and
    /// metrics. A no-op if no tick is in progress.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        if let Some(period) = self.period {
            let utilization = elapsed.as_secs_f64() / period.as_secs_f64();
            self.metrics.budget_utilization = utilization;

            if utilization >= self.config.budget_warn_threshold {
                warn!(
                    tick = self.tick_count,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    period_ms = period.as_millis() as u64,
                    "tick work approaching its period"
                );
            }
        }

        if self.config.metrics_enabled {
            if elapsed > self.metrics.max_tick_time {
                self.metrics.max_tick_time = elapsed;
            }
            let alpha = 0.1;
            let prev = self.metrics.avg_tick_time.as_secs_f64();
            let curr = elapsed.as_secs_f64();
            self.metrics.avg_tick_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + curr * alpha);
        }
    }

    /// Changes the period. The next tick is rescheduled one new period
    /// from now; a zero period disables the scheduler.
    pub fn set_period(&mut self, period: Duration) {
        self.config.period = period;
        self.config = self.config.clone().validated();
        self.period = self.config.tick_period();
        self.next_tick = self.period.map(|p| TokioInstant::now() + p);
        debug!(period_ms = period.as_millis() as u64, "tick period changed");
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Resumes ticking, one full period from now.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(period) = self.period {
                self.next_tick = Some(TokioInstant::now() + period);
            }
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// `true` when the period is zero.
    pub fn is_disabled(&self) -> bool {
        self.period.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    /// The period, or `None` when disabled.
    pub fn period(&self) -> Option<Duration> {
        self.period
    }
}
