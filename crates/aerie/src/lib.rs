//! # Aerie
//!
//! Time-boxed, purchasable flight for game servers.
//!
//! Players deposit in-game currency to unlock flight tiers, activate a
//! countdown of the tier's duration, and keep whatever is left when
//! combat, a zone change or a disconnect interrupts them. A host
//! integration feeds events and commands to a [`FlightHandle`]; the
//! service grants and revokes flight through a [`FlightCapability`] and
//! talks to players through a [`Notifier`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aerie::prelude::*;
//!
//! # async fn run() -> Result<(), AerieError> {
//! let config = AerieConfig::load_or_default("aerie.toml")?;
//! let store = JsonFileStore::open(&config.data_dir)?;
//! let handle = FlightService::builder(config).start(
//!     store,
//!     InMemoryLedger::new("$"),
//!     CapabilitySet::new(),
//!     NoticeLog::new(),
//! );
//!
//! let player = PlayerId::new_v4();
//! handle.join(player, "world").await?;
//! handle.deposit(player, 60_000.0).await?;
//! handle.activate(player, "world").await?;
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod host;
mod service;
mod zone;

pub use config::AerieConfig;
pub use error::{AerieError, ConfigError};
pub use host::{CapabilitySet, FlightCapability, NoticeLog, Notifier};
pub use service::{
    DEFAULT_CHANNEL_SIZE, FlightHandle, FlightService, FlightServiceBuilder, JoinOutcome,
};
pub use zone::ZonePolicy;

pub use aerie_protocol as protocol;
pub use aerie_session as session;
pub use aerie_store as store;
pub use aerie_tick as tick;
pub use aerie_tier as tier;

/// Installs a `tracing` subscriber that logs to stderr, filtered by
/// `RUST_LOG` (default `info`). Calling it twice is harmless.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

pub mod prelude {
    pub use crate::{
        AerieConfig, AerieError, CapabilitySet, FlightCapability, FlightHandle, FlightService,
        JoinOutcome, NoticeLog, Notifier, ZonePolicy,
    };
    pub use aerie_protocol::{
        Clock, FlightRecord, ManualClock, Notice, PauseReason, PlayerId, SystemClock, Timestamp,
        ZoneId,
    };
    pub use aerie_session::{
        Activation, BalanceLedger, DepositReceipt, FlightState, FlightStatus, InMemoryLedger,
        OvershootPolicy, PauseOutcome, Resumed, SessionError,
    };
    pub use aerie_store::{JsonFileStore, MemoryStore, SessionStore, StoreError};
    pub use aerie_tier::{FlightTier, SpeedTable, TierTable};
}
