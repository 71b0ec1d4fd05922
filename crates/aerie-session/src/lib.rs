//! Flight session state machine for Aerie.
//!
//! This crate decides, for each player, whether flight is granted right
//! now, how much time remains, and what happens to that time when the
//! session is interrupted:
//!
//! 1. **Deposits** — turning currency into an unlocked tier
//!    ([`BalanceLedger`] trait for the currency side)
//! 2. **Sessions** — activation, pause, resume, expiry ([`SessionManager`])
//! 3. **Reconciliation** — the periodic sweep that expires finished
//!    sessions and keeps durable records in line
//!
//! # How it fits in the stack
//!
//! ```text
//! Service layer (above)  ← serializes commands, ticks, and notifications
//!     ↕
//! Session layer (this crate)  ← the per-player state machine
//!     ↕
//! Store / Tier layers (below)  ← durable records, tier arithmetic
//! ```

mod error;
mod ledger;
mod manager;
mod session;

pub use error::SessionError;
pub use ledger::{BalanceLedger, InMemoryLedger};
pub use manager::SessionManager;
pub use session::{
    Activation, DepositReceipt, FlightState, FlightStatus, OvershootPolicy, PauseOutcome,
    Reconciliation, Resumed, SessionConfig, TierStatus,
};
