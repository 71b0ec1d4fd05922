//! Shared vocabulary for Aerie.
//!
//! Every other crate in the workspace speaks in terms of the types defined
//! here:
//!
//! - **Identity** ([`PlayerId`], [`ZoneId`]) — who a session belongs to and
//!   where the player currently is.
//! - **Time** ([`Timestamp`], [`Clock`]) — absolute wall-clock instants in
//!   epoch milliseconds, and a pluggable source for "now".
//! - **Record** ([`FlightRecord`]) — the durable per-player ledger that
//!   survives restarts.
//! - **Notices** ([`Notice`], [`PauseReason`]) — the user-facing outcomes
//!   handed to whatever delivers text to players.
//!
//! # Architecture
//!
//! ```text
//! Service (aerie)  → Session (state machine) → Store / Tier
//!        ↘                 ↓                      ↙
//!                 Protocol (this crate)
//! ```

mod format;
mod notice;
mod record;
mod time;
mod types;

pub use format::{format_amount, format_duration};
pub use notice::{Notice, PauseReason};
pub use record::FlightRecord;
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
pub use types::{PlayerId, ZoneId};
