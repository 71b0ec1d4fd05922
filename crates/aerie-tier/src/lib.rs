//! Flight tiers: how much flight a deposited balance buys.
//!
//! - [`TierTable`] — level → (minimum balance, duration), with
//!   balance-to-level lookup.
//! - [`SpeedTable`] — level → fly speed multiplier.
//!
//! Both tables are immutable once built. A configuration reload builds
//! new tables and swaps them in whole.

mod speed;
mod table;

pub use speed::SpeedTable;
pub use table::{FlightTier, TierTable};
