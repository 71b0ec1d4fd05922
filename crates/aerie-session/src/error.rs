//! Outcomes that stop a flight operation.

use std::time::Duration;

use aerie_protocol::Notice;
use aerie_store::StoreError;

/// Why a flight operation did not go through.
///
/// Everything except [`SessionError::Persistence`] is an expected,
/// user-facing outcome: the caller branches on it and tells the player.
/// None of them mean the in-memory state was changed.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The currency backend is not available.
    #[error("economy unavailable")]
    EconomyUnavailable,

    /// Activation with a zero balance.
    #[error("no balance deposited")]
    NoBalance,

    /// Balance below the first tier, or the ledger lacks the funds.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// A fresh activation was attempted before the cooldown ended.
    #[error("cooldown active for another {remaining:?}")]
    CooldownActive { remaining: Duration },

    /// The player's current zone does not allow flight.
    #[error("zone not allowed")]
    ZoneNotAllowed,

    /// A countdown is already running for this player.
    #[error("flight already active")]
    AlreadyActive,

    /// Activation refused because banked time should be continued instead.
    #[error("banked flight time available: {remaining:?}")]
    BankedTimeAvailable { remaining: Duration },

    /// Continue with nothing banked.
    #[error("no banked flight time")]
    NoBankedTime,

    /// Deposit amount is zero, negative, or not a number.
    #[error("invalid deposit amount {0}")]
    InvalidAmount(f64),

    /// Deposit while the top tier is already unlocked.
    #[error("maximum flight level {level} already reached")]
    MaxLevelReached { level: u32 },

    /// Deposit would pass the top tier's threshold; `shortfall` is the
    /// exact amount that reaches it.
    #[error("deposit overshoots the top tier; deposit {shortfall} instead")]
    DepositOvershoot { shortfall: f64 },

    /// The player's durable record could not be read, so nothing changed.
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl SessionError {
    /// The notice to show the player for this outcome.
    pub fn notice(&self, currency: &str) -> Notice {
        match self {
            Self::EconomyUnavailable => Notice::EconomyUnavailable,
            Self::NoBalance => Notice::NoBalance,
            Self::InsufficientFunds => Notice::InsufficientFunds,
            Self::CooldownActive { remaining } => Notice::CooldownActive {
                remaining: *remaining,
            },
            Self::ZoneNotAllowed => Notice::ZoneNotAllowed,
            Self::AlreadyActive => Notice::AlreadyActive,
            Self::BankedTimeAvailable { remaining } => Notice::BankedTimeAvailable {
                remaining: *remaining,
            },
            Self::NoBankedTime => Notice::NoBankedTime,
            Self::InvalidAmount(_) => Notice::InvalidAmount,
            Self::MaxLevelReached { level } => Notice::MaxLevelReached { level: *level },
            Self::DepositOvershoot { shortfall } => Notice::DepositSuggestion {
                shortfall: *shortfall,
                currency: currency.to_string(),
            },
            Self::Persistence(_) => Notice::Unavailable,
        }
    }
}
