//! User-facing notices.
//!
//! The service never builds strings inline; it emits a [`Notice`] and lets
//! the host's notifier decide how to render it. The `Display` impl gives a
//! plain English rendering that hosts without their own templates can use
//! as-is.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::format::{format_amount, format_duration};

/// Why a running flight was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// The player moved into a zone where flight is not allowed.
    WorldChange,
    /// The player attacked or was attacked by another player.
    Combat,
    /// The player disconnected.
    Quit,
    /// The service is stopping.
    Shutdown,
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorldChange => f.write_str("you changed worlds"),
            Self::Combat => f.write_str("you entered combat"),
            Self::Quit => f.write_str("you left the server"),
            Self::Shutdown => f.write_str("the server is restarting"),
        }
    }
}

/// Something a player should be told.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// A fresh flight started.
    Activated { level: u32, duration: Duration },
    /// Activation refused: cooldown still running.
    CooldownActive { remaining: Duration },
    /// Activation refused: nothing deposited yet.
    NoBalance,
    /// Balance does not reach the first tier, or the ledger lacks funds.
    InsufficientFunds,
    /// The action is not permitted in the player's current zone.
    ZoneNotAllowed,
    /// Activation refused: a flight is already counting down.
    AlreadyActive,
    /// Activation refused: banked time exists and should be continued.
    BankedTimeAvailable { remaining: Duration },
    /// A flight was interrupted and its remaining time banked.
    Paused { reason: PauseReason, remaining: Duration },
    /// A flight was interrupted with nothing left to bank.
    Disabled { reason: PauseReason },
    /// Banked time was resumed by the player.
    Continued { remaining: Duration },
    /// Continue refused: nothing banked.
    NoBankedTime,
    /// Banked time was resumed automatically on join.
    Restored { remaining: Duration },
    /// Banked time exists but could not be resumed on join.
    RestoreFailed,
    /// Banked time exists; the player must return to an allowed zone.
    SavedComeBack { remaining: Duration },
    /// A running flight ran out.
    Expired,
    /// The currency backend is not available.
    EconomyUnavailable,
    /// Deposit refused: the top tier is already unlocked.
    MaxLevelReached { level: u32 },
    /// Deposit refused: it would overshoot the top tier by more than needed.
    DepositSuggestion { shortfall: f64, currency: String },
    /// Deposit refused: the amount is not a positive number.
    InvalidAmount,
    /// Deposit accepted.
    Deposited {
        amount: f64,
        balance: f64,
        level: u32,
        currency: String,
    },
    /// A deposit unlocked a new highest tier.
    LevelUp { level: u32 },
    /// Periodic remaining-time refresh for an active flight.
    StatusBar { remaining: Duration },
    /// Fly speed applied.
    SpeedSet { level: u32, speed: f32 },
    /// Fly speed refused: no such speed level.
    UnknownSpeed { level: u32, available: Vec<u32> },
    /// Flight data could not be read; nothing changed.
    Unavailable,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activated { level, duration } => write!(
                f,
                "Flight level {level} activated for {}.",
                format_duration(*duration)
            ),
            Self::CooldownActive { remaining } => write!(
                f,
                "Flight is on cooldown for another {}.",
                format_duration(*remaining)
            ),
            Self::NoBalance => f.write_str("You have not deposited anything for flight yet."),
            Self::InsufficientFunds => f.write_str("Insufficient funds for flight."),
            Self::ZoneNotAllowed => f.write_str("Flight is not allowed in this world."),
            Self::AlreadyActive => f.write_str("Your flight is already active."),
            Self::BankedTimeAvailable { remaining } => write!(
                f,
                "You have {} of saved flight time. Use continue to resume it.",
                format_duration(*remaining)
            ),
            Self::Paused { reason, remaining } => write!(
                f,
                "Flight paused because {reason}. {} saved.",
                format_duration(*remaining)
            ),
            Self::Disabled { reason } => write!(f, "Flight disabled because {reason}."),
            Self::Continued { remaining } => write!(
                f,
                "Flight continued with {} remaining.",
                format_duration(*remaining)
            ),
            Self::NoBankedTime => f.write_str("You have no saved flight time."),
            Self::Restored { remaining } => write!(
                f,
                "Your saved flight was restored: {} remaining.",
                format_duration(*remaining)
            ),
            Self::RestoreFailed => f.write_str("Your saved flight could not be restored."),
            Self::SavedComeBack { remaining } => write!(
                f,
                "You have {} of saved flight. Return to an allowed world and use continue.",
                format_duration(*remaining)
            ),
            Self::Expired => f.write_str("Your flight time has run out."),
            Self::EconomyUnavailable => f.write_str("The economy is currently unavailable."),
            Self::MaxLevelReached { level } => {
                write!(f, "You already reached the maximum flight level ({level}).")
            }
            Self::DepositSuggestion { shortfall, currency } => write!(
                f,
                "That is more than needed. Deposit {}{currency} to reach the maximum level.",
                format_amount(*shortfall)
            ),
            Self::InvalidAmount => f.write_str("The amount must be a positive number."),
            Self::Deposited {
                amount,
                balance,
                level,
                currency,
            } => write!(
                f,
                "Deposited {}{currency}. Balance: {}{currency}, level {level}.",
                format_amount(*amount),
                format_amount(*balance)
            ),
            Self::LevelUp { level } => write!(f, "New flight level unlocked: {level}!"),
            Self::StatusBar { remaining } => {
                write!(f, "Flight: {}", format_duration(*remaining))
            }
            Self::SpeedSet { level, speed } => {
                write!(f, "Fly speed set to level {level} ({speed}).")
            }
            Self::UnknownSpeed { level, available } => {
                let list = available
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "Speed {level} is not available. Available: {list}.")
            }
            Self::Unavailable => {
                f.write_str("Flight data is temporarily unavailable. Try again shortly.")
            }
        }
    }
}
