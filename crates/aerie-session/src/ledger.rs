//! Currency hook for deposits.
//!
//! Aerie does not keep anyone's money. The host's economy plugin does,
//! and Aerie only asks it two questions during a deposit: "can this
//! player afford it?" and "take it". The [`BalanceLedger`] trait is that
//! conversation; hosts implement it over whatever currency backend they
//! run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use aerie_protocol::PlayerId;

/// The currency backend deposits draw from.
///
/// # Example
///
/// ```rust
/// use aerie_protocol::PlayerId;
/// use aerie_session::BalanceLedger;
///
/// /// Everyone is infinitely rich. Development only.
/// struct FreeMoney;
///
/// impl BalanceLedger for FreeMoney {
///     fn has_funds(&self, _player: PlayerId, _amount: f64) -> bool {
///         true
///     }
///
///     fn withdraw(&self, _player: PlayerId, _amount: f64) -> bool {
///         true
///     }
/// }
/// ```
pub trait BalanceLedger: Send + Sync + 'static {
    /// Whether the backing currency exists at all. When `false`, deposits
    /// and activations are refused without touching any state.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether `player` holds at least `amount`.
    fn has_funds(&self, player: PlayerId, amount: f64) -> bool;

    /// Removes `amount` from `player`. Returns `false` if nothing was taken.
    fn withdraw(&self, player: PlayerId, amount: f64) -> bool;

    /// Symbol appended to amounts in notices.
    fn currency_symbol(&self) -> &str {
        ""
    }
}

impl<L: BalanceLedger> BalanceLedger for Arc<L> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn has_funds(&self, player: PlayerId, amount: f64) -> bool {
        (**self).has_funds(player, amount)
    }

    fn withdraw(&self, player: PlayerId, amount: f64) -> bool {
        (**self).withdraw(player, amount)
    }

    fn currency_symbol(&self) -> &str {
        (**self).currency_symbol()
    }
}

/// A ledger that keeps wallets in a map. Useful for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    wallets: Mutex<HashMap<PlayerId, f64>>,
    symbol: String,
    available: bool,
}

impl InMemoryLedger {
    /// Creates an available ledger with the given currency symbol.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            wallets: Mutex::new(HashMap::new()),
            symbol: symbol.into(),
            available: true,
        }
    }

    /// A ledger whose currency does not exist.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    /// Adds money to a wallet.
    pub fn credit(&self, player: PlayerId, amount: f64) {
        let mut wallets = self.wallets.lock().unwrap_or_else(|p| p.into_inner());
        *wallets.entry(player).or_insert(0.0) += amount;
    }

    /// Current wallet balance.
    pub fn balance(&self, player: PlayerId) -> f64 {
        let wallets = self.wallets.lock().unwrap_or_else(|p| p.into_inner());
        wallets.get(&player).copied().unwrap_or(0.0)
    }
}

impl BalanceLedger for InMemoryLedger {
    fn is_available(&self) -> bool {
        self.available
    }

    fn has_funds(&self, player: PlayerId, amount: f64) -> bool {
        self.balance(player) >= amount
    }

    fn withdraw(&self, player: PlayerId, amount: f64) -> bool {
        let mut wallets = self.wallets.lock().unwrap_or_else(|p| p.into_inner());
        match wallets.get_mut(&player) {
            Some(held) if *held >= amount => {
                *held -= amount;
                true
            }
            _ => false,
        }
    }

    fn currency_symbol(&self) -> &str {
        &self.symbol
    }
}
