//! The tier table and balance-to-level arithmetic.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// FlightTier
// ---------------------------------------------------------------------------

/// One purchasable flight tier.
///
/// A player whose deposited balance reaches `min_balance` unlocks this
/// tier; activating it grants `duration_secs` of flight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlightTier {
    /// Tier level. Level 0 means "nothing unlocked" and is never stored.
    pub level: u32,
    /// Balance required to unlock this tier.
    pub min_balance: f64,
    /// Flight granted per activation, in seconds.
    pub duration_secs: u64,
}

impl FlightTier {
    /// Creates a tier.
    pub const fn new(level: u32, min_balance: f64, duration_secs: u64) -> Self {
        Self {
            level,
            min_balance,
            duration_secs,
        }
    }

    /// Flight granted per activation.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

/// Tiers used when the configuration provides none.
const BUILT_IN_TIERS: [FlightTier; 3] = [
    FlightTier::new(1, 50_000.0, 120),
    FlightTier::new(2, 100_000.0, 300),
    FlightTier::new(3, 200_000.0, 600),
];

// ---------------------------------------------------------------------------
// TierTable
// ---------------------------------------------------------------------------

/// Immutable level → tier mapping.
///
/// `BTreeMap` keeps levels sorted, so "highest level" and "next level"
/// are ordered walks rather than scans.
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    tiers: BTreeMap<u32, FlightTier>,
}

impl TierTable {
    /// Builds a table from the given tiers.
    ///
    /// Level-0 and invalid entries (negative or non-finite threshold,
    /// zero duration) are skipped with a warning; a later duplicate level
    /// replaces an earlier one. An empty result is allowed here; use
    /// [`TierTable::or_built_in`] to fall back to defaults.
    pub fn new(tiers: impl IntoIterator<Item = FlightTier>) -> Self {
        let mut map = BTreeMap::new();
        for tier in tiers {
            if tier.level == 0 {
                warn!("flight tier with level 0 ignored (level 0 is implicit)");
                continue;
            }
            if !tier.min_balance.is_finite() || tier.min_balance < 0.0 {
                warn!(level = tier.level, min_balance = tier.min_balance, "flight tier has invalid cost, skipped");
                continue;
            }
            if tier.duration_secs == 0 {
                warn!(level = tier.level, "flight tier has zero duration, skipped");
                continue;
            }
            if map.insert(tier.level, tier).is_some() {
                warn!(level = tier.level, "duplicate flight tier level, last one wins");
            }
        }

        let table = Self { tiers: map };
        table.warn_if_unordered();
        table
    }

    /// The three built-in tiers: 50 000 → 2 min, 100 000 → 5 min,
    /// 200 000 → 10 min.
    pub fn built_in() -> Self {
        Self {
            tiers: BUILT_IN_TIERS.iter().map(|t| (t.level, *t)).collect(),
        }
    }

    /// Returns `self`, or the built-in tiers if `self` is empty.
    pub fn or_built_in(self) -> Self {
        if self.tiers.is_empty() {
            warn!("no valid flight tiers configured, using built-in defaults");
            Self::built_in()
        } else {
            self
        }
    }

    /// Highest level whose threshold is at or below `balance`; 0 if none.
    pub fn level_for_balance(&self, balance: f64) -> u32 {
        self.tiers
            .values()
            .filter(|t| balance >= t.min_balance)
            .map(|t| t.level)
            .max()
            .unwrap_or(0)
    }

    /// The tier at `level`, if configured.
    pub fn tier(&self, level: u32) -> Option<&FlightTier> {
        self.tiers.get(&level)
    }

    /// Highest configured level; 0 for an empty table.
    pub fn max_level(&self) -> u32 {
        self.tiers.keys().next_back().copied().unwrap_or(0)
    }

    /// The highest configured tier.
    pub fn top_tier(&self) -> Option<&FlightTier> {
        self.tiers.values().next_back()
    }

    /// The first configured tier above `level`.
    pub fn next_tier_after(&self, level: u32) -> Option<&FlightTier> {
        self.tiers
            .range(level.saturating_add(1)..)
            .next()
            .map(|(_, t)| t)
    }

    /// How much more a player at `balance` must deposit to reach the next
    /// level, or `None` when already at the top.
    pub fn amount_for_next_level(&self, balance: f64) -> Option<f64> {
        let current = self.level_for_balance(balance);
        self.next_tier_after(current)
            .map(|t| (t.min_balance - balance).max(0.0))
    }

    /// How much a player at `balance` may still deposit before passing
    /// the top tier's threshold. `None` for an empty table.
    pub fn shortfall_to_max(&self, balance: f64) -> Option<f64> {
        self.top_tier().map(|t| t.min_balance - balance)
    }

    /// All tiers in ascending level order.
    pub fn iter(&self) -> impl Iterator<Item = &FlightTier> {
        self.tiers.values()
    }

    /// Number of configured tiers.
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// `true` if no tiers are configured.
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    fn warn_if_unordered(&self) {
        let mut prev: Option<&FlightTier> = None;
        for tier in self.tiers.values() {
            if let Some(p) = prev {
                if tier.min_balance < p.min_balance {
                    warn!(
                        level = tier.level,
                        previous = p.level,
                        "flight tier costs less than a lower level"
                    );
                }
            }
            prev = Some(tier);
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::built_in()
    }
}
