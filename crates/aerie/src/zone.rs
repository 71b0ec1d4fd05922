//! Which zones allow flight.

use std::collections::BTreeSet;

use aerie_protocol::ZoneId;

/// The zone allow-list. Empty means every zone allows flight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZonePolicy {
    allowed: BTreeSet<ZoneId>,
}

impl ZonePolicy {
    /// Every zone allows flight.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Only the listed zones allow flight. An empty list allows all.
    pub fn only<I, Z>(zones: I) -> Self
    where
        I: IntoIterator<Item = Z>,
        Z: Into<ZoneId>,
    {
        Self {
            allowed: zones.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, zone: &ZoneId) -> bool {
        self.allowed.is_empty() || self.allowed.contains(zone)
    }

    /// `true` when no allow-list is configured.
    pub fn allows_all(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn zones(&self) -> impl Iterator<Item = &ZoneId> {
        self.allowed.iter()
    }
}
