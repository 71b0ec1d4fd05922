//! Selectable fly speeds.

use std::collections::BTreeMap;

use tracing::warn;

/// Engine fly speeds are multipliers in `0.0..=1.0`.
const SPEED_RANGE: std::ops::RangeInclusive<f32> = 0.0..=1.0;

/// Level → fly speed multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTable {
    speeds: BTreeMap<u32, f32>,
}

impl SpeedTable {
    /// Builds a table from `(level, speed)` pairs, skipping speeds outside
    /// `0.0..=1.0` with a warning.
    pub fn new(speeds: impl IntoIterator<Item = (u32, f32)>) -> Self {
        let speeds = speeds
            .into_iter()
            .filter(|(level, speed)| {
                let ok = SPEED_RANGE.contains(speed);
                if !ok {
                    warn!(level, speed, "fly speed out of range, skipped");
                }
                ok
            })
            .collect();
        Self { speeds }
    }

    /// Speeds 1: 0.1, 2: 0.2, 3: 0.4.
    pub fn built_in() -> Self {
        Self {
            speeds: BTreeMap::from([(1, 0.1), (2, 0.2), (3, 0.4)]),
        }
    }

    /// Returns `self`, or the built-in speeds if `self` is empty.
    pub fn or_built_in(self) -> Self {
        if self.speeds.is_empty() {
            Self::built_in()
        } else {
            self
        }
    }

    /// The speed for `level`, if configured.
    pub fn speed(&self, level: u32) -> Option<f32> {
        self.speeds.get(&level).copied()
    }

    /// Configured levels in ascending order.
    pub fn levels(&self) -> Vec<u32> {
        self.speeds.keys().copied().collect()
    }
}

impl Default for SpeedTable {
    fn default() -> Self {
        Self::built_in()
    }
}
