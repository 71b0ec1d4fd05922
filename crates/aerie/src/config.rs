//! Service configuration, loaded from TOML.
//!
//! ```toml
//! cooldown_ms = 600000
//! worlds = ["world", "world_nether"]   # empty = all allowed
//! overshoot = "reject"                  # or "clamp"
//! reconcile_interval_ms = 1000
//! status_interval_ms = 500              # 0 disables status refresh
//! data_dir = "playerdata"
//!
//! [tiers.1]
//! cost = 50000
//! duration = 120
//!
//! [speeds]
//! 1 = 0.1
//! ```
//!
//! Tier and speed entries are read one by one: a bad entry is skipped
//! with a warning instead of failing the whole file, and an empty result
//! falls back to the built-in tables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use aerie_session::{OvershootPolicy, SessionConfig};
use aerie_tier::{FlightTier, SpeedTable, TierTable};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{ConfigError, ZonePolicy};

/// Everything the flight service needs to know at startup or reload.
#[derive(Debug, Clone, PartialEq)]
pub struct AerieConfig {
    pub tiers: TierTable,
    pub speeds: SpeedTable,
    pub zones: ZonePolicy,
    pub session: SessionConfig,
    /// Period of the reconciliation pass that expires finished flights.
    pub reconcile_interval: Duration,
    /// Period of the remaining-time refresh. Zero disables it.
    pub status_interval: Duration,
    /// Directory for per-player records.
    pub data_dir: PathBuf,
}

impl Default for AerieConfig {
    fn default() -> Self {
        Self {
            tiers: TierTable::built_in(),
            speeds: SpeedTable::built_in(),
            zones: ZonePolicy::allow_all(),
            session: SessionConfig::default(),
            reconcile_interval: Duration::from_millis(DEFAULT_RECONCILE_MS),
            status_interval: Duration::from_millis(DEFAULT_STATUS_MS),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

const DEFAULT_COOLDOWN_MS: u64 = 600_000;
const DEFAULT_RECONCILE_MS: u64 = 1_000;
const DEFAULT_STATUS_MS: u64 = 500;
const DEFAULT_DATA_DIR: &str = "playerdata";

/// The file as written, before entry-level validation.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawConfig {
    cooldown_ms: u64,
    worlds: Vec<String>,
    overshoot: OvershootPolicy,
    reconcile_interval_ms: u64,
    status_interval_ms: u64,
    data_dir: PathBuf,
    tiers: BTreeMap<String, toml::Value>,
    speeds: BTreeMap<String, toml::Value>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            worlds: Vec::new(),
            overshoot: OvershootPolicy::default(),
            reconcile_interval_ms: DEFAULT_RECONCILE_MS,
            status_interval_ms: DEFAULT_STATUS_MS,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            tiers: BTreeMap::new(),
            speeds: BTreeMap::new(),
        }
    }
}

impl AerieConfig {
    /// Reads and parses a TOML file.
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`]
    /// if it is not valid TOML or a top-level value has the wrong type.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), tiers = config.tiers.len(), "configuration loaded");
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parses TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;

        if raw.reconcile_interval_ms == 0 {
            warn!("reconcile_interval_ms must be positive, using {DEFAULT_RECONCILE_MS}");
        }
        let reconcile_ms = match raw.reconcile_interval_ms {
            0 => DEFAULT_RECONCILE_MS,
            ms => ms,
        };

        Ok(Self {
            tiers: parse_tiers(&raw.tiers),
            speeds: parse_speeds(&raw.speeds),
            zones: ZonePolicy::only(raw.worlds),
            session: SessionConfig {
                cooldown: Duration::from_millis(raw.cooldown_ms),
                overshoot: raw.overshoot,
            },
            reconcile_interval: Duration::from_millis(reconcile_ms),
            status_interval: Duration::from_millis(raw.status_interval_ms),
            data_dir: raw.data_dir,
        })
    }
}

fn as_number(value: &toml::Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

fn parse_tiers(raw: &BTreeMap<String, toml::Value>) -> TierTable {
    let mut tiers = Vec::with_capacity(raw.len());
    for (key, entry) in raw {
        let Ok(level) = key.parse::<u32>() else {
            warn!(key = %key, "flight tier level is not a number, skipped");
            continue;
        };
        let cost = entry.get("cost").and_then(as_number);
        let duration = entry.get("duration").and_then(toml::Value::as_integer);
        match (cost, duration) {
            (Some(cost), Some(duration)) if cost >= 0.0 && duration > 0 => {
                tiers.push(FlightTier::new(level, cost, duration as u64));
            }
            _ => warn!(level, "flight tier needs a non-negative cost and a positive duration, skipped"),
        }
    }
    TierTable::new(tiers).or_built_in()
}

fn parse_speeds(raw: &BTreeMap<String, toml::Value>) -> SpeedTable {
    let speeds = raw.iter().filter_map(|(key, value)| {
        let Ok(level) = key.parse::<u32>() else {
            warn!(key = %key, "fly speed level is not a number, skipped");
            return None;
        };
        match as_number(value) {
            Some(speed) => Some((level, speed as f32)),
            None => {
                warn!(level, "fly speed is not a number, skipped");
                None
            }
        }
    });
    SpeedTable::new(speeds).or_built_in()
}
