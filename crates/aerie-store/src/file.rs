//! One-JSON-file-per-player store.
//!
//! Layout:
//!
//! ```text
//! <data_dir>/
//! ├── 6f1c…-….json
//! └── a03e…-….json
//! ```
//!
//! Saves go to a sibling `.tmp` file first and are renamed into place, so
//! a crash mid-write leaves the previous record intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use aerie_protocol::{FlightRecord, PlayerId};

use crate::{SessionStore, StoreError};

/// Stores each player's record as `<uuid>.json` in a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Opens (and creates if needed) the data directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        tracing::debug!(dir = %dir.display(), "flight record store opened");
        Ok(Self { dir })
    }

    /// The data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, player_id: PlayerId) -> PathBuf {
        self.dir.join(format!("{player_id}.json"))
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self, player_id: PlayerId) -> Result<FlightRecord, StoreError> {
        let path = self.path_for(player_id);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(FlightRecord::default());
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Decode { path, source })
    }

    fn save(&self, player_id: PlayerId, record: &FlightRecord) -> Result<(), StoreError> {
        let path = self.path_for(player_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(record).map_err(StoreError::Encode)?;

        fs::write(&tmp, bytes).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path, source })?;

        tracing::trace!(%player_id, "flight record saved");
        Ok(())
    }
}
