//! In-memory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use aerie_protocol::{FlightRecord, PlayerId};

use crate::{SessionStore, StoreError};

/// A `HashMap`-backed store.
///
/// Clones share the same map, so a test can hand one clone to the
/// service and inspect records through another. Saves can be made to
/// fail on demand to exercise persistence-failure paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    records: Mutex<HashMap<PlayerId, FlightRecord>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record directly, bypassing the save counter.
    pub fn insert(&self, player_id: PlayerId, record: FlightRecord) {
        self.records().insert(player_id, record);
    }

    /// The stored record for a player, if one was ever saved.
    pub fn get(&self, player_id: PlayerId) -> Option<FlightRecord> {
        self.records().get(&player_id).cloned()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    /// Makes every subsequent save fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.inner.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent load fail (or succeed again).
    pub fn set_fail_loads(&self, fail: bool) {
        self.inner.fail_loads.store(fail, Ordering::SeqCst);
    }

    fn records(&self) -> MutexGuard<'_, HashMap<PlayerId, FlightRecord>> {
        // A poisoned map still holds valid records; keep serving them.
        self.inner
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, player_id: PlayerId) -> Result<FlightRecord, StoreError> {
        if self.inner.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("loads disabled".into()));
        }
        Ok(self.get(player_id).unwrap_or_default())
    }

    fn save(&self, player_id: PlayerId, record: &FlightRecord) -> Result<(), StoreError> {
        if self.inner.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("saves disabled".into()));
        }
        self.records().insert(player_id, record.clone());
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
