//! Durable storage for per-player flight records.
//!
//! Provides the [`SessionStore`] trait and two implementations:
//!
//! - [`JsonFileStore`] — one JSON file per player under a data directory
//! - [`MemoryStore`] — an in-process map, for tests and embedding
//!
//! # Contract
//!
//! - `load` of an unknown player returns `FlightRecord::default()`; the
//!   record comes into existence the first time it is saved.
//! - `save` replaces the whole record. Writes are synchronous and the
//!   store serializes writes to the same key on its own.

mod error;
mod file;
mod memory;

pub use error::StoreError;
pub use file::JsonFileStore;
pub use memory::MemoryStore;

use aerie_protocol::{FlightRecord, PlayerId};

/// Reads and writes durable flight records.
///
/// # Trait bounds
///
/// - `Send + Sync` → the store is owned by the service task but may be
///   shared (e.g. an `Arc<MemoryStore>` inspected by a test).
/// - `'static` → it lives as long as the service.
pub trait SessionStore: Send + Sync + 'static {
    /// Loads a player's record, or a fresh default one if none exists.
    fn load(&self, player_id: PlayerId) -> Result<FlightRecord, StoreError>;

    /// Writes a player's record, replacing any previous version.
    fn save(&self, player_id: PlayerId, record: &FlightRecord) -> Result<(), StoreError>;
}

impl<S: SessionStore> SessionStore for std::sync::Arc<S> {
    fn load(&self, player_id: PlayerId) -> Result<FlightRecord, StoreError> {
        (**self).load(player_id)
    }

    fn save(&self, player_id: PlayerId, record: &FlightRecord) -> Result<(), StoreError> {
        (**self).save(player_id, record)
    }
}
