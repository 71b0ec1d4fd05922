//! The host side: switching flight on and off, and talking to players.
//!
//! The service never touches the game directly. It calls a
//! [`FlightCapability`] to grant or revoke the ability to fly and a
//! [`Notifier`] to deliver [`Notice`]s. Both are implemented by the host
//! integration; [`CapabilitySet`] and [`NoticeLog`] are in-memory versions
//! for tests and demos.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use aerie_protocol::{Notice, PlayerId};

/// The host's raw "may fly" switch.
pub trait FlightCapability: Send + Sync + 'static {
    fn grant(&self, player: PlayerId);

    /// Revokes flight. Revoking an ungranted player is a no-op.
    fn revoke(&self, player: PlayerId);

    fn is_granted(&self, player: PlayerId) -> bool;

    /// Applies a fly speed multiplier (`0.0..=1.0`).
    fn set_speed(&self, player: PlayerId, speed: f32);
}

/// Delivers player-facing notices.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, player: PlayerId, notice: &Notice);
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Capabilities {
    granted: HashMap<PlayerId, bool>,
    speeds: HashMap<PlayerId, f32>,
}

/// A [`FlightCapability`] backed by a map. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    inner: Arc<Mutex<Capabilities>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The speed last applied to `player`.
    pub fn speed(&self, player: PlayerId) -> Option<f32> {
        self.lock().speeds.get(&player).copied()
    }

    /// Players currently granted, in no particular order.
    pub fn granted(&self) -> Vec<PlayerId> {
        self.lock()
            .granted
            .iter()
            .filter(|(_, on)| **on)
            .map(|(p, _)| *p)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Capabilities> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl FlightCapability for CapabilitySet {
    fn grant(&self, player: PlayerId) {
        self.lock().granted.insert(player, true);
    }

    fn revoke(&self, player: PlayerId) {
        self.lock().granted.insert(player, false);
    }

    fn is_granted(&self, player: PlayerId) -> bool {
        self.lock().granted.get(&player).copied().unwrap_or(false)
    }

    fn set_speed(&self, player: PlayerId, speed: f32) {
        self.lock().speeds.insert(player, speed);
    }
}

/// A [`Notifier`] that records every notice. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct NoticeLog {
    entries: Arc<Mutex<Vec<(PlayerId, Notice)>>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything logged so far.
    pub fn take(&self) -> Vec<(PlayerId, Notice)> {
        std::mem::take(&mut *self.lock())
    }

    /// Notices sent to `player`, oldest first.
    pub fn for_player(&self, player: PlayerId) -> Vec<Notice> {
        self.lock()
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// The most recent notice sent to `player`.
    pub fn last(&self, player: PlayerId) -> Option<Notice> {
        self.lock()
            .iter()
            .rev()
            .find(|(p, _)| *p == player)
            .map(|(_, n)| n.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(PlayerId, Notice)>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Notifier for NoticeLog {
    fn notify(&self, player: PlayerId, notice: &Notice) {
        tracing::debug!(%player, %notice, "notice");
        self.lock().push((player, notice.clone()));
    }
}
