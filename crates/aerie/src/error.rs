//! Unified error type for Aerie.

use std::path::PathBuf;

use aerie_session::SessionError;
use aerie_store::StoreError;

/// A configuration file that could not be used at all.
///
/// Malformed entries inside a readable file are not errors: they are
/// skipped with a warning and the built-in values fill the gap.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors, so callers
/// of the service deal with this one type.
#[derive(Debug, thiserror::Error)]
pub enum AerieError {
    /// A flight operation did not go through (expected outcome or an
    /// unreadable record).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The durable store could not be opened or used.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No speed is configured for the requested level.
    #[error("no fly speed configured for level {level}")]
    UnknownSpeed { level: u32, available: Vec<u32> },

    /// The flight service has stopped.
    #[error("flight service unavailable")]
    ServiceUnavailable,
}

impl AerieError {
    /// The expected session outcome inside, if this is one.
    pub fn as_session(&self) -> Option<&SessionError> {
        match self {
            Self::Session(e) => Some(e),
            _ => None,
        }
    }
}
