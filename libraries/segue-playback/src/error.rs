//! Error types for playback control

use crate::types::Locator;
use thiserror::Error;

/// Playback errors
///
/// None of these are fatal: enqueue/remove failures are reported to the
/// caller, item load failures are recovered by skipping to the next item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// Locator is already in the queue
    #[error("Already enqueued: {0}")]
    DuplicateEnqueue(Locator),

    /// Resource cannot be played by this controller
    #[error("Unsupported resource kind: {0}")]
    UnsupportedResourceKind(String),

    /// Engine failed to load an item
    #[error("Failed to load {locator}: {reason}")]
    ItemLoadFailure { locator: Locator, reason: String },

    /// Query or command needs a current item and there is none
    #[error("No current item")]
    NoCurrentItem,

    /// Locator is not in the queue
    #[error("Not enqueued: {0}")]
    NotEnqueued(Locator),

    /// String could not be parsed as a locator
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Controller threads could not be started
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
