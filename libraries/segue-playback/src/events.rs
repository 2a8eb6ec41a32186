//! Playback Events
//!
//! Event-based communication with the embedding application. The state
//! machine accumulates events during a transition; the controller drains
//! them and forwards each one to the delegate on the notification context.

use crate::error::PlaybackError;
use crate::types::{Locator, PlaybackState};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Events emitted by the playback state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Playback state changed
    StateChanged {
        /// The new playback state
        state: PlaybackState,
    },

    /// Engine started on a new target while playing
    StartedItem {
        /// Locator now being rendered
        locator: Locator,
    },

    /// Current target finished loading
    ItemReady {
        locator: Locator,
        /// `None` for indefinite (live) resources
        duration: Option<Duration>,
    },

    /// Current target played to its end
    ItemFinished { locator: Locator },

    /// Current target failed to load; playback skips past it
    ItemFailed { locator: Locator, reason: String },

    /// Queue moved on to the next item
    Advanced { from: Locator, to: Locator },

    /// Nothing left to play after `last`
    QueueExhausted { last: Locator },

    /// Queue contents changed (items added/removed)
    QueueChanged {
        /// New queue length
        length: usize,
    },

    /// A fade reached its target volume
    FadeCompleted { volume: f32 },
}

impl PlaybackEvent {
    /// Invoke the matching delegate method
    pub fn dispatch(&self, delegate: &dyn PlaybackDelegate) {
        match self {
            PlaybackEvent::StateChanged { state } => delegate.state_changed(*state),
            PlaybackEvent::StartedItem { locator } => delegate.started_item(locator),
            PlaybackEvent::ItemReady { locator, duration } => {
                delegate.item_ready(locator, *duration);
            }
            PlaybackEvent::ItemFinished { locator } => delegate.item_finished(locator),
            PlaybackEvent::ItemFailed { locator, reason } => {
                delegate.item_failed(&PlaybackError::ItemLoadFailure {
                    locator: locator.clone(),
                    reason: reason.clone(),
                });
            }
            PlaybackEvent::Advanced { from, to } => delegate.advanced(from, to),
            PlaybackEvent::QueueExhausted { last } => delegate.queue_exhausted(last),
            PlaybackEvent::QueueChanged { length } => delegate.queue_changed(*length),
            PlaybackEvent::FadeCompleted { volume } => delegate.fade_completed(*volume),
        }
    }
}

/// Receiver of playback notifications
///
/// Every method has an empty default so implementors only pick what they
/// need. Methods are called on the controller's callback queue, in the order
/// the transitions happened.
pub trait PlaybackDelegate: Send + Sync {
    fn state_changed(&self, _state: PlaybackState) {}

    fn started_item(&self, _locator: &Locator) {}

    fn item_ready(&self, _locator: &Locator, _duration: Option<Duration>) {}

    fn item_finished(&self, _locator: &Locator) {}

    /// Always called with [`PlaybackError::ItemLoadFailure`]
    fn item_failed(&self, _error: &PlaybackError) {}

    fn advanced(&self, _from: &Locator, _to: &Locator) {}

    fn queue_exhausted(&self, _last: &Locator) {}

    fn queue_changed(&self, _length: usize) {}

    fn fade_completed(&self, _volume: f32) {}
}
