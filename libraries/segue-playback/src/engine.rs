//! Single-item playback engine abstraction
//!
//! The engine decodes and renders exactly one item at a time. It is driven
//! by the state machine and reports back asynchronously through an
//! [`EngineEventSink`], from whatever thread it likes.

use crate::types::MediaItem;
use crossbeam_channel::Sender;
use std::fmt;
use std::time::Duration;

/// Identity of one playback attempt of one item
///
/// Handed to the engine with every `target` call; engines tag item events
/// with it so events from superseded attempts can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationId(pub(crate) u64);

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs#{}", self.0)
    }
}

/// Identity of one seek request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeekId(pub(crate) u64);

impl fmt::Display for SeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seek#{}", self.0)
    }
}

/// Per-item signal raised by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum ItemSignal {
    /// Item metadata resolved; duration is `None` for live streams
    Ready { duration: Option<Duration> },

    /// Item could not be loaded or rendered
    Failed { reason: String },

    /// Item played to its end
    ReachedEnd,
}

/// Event raised by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Readiness/failure/end of the item targeted under `observation`
    Item {
        observation: ObservationId,
        signal: ItemSignal,
    },

    /// A seek finished (`finished == false` if the engine interrupted it)
    SeekCompleted { seek: SeekId, finished: bool },
}

impl EngineEvent {
    pub fn ready(observation: ObservationId, duration: Option<Duration>) -> Self {
        Self::Item {
            observation,
            signal: ItemSignal::Ready { duration },
        }
    }

    pub fn failed(observation: ObservationId, reason: impl Into<String>) -> Self {
        Self::Item {
            observation,
            signal: ItemSignal::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn reached_end(observation: ObservationId) -> Self {
        Self::Item {
            observation,
            signal: ItemSignal::ReachedEnd,
        }
    }

    pub fn seek_completed(seek: SeekId, finished: bool) -> Self {
        Self::SeekCompleted { seek, finished }
    }
}

/// Platform playback engine
///
/// Implementors hold at most one item. Every method must return promptly;
/// loading, seeking and end-of-item are reported later through the sink.
pub trait PlaybackEngine: Send {
    /// Replace the engine's target and start loading it
    fn target(&mut self, item: &MediaItem, observation: ObservationId);

    /// Start or resume rendering the target
    fn play(&mut self);

    /// Halt rendering, keeping the position
    fn pause(&mut self);

    /// Release the target
    fn stop(&mut self);

    /// Seek the target; completion is reported as `SeekCompleted { seek, .. }`
    fn seek(&mut self, position: Duration, seek: SeekId);

    /// Position within the target, if the engine knows it
    fn current_time(&self) -> Option<Duration>;

    /// Output volume, 0.0-1.0
    fn set_volume(&mut self, volume: f32);
}

/// Message delivered to the controller's owner thread
#[derive(Debug)]
pub(crate) enum OwnerMessage {
    Engine(EngineEvent),
    Wake,
    Shutdown,
}

/// Handle engines use to report events
///
/// Cheap to clone and usable from any thread. Events are marshalled onto the
/// controller's owner thread before they touch any playback state.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    tx: Sender<OwnerMessage>,
}

impl EngineEventSink {
    pub(crate) fn new(tx: Sender<OwnerMessage>) -> Self {
        Self { tx }
    }

    /// Report an event
    ///
    /// Returns false if the controller has shut down.
    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx.send(OwnerMessage::Engine(event)).is_ok()
    }
}
