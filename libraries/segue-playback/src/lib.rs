//! Segue - Queue-driven playback control
//!
//! Sequences a queue of local or remote media resources through a playback
//! engine that only ever holds one item, presenting them as one continuous
//! program.
//!
//! This crate provides:
//! - Ordered, duplicate-free playback queue with retention policies
//! - Readiness tracking per item (loading, ready, failed)
//! - Playback state machine (Stopped, Playing, Paused) with auto-advance
//! - Load failures skipped like end-of-item
//! - Timer-driven linear volume fades
//! - Seek with exactly-once completion callbacks
//! - Now-playing and remote-control integration points
//!
//! # Architecture
//!
//! `segue-playback` owns no audio or platform code:
//! - The engine is a [`PlaybackEngine`] trait object
//! - Engine events are marshalled onto a single owner thread
//! - Delegate notifications run on a configurable [`CallbackQueue`]
//!
//! # Example: Driving the state machine
//!
//! ```rust
//! use segue_playback::{
//!     EngineEvent, Locator, MediaItem, ObservationId, PlaybackEngine, PlaybackState,
//!     PlaybackStateMachine, PlayerConfig, SeekId,
//! };
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! #[derive(Default)]
//! struct Silent {
//!     observation: Arc<Mutex<Option<ObservationId>>>,
//! }
//!
//! impl PlaybackEngine for Silent {
//!     fn target(&mut self, _item: &MediaItem, observation: ObservationId) {
//!         *self.observation.lock().unwrap() = Some(observation);
//!     }
//!     fn play(&mut self) {}
//!     fn pause(&mut self) {}
//!     fn stop(&mut self) {}
//!     fn seek(&mut self, _position: Duration, _seek: SeekId) {}
//!     fn current_time(&self) -> Option<Duration> { None }
//!     fn set_volume(&mut self, _volume: f32) {}
//! }
//!
//! let engine = Silent::default();
//! let observation = engine.observation.clone();
//! let mut machine = PlaybackStateMachine::new(PlayerConfig::default(), Box::new(engine));
//!
//! machine.enqueue(MediaItem::new(Locator::parse("file:///music/a.flac")?))?;
//! machine.enqueue(MediaItem::new(Locator::parse("file:///music/b.flac")?))?;
//! machine.play()?;
//!
//! // The engine reports that the first item finished
//! let first = observation.lock().unwrap().unwrap();
//! machine.handle_engine_event(EngineEvent::reached_end(first));
//!
//! assert_eq!(machine.state(), PlaybackState::Playing);
//! assert_eq!(machine.current_locator().unwrap().as_str(), "file:///music/b.flac");
//! # Ok::<(), segue_playback::PlaybackError>(())
//! ```
//!
//! # Example: Threaded controller
//!
//! ```rust,ignore
//! use segue_playback::{PlaybackController, PlayerConfig};
//!
//! let controller = PlaybackController::with_urls(
//!     PlayerConfig::default(),
//!     ["https://example.com/a.mp3", "https://example.com/b.mp3"],
//!     |sink| Box::new(MyEngine::new(sink)),
//! )?;
//!
//! controller.play()?;
//! controller.fade_volume(0.0, 1.0, std::time::Duration::from_secs(2));
//! ```

mod config;
mod controller;
mod engine;
mod error;
mod events;
mod fader;
mod integrations;
mod machine;
mod notify;
mod observer;
mod queue;
pub mod types;

// Public exports
pub use config::PlayerConfig;
pub use controller::{PlaybackController, PlaybackControllerBuilder};
pub use engine::{EngineEvent, EngineEventSink, ItemSignal, ObservationId, PlaybackEngine, SeekId};
pub use error::{PlaybackError, Result};
pub use events::{PlaybackDelegate, PlaybackEvent};
pub use fader::{FadeOperation, VolumeFader};
pub use integrations::{MediaControls, NowPlayingCenter, RemoteCommand};
pub use machine::PlaybackStateMachine;
pub use notify::{CallbackQueue, DedicatedThreadQueue, ImmediateQueue, Job, SeekCallback};
pub use observer::{ItemEvent, ItemReadinessObserver};
pub use queue::{PlaybackQueue, Removal};
pub use types::{
    AssetKind, Locator, MediaItem, NowPlayingInfo, NowPlayingUpdate, PlaybackState,
    PreparedItem, ReadinessStatus, RetentionPolicy,
};
