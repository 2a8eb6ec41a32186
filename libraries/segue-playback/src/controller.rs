//! Playback controller facade
//!
//! Wraps the state machine in the shared-ownership runtime: commands lock the
//! machine, apply, drain the resulting events and unlock. Engine events and
//! fade ticks are applied by a dedicated owner thread under the same lock.

use crate::{
    config::PlayerConfig,
    engine::{EngineEventSink, OwnerMessage, PlaybackEngine},
    error::{PlaybackError, Result},
    events::PlaybackDelegate,
    integrations::{MediaControls, NowPlayingCenter, RemoteCommand},
    machine::PlaybackStateMachine,
    notify::{CallbackQueue, DedicatedThreadQueue, NotificationContext},
    types::{
        AssetKind, Locator, MediaItem, NowPlayingInfo, PlaybackState, PreparedItem,
        RetentionPolicy,
    },
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

struct Shared {
    machine: Mutex<PlaybackStateMachine>,
    notifier: NotificationContext,
}

impl Shared {
    /// Run `f` with exclusive access, then publish what it produced
    ///
    /// Dispatch happens before the lock is released so notifications keep
    /// the order of the transitions that caused them.
    fn apply<R>(&self, f: impl FnOnce(&mut PlaybackStateMachine) -> R) -> R {
        let mut machine = self.machine.lock();
        let result = f(&mut *machine);

        let events = machine.drain_events();
        let completions = machine.drain_seek_completions();
        self.notifier.publish(events);
        self.notifier.complete_seeks(completions);

        result
    }

    fn read<R>(&self, f: impl FnOnce(&PlaybackStateMachine) -> R) -> R {
        f(&*self.machine.lock())
    }
}

/// Builder for [`PlaybackController`]
pub struct PlaybackControllerBuilder {
    config: PlayerConfig,
    now_playing: Option<Box<dyn NowPlayingCenter>>,
    media_controls: Option<Box<dyn MediaControls>>,
    callback_queue: Option<Arc<dyn CallbackQueue>>,
    delegate: Option<Weak<dyn PlaybackDelegate>>,
    urls: Vec<String>,
}

impl PlaybackControllerBuilder {
    pub fn now_playing(mut self, center: Box<dyn NowPlayingCenter>) -> Self {
        self.now_playing = Some(center);
        self
    }

    pub fn media_controls(mut self, controls: Box<dyn MediaControls>) -> Self {
        self.media_controls = Some(controls);
        self
    }

    /// Queue notifications run on (default: a dedicated "segue-notify" thread)
    pub fn callback_queue(mut self, queue: Arc<dyn CallbackQueue>) -> Self {
        self.callback_queue = Some(queue);
        self
    }

    pub fn delegate(mut self, delegate: Weak<dyn PlaybackDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Pre-seed the queue
    pub fn urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Build the controller, handing the engine factory its event sink
    ///
    /// Initial locators that are invalid, unsupported or duplicated are
    /// skipped with a warning.
    pub fn build<F>(self, engine_factory: F) -> Result<PlaybackController>
    where
        F: FnOnce(EngineEventSink) -> Box<dyn PlaybackEngine>,
    {
        self.config.validate()?;

        let callback_queue: Arc<dyn CallbackQueue> = match self.callback_queue {
            Some(queue) => queue,
            None => Arc::new(DedicatedThreadQueue::spawn("segue-notify")?),
        };

        let (owner_tx, owner_rx) = unbounded();
        let engine = engine_factory(EngineEventSink::new(owner_tx.clone()));
        let tick = self.config.fade_tick_interval();

        let mut machine = PlaybackStateMachine::new(self.config, engine);
        if let Some(center) = self.now_playing {
            machine.set_now_playing_center(center);
        }
        if let Some(controls) = self.media_controls {
            machine.set_media_controls(controls);
        }

        let notifier = NotificationContext::new(callback_queue);
        notifier.set_delegate(self.delegate);

        let shared = Arc::new(Shared {
            machine: Mutex::new(machine),
            notifier,
        });

        for url in &self.urls {
            if let Err(e) = shared.apply(|m| {
                let locator = checked_locator(m.config(), url)?;
                m.enqueue(MediaItem::new(locator))
            }) {
                warn!(%url, %e, "Skipping initial locator");
            }
        }

        let owner = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("segue-owner".to_string())
                .spawn(move || run_owner(&shared, &owner_rx, tick))
                .map_err(|e| PlaybackError::Runtime(format!("failed to spawn segue-owner: {e}")))?
        };

        info!(queued = self.urls.len(), "Playback controller started");

        Ok(PlaybackController {
            shared,
            owner_tx,
            owner: Some(owner),
        })
    }
}

/// Owner thread: applies engine events and drives fade ticks
fn run_owner(shared: &Shared, rx: &Receiver<OwnerMessage>, tick: Duration) {
    debug!("Owner thread started");

    loop {
        let fading = shared.read(PlaybackStateMachine::is_fading);

        let message = if fading {
            match rx.recv_timeout(tick) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match rx.recv() {
                Ok(message) => Some(message),
                Err(_) => break,
            }
        };

        match message {
            Some(OwnerMessage::Shutdown) => break,
            Some(OwnerMessage::Engine(event)) => {
                shared.apply(|m| m.handle_engine_event(event));
            }
            Some(OwnerMessage::Wake) | None => {}
        }

        if fading || shared.read(PlaybackStateMachine::is_fading) {
            shared.apply(|m| m.tick(Instant::now()));
        }
    }

    debug!("Owner thread exiting");
}

fn checked_locator(config: &PlayerConfig, url: &str) -> Result<Locator> {
    let locator = Locator::parse(url)?;
    check_scheme(config, &locator)?;
    Ok(locator)
}

fn check_scheme(config: &PlayerConfig, locator: &Locator) -> Result<()> {
    if config.supports_scheme(locator.scheme()) {
        Ok(())
    } else {
        Err(PlaybackError::UnsupportedResourceKind(format!(
            "{} (scheme '{}')",
            locator,
            locator.scheme()
        )))
    }
}

fn prepared_locator(config: &PlayerConfig, item: PreparedItem) -> Result<Locator> {
    match item.asset {
        AssetKind::Url(locator) => {
            check_scheme(config, &locator)?;
            Ok(locator)
        }
        AssetKind::Opaque(description) => Err(PlaybackError::UnsupportedResourceKind(description)),
    }
}

/// Queue-driven playback controller
///
/// Presents a queue of resources as one continuous program on top of an
/// engine that only holds one item. Every method is safe to call from any
/// thread.
///
/// # Example
///
/// ```ignore
/// let controller = PlaybackController::new(PlayerConfig::default(), |sink| {
///     Box::new(MyEngine::new(sink))
/// })?;
/// controller.enqueue_url("https://example.com/a.mp3");
/// controller.play()?;
/// ```
pub struct PlaybackController {
    shared: Arc<Shared>,
    owner_tx: Sender<OwnerMessage>,
    owner: Option<JoinHandle<()>>,
}

impl PlaybackController {
    pub fn builder(config: PlayerConfig) -> PlaybackControllerBuilder {
        PlaybackControllerBuilder {
            config,
            now_playing: None,
            media_controls: None,
            callback_queue: None,
            delegate: None,
            urls: Vec::new(),
        }
    }

    /// Controller with an empty queue
    pub fn new<F>(config: PlayerConfig, engine_factory: F) -> Result<Self>
    where
        F: FnOnce(EngineEventSink) -> Box<dyn PlaybackEngine>,
    {
        Self::builder(config).build(engine_factory)
    }

    /// Controller pre-seeded with one locator
    pub fn with_url<F>(config: PlayerConfig, url: &str, engine_factory: F) -> Result<Self>
    where
        F: FnOnce(EngineEventSink) -> Box<dyn PlaybackEngine>,
    {
        Self::builder(config).urls([url]).build(engine_factory)
    }

    /// Controller pre-seeded with many locators, in order
    pub fn with_urls<I, S, F>(config: PlayerConfig, urls: I, engine_factory: F) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(EngineEventSink) -> Box<dyn PlaybackEngine>,
    {
        Self::builder(config).urls(urls).build(engine_factory)
    }

    // ===== Playback Control =====

    /// Clear the queue and play `url`
    pub fn play_url(&self, url: &str) -> Result<()> {
        self.shared.apply(|m| {
            let locator = checked_locator(m.config(), url)?;
            m.play_url(locator);
            Ok(())
        })
    }

    pub fn play(&self) -> Result<()> {
        self.shared.apply(PlaybackStateMachine::play)
    }

    /// Resume `url`, selecting it if it is queued but not current
    pub fn resume(&self, url: &str) -> Result<()> {
        let locator = Locator::parse(url)?;
        self.shared.apply(|m| m.resume(&locator))
    }

    pub fn pause(&self) {
        self.shared.apply(PlaybackStateMachine::pause);
    }

    pub fn stop(&self) {
        self.shared.apply(PlaybackStateMachine::stop);
    }

    pub fn toggle_playback(&self) -> Result<()> {
        self.shared.apply(PlaybackStateMachine::toggle_playback)
    }

    /// Seek the current item
    ///
    /// `callback` runs once on the callback queue with whether the seek
    /// finished.
    pub fn seek_to_time<C>(&self, position: Duration, callback: C)
    where
        C: FnOnce(bool) + Send + 'static,
    {
        self.shared
            .apply(|m| m.seek_to_time(position, Box::new(callback)));
    }

    /// Restart the current item, or go back one item near its start
    pub fn previous(&self) {
        self.shared.apply(PlaybackStateMachine::previous);
    }

    // ===== Volume =====

    /// Fade volume linearly over `duration`, superseding any active fade
    pub fn fade_volume(&self, from: f32, to: f32, duration: Duration) {
        self.shared
            .apply(|m| m.fade_volume(from, to, duration, Instant::now()));
        self.wake_owner();
    }

    pub fn set_volume(&self, volume: f32) {
        self.shared.apply(|m| m.set_volume(volume));
    }

    pub fn volume(&self) -> f32 {
        self.shared.read(PlaybackStateMachine::volume)
    }

    pub fn is_fading(&self) -> bool {
        self.shared.read(PlaybackStateMachine::is_fading)
    }

    // ===== Queue Management =====

    /// Enqueue `url`, reporting success
    pub fn enqueue_url(&self, url: &str) -> bool {
        match self.try_enqueue_url(url) {
            Ok(()) => true,
            Err(e) => {
                debug!(%url, %e, "Enqueue failed");
                false
            }
        }
    }

    pub fn try_enqueue_url(&self, url: &str) -> Result<()> {
        self.shared.apply(|m| {
            let locator = checked_locator(m.config(), url)?;
            m.enqueue(MediaItem::new(locator))
        })
    }

    /// Enqueue each url independently, in order
    ///
    /// Returns whether every url was accepted; accepted ones stay queued
    /// either way.
    pub fn enqueue_urls<I, S>(&self, urls: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls: Vec<S> = urls.into_iter().collect();
        self.shared.apply(|m| {
            let mut all_accepted = true;
            let mut items = Vec::with_capacity(urls.len());

            for url in &urls {
                match checked_locator(m.config(), url.as_ref()) {
                    Ok(locator) => items.push(MediaItem::new(locator)),
                    Err(e) => {
                        debug!(url = url.as_ref(), %e, "Rejected in batch");
                        all_accepted = false;
                    }
                }
            }

            let results = m.enqueue_each(items);
            all_accepted && results.iter().all(Result::is_ok)
        })
    }

    /// Enqueue an externally built item
    pub fn enqueue_item(&self, item: PreparedItem) -> Result<()> {
        self.shared.apply(|m| {
            let locator = prepared_locator(m.config(), item)?;
            m.enqueue(MediaItem::new(locator))
        })
    }

    /// Enqueue externally built items independently, in order
    pub fn enqueue_items(&self, items: Vec<PreparedItem>) -> bool {
        items
            .into_iter()
            .map(|item| self.enqueue_item(item))
            .fold(true, |all, result| all & result.is_ok())
    }

    /// Remove `url` from the queue, reporting success
    pub fn remove_url(&self, url: &str) -> bool {
        let Ok(locator) = Locator::parse(url) else {
            return false;
        };
        self.shared.apply(|m| m.remove(&locator)).is_ok()
    }

    pub fn remove_all_urls(&self) {
        self.shared.apply(PlaybackStateMachine::remove_all);
    }

    /// Skip to the next queued item
    pub fn advance_to_next_url(&self) -> Result<()> {
        self.shared.apply(PlaybackStateMachine::advance_to_next)
    }

    // ===== State Queries =====

    pub fn is_playing(&self) -> bool {
        self.shared.read(PlaybackStateMachine::is_playing)
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.shared.read(PlaybackStateMachine::state)
    }

    pub fn current_playing_url(&self) -> Option<Locator> {
        self.shared.read(|m| m.current_locator().cloned())
    }

    /// Duration of the current item, `None` until it is ready
    pub fn duration_of_current_playing_url(&self) -> Option<Duration> {
        self.shared
            .read(PlaybackStateMachine::current_items_duration)
    }

    pub fn current_items_duration(&self) -> Option<Duration> {
        self.duration_of_current_playing_url()
    }

    pub fn current_time(&self) -> Option<Duration> {
        self.shared.read(PlaybackStateMachine::current_time)
    }

    pub fn enqueued_urls(&self) -> Vec<Locator> {
        self.shared.read(PlaybackStateMachine::enqueued_locators)
    }

    // ===== Flags =====

    pub fn automatically_update_now_playing_info(&self) -> bool {
        self.shared
            .read(|m| m.config().automatically_update_now_playing_info)
    }

    pub fn set_automatically_update_now_playing_info(&self, enabled: bool) {
        self.shared
            .apply(|m| m.set_automatically_update_now_playing_info(enabled));
    }

    pub fn uses_media_controls(&self) -> bool {
        self.shared.read(|m| m.config().uses_media_controls)
    }

    pub fn set_uses_media_controls(&self, enabled: bool) {
        self.shared.apply(|m| m.set_uses_media_controls(enabled));
    }

    pub fn remove_all_urls_on_playback_stop(&self) -> bool {
        self.shared
            .read(|m| m.config().remove_all_urls_on_playback_stop)
    }

    pub fn set_remove_all_urls_on_playback_stop(&self, enabled: bool) {
        self.shared
            .apply(|m| m.set_remove_all_urls_on_playback_stop(enabled));
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.shared.read(|m| m.config().retention)
    }

    pub fn set_retention(&self, retention: RetentionPolicy) {
        self.shared.apply(|m| m.set_retention(retention));
    }

    // ===== Integrations =====

    /// Replace the delegate; `None` silences notifications
    pub fn set_delegate(&self, delegate: Option<Weak<dyn PlaybackDelegate>>) {
        self.shared.notifier.set_delegate(delegate);
    }

    pub fn set_callback_queue(&self, queue: Arc<dyn CallbackQueue>) {
        self.shared.notifier.set_queue(queue);
    }

    /// Associate now-playing metadata with `url`
    pub fn set_now_playing_info(&self, url: &str, info: NowPlayingInfo) -> Result<()> {
        let locator = Locator::parse(url)?;
        self.shared
            .apply(|m| m.set_now_playing_info(locator, info));
        Ok(())
    }

    /// Feed a remote-control command; false if media controls are off
    pub fn handle_remote_command(&self, command: RemoteCommand) -> bool {
        self.shared
            .apply(|m| m.handle_remote_command(command))
    }

    fn wake_owner(&self) {
        if self.owner_tx.send(OwnerMessage::Wake).is_err() {
            warn!("Owner thread gone");
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.shared.apply(PlaybackStateMachine::shutdown);

        // Engines may still hold a sink, so the channel never disconnects
        let _ = self.owner_tx.send(OwnerMessage::Shutdown);
        if let Some(owner) = self.owner.take() {
            if owner.join().is_err() {
                warn!("Owner thread panicked");
            }
        }
        info!("Playback controller shut down");
    }
}
