//! Playback state machine - core orchestration
//!
//! Owns the queue, the engine handle, readiness observation and the fader,
//! and reconciles user commands, item readiness and end-of-item signals into
//! one consistent state. All methods are synchronous; serialisation across
//! threads is the controller's job.

use crate::{
    config::PlayerConfig,
    engine::{EngineEvent, ItemSignal, ObservationId, PlaybackEngine, SeekId},
    error::{PlaybackError, Result},
    events::PlaybackEvent,
    fader::VolumeFader,
    integrations::{MediaControls, NowPlayingCenter, RemoteCommand},
    notify::SeekCallback,
    observer::{ItemEvent, ItemReadinessObserver},
    queue::PlaybackQueue,
    types::{
        Locator, MediaItem, NowPlayingInfo, NowPlayingUpdate, PlaybackState, RetentionPolicy,
    },
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Position past which "previous" restarts the current item instead of
/// moving back
const RESTART_THRESHOLD: Duration = Duration::from_secs(3);

struct PendingSeek {
    id: SeekId,
    callback: SeekCallback,
}

/// Queue-driven playback state machine
///
/// States: `Stopped` (no engine target), `Playing`, `Paused`. The engine
/// target is a single slot written only here, and it always names the
/// queue's current item when set.
pub struct PlaybackStateMachine {
    state: PlaybackState,
    config: PlayerConfig,

    queue: PlaybackQueue,
    engine: Box<dyn PlaybackEngine>,
    target: Option<Locator>,
    observer: ItemReadinessObserver,

    fader: VolumeFader,
    volume: f32,

    pending_seek: Option<PendingSeek>,
    next_seek_id: u64,

    now_playing: Option<Box<dyn NowPlayingCenter>>,
    now_playing_info: HashMap<Locator, NowPlayingInfo>,
    media_controls: Option<Box<dyn MediaControls>>,
    receiving_controls: bool,

    // Drained by the controller after every transition
    pending_events: Vec<PlaybackEvent>,
    seek_completions: Vec<(SeekCallback, bool)>,

    shut_down: bool,
}

impl PlaybackStateMachine {
    pub fn new(config: PlayerConfig, mut engine: Box<dyn PlaybackEngine>) -> Self {
        let volume = config.initial_volume.clamp(0.0, 1.0);
        engine.set_volume(volume);

        Self {
            state: PlaybackState::Stopped,
            config,
            queue: PlaybackQueue::new(),
            engine,
            target: None,
            observer: ItemReadinessObserver::new(),
            fader: VolumeFader::new(),
            volume,
            pending_seek: None,
            next_seek_id: 0,
            now_playing: None,
            now_playing_info: HashMap::new(),
            media_controls: None,
            receiving_controls: false,
            pending_events: Vec::new(),
            seek_completions: Vec::new(),
            shut_down: false,
        }
    }

    // ===== Integrations =====

    pub fn set_now_playing_center(&mut self, center: Box<dyn NowPlayingCenter>) {
        self.now_playing = Some(center);
        self.refresh_now_playing();
    }

    /// Install remote-control registration
    ///
    /// Starts receiving immediately if media controls are enabled.
    pub fn set_media_controls(&mut self, controls: Box<dyn MediaControls>) {
        self.end_media_controls();
        self.media_controls = Some(controls);
        if self.config.uses_media_controls {
            self.begin_media_controls();
        }
    }

    /// Associate now-playing metadata with a locator
    pub fn set_now_playing_info(&mut self, locator: Locator, info: NowPlayingInfo) {
        let is_target = self.target.as_ref() == Some(&locator);
        self.now_playing_info.insert(locator, info);
        if is_target {
            self.refresh_now_playing();
        }
    }

    // ===== Configuration flags =====

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn set_automatically_update_now_playing_info(&mut self, enabled: bool) {
        self.config.automatically_update_now_playing_info = enabled;
        if enabled {
            self.refresh_now_playing();
        } else if let Some(center) = self.now_playing.as_mut() {
            center.clear();
        }
    }

    pub fn set_uses_media_controls(&mut self, enabled: bool) {
        self.config.uses_media_controls = enabled;
        if enabled {
            self.begin_media_controls();
        } else {
            self.end_media_controls();
        }
    }

    pub fn set_remove_all_urls_on_playback_stop(&mut self, enabled: bool) {
        self.config.remove_all_urls_on_playback_stop = enabled;
    }

    pub fn set_retention(&mut self, retention: RetentionPolicy) {
        self.config.retention = retention;
    }

    // ===== Playback Control =====

    /// Clear the queue and play `locator`
    pub fn play_url(&mut self, locator: Locator) {
        self.transition(move |m| {
            m.release_target();
            m.queue.remove_all();
            if let Err(e) = m.queue.enqueue(MediaItem::new(locator)) {
                warn!(%e, "Enqueue into cleared queue rejected");
                return;
            }
            m.emit_queue_changed();

            if let Some(locator) = m.target_current() {
                m.engine.play();
                m.set_state(PlaybackState::Playing);
                m.emit_started_item(locator);
            }
        });
    }

    /// Start or resume playback
    ///
    /// From `Stopped` the queue's current item is targeted; an empty queue
    /// leaves the machine stopped and reports `NoCurrentItem`.
    pub fn play(&mut self) -> Result<()> {
        self.transition(|m| m.play_current())
    }

    /// Resume `locator`
    ///
    /// If it is the current target, playback resumes in place. If it is
    /// another queued item, that item becomes current and is targeted,
    /// keeping its place in the queue.
    pub fn resume(&mut self, locator: &Locator) -> Result<()> {
        self.transition(|m| {
            if m.target.as_ref() == Some(locator) {
                return m.play_current();
            }

            if m.queue.select(locator).is_none() {
                return Err(PlaybackError::NotEnqueued(locator.clone()));
            }

            if let Some(target) = m.target_current() {
                m.engine.play();
                m.set_state(PlaybackState::Playing);
                m.emit_started_item(target);
            }
            Ok(())
        })
    }

    /// Pause playback
    ///
    /// Cancels any active fade, leaving the volume where it was.
    pub fn pause(&mut self) {
        self.transition(|m| {
            if m.state != PlaybackState::Playing {
                return;
            }
            m.fader.cancel();
            m.engine.pause();
            m.set_state(PlaybackState::Paused);
        });
    }

    /// Stop playback
    ///
    /// The engine releases its target. The queue is cleared when
    /// `remove_all_urls_on_playback_stop` is set, otherwise rewound to its
    /// first item.
    pub fn stop(&mut self) {
        self.transition(|m| m.enter_stopped());
    }

    pub fn toggle_playback(&mut self) -> Result<()> {
        if self.state == PlaybackState::Playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Finish the current item now and move on as if it had reached its end
    pub fn advance_to_next(&mut self) -> Result<()> {
        let from = self
            .queue
            .current()
            .map(|item| item.locator().clone())
            .ok_or(PlaybackError::NoCurrentItem)?;

        self.transition(|m| {
            m.pending_events.push(PlaybackEvent::ItemFinished {
                locator: from.clone(),
            });
            m.advance_from(from);
        });
        Ok(())
    }

    /// Restart the current item, or move back one item near its start
    pub fn previous(&mut self) {
        if self
            .current_time()
            .is_some_and(|position| position > RESTART_THRESHOLD)
        {
            self.seek_to_time(Duration::ZERO, Box::new(|_| {}));
            return;
        }

        self.transition(|m| {
            let Some(previous) = m.queue.retreat().map(|item| item.locator().clone()) else {
                if m.target.is_some() {
                    m.seek_to_time(Duration::ZERO, Box::new(|_| {}));
                }
                return;
            };

            debug!(%previous, "Moved back one item");
            if m.state == PlaybackState::Stopped {
                return;
            }
            if let Some(locator) = m.target_current() {
                if m.state == PlaybackState::Playing {
                    m.engine.play();
                    m.emit_started_item(locator);
                }
            }
        });
    }

    // ===== Seek =====

    /// Seek within the current target
    ///
    /// `callback` runs exactly once. It gets `false` when there is nothing
    /// to seek, or when the seek is superseded by another seek, a stop or a
    /// change of target before the engine completes it.
    pub fn seek_to_time(&mut self, position: Duration, callback: SeekCallback) {
        if self.state == PlaybackState::Stopped || self.target.is_none() {
            debug!(?position, "Seek without a target");
            self.seek_completions.push((callback, false));
            return;
        }

        self.cancel_pending_seek();
        self.next_seek_id += 1;
        let id = SeekId(self.next_seek_id);
        debug!(seek = %id, ?position, "Seeking");
        self.pending_seek = Some(PendingSeek { id, callback });
        self.engine.seek(position, id);
    }

    // ===== Volume =====

    /// Fade the output volume linearly from `from` to `to`
    ///
    /// Supersedes any in-flight fade. The owner thread advances it through
    /// [`tick`](Self::tick).
    pub fn fade_volume(&mut self, from: f32, to: f32, duration: Duration, now: Instant) {
        if self.fader.cancel().is_some() {
            debug!("Superseding in-flight fade");
        }
        let start = self.fader.start(from, to, duration, now);
        self.apply_volume(start);
        self.tick(now);
    }

    /// Advance an active fade
    pub fn tick(&mut self, now: Instant) {
        let Some(volume) = self.fader.tick(now) else {
            return;
        };
        self.apply_volume(volume);

        if !self.fader.is_active() {
            debug!(volume, "Fade completed");
            self.pending_events.push(PlaybackEvent::FadeCompleted { volume });
        }
    }

    /// Set the volume directly, cancelling any fade
    pub fn set_volume(&mut self, volume: f32) {
        self.fader.cancel();
        self.apply_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_fading(&self) -> bool {
        self.fader.is_active()
    }

    // ===== Queue Management =====

    /// Append an item
    pub fn enqueue(&mut self, item: MediaItem) -> Result<()> {
        let locator = item.locator().clone();
        match self.queue.enqueue(item) {
            Ok(()) => {
                debug!(%locator, "Enqueued");
                self.emit_queue_changed();
                Ok(())
            }
            Err(e) => {
                debug!(%e, "Enqueue rejected");
                Err(e)
            }
        }
    }

    /// Append items independently, in order
    pub fn enqueue_each(&mut self, items: Vec<MediaItem>) -> Vec<Result<()>> {
        let results = self.queue.enqueue_each(items);
        if results.iter().any(Result::is_ok) {
            self.emit_queue_changed();
        }
        results
    }

    /// Remove the item with `locator`
    ///
    /// Removing the current target stops targeting it first, then retargets
    /// the following item (keeping Playing/Paused) or stops if none follows.
    pub fn remove(&mut self, locator: &Locator) -> Result<()> {
        if !self.queue.contains(locator) {
            return Err(PlaybackError::NotEnqueued(locator.clone()));
        }

        self.transition(|m| {
            let targeted = m.target.as_ref() == Some(locator);
            if targeted {
                m.cancel_pending_seek();
                m.observer.detach();
            }

            let Some(removal) = m.queue.remove(locator) else {
                return;
            };
            debug!(%locator, index = removal.index, was_current = removal.was_current, "Removed");
            m.emit_queue_changed();

            if !removal.was_current {
                return;
            }

            if m.queue.current_index().is_none() {
                if targeted {
                    m.halt();
                } else {
                    m.queue.rewind();
                }
                return;
            }

            if targeted {
                if let Some(next) = m.target_current() {
                    if m.state == PlaybackState::Playing {
                        m.engine.play();
                        m.emit_started_item(next);
                    }
                }
            }
        });
        Ok(())
    }

    /// Remove every item, stopping playback
    pub fn remove_all(&mut self) {
        self.transition(|m| {
            m.halt();
            if !m.queue.is_empty() {
                m.queue.remove_all();
                m.emit_queue_changed();
            }
        });
    }

    // ===== Engine Events =====

    /// Apply an event raised by the engine
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Item {
                observation,
                signal,
            } => self.handle_item_signal(observation, signal),
            EngineEvent::SeekCompleted { seek, finished } => {
                self.handle_seek_completed(seek, finished);
            }
        }
    }

    fn handle_item_signal(&mut self, observation: ObservationId, signal: ItemSignal) {
        let Some((locator, event)) = self.observer.accept(observation, signal) else {
            return;
        };

        match self.queue.find_mut(&locator) {
            Some(item) => ItemReadinessObserver::apply(&event, item),
            None => {
                warn!(%locator, "Event for an item that is no longer queued");
                return;
            }
        }

        self.transition(move |m| match event {
            ItemEvent::BecameReady(duration) => {
                debug!(%locator, ?duration, "Item ready");
                m.pending_events
                    .push(PlaybackEvent::ItemReady { locator, duration });
                m.refresh_now_playing();
            }
            ItemEvent::Failed(reason) => {
                warn!(%locator, %reason, "Item failed to load, skipping");
                m.pending_events.push(PlaybackEvent::ItemFailed {
                    locator: locator.clone(),
                    reason,
                });
                m.advance_from(locator);
            }
            ItemEvent::ReachedEnd => {
                debug!(%locator, "Item reached end");
                m.pending_events.push(PlaybackEvent::ItemFinished {
                    locator: locator.clone(),
                });
                m.advance_from(locator);
            }
        });
    }

    fn handle_seek_completed(&mut self, seek: SeekId, finished: bool) {
        match self.pending_seek.take() {
            Some(pending) if pending.id == seek => {
                debug!(%seek, finished, "Seek completed");
                self.seek_completions.push((pending.callback, finished));
                self.refresh_now_playing();
            }
            other => {
                self.pending_seek = other;
                debug!(%seek, "Dropping completion of superseded seek");
            }
        }
    }

    // ===== Remote Commands =====

    /// Handle a remote-control command like the equivalent local call
    ///
    /// Returns false (and does nothing) while media controls are disabled.
    pub fn handle_remote_command(&mut self, command: RemoteCommand) -> bool {
        if !self.config.uses_media_controls {
            debug!(?command, "Media controls disabled, ignoring remote command");
            return false;
        }

        info!(?command, "Remote command");
        let result = match command {
            RemoteCommand::Play => self.play(),
            RemoteCommand::Pause => {
                self.pause();
                Ok(())
            }
            RemoteCommand::TogglePlayPause => self.toggle_playback(),
            RemoteCommand::Stop => {
                self.stop();
                Ok(())
            }
            RemoteCommand::Next => self.advance_to_next(),
            RemoteCommand::Previous => {
                self.previous();
                Ok(())
            }
        };
        if let Err(e) = result {
            debug!(?command, %e, "Remote command had no effect");
        }
        true
    }

    // ===== State Queries =====

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Locator the engine currently targets
    pub fn current_locator(&self) -> Option<&Locator> {
        self.target.as_ref()
    }

    /// Duration of the current target, `None` until it is ready
    pub fn current_items_duration(&self) -> Option<Duration> {
        self.target_item()?.duration()
    }

    /// Position within the current target, `None` until it is ready
    pub fn current_time(&self) -> Option<Duration> {
        if self.target_item()?.is_ready() {
            self.engine.current_time()
        } else {
            None
        }
    }

    pub fn enqueued_locators(&self) -> Vec<Locator> {
        self.queue.locators()
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    // ===== Events =====

    /// Drain all pending events
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Drain seek callbacks resolved since the last drain
    pub fn drain_seek_completions(&mut self) -> Vec<(SeekCallback, bool)> {
        std::mem::take(&mut self.seek_completions)
    }

    /// Release the engine and system integrations
    ///
    /// Runs once; later calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.halt();
        self.end_media_controls();
        if let Some(center) = self.now_playing.as_mut() {
            center.clear();
        }
    }

    // ===== Internals =====

    /// Run a transition and refresh now-playing info if state or target moved
    fn transition<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let state = self.state;
        let target = self.target.clone();

        let result = f(&mut *self);

        if state != self.state || target != self.target {
            self.refresh_now_playing();
        }
        result
    }

    fn play_current(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => {
                self.engine.play();
                self.set_state(PlaybackState::Playing);
                Ok(())
            }
            PlaybackState::Stopped => {
                if self.queue.current().is_none() {
                    self.queue.rewind();
                }
                let Some(locator) = self.target_current() else {
                    debug!("Play requested with an empty queue");
                    return Err(PlaybackError::NoCurrentItem);
                };
                self.engine.play();
                self.set_state(PlaybackState::Playing);
                self.emit_started_item(locator);
                Ok(())
            }
        }
    }

    /// Point the engine at the queue's current item
    ///
    /// Starts a fresh observation so signals from the previous target are
    /// dropped. Returns the targeted locator.
    fn target_current(&mut self) -> Option<Locator> {
        self.cancel_pending_seek();

        let item = self.queue.current_mut()?;
        ItemReadinessObserver::mark_loading(item);
        let locator = item.locator().clone();

        let observation = self.observer.attach(locator.clone());
        let item = self.queue.current()?;
        self.engine.target(item, observation);
        self.target = Some(locator.clone());

        debug!(%locator, %observation, "Engine targeted");
        Some(locator)
    }

    fn release_target(&mut self) {
        self.cancel_pending_seek();
        self.observer.detach();
        if let Some(locator) = self.target.take() {
            debug!(%locator, "Engine released");
            self.engine.stop();
        }
    }

    /// Move past `from`: retarget the next item or stop at the end
    fn advance_from(&mut self, from: Locator) {
        self.cancel_pending_seek();
        self.observer.detach();

        let Some(to) = self.queue.advance().map(|item| item.locator().clone()) else {
            info!(last = %from, "Queue exhausted");
            self.pending_events
                .push(PlaybackEvent::QueueExhausted { last: from });
            self.enter_stopped();
            return;
        };

        if self.config.retention == RetentionPolicy::Remove && self.queue.drop_consumed() > 0 {
            self.emit_queue_changed();
        }

        info!(%from, %to, "Advanced to next item");
        self.pending_events
            .push(PlaybackEvent::Advanced { from, to });

        if self.state == PlaybackState::Stopped {
            return;
        }
        if let Some(locator) = self.target_current() {
            if self.state == PlaybackState::Playing {
                self.engine.play();
                self.emit_started_item(locator);
            }
        }
    }

    /// Stop without touching queue contents
    fn halt(&mut self) {
        self.fader.cancel();
        self.release_target();
        self.queue.rewind();
        self.set_state(PlaybackState::Stopped);
    }

    /// Stop and apply the queue retention flag
    fn enter_stopped(&mut self) {
        self.halt();
        if self.config.remove_all_urls_on_playback_stop && !self.queue.is_empty() {
            self.queue.remove_all();
            self.emit_queue_changed();
        }
    }

    fn cancel_pending_seek(&mut self) {
        if let Some(seek) = self.pending_seek.take() {
            debug!(seek = %seek.id, "Seek superseded");
            self.seek_completions.push((seek.callback, false));
        }
    }

    fn target_item(&self) -> Option<&MediaItem> {
        let target = self.target.as_ref()?;
        self.queue
            .current()
            .filter(|item| item.locator() == target)
    }

    fn apply_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.engine.set_volume(self.volume);
    }

    fn begin_media_controls(&mut self) {
        if self.receiving_controls {
            return;
        }
        if let Some(controls) = self.media_controls.as_mut() {
            controls.begin_receiving();
            self.receiving_controls = true;
        }
    }

    fn end_media_controls(&mut self) {
        if !self.receiving_controls {
            return;
        }
        if let Some(controls) = self.media_controls.as_mut() {
            controls.end_receiving();
        }
        self.receiving_controls = false;
    }

    fn refresh_now_playing(&mut self) {
        if !self.config.automatically_update_now_playing_info || self.now_playing.is_none() {
            return;
        }

        let update = match (self.state, self.target.as_ref()) {
            (PlaybackState::Stopped, _) | (_, None) => None,
            (state, Some(locator)) => Some(NowPlayingUpdate {
                locator: locator.clone(),
                info: self
                    .now_playing_info
                    .get(locator)
                    .cloned()
                    .unwrap_or_default(),
                elapsed: self.current_time(),
                duration: self.current_items_duration(),
                rate: if state == PlaybackState::Playing { 1.0 } else { 0.0 },
            }),
        };

        if let Some(center) = self.now_playing.as_mut() {
            match update {
                Some(update) => center.update(update),
                None => center.clear(),
            }
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        info!(from = ?self.state, to = ?state, "Playback state changed");
        self.state = state;
        self.pending_events.push(PlaybackEvent::StateChanged { state });
    }

    fn emit_started_item(&mut self, locator: Locator) {
        self.pending_events
            .push(PlaybackEvent::StartedItem { locator });
    }

    fn emit_queue_changed(&mut self) {
        self.pending_events.push(PlaybackEvent::QueueChanged {
            length: self.queue.len(),
        });
    }
}

impl Drop for PlaybackStateMachine {
    fn drop(&mut self) {
        self.shutdown();

        // Nobody is left to drain these
        for (callback, finished) in self.drain_seek_completions() {
            callback(finished);
        }
    }
}
