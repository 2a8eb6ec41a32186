//! Common test utilities and fixtures
#![allow(dead_code)]

use parking_lot::Mutex;
use segue_playback::{
    EngineEvent, EngineEventSink, Locator, MediaControls, MediaItem, NowPlayingCenter,
    NowPlayingUpdate, ObservationId, PlaybackDelegate, PlaybackEngine, PlaybackError,
    PlaybackState, SeekId,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub fn locator(name: &str) -> Locator {
    Locator::parse(&url(name)).unwrap()
}

pub fn url(name: &str) -> String {
    format!("https://media.example.com/{name}.mp3")
}

pub fn item(name: &str) -> MediaItem {
    MediaItem::new(locator(name))
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ===== Engine =====

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Target(Locator),
    Play,
    Pause,
    Stop,
    Seek(Duration),
    Volume(f32),
}

#[derive(Default)]
struct EngineState {
    calls: Vec<EngineCall>,
    target: Option<(Locator, ObservationId)>,
    position: Duration,
    seeks: Vec<SeekId>,
    volume: f32,
}

/// Test-side view of a [`RecordingEngine`]
///
/// Clones share state with the engine handed to the controller.
#[derive(Clone, Default)]
pub struct EngineSpy {
    state: Arc<Mutex<EngineState>>,
    sink: Arc<Mutex<Option<EngineEventSink>>>,
}

impl EngineSpy {
    pub fn engine(&self) -> Box<dyn PlaybackEngine> {
        Box::new(RecordingEngine {
            spy: self.clone(),
        })
    }

    /// Engine factory for the threaded controller
    pub fn factory(&self) -> impl FnOnce(EngineEventSink) -> Box<dyn PlaybackEngine> {
        let spy = self.clone();
        move |sink| {
            *spy.sink.lock() = Some(sink);
            spy.engine()
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn targets(&self) -> Vec<Locator> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Target(locator) => Some(locator),
                _ => None,
            })
            .collect()
    }

    pub fn target(&self) -> Option<Locator> {
        self.state.lock().target.as_ref().map(|(l, _)| l.clone())
    }

    /// Observation of the current engine target
    pub fn observation(&self) -> ObservationId {
        self.state
            .lock()
            .target
            .as_ref()
            .map(|(_, id)| *id)
            .expect("engine has no target")
    }

    pub fn last_seek(&self) -> SeekId {
        *self.state.lock().seeks.last().expect("no seek issued")
    }

    pub fn set_position(&self, position: Duration) {
        self.state.lock().position = position;
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn ready(&self, secs: u64) -> EngineEvent {
        EngineEvent::ready(self.observation(), Some(Duration::from_secs(secs)))
    }

    pub fn ended(&self) -> EngineEvent {
        EngineEvent::reached_end(self.observation())
    }

    pub fn failed(&self, reason: &str) -> EngineEvent {
        EngineEvent::failed(self.observation(), reason)
    }

    /// Report an event the way a real engine would, through its sink
    pub fn send(&self, event: EngineEvent) {
        let sink = self.sink.lock().clone().expect("engine built without a sink");
        assert!(sink.send(event), "controller shut down");
    }
}

/// Engine that records every call and renders nothing
pub struct RecordingEngine {
    spy: EngineSpy,
}

impl PlaybackEngine for RecordingEngine {
    fn target(&mut self, item: &MediaItem, observation: ObservationId) {
        let mut state = self.spy.state.lock();
        state.calls.push(EngineCall::Target(item.locator().clone()));
        state.target = Some((item.locator().clone(), observation));
        state.position = Duration::ZERO;
    }

    fn play(&mut self) {
        self.spy.state.lock().calls.push(EngineCall::Play);
    }

    fn pause(&mut self) {
        self.spy.state.lock().calls.push(EngineCall::Pause);
    }

    fn stop(&mut self) {
        let mut state = self.spy.state.lock();
        state.calls.push(EngineCall::Stop);
        state.target = None;
    }

    fn seek(&mut self, position: Duration, seek: SeekId) {
        let mut state = self.spy.state.lock();
        state.calls.push(EngineCall::Seek(position));
        state.seeks.push(seek);
        state.position = position;
    }

    fn current_time(&self) -> Option<Duration> {
        let state = self.spy.state.lock();
        state.target.as_ref().map(|_| state.position)
    }

    fn set_volume(&mut self, volume: f32) {
        let mut state = self.spy.state.lock();
        state.calls.push(EngineCall::Volume(volume));
        state.volume = volume;
    }
}

// ===== Delegate =====

#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    State(PlaybackState),
    Started(Locator),
    Ready(Locator, Option<Duration>),
    Finished(Locator),
    Failed(String),
    Advanced(Locator, Locator),
    Exhausted(Locator),
    QueueChanged(usize),
    FadeCompleted(f32),
}

#[derive(Default)]
pub struct RecordingDelegate {
    notes: Mutex<Vec<Note>>,
}

impl RecordingDelegate {
    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().clone()
    }

    pub fn has(&self, note: &Note) -> bool {
        self.notes.lock().contains(note)
    }

    pub fn count(&self, predicate: impl Fn(&Note) -> bool) -> usize {
        self.notes.lock().iter().filter(|n| predicate(n)).count()
    }

    fn push(&self, note: Note) {
        self.notes.lock().push(note);
    }
}

impl PlaybackDelegate for RecordingDelegate {
    fn state_changed(&self, state: PlaybackState) {
        self.push(Note::State(state));
    }

    fn started_item(&self, locator: &Locator) {
        self.push(Note::Started(locator.clone()));
    }

    fn item_ready(&self, locator: &Locator, duration: Option<Duration>) {
        self.push(Note::Ready(locator.clone(), duration));
    }

    fn item_finished(&self, locator: &Locator) {
        self.push(Note::Finished(locator.clone()));
    }

    fn item_failed(&self, error: &PlaybackError) {
        self.push(Note::Failed(error.to_string()));
    }

    fn advanced(&self, from: &Locator, to: &Locator) {
        self.push(Note::Advanced(from.clone(), to.clone()));
    }

    fn queue_exhausted(&self, last: &Locator) {
        self.push(Note::Exhausted(last.clone()));
    }

    fn queue_changed(&self, length: usize) {
        self.push(Note::QueueChanged(length));
    }

    fn fade_completed(&self, volume: f32) {
        self.push(Note::FadeCompleted(volume));
    }
}

// ===== Integrations =====

/// Records updates; `None` marks a clear
#[derive(Clone, Default)]
pub struct RecordingNowPlaying {
    pub published: Arc<Mutex<Vec<Option<NowPlayingUpdate>>>>,
}

impl RecordingNowPlaying {
    pub fn last(&self) -> Option<Option<NowPlayingUpdate>> {
        self.published.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.published.lock().len()
    }
}

impl NowPlayingCenter for RecordingNowPlaying {
    fn update(&mut self, update: NowPlayingUpdate) {
        self.published.lock().push(Some(update));
    }

    fn clear(&mut self) {
        self.published.lock().push(None);
    }
}

#[derive(Clone, Default)]
pub struct RecordingMediaControls {
    pub calls: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingMediaControls {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

impl MediaControls for RecordingMediaControls {
    fn begin_receiving(&mut self) {
        self.calls.lock().push("begin");
    }

    fn end_receiving(&mut self) {
        self.calls.lock().push("end");
    }
}
