//! Simulated playback engine
//!
//! Renders nothing: a worker thread advances a virtual clock for the target
//! and reports readiness, seeks and end-of-item through the event sink.
//! Locators whose path contains `fail` never become ready.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use segue_playback::{
    EngineEvent, EngineEventSink, Locator, MediaItem, ObservationId, PlaybackEngine, SeekId,
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const STEP: Duration = Duration::from_millis(10);

#[derive(Debug)]
enum Command {
    Attach(EngineEventSink),
    Target(Locator, ObservationId),
    Play,
    Pause,
    Stop,
    Seek(Duration, SeekId),
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
pub struct SimulationSettings {
    /// Time until an item reports ready
    pub load_delay: Duration,

    /// Virtual length of every item
    pub item_length: Duration,
}

struct Target {
    locator: Locator,
    observation: ObservationId,
    loaded_at: Instant,
    ready: bool,
}

struct Worker {
    sink: Option<EngineEventSink>,
    settings: SimulationSettings,
    position: Arc<Mutex<Option<Duration>>>,
    target: Option<Target>,
    playing: bool,
}

impl Worker {
    fn run(mut self, rx: &Receiver<Command>) {
        debug!("Simulated engine started");
        let mut last = Instant::now();

        loop {
            match rx.recv_timeout(STEP) {
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => self.apply(command),
                Err(RecvTimeoutError::Timeout) => {}
            }

            let now = Instant::now();
            self.advance(now, now - last);
            last = now;
        }

        debug!("Simulated engine exiting");
    }

    fn emit(&self, event: EngineEvent) {
        match &self.sink {
            Some(sink) => {
                sink.send(event);
            }
            None => trace!(?event, "No sink attached, dropping event"),
        }
    }

    fn apply(&mut self, command: Command) {
        trace!(?command, "Engine command");
        match command {
            Command::Attach(sink) => self.sink = Some(sink),
            Command::Target(locator, observation) => {
                self.target = Some(Target {
                    locator,
                    observation,
                    loaded_at: Instant::now() + self.settings.load_delay,
                    ready: false,
                });
                *self.position.lock() = Some(Duration::ZERO);
            }
            Command::Play => self.playing = true,
            Command::Pause => self.playing = false,
            Command::Stop => {
                self.playing = false;
                self.target = None;
                *self.position.lock() = None;
            }
            Command::Seek(position, seek) => {
                let finished = self.target.is_some();
                if finished {
                    *self.position.lock() = Some(position.min(self.settings.item_length));
                }
                self.emit(EngineEvent::seek_completed(seek, finished));
            }
            Command::Shutdown => {}
        }
    }

    fn advance(&mut self, now: Instant, elapsed: Duration) {
        let Some(target) = self.target.as_mut() else {
            return;
        };
        let observation = target.observation;

        if !target.ready {
            if now < target.loaded_at {
                return;
            }
            if target.locator.as_url().path().contains("fail") {
                self.target = None;
                self.emit(EngineEvent::failed(observation, "simulated load failure"));
                return;
            }
            target.ready = true;
            self.emit(EngineEvent::ready(observation, Some(self.settings.item_length)));
        }

        if !self.playing {
            return;
        }

        let mut position = self.position.lock();
        let next = position.unwrap_or_default() + elapsed;
        if next >= self.settings.item_length {
            *position = Some(self.settings.item_length);
            drop(position);
            self.target = None;
            self.emit(EngineEvent::reached_end(observation));
        } else {
            *position = Some(next);
        }
    }
}

/// Engine backed by a virtual clock on a worker thread
pub struct SimulatedEngine {
    tx: Sender<Command>,
    position: Arc<Mutex<Option<Duration>>>,
    volume: f32,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedEngine {
    /// Start the worker; events are dropped until a sink is attached
    pub fn spawn(settings: SimulationSettings) -> std::io::Result<Self> {
        let (tx, rx) = unbounded();
        let position = Arc::new(Mutex::new(None));

        let worker = Worker {
            sink: None,
            settings,
            position: position.clone(),
            target: None,
            playing: false,
        };
        let handle = thread::Builder::new()
            .name("simulated-engine".to_string())
            .spawn(move || worker.run(&rx))?;

        Ok(Self {
            tx,
            position,
            volume: 1.0,
            worker: Some(handle),
        })
    }

    pub fn attach(&self, sink: EngineEventSink) {
        self.send(Command::Attach(sink));
    }

    fn send(&self, command: Command) {
        // Worker only goes away on shutdown
        let _ = self.tx.send(command);
    }
}

impl PlaybackEngine for SimulatedEngine {
    fn target(&mut self, item: &MediaItem, observation: ObservationId) {
        self.send(Command::Target(item.locator().clone(), observation));
    }

    fn play(&mut self) {
        self.send(Command::Play);
    }

    fn pause(&mut self) {
        self.send(Command::Pause);
    }

    fn stop(&mut self) {
        self.send(Command::Stop);
    }

    fn seek(&mut self, position: Duration, seek: SeekId) {
        self.send(Command::Seek(position, seek));
    }

    fn current_time(&self) -> Option<Duration> {
        *self.position.lock()
    }

    fn set_volume(&mut self, volume: f32) {
        if (volume - self.volume).abs() >= 0.05 || volume == 0.0 || volume == 1.0 {
            debug!(volume, "Engine volume");
        }
        self.volume = volume;
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        self.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
