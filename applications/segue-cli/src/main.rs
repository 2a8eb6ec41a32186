//! Segue - queue-driven playback controller demo
//!
//! Plays a list of locators through a simulated engine. Remote commands are
//! read from stdin, one per line (`play`, `pause`, `next`, `previous`, ...).

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use segue_playback::{
    Locator, MediaControls, NowPlayingCenter, NowPlayingUpdate, PlaybackController,
    PlaybackDelegate, PlaybackError, PlaybackState, PlayerConfig, RemoteCommand,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod simulated;

const STATE_POLL: Duration = Duration::from_millis(250);

use simulated::{SimulatedEngine, SimulationSettings};

#[derive(Parser)]
#[command(name = "segue")]
#[command(about = "Queue-driven playback controller demo", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "SEGUE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play locators in order through the simulated engine
    Play {
        /// Locators to enqueue
        #[arg(required = true)]
        urls: Vec<String>,

        /// Virtual length of every item, in seconds
        #[arg(long, default_value_t = 3)]
        item_secs: u64,

        /// Simulated load time, in milliseconds
        #[arg(long, default_value_t = 200)]
        load_ms: u64,

        /// Fade in over this many milliseconds on start
        #[arg(long)]
        fade_in_ms: Option<u64>,
    },
    /// Print the resolved configuration as JSON
    ShowConfig,
}

/// Logs notifications and signals the main thread when the queue runs out
struct LoggingDelegate {
    done: Sender<()>,
}

impl PlaybackDelegate for LoggingDelegate {
    fn state_changed(&self, state: PlaybackState) {
        info!(?state, "State changed");
    }

    fn started_item(&self, locator: &Locator) {
        info!(%locator, "Started");
    }

    fn item_ready(&self, locator: &Locator, duration: Option<Duration>) {
        info!(%locator, ?duration, "Ready");
    }

    fn item_failed(&self, error: &PlaybackError) {
        warn!(%error, "Item failed");
    }

    fn advanced(&self, from: &Locator, to: &Locator) {
        info!(%from, %to, "Advanced");
    }

    fn queue_exhausted(&self, last: &Locator) {
        info!(%last, "Queue exhausted");
        if self.done.send(()).is_err() {
            debug!("Main loop already finished");
        }
    }

    fn fade_completed(&self, volume: f32) {
        info!(volume, "Fade completed");
    }
}

struct LoggingNowPlaying;

impl NowPlayingCenter for LoggingNowPlaying {
    fn update(&mut self, update: NowPlayingUpdate) {
        info!(
            locator = %update.locator,
            elapsed = ?update.elapsed,
            duration = ?update.duration,
            rate = update.rate,
            "Now playing"
        );
    }

    fn clear(&mut self) {
        info!("Now playing cleared");
    }
}

struct StdinMediaControls;

impl MediaControls for StdinMediaControls {
    fn begin_receiving(&mut self) {
        info!("Accepting remote commands on stdin");
    }

    fn end_receiving(&mut self) {
        info!("No longer accepting remote commands");
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segue_playback=info,segue=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = PlayerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Play {
            urls,
            item_secs,
            load_ms,
            fade_in_ms,
        } => {
            let settings = SimulationSettings {
                load_delay: Duration::from_millis(load_ms),
                item_length: Duration::from_secs(item_secs),
            };
            play(config, urls, settings, fade_in_ms.map(Duration::from_millis))?;
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn play(
    config: PlayerConfig,
    urls: Vec<String>,
    settings: SimulationSettings,
    fade_in: Option<Duration>,
) -> anyhow::Result<()> {
    let (done_tx, done_rx) = unbounded();
    let delegate: Arc<dyn PlaybackDelegate> = Arc::new(LoggingDelegate { done: done_tx });

    let engine = SimulatedEngine::spawn(settings).context("Failed to start simulated engine")?;
    let controller = PlaybackController::builder(config)
        .now_playing(Box::new(LoggingNowPlaying))
        .media_controls(Box::new(StdinMediaControls))
        .delegate(Arc::downgrade(&delegate))
        .urls(urls)
        .build(move |sink| {
            engine.attach(sink);
            Box::new(engine)
        })
        .context("Failed to start playback controller")?;

    if controller.enqueued_urls().is_empty() {
        anyhow::bail!("No playable locators given");
    }

    if let Some(duration) = fade_in {
        controller.set_volume(0.0);
        controller.play()?;
        controller.fade_volume(0.0, 1.0, duration);
    } else {
        controller.play()?;
    }

    let commands = spawn_stdin_reader()?;
    loop {
        select! {
            recv(done_rx) -> _ => break,
            recv(commands) -> line => {
                let Ok(line) = line else {
                    wait_for_finish(&controller, &done_rx);
                    break;
                };
                match line.trim() {
                    "" => {}
                    "quit" | "exit" => break,
                    "status" => print_status(&controller),
                    other => match other.parse::<RemoteCommand>() {
                        Ok(command) => {
                            if !controller.handle_remote_command(command) {
                                warn!(?command, "Media controls are disabled");
                            }
                        }
                        Err(e) => warn!("{e}"),
                    },
                }
            }
        }
    }

    controller.stop();
    drop(delegate);
    Ok(())
}

/// Keep playing after stdin closes until the queue runs out
///
/// Returns early once playback is paused or stopped, since nothing can
/// resume it any more.
fn wait_for_finish(controller: &PlaybackController, done: &Receiver<()>) {
    loop {
        if !controller.is_playing() {
            info!(state = ?controller.playback_state(), "Playback halted, exiting");
            return;
        }
        select! {
            recv(done) -> signal => {
                if signal.is_err() {
                    warn!("Delegate went away before the queue finished");
                }
                return;
            }
            default(STATE_POLL) => {}
        }
    }
}

fn print_status(controller: &PlaybackController) {
    info!(
        state = ?controller.playback_state(),
        current = ?controller.current_playing_url().map(|l| l.to_string()),
        position = ?controller.current_time(),
        duration = ?controller.duration_of_current_playing_url(),
        queued = controller.enqueued_urls().len(),
        volume = controller.volume(),
        "Status"
    );
}

fn spawn_stdin_reader() -> anyhow::Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn stdin reader")?;
    Ok(rx)
}
