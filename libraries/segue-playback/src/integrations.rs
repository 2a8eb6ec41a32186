//! System integration points
//!
//! Process-wide surfaces the state machine talks to on transitions. They are
//! external collaborators: this crate only defines the contracts.

use crate::types::NowPlayingUpdate;
use serde::{Deserialize, Serialize};

/// System "now playing" information surface
pub trait NowPlayingCenter: Send {
    /// Publish metadata for the current item
    fn update(&mut self, update: NowPlayingUpdate);

    /// Remove any published metadata
    fn clear(&mut self);
}

/// Remote-control / media-key input registration
pub trait MediaControls: Send {
    /// Start routing remote commands to this player
    fn begin_receiving(&mut self);

    /// Stop routing remote commands to this player
    fn end_receiving(&mut self);
}

/// Abstract command raised by a remote-control source
///
/// Handled exactly like the equivalent local call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteCommand {
    Play,
    Pause,
    TogglePlayPause,
    Stop,
    Next,
    Previous,
}

impl std::str::FromStr for RemoteCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "play" => Ok(RemoteCommand::Play),
            "pause" => Ok(RemoteCommand::Pause),
            "toggle" | "toggle-play-pause" => Ok(RemoteCommand::TogglePlayPause),
            "stop" => Ok(RemoteCommand::Stop),
            "next" => Ok(RemoteCommand::Next),
            "previous" | "prev" => Ok(RemoteCommand::Previous),
            other => Err(format!("unknown remote command: {other}")),
        }
    }
}
