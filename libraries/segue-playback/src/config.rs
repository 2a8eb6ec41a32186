//! Controller configuration

use crate::error::{PlaybackError, Result};
use crate::types::RetentionPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Push now-playing metadata on every transition (default: true)
    pub automatically_update_now_playing_info: bool,

    /// Receive remote/media-key commands (default: true)
    pub uses_media_controls: bool,

    /// Clear the queue on stop instead of rewinding it (default: false)
    pub remove_all_urls_on_playback_stop: bool,

    /// Consumed-item retention on advance (default: Retain)
    pub retention: RetentionPolicy,

    /// Fade timer period in milliseconds (default: 16, ~60 Hz)
    pub fade_tick_interval_ms: u64,

    /// URI schemes accepted on enqueue (default: file, http, https)
    pub supported_schemes: Vec<String>,

    /// Engine volume at construction, 0.0-1.0 (default: 1.0)
    pub initial_volume: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            automatically_update_now_playing_info: true,
            uses_media_controls: true,
            remove_all_urls_on_playback_stop: false,
            retention: RetentionPolicy::Retain,
            fade_tick_interval_ms: 16,
            supported_schemes: vec!["file".to_string(), "http".to_string(), "https".to_string()],
            initial_volume: 1.0,
        }
    }
}

impl PlayerConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Environment variables are prefixed with `SEGUE_` and override file
    /// values, e.g. `SEGUE_REMOVE_ALL_URLS_ON_PLAYBACK_STOP=true`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path).required(false));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("SEGUE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("supported_schemes")
                .try_parsing(true),
        );

        let config: Self = settings
            .build()
            .map_err(|e| PlaybackError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.fade_tick_interval_ms == 0 {
            return Err(PlaybackError::Config(
                "fade_tick_interval_ms must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(PlaybackError::Config(format!(
                "initial_volume must be within 0.0-1.0, got {}",
                self.initial_volume
            )));
        }

        if self.supported_schemes.is_empty() {
            return Err(PlaybackError::Config(
                "supported_schemes must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn fade_tick_interval(&self) -> Duration {
        Duration::from_millis(self.fade_tick_interval_ms)
    }

    /// Whether a URI scheme is playable (case-insensitive)
    pub fn supports_scheme(&self, scheme: &str) -> bool {
        self.supported_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(scheme))
    }
}
