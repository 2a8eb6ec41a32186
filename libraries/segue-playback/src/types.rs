//! Core types for playback control

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Opaque identifier of a playable resource
///
/// Identity key for queue membership. Two locators are equal when their
/// normalised URIs are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(Url);

impl Locator {
    /// Parse a locator from a URI string
    pub fn parse(input: &str) -> Result<Self> {
        Url::parse(input)
            .map(Self)
            .map_err(|e| PlaybackError::InvalidLocator(format!("{input}: {e}")))
    }

    /// URI scheme (`file`, `https`, ...)
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl From<Url> for Locator {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Lifecycle stage of an item's metadata availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadinessStatus {
    /// Not yet handed to the engine
    #[default]
    Unknown,

    /// Engine is loading the item
    Loading,

    /// Duration known, item can render
    Ready,

    /// Engine gave up on the item
    Failed,
}

/// One playable resource plus its load status
///
/// The locator never changes after creation. Readiness, duration and failure
/// reason are only written by the readiness observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    locator: Locator,
    readiness: ReadinessStatus,
    duration: Option<Duration>,
    failure: Option<String>,
}

impl MediaItem {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            readiness: ReadinessStatus::Unknown,
            duration: None,
            failure: None,
        }
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn readiness(&self) -> ReadinessStatus {
        self.readiness
    }

    /// Duration, known only once the item is ready
    pub fn duration(&self) -> Option<Duration> {
        match self.readiness {
            ReadinessStatus::Ready => self.duration,
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.readiness == ReadinessStatus::Ready
    }

    pub(crate) fn set_loading(&mut self) {
        self.readiness = ReadinessStatus::Loading;
        self.duration = None;
        self.failure = None;
    }

    pub(crate) fn set_ready(&mut self, duration: Option<Duration>) {
        self.readiness = ReadinessStatus::Ready;
        self.duration = duration;
    }

    pub(crate) fn set_failed(&mut self, reason: String) {
        self.readiness = ReadinessStatus::Failed;
        self.duration = None;
        self.failure = Some(reason);
    }
}

impl PartialEq for MediaItem {
    fn eq(&self, other: &Self) -> bool {
        self.locator == other.locator
    }
}

impl Eq for MediaItem {}

/// Asset behind an externally built item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetKind {
    /// Asset addressed by a URI
    Url(Locator),

    /// Asset with no URI (in-memory composition, generated stream, ...)
    Opaque(String),
}

/// Item built outside the controller
///
/// Only URL-backed assets can be enqueued; anything else is rejected as an
/// unsupported resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedItem {
    pub asset: AssetKind,
}

impl PreparedItem {
    pub fn url(locator: Locator) -> Self {
        Self {
            asset: AssetKind::Url(locator),
        }
    }

    pub fn opaque(description: impl Into<String>) -> Self {
        Self {
            asset: AssetKind::Opaque(description.into()),
        }
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No engine target
    #[default]
    Stopped,

    /// Engine rendering the current item
    Playing,

    /// Engine holds the current item without rendering
    Paused,
}

/// What happens to played-through items on advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Keep consumed items until explicitly removed
    #[default]
    Retain,

    /// Drop items before the new current item on every advance
    Remove,
}

/// Metadata associated with a locator for the now-playing surface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,

    /// Free-form extra keys forwarded as-is
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// Snapshot pushed to the now-playing surface
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingUpdate {
    pub locator: Locator,
    pub info: NowPlayingInfo,
    pub elapsed: Option<Duration>,
    pub duration: Option<Duration>,

    /// 1.0 while playing, 0.0 while paused
    pub rate: f32,
}
