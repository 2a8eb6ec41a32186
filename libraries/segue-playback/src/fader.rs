//! Volume fading
//!
//! Time-driven linear interpolation of the engine's output volume. The
//! fader itself owns no timer: the controller's owner thread calls
//! [`VolumeFader::tick`] periodically while a fade is active.

use std::time::{Duration, Instant};

/// One in-flight fade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeOperation {
    pub from: f32,
    pub to: f32,
    pub duration: Duration,
    pub started_at: Instant,

    /// Cancel token, increases with every started fade
    pub id: u64,
}

impl FadeOperation {
    /// Interpolated volume at `now`, clamped to [0, 1]
    ///
    /// Returns exactly `to` once the duration has elapsed.
    pub fn volume_at(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.started_at);
        if self.duration.is_zero() || elapsed >= self.duration {
            return self.to;
        }

        let progress = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        (self.from + (self.to - self.from) * progress).clamp(0.0, 1.0)
    }

    pub fn is_complete_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= self.duration
    }
}

/// Linear volume fader with supersede/cancel semantics
#[derive(Debug, Default)]
pub struct VolumeFader {
    active: Option<FadeOperation>,
    last_id: u64,
}

impl VolumeFader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fade, superseding any in-flight one
    ///
    /// `from` and `to` are clamped to [0, 1]. Returns the volume to apply
    /// immediately (the clamped start value).
    pub fn start(&mut self, from: f32, to: f32, duration: Duration, now: Instant) -> f32 {
        self.last_id += 1;
        let from = from.clamp(0.0, 1.0);
        let op = FadeOperation {
            from,
            to: to.clamp(0.0, 1.0),
            duration,
            started_at: now,
            id: self.last_id,
        };
        self.active = Some(op);
        from
    }

    /// Advance the fade
    ///
    /// Returns the volume to apply, or `None` when no fade is active. The
    /// tick that reaches the end returns exactly the target value and
    /// finishes the fade.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        let op = self.active?;
        let volume = op.volume_at(now);
        if op.is_complete_at(now) {
            self.active = None;
        }
        Some(volume)
    }

    /// Stop the fade, leaving the volume at its last applied value
    pub fn cancel(&mut self) -> Option<FadeOperation> {
        self.active.take()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn current(&self) -> Option<&FadeOperation> {
        self.active.as_ref()
    }
}
