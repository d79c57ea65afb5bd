//! Player state management
//!
//! Transport state machine, the observable player snapshot, the playback
//! speed allow-list and player configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport state of the player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing playing (initial, stopped or finished)
    #[default]
    Idle,
    /// Dispatching events
    Playing,
    /// Paused mid-playback
    Paused,
}

/// Snapshot of the player returned by `ReplayPlayer::get_state`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub state: PlaybackState,

    /// Position of the playback clock in recording milliseconds
    pub current_time_ms: f64,

    pub duration_ms: u64,

    pub playback_speed: f64,

    /// Index of the next event to dispatch
    pub next_event_index: usize,

    /// Number of events in the loaded recording
    pub event_count: usize,
}

impl PlayerState {
    /// State of a player with `duration_ms` and `event_count` loaded and rewound
    pub fn loaded(duration_ms: u64, event_count: usize, speed: PlaybackSpeed) -> Self {
        Self {
            state: PlaybackState::Idle,
            current_time_ms: 0.0,
            duration_ms,
            playback_speed: speed.value(),
            next_event_index: 0,
            event_count,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Whether every event has been dispatched or skipped
    pub fn is_finished(&self) -> bool {
        self.next_event_index >= self.event_count
    }

    /// Playback position as a fraction of the duration (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        (self.current_time_ms / self.duration_ms as f64).clamp(0.0, 1.0)
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::loaded(0, 0, PlaybackSpeed::NORMAL)
    }
}

/// A playback speed multiplier from the supported set
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(into = "f64", from = "f64")]
pub struct PlaybackSpeed(f64);

impl PlaybackSpeed {
    /// Supported multipliers in ascending order
    pub const SUPPORTED: [f64; 6] = [0.25, 0.5, 1.0, 1.5, 2.0, 4.0];

    pub const NORMAL: PlaybackSpeed = PlaybackSpeed(1.0);

    /// Check if `speed` is one of the supported multipliers
    pub fn is_supported(speed: f64) -> bool {
        Self::SUPPORTED.contains(&speed)
    }

    /// Map any value onto the supported set. Unsupported values become 1x.
    pub fn normalize(speed: f64) -> Self {
        if Self::is_supported(speed) {
            Self(speed)
        } else {
            Self::NORMAL
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// The next supported speed, wrapping back to the slowest
    pub fn next(self) -> Self {
        let index = Self::SUPPORTED
            .iter()
            .position(|&speed| speed == self.0)
            .map_or(0, |i| (i + 1) % Self::SUPPORTED.len());
        Self(Self::SUPPORTED[index])
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<f64> for PlaybackSpeed {
    fn from(speed: f64) -> Self {
        Self::normalize(speed)
    }
}

impl From<PlaybackSpeed> for f64 {
    fn from(speed: PlaybackSpeed) -> Self {
        speed.0
    }
}

/// Errors reported by the player.
///
/// Rejected requests are no-ops; nothing here is fatal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("no recording loaded")]
    NoRecordingLoaded,

    #[error("no async runtime available to schedule playback")]
    NoRuntime,
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Events emitted by the player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Loaded { replay_id: String },
    Playing,
    Paused,
    Stopped,
    Seeked { time_ms: f64 },
    SpeedChanged { speed: f64 },
    /// Every remaining event has been dispatched
    Finished,
    Disposed,
}

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerConfig {
    /// Speed applied on every load
    pub initial_speed: PlaybackSpeed,

    /// Capacity of the player event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            initial_speed: PlaybackSpeed::NORMAL,
            event_channel_capacity: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_speed() {
        for speed in PlaybackSpeed::SUPPORTED {
            assert_eq!(PlaybackSpeed::normalize(speed).value(), speed);
        }

        assert_eq!(PlaybackSpeed::normalize(3.0).value(), 1.0);
        assert_eq!(PlaybackSpeed::normalize(0.0).value(), 1.0);
        assert_eq!(PlaybackSpeed::normalize(-2.0).value(), 1.0);
        assert_eq!(PlaybackSpeed::normalize(f64::NAN).value(), 1.0);
    }

    #[test]
    fn test_next_speed_cycles() {
        let mut speed = PlaybackSpeed::normalize(0.25);
        let mut seen = Vec::new();
        for _ in 0..PlaybackSpeed::SUPPORTED.len() {
            seen.push(speed.value());
            speed = speed.next();
        }

        assert_eq!(seen, PlaybackSpeed::SUPPORTED.to_vec());
        assert_eq!(speed.value(), 0.25);
    }

    #[test]
    fn test_progress() {
        let mut state = PlayerState::loaded(1000, 4, PlaybackSpeed::NORMAL);
        assert_eq!(state.progress(), 0.0);

        state.current_time_ms = 500.0;
        assert!((state.progress() - 0.5).abs() < f64::EPSILON);

        assert_eq!(PlayerState::default().progress(), 0.0);
    }

    #[test]
    fn test_config_normalizes_speed() {
        let config: PlayerConfig = serde_json::from_str(r#"{"initialSpeed":3}"#).unwrap();
        assert_eq!(config.initial_speed, PlaybackSpeed::NORMAL);

        let config: PlayerConfig = serde_json::from_str(r#"{"initialSpeed":2}"#).unwrap();
        assert_eq!(config.initial_speed.value(), 2.0);
        assert_eq!(config.event_channel_capacity, 100);
    }
}
