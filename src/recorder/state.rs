//! Recorder state management
//!
//! Defines the capture state machine, the working capture session and the
//! recorder configuration.

use crate::replay::{RecordedEvent, ReplayMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

/// Current state of the recorder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No capture in progress and nothing waiting to be saved
    #[default]
    Idle,
    /// Currently capturing events
    Recording,
    /// Capture stopped, finished events retained until saved or cancelled
    Complete,
}

/// Errors reported by the recorder.
///
/// None of these are fatal: the rejected request leaves the recorder untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("already recording session {0}")]
    AlreadyRecording(String),

    #[error("not recording")]
    NotRecording,

    #[error("no recording data to save")]
    NoData,
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// Recorder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Owner recorded on every saved replay
    pub owner_id: String,

    /// Capacity of the recorder event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            owner_id: "current-user".to_string(),
            event_channel_capacity: 100,
        }
    }
}

/// Working state of an active capture.
///
/// Exists only between `start()` and `stop()`/`cancel()`.
#[derive(Debug)]
pub struct CaptureSession<E> {
    pub session_id: String,
    pub metadata: ReplayMetadata,

    /// Monotonic instant the capture started
    pub started_at: Instant,

    /// Wall-clock time the capture started
    pub started_wall: DateTime<Utc>,

    /// Events with their capture instants, in arrival order
    pub(crate) events: Vec<BufferedEvent<E>>,
}

#[derive(Debug)]
pub(crate) struct BufferedEvent<E> {
    pub payload: E,
    pub captured_at: Instant,
    pub captured_wall: DateTime<Utc>,
}

impl<E> CaptureSession<E> {
    pub fn new(session_id: String, metadata: ReplayMetadata) -> Self {
        Self {
            session_id,
            metadata,
            started_at: Instant::now(),
            started_wall: Utc::now(),
            events: Vec::new(),
        }
    }

    /// Buffer an event stamped with the current instant
    pub fn push(&mut self, payload: E) {
        self.events.push(BufferedEvent {
            payload,
            captured_at: Instant::now(),
            captured_wall: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Milliseconds since the capture started
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Convert the buffer into offset-normalized events, preserving insertion order
    pub fn finish(self) -> FinishedCapture<E> {
        let duration_ms = self.elapsed_ms();
        let started_at = self.started_at;

        let events = self
            .events
            .into_iter()
            .map(|buffered| RecordedEvent {
                offset_ms: buffered
                    .captured_at
                    .saturating_duration_since(started_at)
                    .as_millis() as u64,
                recorded_at: buffered.captured_wall,
                payload: buffered.payload,
            })
            .collect();

        FinishedCapture {
            session_id: self.session_id,
            metadata: self.metadata,
            started_wall: self.started_wall,
            events,
            duration_ms,
        }
    }
}

/// Output of a stopped capture
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedCapture<E> {
    pub session_id: String,
    pub metadata: ReplayMetadata,
    pub started_wall: DateTime<Utc>,
    pub events: Vec<RecordedEvent<E>>,
    pub duration_ms: u64,
}
