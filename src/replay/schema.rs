//! Replay schema definitions
//!
//! The entities shared by the recorder, the player and the stores. Offsets
//! are milliseconds since capture start; wall-clock times are kept only for
//! bookkeeping and never drive playback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// Metadata Types
// =============================================================================

/// Summary counters collected while a session was captured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStats {
    pub tools_used: u32,
    pub files_edited: u32,
    pub commands_run: u32,
}

/// Free-form capture context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayMetadata {
    /// Working directory of the captured session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Session flags that were active during capture
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ReplayStats>,
}

impl ReplayMetadata {
    /// Metadata for a session running in `cwd`
    pub fn with_cwd(cwd: impl Into<String>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Self::default()
        }
    }

    /// Set a session flag
    pub fn flag(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.flags.insert(name.into(), enabled);
        self
    }
}

/// Descriptive metadata for a finalized recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replay {
    /// Unique replay ID
    pub id: String,

    /// Owner of the replay
    pub user_id: String,

    /// Session the events were captured from
    pub session_id: String,

    /// Human readable name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Total capture length in milliseconds
    pub duration_ms: u64,

    /// Number of recorded events
    pub event_count: usize,

    #[serde(default)]
    pub metadata: ReplayMetadata,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Event Types
// =============================================================================

/// A captured event positioned relative to capture start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent<E> {
    /// Milliseconds since capture start
    pub offset_ms: u64,

    /// Wall-clock time the event was captured
    pub recorded_at: DateTime<Utc>,

    /// The opaque application event
    pub payload: E,
}

impl<E> RecordedEvent<E> {
    pub fn new(offset_ms: u64, payload: E) -> Self {
        Self {
            offset_ms,
            recorded_at: Utc::now(),
            payload,
        }
    }
}

// =============================================================================
// Recording
// =============================================================================

/// Reasons a recording breaks the data model invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingInvariantError {
    #[error("event {index} at {offset_ms}ms precedes the previous event at {previous_ms}ms")]
    OutOfOrder {
        index: usize,
        offset_ms: u64,
        previous_ms: u64,
    },

    #[error("duration {duration_ms}ms is shorter than the last event offset {last_offset_ms}ms")]
    DurationTooShort {
        duration_ms: u64,
        last_offset_ms: u64,
    },

    #[error("event count {declared} does not match the {actual} stored events")]
    EventCountMismatch { declared: usize, actual: usize },
}

/// An immutable finalized capture: metadata plus ordered events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording<E> {
    pub replay: Replay,
    pub events: Vec<RecordedEvent<E>>,
}

impl<E> Recording<E> {
    /// Total length in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.replay.duration_ms
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events at or before `time_ms`.
    ///
    /// This is also the index of the first event strictly after `time_ms`.
    /// Events must be in non-decreasing offset order.
    pub fn event_index_after(&self, time_ms: f64) -> usize {
        self.events
            .partition_point(|event| (event.offset_ms as f64) <= time_ms)
    }

    /// Check the ordering and duration invariants
    pub fn validate(&self) -> Result<(), RecordingInvariantError> {
        if self.replay.event_count != self.events.len() {
            return Err(RecordingInvariantError::EventCountMismatch {
                declared: self.replay.event_count,
                actual: self.events.len(),
            });
        }

        for (index, pair) in self.events.windows(2).enumerate() {
            if pair[1].offset_ms < pair[0].offset_ms {
                return Err(RecordingInvariantError::OutOfOrder {
                    index: index + 1,
                    offset_ms: pair[1].offset_ms,
                    previous_ms: pair[0].offset_ms,
                });
            }
        }

        if let Some(last) = self.events.last() {
            if self.replay.duration_ms < last.offset_ms {
                return Err(RecordingInvariantError::DurationTooShort {
                    duration_ms: self.replay.duration_ms,
                    last_offset_ms: last.offset_ms,
                });
            }
        }

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::recording;
    use super::*;

    #[test]
    fn test_event_index_after() {
        let rec = recording(1000, &[0, 250, 500, 900]);

        assert_eq!(rec.event_index_after(0.0), 1);
        assert_eq!(rec.event_index_after(249.9), 1);
        assert_eq!(rec.event_index_after(250.0), 2);
        assert_eq!(rec.event_index_after(600.0), 3);
        assert_eq!(rec.event_index_after(1000.0), 4);
        assert_eq!(rec.event_index_after(-1.0), 0);
    }

    #[test]
    fn test_validate_accepts_equal_offsets() {
        let rec = recording(500, &[100, 100, 500]);
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_order() {
        let rec = recording(1000, &[0, 400, 300]);
        assert_eq!(
            rec.validate(),
            Err(RecordingInvariantError::OutOfOrder {
                index: 2,
                offset_ms: 300,
                previous_ms: 400,
            })
        );
    }

    #[test]
    fn test_validate_rejects_short_duration() {
        let rec = recording(100, &[0, 250]);
        assert!(matches!(
            rec.validate(),
            Err(RecordingInvariantError::DurationTooShort { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_count_mismatch() {
        let mut rec = recording(1000, &[0, 250]);
        rec.replay.event_count = 3;
        assert!(matches!(
            rec.validate(),
            Err(RecordingInvariantError::EventCountMismatch { declared: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_replay_serializes_camel_case() {
        let mut rec = recording(1000, &[0]);
        rec.replay.metadata = ReplayMetadata::with_cwd("/work").flag("verbose", true);

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["replay"]["durationMs"], 1000);
        assert_eq!(json["replay"]["eventCount"], 1);
        assert_eq!(json["replay"]["metadata"]["cwd"], "/work");
        assert_eq!(json["replay"]["metadata"]["flags"]["verbose"], true);
        assert_eq!(json["events"][0]["offsetMs"], 0);
        assert!(json["replay"].get("description").is_none());
    }
}
