//! Replay recorder
//!
//! Captures a live stream of application events and finalizes it into a
//! `Recording` whose offsets are relative to capture start.

use super::state::{
    CaptureSession, FinishedCapture, RecorderConfig, RecorderState, RecordingError,
    RecordingResult,
};
use crate::replay::{Recording, Replay, ReplayMetadata};
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted by the recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// Capture started
    Started { session_id: String },
    /// Capture stopped
    Stopped { duration_ms: u64, event_count: usize },
    /// Capture discarded
    Cancelled,
    /// Capture finalized into a replay
    Saved { replay_id: String },
}

/// Records events from one session at a time
pub struct ReplayRecorder<E> {
    config: RecorderConfig,

    state: RecorderState,

    /// Active capture, present only while recording
    session: Option<CaptureSession<E>>,

    /// Last stopped capture, kept until saved, cancelled or replaced
    finished: Option<FinishedCapture<E>>,

    event_tx: broadcast::Sender<RecorderEvent>,
}

impl<E> ReplayRecorder<E> {
    /// Create a recorder with the default configuration
    pub fn new() -> Self {
        Self::with_config(RecorderConfig::default())
    }

    pub fn with_config(config: RecorderConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            config,
            state: RecorderState::Idle,
            session: None,
            finished: None,
            event_tx,
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Get the current recorder state
    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Session being captured, or the session of the unsaved capture
    pub fn session_id(&self) -> Option<&str> {
        match (&self.session, &self.finished) {
            (Some(session), _) => Some(&session.session_id),
            (None, Some(finished)) => Some(&finished.session_id),
            (None, None) => None,
        }
    }

    /// Number of events captured so far
    pub fn event_count(&self) -> usize {
        match (&self.session, &self.finished) {
            (Some(session), _) => session.len(),
            (None, Some(finished)) => finished.events.len(),
            (None, None) => 0,
        }
    }

    /// Capture length in milliseconds, live while recording
    pub fn elapsed_ms(&self) -> u64 {
        match (&self.session, &self.finished) {
            (Some(session), _) => session.elapsed_ms(),
            (None, Some(finished)) => finished.duration_ms,
            (None, None) => 0,
        }
    }

    /// Subscribe to recorder events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    /// Begin capturing `session_id`.
    ///
    /// Rejected without any state change if a capture is already active.
    /// Starting over an unsaved stopped capture discards it.
    pub fn start(
        &mut self,
        session_id: impl Into<String>,
        metadata: Option<ReplayMetadata>,
    ) -> RecordingResult<()> {
        if let Some(active) = &self.session {
            tracing::warn!("Already recording session {}", active.session_id);
            return Err(RecordingError::AlreadyRecording(active.session_id.clone()));
        }

        let session_id = session_id.into();
        if self.finished.take().is_some() {
            tracing::debug!("Discarding unsaved capture before starting {}", session_id);
        }

        self.session = Some(CaptureSession::new(
            session_id.clone(),
            metadata.unwrap_or_default(),
        ));
        self.state = RecorderState::Recording;

        tracing::info!("Started recording session: {}", session_id);
        let _ = self.event_tx.send(RecorderEvent::Started { session_id });
        Ok(())
    }

    /// Buffer an event. Returns false if no capture is active.
    pub fn record_event(&mut self, event: E) -> bool {
        match self.session.as_mut() {
            Some(session) => {
                session.push(event);
                true
            }
            None => false,
        }
    }

    /// Finalize the active capture.
    ///
    /// The finished capture stays in the recorder until `save()` or `cancel()`.
    pub fn stop(&mut self) -> RecordingResult<&FinishedCapture<E>> {
        let Some(session) = self.session.take() else {
            tracing::warn!("Not recording");
            return Err(RecordingError::NotRecording);
        };

        let finished = session.finish();
        tracing::info!(
            "Stopped recording. Duration: {}ms, Events: {}",
            finished.duration_ms,
            finished.events.len()
        );

        let _ = self.event_tx.send(RecorderEvent::Stopped {
            duration_ms: finished.duration_ms,
            event_count: finished.events.len(),
        });

        self.state = RecorderState::Complete;
        let finished = self.finished.insert(finished);
        Ok(&*finished)
    }

    /// Discard the active or unsaved capture
    pub fn cancel(&mut self) {
        let had_session = self.session.take().is_some();
        let had_finished = self.finished.take().is_some();
        self.state = RecorderState::Idle;

        if had_session || had_finished {
            tracing::info!("Recording cancelled");
            let _ = self.event_tx.send(RecorderEvent::Cancelled);
        }
    }

    /// Finalize the capture into a `Recording` ready for persistence.
    ///
    /// Stops the capture first if it is still active.
    pub fn save(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
    ) -> RecordingResult<Recording<E>> {
        if self.session.is_some() {
            self.stop()?;
        }

        let Some(finished) = self.finished.take() else {
            tracing::error!("No recording data to save");
            return Err(RecordingError::NoData);
        };
        self.state = RecorderState::Idle;

        let replay = Replay {
            id: Uuid::new_v4().to_string(),
            user_id: self.config.owner_id.clone(),
            session_id: finished.session_id,
            name: name.into(),
            description,
            duration_ms: finished.duration_ms,
            event_count: finished.events.len(),
            metadata: finished.metadata,
            created_at: finished.started_wall,
            updated_at: Utc::now(),
        };

        tracing::info!(
            id = %replay.id,
            name = %replay.name,
            duration_ms = replay.duration_ms,
            events = replay.event_count,
            "Replay saved"
        );
        let _ = self.event_tx.send(RecorderEvent::Saved {
            replay_id: replay.id.clone(),
        });

        Ok(Recording {
            replay,
            events: finished.events,
        })
    }
}

impl<E> Default for ReplayRecorder<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_record_and_stop() {
        let mut recorder = ReplayRecorder::new();
        recorder.start("session-1", None).unwrap();

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(recorder.record_event("first"));
        tokio::time::advance(Duration::from_millis(300)).await;
        assert!(recorder.record_event("second"));
        tokio::time::advance(Duration::from_millis(100)).await;

        let finished = recorder.stop().unwrap();
        assert_eq!(finished.duration_ms, 500);
        assert_eq!(finished.events.len(), 2);
        assert_eq!(finished.events[0].offset_ms, 100);
        assert_eq!(finished.events[1].offset_ms, 400);
        assert_eq!(finished.events[1].payload, "second");

        assert!(!recorder.is_recording());
        assert_eq!(recorder.state(), RecorderState::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offsets_are_monotonic() {
        let mut recorder = ReplayRecorder::new();
        recorder.start("session-1", None).unwrap();

        for step in [0u64, 5, 0, 17, 1, 0, 40] {
            tokio::time::advance(Duration::from_millis(step)).await;
            recorder.record_event(step);
        }

        let finished = recorder.stop().unwrap();
        assert!(finished
            .events
            .windows(2)
            .all(|pair| pair[0].offset_ms <= pair[1].offset_ms));
        assert!(finished.duration_ms >= finished.events.last().unwrap().offset_ms);
    }

    #[test]
    fn test_events_dropped_when_not_recording() {
        let mut recorder = ReplayRecorder::new();
        assert!(!recorder.record_event(1));

        recorder.start("session-1", None).unwrap();
        recorder.record_event(2);
        recorder.stop().unwrap();
        assert!(!recorder.record_event(3));

        let recording = recorder.save("name", None).unwrap();
        let payloads: Vec<_> = recording.events.iter().map(|e| e.payload).collect();
        assert_eq!(payloads, vec![2]);
    }

    #[test]
    fn test_double_start_keeps_first_capture() {
        let mut recorder = ReplayRecorder::new();
        recorder.start("first", None).unwrap();
        recorder.record_event("a");
        recorder.record_event("b");

        let err = recorder
            .start("second", Some(ReplayMetadata::with_cwd("/tmp")))
            .unwrap_err();
        assert_eq!(err, RecordingError::AlreadyRecording("first".to_string()));
        assert_eq!(recorder.session_id(), Some("first"));
        assert_eq!(recorder.event_count(), 2);
    }

    #[test]
    fn test_stop_when_idle() {
        let mut recorder: ReplayRecorder<()> = ReplayRecorder::new();
        assert_eq!(recorder.stop().unwrap_err(), RecordingError::NotRecording);
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn test_cancel_resets_recorder() {
        let mut recorder = ReplayRecorder::new();
        let mut events = recorder.subscribe();
        recorder.start("session-1", None).unwrap();
        recorder.record_event("a");
        recorder.cancel();

        assert_eq!(recorder.state(), RecorderState::Idle);
        assert_eq!(recorder.session_id(), None);
        assert_eq!(recorder.event_count(), 0);
        assert_eq!(recorder.save("name", None).unwrap_err(), RecordingError::NoData);

        assert!(matches!(events.try_recv(), Ok(RecorderEvent::Started { .. })));
        assert_eq!(events.try_recv().unwrap(), RecorderEvent::Cancelled);
    }

    #[test]
    fn test_save_stops_active_capture() {
        let config = RecorderConfig {
            owner_id: "alice".to_string(),
            ..RecorderConfig::default()
        };
        let mut recorder = ReplayRecorder::with_config(config);
        let metadata = ReplayMetadata::with_cwd("/work").flag("verbose", true);
        recorder.start("session-9", Some(metadata.clone())).unwrap();
        recorder.record_event("a");

        let recording = recorder
            .save("Demo", Some("first take".to_string()))
            .unwrap();
        assert!(!recorder.is_recording());
        assert_eq!(recording.replay.user_id, "alice");
        assert_eq!(recording.replay.session_id, "session-9");
        assert_eq!(recording.replay.name, "Demo");
        assert_eq!(recording.replay.description.as_deref(), Some("first take"));
        assert_eq!(recording.replay.event_count, 1);
        assert_eq!(recording.replay.metadata, metadata);
        assert!(Uuid::parse_str(&recording.replay.id).is_ok());
        assert!(recording.validate().is_ok());
    }

    #[test]
    fn test_save_after_stop_uses_retained_capture() {
        let mut recorder = ReplayRecorder::new();
        recorder.start("session-1", None).unwrap();
        recorder.record_event("a");
        recorder.stop().unwrap();

        assert_eq!(recorder.session_id(), Some("session-1"));
        let recording = recorder.save("Later", None).unwrap();
        assert_eq!(recording.events.len(), 1);

        // The capture is consumed by the save
        assert_eq!(recorder.save("Again", None).unwrap_err(), RecordingError::NoData);
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn test_restart_discards_unsaved_capture() {
        let mut recorder = ReplayRecorder::new();
        recorder.start("one", None).unwrap();
        recorder.record_event("a");
        recorder.stop().unwrap();

        recorder.start("two", None).unwrap();
        assert_eq!(recorder.event_count(), 0);
        assert_eq!(recorder.session_id(), Some("two"));
    }

    #[test]
    fn test_save_stamps_capture_start_as_created_at() {
        let mut recorder = ReplayRecorder::new();
        let before_start = Utc::now();
        recorder.start("session-1", None).unwrap();
        let after_start = Utc::now();
        recorder.record_event("only");

        std::thread::sleep(Duration::from_millis(5));
        let recording = recorder.save("Stamped", None).unwrap();

        let replay = &recording.replay;
        assert!(replay.created_at >= before_start);
        assert!(replay.created_at <= after_start);
        assert!(replay.updated_at > after_start);
    }
}
