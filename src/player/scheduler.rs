//! Replay player
//!
//! A timer-driven scheduler that re-emits the events of one loaded
//! recording at their scaled offsets. At most one deferred wake is
//! outstanding at a time; every transport operation cancels it before
//! touching state, so a wake armed before a seek or speed change can
//! never fire against the new position.

use super::state::{
    PlaybackError, PlaybackResult, PlaybackSpeed, PlaybackState, PlayerConfig, PlayerEvent,
    PlayerState,
};
use crate::replay::{Recording, Replay};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Observer receiving each dispatched payload with its original offset
pub type EventCallback<E> = Arc<dyn Fn(&E, u64) + Send + Sync>;

/// Mutable player state, only touched under the lock
struct Inner<E> {
    state: PlayerState,
    recording: Option<Arc<Recording<E>>>,
    callback: Option<EventCallback<E>>,

    /// The single outstanding wake, if any
    pending: Option<JoinHandle<()>>,

    /// Bumped on every arm and cancel; a wake only acts if it still matches
    generation: u64,

    /// Instant of the last play, seek or dispatch, for drift correction
    anchor: Instant,
}

impl<E> Inner<E> {
    fn cancel_pending(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    fn reset_position(&mut self) {
        self.state.current_time_ms = 0.0;
        self.state.next_event_index = 0;
    }
}

struct Shared<E> {
    inner: Mutex<Inner<E>>,

    /// Held for the whole of a dispatch so observer calls never overlap
    dispatch: Mutex<()>,

    runtime: Option<Handle>,
    config: PlayerConfig,
    event_tx: broadcast::Sender<PlayerEvent>,
}

impl<E> Shared<E> {
    fn emit(&self, event: PlayerEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl<E> Drop for Shared<E> {
    fn drop(&mut self) {
        self.inner.get_mut().cancel_pending();
    }
}

impl<E: Send + Sync + 'static> Shared<E> {
    /// Arm a wake for the next due event, or finish if none is left
    fn schedule_next(self: &Arc<Self>, inner: &mut Inner<E>) {
        if inner.state.state != PlaybackState::Playing {
            return;
        }
        let index = inner.state.next_event_index;
        let Some(next_offset_ms) = inner
            .recording
            .as_ref()
            .and_then(|recording| recording.events.get(index))
            .map(|event| event.offset_ms)
        else {
            if inner.recording.is_none() {
                return;
            }
            inner.cancel_pending();
            inner.state.state = PlaybackState::Idle;
            tracing::info!("Replay finished");
            self.emit(PlayerEvent::Finished);
            return;
        };

        let Some(runtime) = self.runtime.as_ref() else {
            inner.state.state = PlaybackState::Idle;
            tracing::warn!("No runtime available, playback halted");
            return;
        };

        let delay_ms = ((next_offset_ms as f64 - inner.state.current_time_ms)
            / inner.state.playback_speed)
            .max(0.0);

        inner.cancel_pending();
        let generation = inner.generation;
        let weak = Arc::downgrade(self);

        tracing::trace!(index, delay_ms, "Scheduling next replay event");

        inner.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms.ceil() as u64)).await;
            Self::wake(weak, generation);
        }));
    }

    /// Dispatch the due event and re-arm
    fn wake(weak: Weak<Self>, generation: u64) {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let _dispatching = shared.dispatch.lock();

        let (recording, index, callback) = {
            let mut inner = shared.inner.lock();
            if inner.generation != generation || inner.state.state != PlaybackState::Playing {
                return;
            }
            inner.pending = None;

            let Some(recording) = inner.recording.clone() else {
                return;
            };
            let index = inner.state.next_event_index;
            let Some(event) = recording.events.get(index) else {
                return;
            };

            // Advance by measured time, not the requested delay
            let now = Instant::now();
            let elapsed_ms = now.duration_since(inner.anchor).as_secs_f64() * 1000.0;
            inner.anchor = now;

            let advanced = inner.state.current_time_ms + elapsed_ms * inner.state.playback_speed;
            inner.state.current_time_ms = advanced
                .min(inner.state.duration_ms as f64)
                .max(event.offset_ms as f64);
            inner.state.next_event_index = index + 1;

            let callback = inner.callback.clone();
            (recording, index, callback)
        };

        let event = &recording.events[index];
        if let Some(callback) = callback {
            callback(&event.payload, event.offset_ms);
        }

        let mut inner = shared.inner.lock();
        if inner.generation == generation {
            shared.schedule_next(&mut inner);
        }
    }
}

/// Plays back one loaded recording with transport controls.
///
/// Cloning yields another handle to the same player.
pub struct ReplayPlayer<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for ReplayPlayer<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Send + Sync + 'static> ReplayPlayer<E> {
    /// Create a player scheduling on the current tokio runtime, if any
    pub fn new() -> Self {
        Self::with_config(PlayerConfig::default())
    }

    pub fn with_config(config: PlayerConfig) -> Self {
        Self::build(config, Handle::try_current().ok())
    }

    /// Create a player scheduling on `runtime`
    pub fn with_runtime(config: PlayerConfig, runtime: Handle) -> Self {
        Self::build(config, Some(runtime))
    }

    fn build(config: PlayerConfig, runtime: Option<Handle>) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let inner = Inner {
            state: PlayerState::loaded(0, 0, config.initial_speed),
            recording: None,
            callback: None,
            pending: None,
            generation: 0,
            anchor: Instant::now(),
        };

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                dispatch: Mutex::new(()),
                runtime,
                config,
                event_tx,
            }),
        }
    }

    /// Snapshot of the current player state
    pub fn get_state(&self) -> PlayerState {
        self.shared.inner.lock().state
    }

    pub fn has_recording(&self) -> bool {
        self.shared.inner.lock().recording.is_some()
    }

    /// Metadata of the loaded recording
    pub fn replay(&self) -> Option<Replay> {
        self.shared
            .inner
            .lock()
            .recording
            .as_ref()
            .map(|recording| recording.replay.clone())
    }

    /// Whether a recording is loaded and all of its events are behind the cursor
    pub fn is_finished(&self) -> bool {
        let inner = self.shared.inner.lock();
        inner.recording.is_some() && inner.state.is_finished()
    }

    /// Subscribe to player events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Register the observer, replacing any previous one
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&E, u64) + Send + Sync + 'static,
    {
        self.shared.inner.lock().callback = Some(Arc::new(callback));
    }

    /// Load a recording, stopping any playback and rewinding
    pub fn load(&self, recording: impl Into<Arc<Recording<E>>>) {
        let recording = recording.into();
        let mut inner = self.shared.inner.lock();
        inner.cancel_pending();

        inner.state = PlayerState::loaded(
            recording.replay.duration_ms,
            recording.events.len(),
            self.shared.config.initial_speed,
        );

        tracing::info!(
            "Loaded replay: {} ({} events, {}ms)",
            recording.replay.name,
            recording.events.len(),
            recording.replay.duration_ms
        );
        let replay_id = recording.replay.id.clone();
        inner.recording = Some(recording);
        self.shared.emit(PlayerEvent::Loaded { replay_id });
    }

    /// Start or resume playback
    pub fn play(&self) -> PlaybackResult<()> {
        let mut inner = self.shared.inner.lock();
        self.start_playing(&mut inner)
    }

    fn start_playing(&self, inner: &mut Inner<E>) -> PlaybackResult<()> {
        if inner.recording.is_none() {
            tracing::warn!("No recording loaded");
            return Err(PlaybackError::NoRecordingLoaded);
        }
        if inner.state.state == PlaybackState::Playing {
            return Ok(());
        }
        if self.shared.runtime.is_none() {
            tracing::warn!("No async runtime available, cannot play");
            return Err(PlaybackError::NoRuntime);
        }

        inner.state.state = PlaybackState::Playing;
        inner.anchor = Instant::now();
        self.shared.emit(PlayerEvent::Playing);

        self.shared.schedule_next(inner);
        Ok(())
    }

    /// Pause playback
    pub fn pause(&self) {
        let mut inner = self.shared.inner.lock();
        if self.pause_locked(&mut inner) {
            self.shared.emit(PlayerEvent::Paused);
        }
    }

    fn pause_locked(&self, inner: &mut Inner<E>) -> bool {
        if inner.state.state != PlaybackState::Playing {
            return false;
        }
        inner.cancel_pending();
        inner.state.state = PlaybackState::Paused;
        true
    }

    /// Stop playback and rewind. The recording stays loaded.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();
        inner.cancel_pending();
        inner.state.state = PlaybackState::Idle;
        inner.reset_position();
        self.shared.emit(PlayerEvent::Stopped);
    }

    /// Move the playback clock to `time_ms`, clamped to the recording.
    ///
    /// Events at or before the new position are treated as delivered.
    pub fn seek(&self, time_ms: f64) -> PlaybackResult<()> {
        let mut inner = self.shared.inner.lock();
        let Some(recording) = inner.recording.clone() else {
            tracing::warn!("Cannot seek, no recording loaded");
            return Err(PlaybackError::NoRecordingLoaded);
        };

        let was_playing = self.pause_locked(&mut inner);

        let target = if time_ms.is_finite() { time_ms } else { 0.0 };
        let target = target.clamp(0.0, inner.state.duration_ms as f64);

        inner.state.current_time_ms = target;
        inner.state.next_event_index = recording.event_index_after(target);
        inner.anchor = Instant::now();

        tracing::debug!(
            "Seeked to {}ms, next event index {}",
            target,
            inner.state.next_event_index
        );
        self.shared.emit(PlayerEvent::Seeked { time_ms: target });

        if was_playing {
            self.start_playing(&mut inner)?;
        }
        Ok(())
    }

    /// Change the speed multiplier. Unsupported values fall back to 1x.
    ///
    /// Returns the speed actually applied.
    pub fn set_speed(&self, speed: f64) -> f64 {
        if !PlaybackSpeed::is_supported(speed) {
            tracing::warn!("Unsupported playback speed {}, using 1x", speed);
        }
        let speed = PlaybackSpeed::normalize(speed).value();

        let mut inner = self.shared.inner.lock();
        inner.state.playback_speed = speed;
        if inner.state.state == PlaybackState::Playing {
            inner.cancel_pending();
            self.shared.schedule_next(&mut inner);
        }

        self.shared.emit(PlayerEvent::SpeedChanged { speed });
        speed
    }

    /// Stop playback, release the recording and clear the observer
    pub fn dispose(&self) {
        let mut inner = self.shared.inner.lock();
        inner.cancel_pending();
        inner.state = PlayerState::loaded(0, 0, self.shared.config.initial_speed);
        inner.recording = None;
        inner.callback = None;

        tracing::debug!("Replay player disposed");
        self.shared.emit(PlayerEvent::Disposed);
    }
}

impl<E: Send + Sync + 'static> Default for ReplayPlayer<E> {
    fn default() -> Self {
        Self::new()
    }
}
