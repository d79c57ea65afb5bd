//! Transport helpers
//!
//! Operations a transport surface (scrubber, buttons, time display) builds
//! on top of the recorder and player. Nothing here renders anything.

use crate::player::{PlaybackResult, PlaybackSpeed, PlaybackState, PlayerState, ReplayPlayer};
use crate::recorder::{RecordingError, ReplayRecorder};
use crate::replay::Replay;
use crate::store::ReplayStore;
use crate::utils::ReplayResult;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Refresh interval for polling surfaces
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Format milliseconds as `m:ss`
pub fn format_time(ms: f64) -> String {
    let total_seconds = if ms.is_finite() && ms > 0.0 {
        (ms / 1000.0).floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// `current / total` label for a time display
pub fn time_label(state: &PlayerState) -> String {
    format!(
        "{} / {}",
        format_time(state.current_time_ms),
        format_time(state.duration_ms as f64)
    )
}

/// Scrubber position in percent (0 to 100)
pub fn progress_percent(state: &PlayerState) -> f64 {
    state.progress() * 100.0
}

/// Seek to a scrubber position given in percent of the duration
pub fn seek_percent<E>(player: &ReplayPlayer<E>, percent: f64) -> PlaybackResult<()>
where
    E: Send + Sync + 'static,
{
    let percent = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let duration_ms = player.get_state().duration_ms as f64;
    player.seek(percent / 100.0 * duration_ms)
}

/// Advance to the next supported speed, returning it
pub fn cycle_speed<E>(player: &ReplayPlayer<E>) -> f64
where
    E: Send + Sync + 'static,
{
    let current = PlaybackSpeed::normalize(player.get_state().playback_speed);
    player.set_speed(current.next().value())
}

/// Play when stopped or paused, pause when playing. Returns the new state.
pub fn toggle<E>(player: &ReplayPlayer<E>) -> PlaybackResult<PlaybackState>
where
    E: Send + Sync + 'static,
{
    if player.get_state().is_playing() {
        player.pause();
    } else {
        player.play()?;
    }
    Ok(player.get_state().state)
}

/// Stop the active capture, finalize it and hand it to `store`
pub async fn stop_and_save<E, S>(
    recorder: &mut ReplayRecorder<E>,
    store: &S,
    name: &str,
    description: Option<String>,
) -> ReplayResult<Replay>
where
    E: Send + Sync + 'static,
    S: ReplayStore<E> + ?Sized,
{
    if !recorder.is_recording() {
        tracing::warn!("Stop and save requested while not recording");
        return Err(RecordingError::NotRecording.into());
    }

    let recording = recorder.save(name, description)?;
    let replay = store.save(&recording).await?;

    tracing::info!("Replay \"{}\" saved successfully", replay.name);
    Ok(replay)
}

/// Publish player snapshots every `interval` while the player is playing.
///
/// The receiver always holds the latest snapshot. Abort the handle to stop
/// polling. Must be called from within a tokio runtime.
pub fn watch_state<E>(
    player: &ReplayPlayer<E>,
    interval: Duration,
) -> (watch::Receiver<PlayerState>, JoinHandle<()>)
where
    E: Send + Sync + 'static,
{
    let (tx, rx) = watch::channel(player.get_state());
    let player = player.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let state = player.get_state();
            let changed = state.is_playing() || *tx.borrow() != state;
            if changed && tx.send(state).is_err() {
                break;
            }
        }
    });

    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::schema::fixtures::recording;
    use crate::store::MemoryStore;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(999.0), "0:00");
        assert_eq!(format_time(65_000.0), "1:05");
        assert_eq!(format_time(3_600_000.0), "60:00");
        assert_eq!(format_time(-5.0), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_percent_and_label() {
        let player: ReplayPlayer<String> = ReplayPlayer::new();
        player.load(recording(120_000, &[1_000, 90_000]));

        seek_percent(&player, 50.0).unwrap();
        let state = player.get_state();
        assert_eq!(state.current_time_ms, 60_000.0);
        assert_eq!(state.next_event_index, 1);
        assert_eq!(time_label(&state), "1:00 / 2:00");
        assert!((progress_percent(&state) - 50.0).abs() < 1e-9);

        seek_percent(&player, 250.0).unwrap();
        assert_eq!(player.get_state().current_time_ms, 120_000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_speed_wraps() {
        let player: ReplayPlayer<String> = ReplayPlayer::new();
        let speeds: Vec<_> = (0..6).map(|_| cycle_speed(&player)).collect();
        assert_eq!(speeds, vec![1.5, 2.0, 4.0, 0.25, 0.5, 1.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle() {
        let player: ReplayPlayer<String> = ReplayPlayer::new();
        assert!(toggle(&player).is_err());

        player.load(recording(1000, &[500]));
        assert_eq!(toggle(&player).unwrap(), PlaybackState::Playing);
        assert_eq!(toggle(&player).unwrap(), PlaybackState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_save_then_replay() {
        let store = MemoryStore::new();
        let mut recorder = ReplayRecorder::new();

        let err = stop_and_save(&mut recorder, &store, "Nothing", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::utils::ReplayError::Recording(RecordingError::NotRecording)
        ));

        recorder.start("session-1", None).unwrap();
        tokio::time::advance(Duration::from_millis(40)).await;
        recorder.record_event("hello".to_string());
        tokio::time::advance(Duration::from_millis(60)).await;
        recorder.record_event("world".to_string());
        tokio::time::advance(Duration::from_millis(10)).await;

        let replay = stop_and_save(&mut recorder, &store, "Greeting", None)
            .await
            .unwrap();
        assert_eq!(replay.event_count, 2);
        assert_eq!(replay.duration_ms, 110);
        assert!(!recorder.is_recording());

        let player: ReplayPlayer<String> = ReplayPlayer::new();
        let received = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&received);
        player.on_event(move |payload: &String, offset| {
            sink.lock().push((payload.clone(), offset));
        });
        player.load(store.load(&replay.id).await.unwrap());
        player.play().unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            *received.lock(),
            vec![("hello".to_string(), 40), ("world".to_string(), 100)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_state_publishes_progress() {
        let player: ReplayPlayer<String> = ReplayPlayer::new();
        player.load(recording(1000, &[300, 600]));
        let (mut rx, handle) = watch_state(&player, DEFAULT_POLL_INTERVAL);

        player.play().unwrap();
        tokio::time::sleep(Duration::from_millis(450)).await;
        rx.changed().await.unwrap();
        let state = *rx.borrow_and_update();
        assert!(state.is_playing());
        assert_eq!(state.next_event_index, 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        rx.changed().await.unwrap();
        let state = *rx.borrow();
        assert_eq!(state.state, PlaybackState::Idle);
        assert_eq!(state.next_event_index, 2);

        handle.abort();
    }
}
