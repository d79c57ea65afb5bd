//! Playback engine for finalized recordings.
//!
//! This module provides:
//! - `ReplayPlayer` - timer-driven scheduler with play/pause/stop/seek/speed
//! - `PlayerState` - the observable snapshot a transport surface renders
//! - `PlaybackSpeed` - the supported speed multipliers
//!
//! # Example
//!
//! ```no_run
//! use session_replay::player::ReplayPlayer;
//! # use session_replay::replay::Recording;
//! # async fn demo(recording: Recording<String>) {
//! let player = ReplayPlayer::new();
//! player.on_event(|payload: &String, offset_ms| {
//!     println!("{offset_ms}ms: {payload}");
//! });
//!
//! player.load(recording);
//! player.set_speed(2.0);
//! player.play().ok();
//! # }
//! ```

mod scheduler;
mod state;

pub use scheduler::{EventCallback, ReplayPlayer};
pub use state::{
    PlaybackError, PlaybackResult, PlaybackSpeed, PlaybackState, PlayerConfig, PlayerEvent,
    PlayerState,
};
