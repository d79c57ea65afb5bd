//! Recording system module
//!
//! This module turns a live event stream into finalized recordings:
//! - `ReplayRecorder` to capture one session at a time
//! - `CaptureSession` holding the buffered events of the active capture
//! - `RecorderState` state machine and `RecordingError` diagnostics

pub mod capture;
pub mod state;

pub use capture::{RecorderEvent, ReplayRecorder};
pub use state::{
    CaptureSession, FinishedCapture, RecorderConfig, RecorderState, RecordingError,
    RecordingResult,
};
