//! Session Replay - record live session events and play them back.
//!
//! The crate has two engines and the types they share:
//! - [`recorder::ReplayRecorder`] captures events with offsets relative to capture start
//! - [`player::ReplayPlayer`] re-emits a loaded recording with play, pause, stop,
//!   seek and variable speed, reproducing the original relative timing
//! - [`replay`] holds the recording data model
//!
//! Persistence goes through the [`store::ReplayStore`] boundary and
//! [`transport`] has the helpers a control surface needs.

pub mod player;
pub mod recorder;
pub mod replay;
pub mod store;
pub mod transport;
pub mod utils;

pub use player::{PlaybackState, PlayerState, ReplayPlayer};
pub use recorder::ReplayRecorder;
pub use replay::{RecordedEvent, Recording, Replay, ReplayMetadata};
pub use utils::{init_tracing, ReplayError, ReplayResult, DEFAULT_LOG_FILTER};
