//! Recording data model
//!
//! Pure schema shared by the recorder, player and stores:
//! - `RecordedEvent` - an opaque payload positioned by its offset from capture start
//! - `Replay` - descriptive metadata for a finalized capture
//! - `Recording` - metadata plus the ordered event list

pub mod schema;

pub use schema::{
    RecordedEvent, Recording, RecordingInvariantError, Replay, ReplayMetadata, ReplayStats,
};
