//! Persistence boundary for finalized recordings
//!
//! The engine hands a finished `Recording` to a `ReplayStore` and gets the
//! stored `Replay` echoed back. Two stores are provided:
//! - `MemoryStore` - keeps recordings in process
//! - `BundleStore` - one JSON file per replay in a directory

pub mod bundle;

pub use bundle::BundleStore;

use crate::replay::{Recording, RecordingInvariantError, Replay};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;

/// Store-related errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Replay not found: {0}")]
    NotFound(String),

    #[error("Invalid replay id: {0:?}")]
    InvalidId(String),

    #[error("Invalid recording: {0}")]
    InvalidRecording(#[from] RecordingInvariantError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// External save API for recordings
#[async_trait]
pub trait ReplayStore<E>: Send + Sync
where
    E: Send + Sync + 'static,
{
    /// Persist a recording, returning the stored metadata
    async fn save(&self, recording: &Recording<E>) -> StoreResult<Replay>;

    /// Load a recording by replay ID
    async fn load(&self, id: &str) -> StoreResult<Recording<E>>;

    /// Metadata of every stored replay, oldest first
    async fn list(&self) -> StoreResult<Vec<Replay>>;

    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Stamp `updated_at`, keeping the original creation time of an existing replay
fn touch(replay: &Replay, existing: Option<&Replay>) -> Replay {
    let mut stored = replay.clone();
    if let Some(existing) = existing {
        stored.created_at = existing.created_at;
    }
    stored.updated_at = Utc::now();
    stored
}

/// In-process store
pub struct MemoryStore<E> {
    recordings: RwLock<BTreeMap<String, Recording<E>>>,
}

impl<E> MemoryStore<E> {
    pub fn new() -> Self {
        Self {
            recordings: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.recordings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.read().is_empty()
    }
}

impl<E> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E> ReplayStore<E> for MemoryStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn save(&self, recording: &Recording<E>) -> StoreResult<Replay> {
        recording.validate()?;

        let mut recordings = self.recordings.write();
        let replay = touch(
            &recording.replay,
            recordings.get(&recording.replay.id).map(|r| &r.replay),
        );
        recordings.insert(
            replay.id.clone(),
            Recording {
                replay: replay.clone(),
                events: recording.events.clone(),
            },
        );

        tracing::debug!("Stored replay '{}' in memory", replay.name);
        Ok(replay)
    }

    async fn load(&self, id: &str) -> StoreResult<Recording<E>> {
        self.recordings
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(&self) -> StoreResult<Vec<Replay>> {
        let mut replays: Vec<_> = self
            .recordings
            .read()
            .values()
            .map(|r| r.replay.clone())
            .collect();
        replays.sort_by_key(|replay| replay.created_at);
        Ok(replays)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.recordings
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
