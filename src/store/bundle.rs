//! Replay bundle read/write operations
//!
//! A bundle directory holds one `<replay id>.json` file per recording,
//! containing the replay metadata and its events.

use super::{touch, ReplayStore, StoreError, StoreResult};
use crate::replay::{RecordedEvent, Recording, Replay};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extension of replay files inside a bundle
pub const REPLAY_EXTENSION: &str = "json";

/// Only the metadata part of a replay file
#[derive(Deserialize)]
struct ReplayHeader {
    replay: Replay,
}

/// Borrowed form of `Recording` written with the refreshed metadata
#[derive(Serialize)]
struct StoredRecording<'a, E> {
    replay: &'a Replay,
    events: &'a [RecordedEvent<E>],
}

/// Directory-backed replay store
#[derive(Debug, Clone)]
pub struct BundleStore {
    root: PathBuf,
}

impl BundleStore {
    /// Open a bundle rooted at `root`. The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding replay `id`
    pub fn replay_path(&self, id: &str) -> StoreResult<PathBuf> {
        if !is_valid_id(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.{REPLAY_EXTENSION}")))
    }

    async fn read_existing_header(&self, path: &Path) -> StoreResult<Option<Replay>> {
        match tokio::fs::read(path).await {
            Ok(content) => Ok(Some(serde_json::from_slice::<ReplayHeader>(&content)?.replay)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Replay ids become file names, so only allow a conservative alphabet
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Check if a path has the replay file extension
pub fn has_replay_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == REPLAY_EXTENSION)
}

#[async_trait]
impl<E> ReplayStore<E> for BundleStore
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn save(&self, recording: &Recording<E>) -> StoreResult<Replay> {
        recording.validate()?;
        let path = self.replay_path(&recording.replay.id)?;

        tokio::fs::create_dir_all(&self.root).await?;
        let existing = self.read_existing_header(&path).await?;
        let replay = touch(&recording.replay, existing.as_ref());

        let content = serde_json::to_vec_pretty(&StoredRecording {
            replay: &replay,
            events: &recording.events,
        })?;
        tokio::fs::write(&path, content).await?;

        tracing::debug!("Saved replay '{}' to {:?}", replay.name, path);
        Ok(replay)
    }

    async fn load(&self, id: &str) -> StoreResult<Recording<E>> {
        let path = self.replay_path(id)?;
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let recording: Recording<E> = serde_json::from_slice(&content)?;
        recording.validate()?;

        tracing::debug!("Loaded replay '{}' from {:?}", recording.replay.name, path);
        Ok(recording)
    }

    async fn list(&self) -> StoreResult<Vec<Replay>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            // An unused bundle has no directory yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut replays = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !has_replay_extension(&path) || !entry.file_type().await?.is_file() {
                continue;
            }

            let content = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<ReplayHeader>(&content) {
                Ok(header) => replays.push(header.replay),
                Err(e) => tracing::warn!("Skipping unreadable replay file {:?}: {}", path, e),
            }
        }

        replays.sort_by_key(|replay| replay.created_at);
        Ok(replays)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let path = self.replay_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
