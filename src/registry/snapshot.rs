//! Metadata snapshot persistence
//!
//! Persists the registry's metadata projection as JSON in the storage
//! directory. Binary payloads are deliberately not persisted: after a
//! restart only id/kind/timestamp/filename come back, and the gallery
//! shows entries without their media. That limitation is part of the
//! format, not something to repair here.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

use super::types::MediaRecord;

/// Name of the snapshot file inside the storage directory.
pub const SNAPSHOT_FILE: &str = "dualcam_media.json";

/// Snapshot-related errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt media snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Write the metadata projection of the registry to `dir`.
pub fn persist_snapshot(records: &[MediaRecord], dir: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(dir)?;
    let content = serde_json::to_string_pretty(records)?;
    fs::write(dir.join(SNAPSHOT_FILE), content)?;

    tracing::debug!(count = records.len(), "persisted media snapshot");
    Ok(())
}

/// Load the metadata projection from `dir`.
///
/// A missing snapshot is an empty registry; a corrupt one is logged and
/// treated the same. Storage failures never propagate out of here.
pub fn load_snapshot(dir: &Path) -> Vec<MediaRecord> {
    let path = dir.join(SNAPSHOT_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            tracing::warn!("failed to read media snapshot: {err}");
            return Vec::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!("corrupt media snapshot, starting empty: {err}");
            Vec::new()
        }
    }
}

/// Delete the persisted snapshot, if any.
pub fn clear_snapshot(dir: &Path) -> Result<(), StorageError> {
    match fs::remove_file(dir.join(SNAPSHOT_FILE)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::{MediaArtifact, MediaKind};
    use tempfile::tempdir;

    fn records(n: usize, dir: &Path) -> Vec<MediaRecord> {
        (0..n)
            .map(|i| {
                let kind = if i % 2 == 0 {
                    MediaKind::Photo
                } else {
                    MediaKind::Video
                };
                MediaArtifact::new(kind, vec![i as u8], "image/jpeg", dir)
                    .unwrap()
                    .record()
            })
            .collect()
    }

    #[test]
    fn round_trips_metadata_exactly() {
        for n in [0, 1, 20] {
            let storage = tempdir().unwrap();
            let previews = tempdir().unwrap();

            let written = records(n, previews.path());
            persist_snapshot(&written, storage.path()).unwrap();
            let loaded = load_snapshot(storage.path());
            assert_eq!(loaded, written);
        }
    }

    #[test]
    fn missing_snapshot_is_an_empty_registry() {
        let storage = tempdir().unwrap();
        assert!(load_snapshot(storage.path()).is_empty());
    }

    #[test]
    fn corrupt_snapshot_is_recovered_as_empty() {
        let storage = tempdir().unwrap();
        fs::write(storage.path().join(SNAPSHOT_FILE), "{not json").unwrap();
        assert!(load_snapshot(storage.path()).is_empty());
    }

    #[test]
    fn clear_removes_the_file_and_is_idempotent() {
        let storage = tempdir().unwrap();
        let previews = tempdir().unwrap();
        persist_snapshot(&records(3, previews.path()), storage.path()).unwrap();

        clear_snapshot(storage.path()).unwrap();
        assert!(!storage.path().join(SNAPSHOT_FILE).exists());
        clear_snapshot(storage.path()).unwrap();
    }
}
