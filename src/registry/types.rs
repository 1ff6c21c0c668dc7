//! Media artifact model
//!
//! Live artifacts carry their binary payload and a revocable preview
//! file; the snapshot format keeps only the metadata projection.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::media::timestamp_slug;

/// Kind of captured artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    fn filename(self, at: DateTime<Local>) -> String {
        match self {
            MediaKind::Photo => format!("DualCam_Photo_{}.jpg", timestamp_slug(at)),
            MediaKind::Video => format!("DualCam_Video_{}.webm", timestamp_slug(at)),
        }
    }
}

/// Ephemeral display handle for an artifact.
///
/// Backed by a file under the app's preview directory; revoking deletes
/// the file. Revocation also happens on drop, so removing an artifact
/// from the registry always releases its preview.
#[derive(Debug)]
pub struct PreviewHandle {
    path: PathBuf,
}

impl PreviewHandle {
    fn write(dir: &Path, name: &str, payload: &[u8]) -> io::Result<Self> {
        let path = dir.join(name);
        fs::write(&path, payload)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the backing file. Safe to call more than once.
    pub fn revoke(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!("failed to remove preview {:?}: {err}", self.path),
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.revoke();
    }
}

/// A finalized capture: binary payload plus metadata. Never mutated
/// after creation.
#[derive(Debug)]
pub struct MediaArtifact {
    pub id: Uuid,
    pub kind: MediaKind,
    pub payload: Vec<u8>,
    pub media_type: String,
    pub preview: PreviewHandle,
    pub created_at: DateTime<Local>,
    pub filename: String,
}

impl MediaArtifact {
    /// Create an artifact, writing its preview file under `preview_dir`.
    pub fn new(
        kind: MediaKind,
        payload: Vec<u8>,
        media_type: impl Into<String>,
        preview_dir: &Path,
    ) -> io::Result<Self> {
        let id = Uuid::new_v4();
        let created_at = Local::now();
        let filename = kind.filename(created_at);
        let preview = PreviewHandle::write(preview_dir, &format!("{id}-{filename}"), &payload)?;

        Ok(Self {
            id,
            kind,
            payload,
            media_type: media_type.into(),
            preview,
            created_at,
            filename,
        })
    }

    /// Write the payload under its suggested filename — the "save file"
    /// half of a download action.
    pub fn save_to(&self, dir: &Path) -> io::Result<PathBuf> {
        let dest = dir.join(&self.filename);
        fs::write(&dest, &self.payload)?;
        Ok(dest)
    }

    /// The metadata projection that goes into the persisted snapshot.
    pub fn record(&self) -> MediaRecord {
        MediaRecord {
            id: self.id,
            kind: self.kind,
            timestamp: self.created_at,
            filename: self.filename.clone(),
        }
    }
}

/// Metadata-only projection of an artifact.
///
/// This is the persisted form: binary payloads and previews do not
/// survive a restart, only identity, kind, timestamp and filename do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub timestamp: DateTime<Local>,
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn slug_is_well_formed(slug: &str) {
        let (date, time) = slug.split_once('_').unwrap();
        assert_eq!(date.len(), 8);
        assert_eq!(time.len(), 6);
        assert!(date.chars().all(|c| c.is_ascii_digit()));
        assert!(time.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn filenames_follow_the_dualcam_pattern() {
        let dir = tempdir().unwrap();
        let photo = MediaArtifact::new(MediaKind::Photo, vec![1], "image/jpeg", dir.path()).unwrap();
        let video = MediaArtifact::new(MediaKind::Video, vec![2], "video/webm", dir.path()).unwrap();

        let slug = photo
            .filename
            .strip_prefix("DualCam_Photo_")
            .unwrap()
            .strip_suffix(".jpg")
            .unwrap();
        slug_is_well_formed(slug);

        let slug = video
            .filename
            .strip_prefix("DualCam_Video_")
            .unwrap()
            .strip_suffix(".webm")
            .unwrap();
        slug_is_well_formed(slug);
    }

    #[test]
    fn preview_is_written_and_released_on_drop() {
        let dir = tempdir().unwrap();
        let artifact =
            MediaArtifact::new(MediaKind::Photo, vec![1, 2, 3], "image/jpeg", dir.path()).unwrap();
        let preview_path = artifact.preview.path().to_path_buf();

        assert_eq!(fs::read(&preview_path).unwrap(), vec![1, 2, 3]);
        drop(artifact);
        assert!(!preview_path.exists());
    }

    #[test]
    fn revoke_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut artifact =
            MediaArtifact::new(MediaKind::Photo, vec![0], "image/jpeg", dir.path()).unwrap();
        artifact.preview.revoke();
        artifact.preview.revoke();
        assert!(!artifact.preview.path().exists());
    }

    #[test]
    fn save_to_uses_the_suggested_filename() {
        let dir = tempdir().unwrap();
        let downloads = tempdir().unwrap();
        let artifact =
            MediaArtifact::new(MediaKind::Video, vec![9; 16], "video/webm", dir.path()).unwrap();

        let dest = artifact.save_to(downloads.path()).unwrap();
        assert_eq!(dest.file_name().unwrap().to_str(), Some(artifact.filename.as_str()));
        assert_eq!(fs::read(dest).unwrap(), vec![9; 16]);
    }

    #[test]
    fn record_serializes_with_the_wire_field_names() {
        let dir = tempdir().unwrap();
        let artifact =
            MediaArtifact::new(MediaKind::Photo, vec![0], "image/jpeg", dir.path()).unwrap();

        let json = serde_json::to_value(artifact.record()).unwrap();
        assert_eq!(json["type"], "photo");
        assert!(json["id"].is_string());
        assert!(json["timestamp"].is_string());
        assert_eq!(json["filename"], artifact.filename.as_str());
    }
}
