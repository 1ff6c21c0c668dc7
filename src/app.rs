//! Application controller
//!
//! The surface a capture UI binds to. Owns both camera slots, the
//! bounded media registry, the preview directory, and at most one live
//! recorder session; registry state lives here and is handed out by
//! reference, never through globals.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use crate::capture::{CameraStream, FacingMode};
use crate::media;
use crate::recorder::{DualRecorder, RecorderError, RecorderState};
use crate::registry::{self, MediaArtifact, MediaKind, MediaRecord, MediaRegistry};
use crate::utils::error::{AppError, AppResult};

/// Which side-by-side feed an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSlot {
    /// Left feed, user-facing by default
    Left,
    /// Right feed, environment-facing by default
    Right,
}

pub struct DualCamApp {
    storage_dir: PathBuf,
    previews: TempDir,
    left: Option<CameraStream>,
    right: Option<CameraStream>,
    left_facing: FacingMode,
    right_facing: FacingMode,
    recorder: Option<DualRecorder>,
    registry: MediaRegistry,
    restored: Vec<MediaRecord>,
}

impl DualCamApp {
    /// Create the controller, loading the previous session's metadata
    /// snapshot. Media payloads do not survive restarts; only the
    /// restored records do.
    pub fn new(storage_dir: impl Into<PathBuf>) -> AppResult<Self> {
        let storage_dir = storage_dir.into();
        std::fs::create_dir_all(&storage_dir)?;
        let previews = TempDir::new()?;
        let restored = registry::load_snapshot(&storage_dir);

        tracing::info!(
            ?storage_dir,
            restored = restored.len(),
            "dualcam app initialized"
        );

        Ok(Self {
            storage_dir,
            previews,
            left: None,
            right: None,
            left_facing: FacingMode::Front,
            right_facing: FacingMode::Back,
            recorder: None,
            registry: MediaRegistry::new(),
            restored,
        })
    }

    /// Records restored from the last session's snapshot (metadata only).
    pub fn restored_records(&self) -> &[MediaRecord] {
        &self.restored
    }

    pub fn registry(&self) -> &MediaRegistry {
        &self.registry
    }

    /// Open both camera feeds. The two acquisitions are issued
    /// concurrently and jointly awaited.
    pub async fn open_cameras(&mut self, include_audio: bool) -> AppResult<()> {
        self.close_cameras().await;

        let left_facing = self.left_facing;
        let right_facing = self.right_facing;
        let (left, right) = tokio::try_join!(
            tokio::task::spawn_blocking(move || CameraStream::acquire(left_facing, include_audio)),
            tokio::task::spawn_blocking(move || CameraStream::acquire(right_facing, include_audio)),
        )
        .map_err(|err| AppError::Io(std::io::Error::other(err)))?;

        let (left, right) = (left?, right?);
        self.left = Some(left);
        self.right = Some(right);
        Ok(())
    }

    /// Release both feeds, tearing down any recorder session first.
    pub async fn close_cameras(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            recorder.cleanup().await;
        }
        if let Some(mut stream) = self.left.take() {
            stream.release();
        }
        if let Some(mut stream) = self.right.take() {
            stream.release();
        }
    }

    /// Flip one feed to the other facing role.
    ///
    /// The old stream is released before the replacement is acquired, so
    /// a slot never holds two device locks at once.
    pub async fn switch_camera(&mut self, slot: CameraSlot, include_audio: bool) -> AppResult<()> {
        // A live recorder holds track clones of the outgoing stream
        if let Some(mut recorder) = self.recorder.take() {
            recorder.cleanup().await;
        }

        let (current, facing) = match slot {
            CameraSlot::Left => (&mut self.left, &mut self.left_facing),
            CameraSlot::Right => (&mut self.right, &mut self.right_facing),
        };
        if let Some(mut stream) = current.take() {
            stream.release();
        }
        *facing = facing.toggled();
        let target = *facing;

        let stream =
            tokio::task::spawn_blocking(move || CameraStream::acquire(target, include_audio))
                .await
                .map_err(|err| AppError::Io(std::io::Error::other(err)))??;
        *current = Some(stream);
        Ok(())
    }

    /// Take a combined still photo.
    ///
    /// Both feeds are captured jointly — composition waits until both
    /// stills resolve — then the side-by-side result lands in the
    /// registry and the snapshot is persisted.
    pub async fn capture_photo(&mut self) -> AppResult<Uuid> {
        let left = self
            .left
            .as_ref()
            .and_then(CameraStream::video_track)
            .ok_or(AppError::CamerasNotReady)?;
        let right = self
            .right
            .as_ref()
            .and_then(CameraStream::video_track)
            .ok_or(AppError::CamerasNotReady)?;

        let (left_jpeg, right_jpeg) =
            tokio::try_join!(media::capture_frame(&left), media::capture_frame(&right))?;
        let combined = media::compose_dual_photo(left_jpeg, right_jpeg).await?;

        let artifact =
            MediaArtifact::new(MediaKind::Photo, combined, "image/jpeg", self.previews.path())?;
        let id = artifact.id;
        self.registry.add(artifact);
        self.persist();
        Ok(id)
    }

    /// Start a recording session over both feeds, constructing one if
    /// none is live.
    pub async fn start_recording(&mut self) -> AppResult<()> {
        if self.recorder.is_none() {
            let left = self.left.as_ref().ok_or(AppError::CamerasNotReady)?;
            let right = self.right.as_ref().ok_or(AppError::CamerasNotReady)?;
            self.recorder = Some(DualRecorder::new(left, right)?);
        }
        match self.recorder.as_mut() {
            Some(recorder) => recorder.start().await?,
            None => return Err(RecorderError::NoStreamAvailable.into()),
        }
        Ok(())
    }

    pub async fn pause_recording(&mut self) {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.pause().await;
        }
    }

    pub async fn resume_recording(&mut self) {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.resume().await;
        }
    }

    pub fn recording_state(&self) -> RecorderState {
        self.recorder
            .as_ref()
            .map(DualRecorder::state)
            .unwrap_or_default()
    }

    /// Recorded time of the live session, for the UI timer overlay.
    pub fn recording_duration(&self) -> std::time::Duration {
        self.recorder
            .as_ref()
            .map(DualRecorder::duration)
            .unwrap_or_default()
    }

    /// Stop the session, producing exactly one video artifact.
    pub async fn stop_recording(&mut self) -> AppResult<Uuid> {
        let mut recorder = self
            .recorder
            .take()
            .ok_or(RecorderError::NoActiveSession)?;
        let recorded = recorder.stop().await?;

        let artifact = MediaArtifact::new(
            MediaKind::Video,
            recorded.payload,
            recorded.media_type,
            self.previews.path(),
        )?;
        let id = artifact.id;
        self.registry.add(artifact);
        self.persist();
        Ok(id)
    }

    /// Delete a captured item, releasing its preview. A no-op for
    /// unknown ids.
    pub fn delete_media(&mut self, id: Uuid) {
        if self.registry.remove(id) {
            self.persist();
        }
    }

    /// Write an item's payload into `dest_dir` under its suggested
    /// filename — the "save file" action for a download.
    pub fn download_media(&self, id: Uuid, dest_dir: &Path) -> AppResult<PathBuf> {
        let artifact = self.registry.get(id).ok_or(AppError::UnknownMedia(id))?;
        Ok(artifact.save_to(dest_dir)?)
    }

    /// Release everything and persist a final snapshot.
    pub async fn shutdown(&mut self) {
        self.close_cameras().await;
        self.persist();
    }

    fn persist(&self) {
        // Storage failures degrade; they never interrupt a capture path
        if let Err(err) = registry::persist_snapshot(&self.registry.records(), &self.storage_dir) {
            tracing::warn!("failed to persist media snapshot: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::camera::{solid_frame, test_video_track};
    use crate::registry::load_snapshot;
    use tempfile::tempdir;

    fn app_with_synthetic_cameras(storage: &Path) -> DualCamApp {
        let mut app = DualCamApp::new(storage).unwrap();

        let (tx_left, left_track) = test_video_track();
        let (tx_right, right_track) = test_video_track();
        // Receivers keep the last value even after the senders drop
        tx_left.send_replace(Some(solid_frame(64, 48, [220, 30, 30])));
        tx_right.send_replace(Some(solid_frame(32, 60, [30, 30, 220])));

        app.left = Some(CameraStream::synthetic(
            FacingMode::Front,
            Some(left_track),
            None,
        ));
        app.right = Some(CameraStream::synthetic(
            FacingMode::Back,
            Some(right_track),
            None,
        ));
        app
    }

    #[tokio::test]
    async fn photo_capture_adds_one_photo_artifact() {
        let storage = tempdir().unwrap();
        let mut app = app_with_synthetic_cameras(storage.path());
        let before = app.registry().len();

        let id = app.capture_photo().await.unwrap();

        assert_eq!(app.registry().len(), before + 1);
        let artifact = app.registry().get(id).unwrap();
        assert_eq!(artifact.kind, MediaKind::Photo);
        assert!(artifact.filename.starts_with("DualCam_Photo_"));
        assert!(artifact.filename.ends_with(".jpg"));

        // Both feeds side by side: sum of widths, max of heights
        let decoded = image::load_from_memory(&artifact.payload).unwrap().to_rgb8();
        assert_eq!((decoded.width(), decoded.height()), (96, 60));

        // The snapshot was persisted alongside
        let records = load_snapshot(storage.path());
        assert_eq!(records.len(), before + 1);
        assert_eq!(records[0].id, id);
    }

    #[tokio::test]
    async fn photo_capture_without_open_cameras_fails() {
        let storage = tempdir().unwrap();
        let mut app = DualCamApp::new(storage.path()).unwrap();
        assert!(matches!(
            app.capture_photo().await,
            Err(AppError::CamerasNotReady)
        ));
    }

    #[tokio::test]
    async fn stop_without_a_session_fails() {
        let storage = tempdir().unwrap();
        let mut app = DualCamApp::new(storage.path()).unwrap();
        assert!(matches!(
            app.stop_recording().await,
            Err(AppError::Recorder(RecorderError::NoActiveSession))
        ));
        assert_eq!(app.recording_state(), RecorderState::Idle);
    }

    #[tokio::test]
    async fn delete_media_updates_registry_and_snapshot() {
        let storage = tempdir().unwrap();
        let mut app = app_with_synthetic_cameras(storage.path());

        let id = app.capture_photo().await.unwrap();
        app.delete_media(id);

        assert!(app.registry().is_empty());
        assert!(load_snapshot(storage.path()).is_empty());

        // Unknown id is a no-op
        app.delete_media(id);
    }

    #[tokio::test]
    async fn download_writes_the_payload_under_its_filename() {
        let storage = tempdir().unwrap();
        let downloads = tempdir().unwrap();
        let mut app = app_with_synthetic_cameras(storage.path());

        let id = app.capture_photo().await.unwrap();
        let dest = app.download_media(id, downloads.path()).unwrap();
        let artifact = app.registry().get(id).unwrap();
        assert_eq!(std::fs::read(dest).unwrap(), artifact.payload);
    }

    #[tokio::test]
    async fn restored_records_come_back_without_payloads() {
        let storage = tempdir().unwrap();
        {
            let mut app = app_with_synthetic_cameras(storage.path());
            app.capture_photo().await.unwrap();
            app.shutdown().await;
        }

        let app = DualCamApp::new(storage.path()).unwrap();
        assert_eq!(app.restored_records().len(), 1);
        assert_eq!(app.restored_records()[0].kind, MediaKind::Photo);
        // The registry itself starts empty: payloads are not restorable
        assert!(app.registry().is_empty());
    }
}
