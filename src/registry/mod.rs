//! Bounded media registry
//!
//! An ordered, most-recent-first collection of captured artifacts,
//! capped at a fixed retention count with FIFO eviction, plus the
//! metadata-only snapshot that survives restarts.

pub mod snapshot;
pub mod types;

pub use snapshot::{clear_snapshot, load_snapshot, persist_snapshot, StorageError, SNAPSHOT_FILE};
pub use types::{MediaArtifact, MediaKind, MediaRecord, PreviewHandle};

use uuid::Uuid;

/// Maximum retained artifacts; the oldest entry is evicted on overflow.
pub const MAX_ITEMS: usize = 20;

/// Ordered collection of captured artifacts, most recent first.
#[derive(Default)]
pub struct MediaRegistry {
    items: Vec<MediaArtifact>,
}

impl MediaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend an artifact, evicting the oldest entry past the cap.
    /// Eviction drops the artifact, which releases its preview.
    pub fn add(&mut self, artifact: MediaArtifact) {
        tracing::debug!(id = %artifact.id, kind = ?artifact.kind, "artifact added");
        self.items.insert(0, artifact);
        while self.items.len() > MAX_ITEMS {
            if let Some(evicted) = self.items.pop() {
                tracing::debug!(id = %evicted.id, "evicted oldest artifact");
            }
        }
    }

    /// Remove an artifact by id; a no-op when the id is unknown.
    /// Removal drops the artifact, which releases its preview.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        before != self.items.len()
    }

    pub fn get(&self, id: Uuid) -> Option<&MediaArtifact> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items(&self) -> &[MediaArtifact] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Metadata projection of every entry, in registry order.
    pub fn records(&self) -> Vec<MediaRecord> {
        self.items.iter().map(MediaArtifact::record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn artifact(dir: &std::path::Path, tag: u8) -> MediaArtifact {
        MediaArtifact::new(MediaKind::Photo, vec![tag], "image/jpeg", dir).unwrap()
    }

    #[test]
    fn retains_at_most_the_cap_with_fifo_eviction() {
        let dir = tempdir().unwrap();
        let mut registry = MediaRegistry::new();

        let mut ids = Vec::new();
        for i in 0..=MAX_ITEMS as u8 {
            let item = artifact(dir.path(), i);
            ids.push(item.id);
            registry.add(item);
        }

        assert_eq!(registry.len(), MAX_ITEMS);
        // First-inserted is gone, the rest are in reverse insertion order
        assert!(registry.get(ids[0]).is_none());
        let expected: Vec<_> = ids[1..].iter().rev().copied().collect();
        let actual: Vec<_> = registry.items().iter().map(|item| item.id).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn eviction_releases_the_preview() {
        let dir = tempdir().unwrap();
        let mut registry = MediaRegistry::new();

        let first = artifact(dir.path(), 0);
        let first_preview = first.preview.path().to_path_buf();
        registry.add(first);
        for i in 1..=MAX_ITEMS as u8 {
            registry.add(artifact(dir.path(), i));
        }

        assert!(!first_preview.exists());
    }

    #[test]
    fn remove_by_id_and_unknown_id_noop() {
        let dir = tempdir().unwrap();
        let mut registry = MediaRegistry::new();

        let item = artifact(dir.path(), 1);
        let id = item.id;
        let preview = item.preview.path().to_path_buf();
        registry.add(item);
        registry.add(artifact(dir.path(), 2));

        assert!(registry.remove(id));
        assert_eq!(registry.len(), 1);
        assert!(!preview.exists());

        assert!(!registry.remove(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn records_follow_registry_order() {
        let dir = tempdir().unwrap();
        let mut registry = MediaRegistry::new();
        for i in 0..3 {
            registry.add(artifact(dir.path(), i));
        }

        let records = registry.records();
        let ids: Vec<_> = registry.items().iter().map(|item| item.id).collect();
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
    }
}
