//! Single writer for playlist state.
//!
//! Every mutation takes the writer lock, derives a new snapshot from the
//! current one, publishes it to subscribers, and rewrites the store before
//! releasing the lock. Mutations therefore apply and persist in the order they
//! acquire the lock, and none of them works from a stale snapshot.
//!
//! The store write owns the lock guard. A caller that drops a mutation
//! mid-write does not release the lock early: the write still finishes and
//! reports its status before the next mutation starts.

use super::{Playlist, PlaylistStore};
use rand::Rng;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

pub type Snapshot = Arc<Vec<Playlist>>;

/// Result of the most recent write to the playlist store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PersistStatus {
    #[default]
    Idle,
    Saved,
    Failed(String),
}

#[derive(Debug)]
struct Inner {
    store: Arc<PlaylistStore>,
    writer: Arc<Mutex<()>>,
    snapshot_tx: watch::Sender<Snapshot>,
    status_tx: watch::Sender<PersistStatus>,
}

#[derive(Debug, Clone)]
pub struct PlaylistManager {
    inner: Arc<Inner>,
}

impl PlaylistManager {
    /// Create a manager with an empty list. Call [`load`](Self::load) to read the store.
    pub fn new(store: PlaylistStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Arc::new(store),
                writer: Arc::new(Mutex::new(())),
                snapshot_tx: watch::Sender::new(Arc::new(Vec::new())),
                status_tx: watch::Sender::new(PersistStatus::Idle),
            }),
        }
    }

    pub async fn open(store: PlaylistStore) -> Self {
        let manager = Self::new(store);
        manager.load().await;
        manager
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Observe the outcome of each store write.
    pub fn persist_status(&self) -> watch::Receiver<PersistStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn get(&self, id: i64) -> Option<Playlist> {
        self.inner.snapshot_tx.borrow().iter().find(|p| p.id == id).cloned()
    }

    /// Ids of the playlists that already hold `song_id`.
    pub fn containing(&self, song_id: i64) -> Vec<i64> {
        self.inner
            .snapshot_tx
            .borrow()
            .iter()
            .filter(|p| p.contains(song_id))
            .map(|p| p.id)
            .collect()
    }

    /// Replace the in-memory list with the store's contents. An unreadable or
    /// malformed store loads as an empty list.
    pub async fn load(&self) {
        let _guard = self.inner.writer.lock().await;

        let store = self.inner.store.clone();
        let loaded = match tokio::task::spawn_blocking(move || store.read()).await {
            Ok(Ok(playlists)) => playlists,
            Ok(Err(e)) => {
                tracing::warn!("load playlists failed, starting empty: {e:#}");
                Vec::new()
            }
            Err(e) => {
                tracing::error!("load playlists task failed: {e}");
                Vec::new()
            }
        };

        tracing::info!(count = loaded.len(), path = %self.inner.store.path().display(), "loaded playlists");
        self.inner.snapshot_tx.send_replace(Arc::new(loaded));
    }

    pub async fn create(&self, name: impl Into<String>) -> Playlist {
        let name = name.into();
        self.mutate("create", |list| {
            let playlist = Playlist::new(fresh_id(list), name);
            list.push(playlist.clone());
            playlist
        })
        .await
    }

    pub async fn delete(&self, id: i64) {
        self.mutate("delete", |list| list.retain(|p| p.id != id)).await;
    }

    pub async fn rename(&self, id: i64, new_name: impl Into<String>) {
        let new_name = new_name.into();
        self.mutate("rename", |list| {
            if let Some(p) = list.iter_mut().find(|p| p.id == id) {
                p.name = new_name;
            }
        })
        .await;
    }

    pub async fn add_song(&self, playlist_id: i64, song_id: i64) {
        self.mutate("add_song", |list| {
            if let Some(p) = list.iter_mut().find(|p| p.id == playlist_id)
                && !p.contains(song_id)
            {
                p.song_ids.push(song_id);
            }
        })
        .await;
    }

    pub async fn remove_song(&self, playlist_id: i64, song_id: i64) {
        self.mutate("remove_song", |list| {
            if let Some(p) = list.iter_mut().find(|p| p.id == playlist_id) {
                p.song_ids.retain(|id| *id != song_id);
            }
        })
        .await;
    }

    /// Apply `f` to a private copy of the current list, publish the copy as the
    /// new snapshot, and write it to the store.
    async fn mutate<R>(&self, op: &'static str, f: impl FnOnce(&mut Vec<Playlist>) -> R) -> R {
        let guard = self.inner.writer.clone().lock_owned().await;

        let mut list = (*self.snapshot()).clone();
        let out = f(&mut list);
        let next: Snapshot = Arc::new(list);
        self.inner.snapshot_tx.send_replace(next.clone());
        tracing::debug!(op, count = next.len(), "playlists updated");

        let inner = self.inner.clone();
        let write = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let status = match inner.store.write(&next) {
                Ok(()) => PersistStatus::Saved,
                Err(e) => {
                    tracing::warn!(op, "persist playlists failed: {e:#}");
                    PersistStatus::Failed(format!("{e:#}"))
                }
            };
            inner.status_tx.send_replace(status);
        });

        if let Err(e) = write.await {
            tracing::error!(op, "persist playlists task failed: {e}");
            self.inner
                .status_tx
                .send_replace(PersistStatus::Failed(e.to_string()));
        }
        out
    }
}

fn fresh_id(existing: &[Playlist]) -> i64 {
    let mut rng = rand::rng();
    loop {
        let id = rng.random_range(1..=i64::MAX);
        if !existing.iter().any(|p| p.id == id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn store_in(dir: &tempfile::TempDir) -> PlaylistStore {
        PlaylistStore::new(dir.path().join("playlists.json"))
    }

    #[tokio::test]
    async fn test_road_trip_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PlaylistManager::open(store_in(&dir)).await;

        let p = manager.create("Road Trip").await;
        for song in [1, 2, 3] {
            manager.add_song(p.id, song).await;
        }
        manager.remove_song(p.id, 2).await;

        let reloaded = PlaylistManager::open(store_in(&dir)).await;
        let snap = reloaded.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].name, "Road Trip");
        assert_eq!(snap[0].song_ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_memory_matches_store_after_mixed_operations() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PlaylistManager::open(store_in(&dir)).await;

        let a = manager.create("A").await;
        let b = manager.create("B").await;
        let c = manager.create("A").await;
        manager.add_song(a.id, 10).await;
        manager.add_song(a.id, 11).await;
        manager.add_song(b.id, 10).await;
        manager.rename(b.id, "Bee").await;
        manager.delete(c.id).await;
        manager.remove_song(a.id, 10).await;
        manager.delete(12345).await;
        manager.rename(12345, "ghost").await;

        let reloaded = PlaylistManager::open(store_in(&dir)).await;
        assert_eq!(*manager.snapshot(), *reloaded.snapshot());
        assert_eq!(manager.get(b.id).unwrap().name, "Bee");
        assert_eq!(manager.containing(10), vec![b.id]);
        assert_eq!(*manager.persist_status().borrow(), PersistStatus::Saved);
    }

    #[tokio::test]
    async fn test_add_song_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PlaylistManager::open(store_in(&dir)).await;
        let p = manager.create("Mix").await;

        manager.add_song(p.id, 42).await;
        manager.add_song(p.id, 7).await;
        manager.add_song(p.id, 42).await;
        assert_eq!(manager.get(p.id).unwrap().song_ids, vec![42, 7]);
    }

    #[tokio::test]
    async fn test_missing_targets_are_noops() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PlaylistManager::open(store_in(&dir)).await;
        let p = manager.create("Mix").await;
        manager.add_song(p.id, 1).await;
        let before = manager.snapshot();

        manager.remove_song(p.id, 99).await;
        manager.add_song(999, 1).await;
        manager.remove_song(999, 1).await;
        manager.delete(999).await;

        assert_eq!(*manager.snapshot(), *before);
        assert_eq!(manager.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_or_missing_store_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PlaylistManager::open(store_in(&dir)).await;
        assert!(manager.snapshot().is_empty());

        manager.create("replaced on load").await;
        std::fs::write(dir.path().join("playlists.json"), "[{\"id\": \"nope\"}").unwrap();
        manager.load().await;
        assert!(manager.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_names_are_not_deduplicated_and_ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PlaylistManager::open(store_in(&dir)).await;
        for _ in 0..5 {
            manager.create("Same").await;
        }
        let snap = manager.snapshot();
        let ids: HashSet<_> = snap.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 5);
        assert!(snap.iter().all(|p| p.name == "Same" && p.id > 0));
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PlaylistManager::open(store_in(&dir)).await;
        let p = manager.create("Party").await;

        let mut handles = Vec::new();
        for song in 0..32 {
            let m = manager.clone();
            handles.push(tokio::spawn(async move { m.add_song(p.id, song).await }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let mut songs = manager.get(p.id).unwrap().song_ids;
        songs.sort_unstable();
        assert_eq!(songs, (0..32).collect::<Vec<_>>());

        let reloaded = PlaylistManager::open(store_in(&dir)).await;
        assert_eq!(reloaded.get(p.id).unwrap().len(), 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dropped_mutations_still_persist_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PlaylistManager::open(store_in(&dir)).await;
        let p = manager.create("Interrupted").await;

        for song in 0..100 {
            let m = manager.clone();
            let _ = tokio::time::timeout(Duration::ZERO, m.add_song(p.id, song)).await;
        }
        manager.add_song(p.id, 1_000).await;

        assert_eq!(*manager.persist_status().borrow(), PersistStatus::Saved);
        let reloaded = PlaylistManager::open(store_in(&dir)).await;
        assert_eq!(*reloaded.snapshot(), *manager.snapshot());
        assert_eq!(manager.get(p.id).unwrap().song_ids.last(), Some(&1_000));
        assert!(!dir.path().join("playlists.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_subscribers_see_each_new_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PlaylistManager::open(store_in(&dir)).await;
        let mut rx = manager.subscribe();

        let p = manager.create("Watched").await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update()[0].id, p.id);

        manager.rename(p.id, "Renamed").await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update()[0].name, "Renamed");
    }

    #[tokio::test]
    async fn test_write_failure_keeps_memory_and_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let manager = PlaylistManager::open(PlaylistStore::new(blocker.join("playlists.json"))).await;

        let p = manager.create("Unsaved").await;
        assert_eq!(manager.get(p.id).unwrap().name, "Unsaved");
        assert!(matches!(
            *manager.persist_status().borrow(),
            PersistStatus::Failed(_)
        ));
    }
}
