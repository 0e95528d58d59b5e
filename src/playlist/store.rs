use super::Playlist;
use anyhow::Context;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// The on-disk playlist collection: a single JSON array, always rewritten in full.
#[derive(Debug, Clone)]
pub struct PlaylistStore {
    path: PathBuf,
}

impl PlaylistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every playlist. A missing file is an empty collection; a malformed
    /// one is an error.
    pub fn read(&self) -> anyhow::Result<Vec<Playlist>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        let playlists: Vec<Playlist> = serde_json::from_str(&raw)
            .with_context(|| format!("parse {}", self.path.display()))?;
        Ok(repair(playlists))
    }

    /// Replace the file with `playlists`.
    ///
    /// The array is written to a sibling temp file and renamed into place, so
    /// readers see either the previous snapshot or the new one.
    pub fn write(&self, playlists: &[Playlist]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        let raw = serde_json::to_string(playlists).context("serialize playlists")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }
}

/// Restore the id-uniqueness and no-duplicate-song invariants on hand-edited files.
fn repair(playlists: Vec<Playlist>) -> Vec<Playlist> {
    let mut seen_ids = HashSet::new();
    let mut out = Vec::with_capacity(playlists.len());

    for mut playlist in playlists {
        if !seen_ids.insert(playlist.id) {
            tracing::warn!(id = playlist.id, "dropping playlist with duplicate id");
            continue;
        }

        let before = playlist.song_ids.len();
        let mut seen_songs = HashSet::new();
        playlist.song_ids.retain(|id| seen_songs.insert(*id));
        if playlist.song_ids.len() != before {
            tracing::warn!(
                id = playlist.id,
                removed = before - playlist.song_ids.len(),
                "collapsed duplicate song ids"
            );
        }

        out.push(playlist);
    }

    out
}
