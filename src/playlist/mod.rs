//! User playlists: the data model, its JSON store, and the manager that owns
//! the in-memory list.

pub mod manager;
pub mod store;

pub use manager::{PersistStatus, PlaylistManager};
pub use store::PlaylistStore;

use serde::{Deserialize, Serialize};

/// A named, ordered, duplicate-free list of song ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default = "now_millis")]
    pub date_created: i64,
    /// Playback order.
    #[serde(default)]
    pub song_ids: Vec<i64>,
}

impl Playlist {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            date_created: now_millis(),
            song_ids: Vec::new(),
        }
    }

    pub fn contains(&self, song_id: i64) -> bool {
        self.song_ids.contains(&song_id)
    }

    pub fn len(&self) -> usize {
        self.song_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.song_ids.is_empty()
    }
}

pub(crate) fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
