use super::LyricsSource;
use anyhow::{Context, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A cache hit: the stored text and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedLyrics {
    pub lyrics: String,
    pub source: LyricsSource,
}

/// Persistent song id -> lyrics map.
///
/// Each song owns two string records, `lyrics_<id>` and `source_<id>`, in a
/// flat key/value table. Entries are never expired; the last write wins.
#[derive(Debug, Clone)]
pub struct LyricsCache {
    conn: Arc<Mutex<Connection>>,
}

impl LyricsCache {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory lyrics cache")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS lyrics_cache (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
"#,
        )
        .context("init schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn get(&self, song_id: i64) -> anyhow::Result<Option<CachedLyrics>> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.get_blocking(song_id))
            .await
            .context("lyrics cache task")?
    }

    pub async fn put(&self, song_id: i64, lyrics: &str, source: LyricsSource) -> anyhow::Result<()> {
        let this = self.clone();
        let lyrics = lyrics.to_string();
        tokio::task::spawn_blocking(move || this.put_blocking(song_id, &lyrics, source))
            .await
            .context("lyrics cache task")?
    }

    fn get_blocking(&self, song_id: i64) -> anyhow::Result<Option<CachedLyrics>> {
        let conn = self.lock()?;
        let Some(lyrics) = read_value(&conn, &lyrics_key(song_id))? else {
            return Ok(None);
        };
        let source = read_value(&conn, &source_key(song_id))?;
        Ok(Some(CachedLyrics {
            lyrics,
            source: LyricsSource::from_tag(source.as_deref()),
        }))
    }

    fn put_blocking(&self, song_id: i64, lyrics: &str, source: LyricsSource) -> anyhow::Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().context("begin lyrics write")?;
        for (key, value) in [
            (lyrics_key(song_id), lyrics),
            (source_key(song_id), source.as_tag()),
        ] {
            tx.execute(
                r#"
INSERT INTO lyrics_cache(key, value)
VALUES(?1, ?2)
ON CONFLICT(key) DO UPDATE SET
  value=excluded.value
"#,
                params![key, value],
            )
            .context("cache lyrics")?;
        }
        tx.commit().context("commit lyrics write")?;
        Ok(())
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("lyrics cache lock poisoned"))
    }
}

fn read_value(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM lyrics_cache WHERE key=?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("read {key}"))
}

fn lyrics_key(song_id: i64) -> String {
    format!("lyrics_{song_id}")
}

fn source_key(song_id: i64) -> String {
    format!("source_{song_id}")
}
