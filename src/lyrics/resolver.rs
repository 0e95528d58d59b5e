use super::lrclib::TrackQuery;
use super::{CachedLyrics, LrclibClient, LyricsCache, LyricsResult, LyricsSource, Song};
use crate::config::Config;

/// Cache-first lyrics lookup with a strict LRCLIB fallback.
///
/// Holds no state beyond its collaborators: the outcome of [`resolve`](Self::resolve)
/// depends only on the song, the cache contents and the remote response.
#[derive(Debug, Clone)]
pub struct LyricsResolver {
    cache: LyricsCache,
    client: LrclibClient,
    tolerance_secs: u32,
}

impl LyricsResolver {
    pub fn new(cache: LyricsCache, client: LrclibClient, tolerance_secs: u32) -> Self {
        Self {
            cache,
            client,
            tolerance_secs,
        }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let cache = LyricsCache::open(&cfg.paths.lyrics_db())?;
        let client = LrclibClient::new(&cfg.lyrics)?;
        Ok(Self::new(cache, client, cfg.lyrics.duration_tolerance_secs))
    }

    pub async fn resolve(&self, song: &Song) -> LyricsResult {
        match self.try_resolve(song).await {
            Ok(Some(hit)) => LyricsResult::Success {
                lyrics: hit.lyrics,
                source: hit.source,
            },
            Ok(None) => {
                tracing::debug!(song_id = song.id, title = %song.title, "no lyrics found");
                LyricsResult::NotFound
            }
            Err(e) => {
                tracing::error!(song_id = song.id, "lyrics lookup failed: {e:#}");
                LyricsResult::Error(format!("{e:#}"))
            }
        }
    }

    async fn try_resolve(&self, song: &Song) -> anyhow::Result<Option<CachedLyrics>> {
        if let Some(hit) = self.cache.get(song.id).await? {
            tracing::debug!(song_id = song.id, source = %hit.source, "lyrics cache hit");
            return Ok(Some(hit));
        }

        let local_secs = song.duration_secs();
        let query = TrackQuery {
            track_name: &song.title,
            artist_name: &song.artist,
            album_name: &song.album,
            duration_secs: local_secs,
        };
        tracing::debug!(title = %song.title, artist = %song.artist, "fetching lyrics from LRCLIB");
        let Some(response) = self.client.get(&query).await? else {
            return Ok(None);
        };

        if response.duration_mismatch(local_secs, self.tolerance_secs) {
            tracing::warn!(
                expected = local_secs,
                got = ?response.duration,
                "LRCLIB duration mismatch, ignoring result"
            );
            return Ok(None);
        }

        let Some(lyrics) = response.into_lyrics() else {
            return Ok(None);
        };

        // A failed cache write still yields the fetched text.
        if let Err(e) = self.cache.put(song.id, &lyrics, LyricsSource::Remote).await {
            tracing::warn!(song_id = song.id, "caching fetched lyrics failed: {e:#}");
        } else {
            tracing::info!(song_id = song.id, "fetched and cached lyrics from LRCLIB");
        }

        Ok(Some(CachedLyrics {
            lyrics,
            source: LyricsSource::Remote,
        }))
    }

    /// Cache user-supplied LRC text. Rejected unless it contains both `[` and
    /// `]`; returns whether it was stored.
    pub async fn import_lrc_file(&self, song_id: i64, content: &str) -> bool {
        if !(content.contains('[') && content.contains(']')) {
            tracing::debug!(song_id, "rejected lyrics import without timestamp tags");
            return false;
        }
        match self.cache.put(song_id, content, LyricsSource::LocalImport).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(song_id, "importing lyrics failed: {e:#}");
                false
            }
        }
    }

    /// Cache user-entered text as-is.
    pub async fn save_lyrics(&self, song_id: i64, lyrics: &str) -> anyhow::Result<()> {
        self.cache.put(song_id, lyrics, LyricsSource::LocalImport).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LyricsConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn song(id: i64, duration_ms: u64) -> Song {
        Song {
            id,
            title: "Hey Jude".into(),
            artist: "The Beatles".into(),
            album: "Past Masters".into(),
            duration_ms,
        }
    }

    fn resolver_for(base_url: String) -> LyricsResolver {
        let client = LrclibClient::new(&LyricsConfig {
            base_url,
            ..LyricsConfig::default()
        })
        .unwrap();
        LyricsResolver::new(LyricsCache::open_in_memory().unwrap(), client, 3)
    }

    async fn mount(server: &MockServer, response: ResponseTemplate, calls: u64) {
        Mock::given(method("GET"))
            .and(path("/api/get"))
            .respond_with(response)
            .expect(calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(200), 0).await;
        let resolver = resolver_for(format!("{}/api", server.uri()));
        resolver.save_lyrics(42, "cached words").await.unwrap();

        let got = resolver.resolve(&song(42, 200_000)).await;
        assert_eq!(
            got,
            LyricsResult::Success {
                lyrics: "cached words".into(),
                source: LyricsSource::LocalImport,
            }
        );
    }

    #[tokio::test]
    async fn test_remote_within_tolerance_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/get"))
            .and(query_param("duration", "203"))
            .and(query_param("album_name", "Past Masters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "duration": 200,
                "plainLyrics": "Hey Jude, don't make it bad"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let resolver = resolver_for(format!("{}/api", server.uri()));

        let first = resolver.resolve(&song(5, 203_000)).await;
        let expected = LyricsResult::Success {
            lyrics: "Hey Jude, don't make it bad".into(),
            source: LyricsSource::Remote,
        };
        assert_eq!(first, expected);
        // Served from the cache; the mock's `expect(1)` fails the test otherwise.
        assert_eq!(resolver.resolve(&song(5, 203_000)).await, expected);
    }

    #[tokio::test]
    async fn test_duration_mismatch_is_not_found() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "duration": 210,
                "syncedLyrics": "[00:01.00]wrong edit"
            })),
            1,
        )
        .await;
        let resolver = resolver_for(format!("{}/api", server.uri()));

        assert_eq!(resolver.resolve(&song(6, 200_000)).await, LyricsResult::NotFound);
        assert!(resolver.cache.get(6).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_synced_preferred_over_plain() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "duration": 200.4,
                "plainLyrics": "plain words",
                "syncedLyrics": "[00:01.00]synced words"
            })),
            1,
        )
        .await;
        let resolver = resolver_for(format!("{}/api", server.uri()));

        assert_eq!(
            resolver.resolve(&song(8, 200_000)).await,
            LyricsResult::Success {
                lyrics: "[00:01.00]synced words".into(),
                source: LyricsSource::Remote,
            }
        );
        let cached = resolver.cache.get(8).await.unwrap().unwrap();
        assert_eq!(cached.lyrics, "[00:01.00]synced words");
    }

    #[tokio::test]
    async fn test_no_match_and_failures_are_not_found() {
        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(404), 1).await;
        let resolver = resolver_for(format!("{}/api", server.uri()));
        assert_eq!(resolver.resolve(&song(1, 1_000)).await, LyricsResult::NotFound);

        let server = MockServer::start().await;
        mount(&server, ResponseTemplate::new(500), 1).await;
        let resolver = resolver_for(format!("{}/api", server.uri()));
        assert_eq!(resolver.resolve(&song(1, 1_000)).await, LyricsResult::NotFound);

        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({ "duration": 1, "instrumental": true })),
            1,
        )
        .await;
        let resolver = resolver_for(format!("{}/api", server.uri()));
        assert_eq!(resolver.resolve(&song(1, 1_000)).await, LyricsResult::NotFound);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_not_found() {
        let resolver = resolver_for("http://127.0.0.1:1/api".into());
        assert_eq!(resolver.resolve(&song(2, 1_000)).await, LyricsResult::NotFound);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            ResponseTemplate::new(200).set_body_string("not json at all"),
            1,
        )
        .await;
        let resolver = resolver_for(format!("{}/api", server.uri()));

        assert!(matches!(
            resolver.resolve(&song(3, 1_000)).await,
            LyricsResult::Error(_)
        ));
    }

    #[tokio::test]
    async fn test_import_requires_brackets() {
        let resolver = resolver_for("http://127.0.0.1:9/api".into());

        assert!(!resolver.import_lrc_file(11, "hello").await);
        assert!(resolver.cache.get(11).await.unwrap().is_none());

        assert!(resolver.import_lrc_file(11, "[00:01.00]hello").await);
        assert_eq!(
            resolver.cache.get(11).await.unwrap(),
            Some(CachedLyrics {
                lyrics: "[00:01.00]hello".into(),
                source: LyricsSource::LocalImport,
            })
        );
    }

    #[tokio::test]
    async fn test_save_bypasses_validation() {
        let resolver = resolver_for("http://127.0.0.1:9/api".into());
        resolver.save_lyrics(12, "no tags here").await.unwrap();

        let hit = resolver.cache.get(12).await.unwrap().unwrap();
        assert_eq!(hit.lyrics, "no tags here");
        assert_eq!(hit.source, LyricsSource::LocalImport);
    }
}
