//! LRCLIB API client
//!
//! LRCLIB is a free lyrics API that provides synchronized (LRC format) lyrics.
//! API Documentation: https://lrclib.net/docs

use crate::config::LyricsConfig;
use anyhow::Context;
use serde::Deserialize;

/// LRCLIB `/get` response. Every field may be missing or null.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LrclibResponse {
    /// Track length in seconds.
    pub duration: Option<f64>,
    #[serde(rename = "plainLyrics")]
    pub plain_lyrics: Option<String>,
    #[serde(rename = "syncedLyrics")]
    pub synced_lyrics: Option<String>,
}

impl LrclibResponse {
    /// Synced lyrics if non-blank, else plain lyrics if non-blank.
    pub fn into_lyrics(self) -> Option<String> {
        let non_blank = |s: &Option<String>| s.as_deref().is_some_and(|t| !t.trim().is_empty());
        if non_blank(&self.synced_lyrics) {
            self.synced_lyrics
        } else if non_blank(&self.plain_lyrics) {
            self.plain_lyrics
        } else {
            None
        }
    }

    /// Whether the remote track length is more than `tolerance_secs` away from
    /// `local_secs`. An absent or zero remote duration never mismatches.
    ///
    /// The remote value is compared with its fractional part intact, so 203.9 s
    /// against a 200 s track is a mismatch even though it truncates to 203.
    pub fn duration_mismatch(&self, local_secs: u64, tolerance_secs: u32) -> bool {
        match self.duration {
            Some(remote) if remote > 0.0 => {
                (remote - local_secs as f64).abs() > f64::from(tolerance_secs)
            }
            _ => false,
        }
    }
}

/// Lookup key for `/get`.
#[derive(Debug, Clone)]
pub struct TrackQuery<'a> {
    pub track_name: &'a str,
    pub artist_name: &'a str,
    pub album_name: &'a str,
    pub duration_secs: u64,
}

/// LRCLIB API client
#[derive(Debug, Clone)]
pub struct LrclibClient {
    client: reqwest::Client,
    base_url: String,
}

impl LrclibClient {
    pub fn new(cfg: &LyricsConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .connect_timeout(cfg.connect_timeout())
            .read_timeout(cfg.read_timeout())
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Exact-match lookup.
    ///
    /// Transport failures, 404 and other non-success statuses all come back as
    /// `Ok(None)`. Only a success response whose body is not the expected JSON
    /// is an error.
    pub async fn get(&self, query: &TrackQuery<'_>) -> anyhow::Result<Option<LrclibResponse>> {
        let url = format!(
            "{}/get?track_name={}&artist_name={}&album_name={}&duration={}",
            self.base_url,
            urlencoding::encode(query.track_name),
            urlencoding::encode(query.artist_name),
            urlencoding::encode(query.album_name),
            query.duration_secs
        );

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("LRCLIB request failed: {e}");
                return Ok(None);
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(track = query.track_name, "LRCLIB: no match");
            return Ok(None);
        }
        if !status.is_success() {
            tracing::warn!("LRCLIB API error: {status}");
            return Ok(None);
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("LRCLIB body read failed: {e}");
                return Ok(None);
            }
        };
        let parsed: LrclibResponse =
            serde_json::from_str(&body).context("decode LRCLIB response")?;
        Ok(Some(parsed))
    }
}
