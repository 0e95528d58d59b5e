//! Lyrics acquisition: a persistent per-song cache in front of LRCLIB, plus
//! an LRC parser for display.
//!
//! Resolution order is cache, then a single strict LRCLIB lookup. The outcome
//! is always one of the three [`LyricsResult`] variants; nothing is raised to
//! the caller.

pub mod cache;
pub mod lrclib;
pub mod parser;
pub mod resolver;

pub use cache::{CachedLyrics, LyricsCache};
pub use lrclib::LrclibClient;
pub use parser::LrcDocument;
pub use resolver::LyricsResolver;

use std::fmt;

/// The song fields the resolver needs.
#[derive(Debug, Clone)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
}

impl Song {
    /// Track length rounded to the nearest second. This is both the `duration`
    /// sent to LRCLIB and the reference for the mismatch check, so a
    /// 199.6 s track counts as 200 s rather than 199 s.
    pub fn duration_secs(&self) -> u64 {
        (self.duration_ms + 500) / 1000
    }
}

/// Where a cached lyrics text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LyricsSource {
    /// Fetched from LRCLIB.
    Remote,
    /// Imported from a file or typed in by the user.
    LocalImport,
}

impl LyricsSource {
    pub fn as_tag(self) -> &'static str {
        match self {
            LyricsSource::Remote => "lrclib",
            LyricsSource::LocalImport => "local",
        }
    }

    /// Entries written before source tags existed have none; they were all local.
    /// Older entries spell the remote tag `LRCLIB`.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some(t) if t.eq_ignore_ascii_case("lrclib") => LyricsSource::Remote,
            _ => LyricsSource::LocalImport,
        }
    }
}

impl fmt::Display for LyricsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LyricsResult {
    Success { lyrics: String, source: LyricsSource },
    NotFound,
    /// Unexpected failure; the UI offers a retry only for this variant.
    Error(String),
}
