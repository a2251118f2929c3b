//! Lyrics: document model, LRC parsing, LRCLIB lookups and playback sync
//!
//! This module provides:
//! - LRCLIB API client (exact lookup and free-text search)
//! - Title/artist cleaning used to widen corpus matches
//! - LRC format parser for synchronized lyrics
//! - The resolver fallback chain and the active-line tracker

pub mod clean;
pub mod lrclib;
pub mod parser;
pub mod resolver;
pub mod tracker;

pub use lrclib::LrclibClient;
pub use resolver::LyricsResolver;
pub use tracker::ActiveLineTracker;

use crate::catalog::Song;
use serde::{Deserialize, Serialize};

/// A single lyric line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    /// Offset in seconds from the start of the track (0 for plain lyrics).
    pub time: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl LyricLine {
    pub fn new(time: f64, text: impl Into<String>) -> Self {
        Self {
            time,
            text: text.into(),
            translation: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LyricsSource {
    /// External lyrics corpus (LRCLIB).
    Corpus,
    /// Lyrics embedded in the catalog record.
    Catalog,
}

/// The metadata a lyrics lookup is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsQuery {
    pub song_id: Option<String>,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: Option<u32>,
}

impl LyricsQuery {
    pub fn for_song(song: &Song) -> Self {
        Self {
            song_id: Some(song.id.clone()),
            title: song.title.clone(),
            artist: song.artist.clone(),
            album: (!song.album.is_empty()).then(|| song.album.clone()),
            duration_secs: song.duration,
        }
    }
}

/// An immutable, resolved lyric document.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricDocument {
    pub lines: Vec<LyricLine>,
    /// Whether line offsets are meaningful.
    pub synced: bool,
    pub source: LyricsSource,
    pub query: LyricsQuery,
}

impl LyricDocument {
    pub fn texts(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.text.clone()).collect()
    }
}
