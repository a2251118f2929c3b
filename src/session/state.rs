use crate::catalog::Song;
use crate::lyrics::{ActiveLineTracker, LyricDocument, LyricLine};
use crate::queue::QueueState;
use crate::translate::WordMeaning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// No current song.
    #[default]
    Idle,
    /// Play requested, media not ready yet.
    Loading,
    Playing,
    Paused,
    /// Natural end of the current song.
    Ended,
    /// The current song failed to load or play.
    Error,
}

impl TransportState {
    pub fn label(self) -> &'static str {
        match self {
            TransportState::Idle => "idle",
            TransportState::Loading => "loading",
            TransportState::Playing => "playing",
            TransportState::Paused => "paused",
            TransportState::Ended => "ended",
            TransportState::Error => "error",
        }
    }

    /// Media is loaded and positionable.
    pub fn is_active(self) -> bool {
        matches!(self, TransportState::Playing | TransportState::Paused)
    }
}

/// Everything the session exposes to its front end.
#[derive(Debug, Default)]
pub struct SessionState {
    pub transport: TransportState,
    pub current: Option<Song>,
    /// Last song that played, kept after stopping and restored at startup.
    pub last_played: Option<Song>,
    pub progress: f64,
    pub duration: f64,
    pub buffering: bool,
    pub queue: QueueState,

    pub lyrics: Option<LyricDocument>,
    pub lyrics_loading: bool,
    pub active_line: ActiveLineTracker,
    pub translation_enabled: bool,
    pub last_word: Option<(String, WordMeaning)>,

    /// Failures since the last song that actually started.
    pub consecutive_failures: usize,
    /// Seek applied once the pending song is ready.
    pub pending_seek: Option<f64>,
    pub should_quit: bool,
}

impl SessionState {
    pub fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.id.as_str())
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active_line.current()
    }

    pub fn active_lyric(&self) -> Option<&LyricLine> {
        let doc = self.lyrics.as_ref()?;
        doc.lines.get(self.active_index()?)
    }

    /// Lyrics resolved for the song that is current right now.
    pub fn lyrics_for_current(&self) -> Option<&LyricDocument> {
        let doc = self.lyrics.as_ref()?;
        let id = self.current_id()?;
        (doc.query.song_id.as_deref() == Some(id)).then_some(doc)
    }
}
