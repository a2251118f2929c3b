use super::actions::Action;
use super::requests::Ticket;
use crate::catalog::Song;
use crate::lyrics::LyricDocument;
use crate::player::PlayerEvent;
use crate::translate::WordMeaning;

#[derive(Debug, Clone)]
pub enum Event {
    Input(Action),
    Player(PlayerEvent),
    Network(NetworkEvent),
    /// Delayed skip scheduled after `song_id` failed to play.
    AutoSkip { song_id: String },
}

#[derive(Debug, Clone)]
pub enum NetworkEvent {
    Error(String),
    SongFetched {
        ticket: Ticket,
        song: Song,
        seek_to: Option<f64>,
    },
    Recommendations { ticket: Ticket, songs: Vec<Song> },
    LyricsResolved { ticket: Ticket, doc: Option<LyricDocument> },
    /// A translation request for `line` settled; the cache holds the result
    /// unless it went stale or failed.
    TranslationSettled { song_id: String, line: usize, language: String },
    WordMeaning { word: String, meaning: WordMeaning, save: bool },
}
