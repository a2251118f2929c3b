use crate::catalog::Song;

#[derive(Debug, Clone)]
pub enum Action {
    Quit,

    // Starting playback
    Play(Song),
    /// Play a raw catalog record, normalized first.
    PlayRecord(serde_json::Value),
    /// Fetch a song by id, then play it.
    PlayId(String),
    /// Replace the queue with a whole collection.
    PlayAll { songs: Vec<Song>, start: usize },
    PlayIndex(usize),
    /// Replay a saved lyric line: fetch its song and seek to the line.
    PlayFavorite(usize),

    // Transport
    Pause,
    Resume,
    TogglePause,
    Seek(f64),
    SeekRelative(f64),
    SeekToLine(usize),
    Next,
    Previous,
    ToggleShuffle,
    ToggleRepeat,

    // Lyrics and translation
    SetTargetLanguage(String),
    ToggleTranslation,
    LookupWord(String),
    SaveWord(String),

    // Library
    ToggleLike,
    FavoriteActiveLine,

    // Display
    ShowQueue,
    ShowLyrics,
    ShowStatus,
}
