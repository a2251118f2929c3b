use crate::catalog::Song;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default number of songs kept in the play history.
pub const HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

impl RepeatMode {
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RepeatMode::Off => "Repeat: Off",
            RepeatMode::One => "Repeat: One",
            RepeatMode::All => "Repeat: All",
        }
    }
}

/// What advancing the queue should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Restart the current song from zero.
    Replay,
    /// Play the song at this queue index.
    Play(usize),
    /// Nothing left to play.
    Stop,
}

/// Play queue, cursor, shuffle/repeat modes and the bounded play history.
///
/// Song ids are unique within the queue; shuffle only changes which index is
/// selected next, never the stored order.
#[derive(Debug, Clone)]
pub struct QueueState {
    songs: Vec<Song>,
    cursor: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
    history: Vec<Song>,
    history_cap: usize,
}

impl Default for QueueState {
    fn default() -> Self {
        Self::new(HISTORY_CAP)
    }
}

impl QueueState {
    pub fn new(history_cap: usize) -> Self {
        Self {
            songs: Vec::new(),
            cursor: None,
            shuffle: false,
            repeat: RepeatMode::Off,
            history: Vec::new(),
            history_cap,
        }
    }

    /// Seed the history from a persisted list (most recent first).
    pub fn restore_history(&mut self, mut history: Vec<Song>) {
        history.truncate(self.history_cap);
        self.history = history;
    }

    /// Make `song` the only entry and select it.
    pub fn reset_to(&mut self, song: Song) {
        self.songs = vec![song];
        self.cursor = Some(0);
    }

    /// Replace the queue with `songs` (duplicates dropped) and select `start`.
    pub fn replace(&mut self, songs: Vec<Song>, start: usize) {
        self.songs.clear();
        self.extend_unique(songs);
        self.cursor = if self.songs.is_empty() {
            None
        } else {
            Some(start.min(self.songs.len() - 1))
        };
    }

    /// Whether `id` is the single entry of the queue.
    pub fn is_sole(&self, id: &str) -> bool {
        self.songs.len() == 1 && self.songs[0].id == id
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.songs.iter().position(|s| s.id == id)
    }

    /// Append songs whose ids are not queued yet. Returns how many were added.
    pub fn extend_unique(&mut self, songs: Vec<Song>) -> usize {
        let before = self.songs.len();
        for song in songs {
            if self.position(&song.id).is_none() {
                self.songs.push(song);
            }
        }
        self.songs.len() - before
    }

    /// Select the entry at `index`.
    pub fn set_cursor(&mut self, index: usize) -> Option<&Song> {
        let song = self.songs.get(index)?;
        self.cursor = Some(index);
        Some(song)
    }

    pub fn current(&self) -> Option<&Song> {
        self.cursor.and_then(|i| self.songs.get(i))
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        self.shuffle
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.next();
        self.repeat
    }

    /// Decide where `next` goes. After a playback failure repeat-one is
    /// ignored so a broken song is not retried forever.
    pub fn next_step<R: Rng>(&self, rng: &mut R, after_failure: bool) -> Step {
        let Some(current) = self.cursor else {
            return if self.songs.is_empty() {
                Step::Stop
            } else {
                Step::Play(0)
            };
        };

        if self.repeat == RepeatMode::One && !after_failure {
            return Step::Replay;
        }

        let len = self.songs.len();
        if self.shuffle && len > 1 {
            // Uniform over every index except the current one.
            let mut pick = rng.random_range(0..len - 1);
            if pick >= current {
                pick += 1;
            }
            return Step::Play(pick);
        }

        if current + 1 < len {
            Step::Play(current + 1)
        } else if self.repeat == RepeatMode::All && len > 0 {
            Step::Play(0)
        } else {
            Step::Stop
        }
    }

    /// The entry before the current one, if any.
    pub fn prev_index(&self) -> Option<usize> {
        self.cursor?.checked_sub(1)
    }

    /// Record a play: most recent first, one entry per id, capped.
    pub fn push_history(&mut self, song: Song) {
        self.history.retain(|s| s.id != song.id);
        self.history.insert(0, song);
        self.history.truncate(self.history_cap);
    }

    pub fn history(&self) -> &[Song] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn make_song(id: &str) -> Song {
        Song {
            id: id.to_string(),
            title: format!("Track {id}"),
            artist: "Artist".to_string(),
            artist_id: None,
            album: String::new(),
            image: String::new(),
            url: format!("https://media/{id}.mp4"),
            duration: Some(180),
            language: None,
        }
    }

    fn queue_of(ids: &[&str]) -> QueueState {
        let mut q = QueueState::default();
        q.replace(ids.iter().map(|id| make_song(id)).collect(), 0);
        q
    }

    #[test]
    fn test_sequential_next_and_stop() {
        let mut q = queue_of(&["1", "2"]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(q.next_step(&mut rng, false), Step::Play(1));
        q.set_cursor(1);
        assert_eq!(q.next_step(&mut rng, false), Step::Stop);
    }

    #[test]
    fn test_repeat_modes() {
        let mut q = queue_of(&["1", "2"]);
        let mut rng = StdRng::seed_from_u64(1);
        q.set_cursor(1);

        assert_eq!(q.cycle_repeat(), RepeatMode::All);
        assert_eq!(q.next_step(&mut rng, false), Step::Play(0));

        assert_eq!(q.cycle_repeat(), RepeatMode::One);
        assert_eq!(q.next_step(&mut rng, false), Step::Replay);
        // A failed song is skipped even under repeat-one.
        assert_eq!(q.next_step(&mut rng, true), Step::Stop);

        assert_eq!(q.cycle_repeat(), RepeatMode::Off);
        assert_eq!(RepeatMode::One.label(), "Repeat: One");
    }

    #[test]
    fn test_shuffle_never_picks_current() {
        let mut q = queue_of(&["a", "b", "c", "d"]);
        q.set_cursor(2);
        assert!(q.toggle_shuffle());
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [0usize; 4];
        for _ in 0..400 {
            match q.next_step(&mut rng, false) {
                Step::Play(i) => seen[i] += 1,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(seen[2], 0);
        assert!(seen.iter().enumerate().all(|(i, n)| i == 2 || *n > 0));
    }

    #[test]
    fn test_shuffle_single_entry_falls_back_to_sequential() {
        let mut q = queue_of(&["solo"]);
        q.toggle_shuffle();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(q.next_step(&mut rng, false), Step::Stop);
    }

    #[test]
    fn test_extend_unique_and_sole() {
        let mut q = QueueState::default();
        q.reset_to(make_song("1"));
        assert!(q.is_sole("1"));
        assert_eq!(q.extend_unique(vec![make_song("1"), make_song("2"), make_song("2")]), 1);
        assert_eq!(q.len(), 2);
        assert!(!q.is_sole("1"));
        assert_eq!(q.current().unwrap().id, "1");
    }

    #[test]
    fn test_prev_index() {
        let mut q = queue_of(&["1", "2", "3"]);
        assert_eq!(q.prev_index(), None);
        q.set_cursor(2);
        assert_eq!(q.prev_index(), Some(1));
        assert!(q.set_cursor(9).is_none());
        assert_eq!(q.cursor(), Some(2));
    }

    #[test]
    fn test_history_dedup_and_cap() {
        let mut q = QueueState::new(3);
        for id in ["1", "2", "3", "2", "4"] {
            q.push_history(make_song(id));
        }
        let ids: Vec<&str> = q.history().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["4", "2", "3"]);
    }

    #[test]
    fn test_replace_clamps_start() {
        let mut q = QueueState::default();
        q.replace(vec![make_song("1"), make_song("2")], 10);
        assert_eq!(q.cursor(), Some(1));
        q.replace(Vec::new(), 0);
        assert!(q.is_empty());
        assert!(q.current().is_none());
    }
}
