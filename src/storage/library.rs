//! User library records kept in the key-value store: history, last played,
//! liked songs, saved vocabulary, favorite lyric lines and the preferred
//! translation language.

use super::{Storage, StoreKey, now_unix};
use crate::catalog::Song;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
    pub word: String,
    pub translation: String,
    pub meaning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_id: Option<String>,
    pub added_at: i64,
}

impl VocabularyEntry {
    pub fn new(word: &str, translation: &str, meaning: &str, song_id: Option<String>) -> Self {
        Self {
            word: word.to_string(),
            translation: translation.to_string(),
            meaning: meaning.to_string(),
            song_id,
            added_at: now_unix(),
        }
    }

    fn same_word(&self, word: &str) -> bool {
        self.word.to_lowercase() == word.to_lowercase()
    }
}

/// A saved lyric line with the song it came from, so it can be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteLine {
    pub song: Song,
    pub time: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    pub added_at: i64,
}

impl FavoriteLine {
    pub fn new(song: Song, time: f64, text: &str, translation: Option<String>) -> Self {
        Self {
            song,
            time,
            text: text.to_string(),
            translation,
            added_at: now_unix(),
        }
    }

    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.song.id, self.time, self.text)
    }
}

impl Storage {
    pub fn history(&self) -> Vec<Song> {
        self.get_or_default(StoreKey::History)
    }

    pub fn save_history(&self, history: &[Song]) -> anyhow::Result<()> {
        self.set(StoreKey::History, history)
    }

    pub fn clear_history(&self) -> anyhow::Result<()> {
        self.remove(StoreKey::History)
    }

    pub fn last_played(&self) -> Option<Song> {
        self.get_or_default(StoreKey::LastPlayed)
    }

    pub fn save_last_played(&self, song: &Song) -> anyhow::Result<()> {
        self.set(StoreKey::LastPlayed, song)
    }

    pub fn language(&self) -> Option<String> {
        self.get_or_default(StoreKey::Language)
    }

    pub fn save_language(&self, code: &str) -> anyhow::Result<()> {
        self.set(StoreKey::Language, code)
    }

    /// Most recently liked first.
    pub fn liked_songs(&self) -> Vec<Song> {
        self.get_or_default(StoreKey::LikedSongs)
    }

    pub fn is_liked(&self, song_id: &str) -> bool {
        self.liked_songs().iter().any(|s| s.id == song_id)
    }

    /// Like or unlike `song`. Returns whether it is liked afterwards.
    pub fn toggle_like(&self, song: &Song) -> anyhow::Result<bool> {
        let mut liked = self.liked_songs();
        let before = liked.len();
        liked.retain(|s| s.id != song.id);
        let now_liked = liked.len() == before;
        if now_liked {
            liked.insert(0, song.clone());
        }
        self.set(StoreKey::LikedSongs, &liked)?;
        Ok(now_liked)
    }

    pub fn vocabulary(&self) -> Vec<VocabularyEntry> {
        self.get_or_default(StoreKey::Vocabulary)
    }

    pub fn is_saved_word(&self, word: &str) -> bool {
        self.vocabulary().iter().any(|v| v.same_word(word))
    }

    /// Save `entry`, or remove it when the word (case-insensitively) is
    /// already saved. Returns whether the word is saved afterwards.
    pub fn toggle_vocabulary(&self, entry: VocabularyEntry) -> anyhow::Result<bool> {
        let mut vocab = self.vocabulary();
        let before = vocab.len();
        vocab.retain(|v| !v.same_word(&entry.word));
        let now_saved = vocab.len() == before;
        if now_saved {
            vocab.push(entry);
        }
        self.set(StoreKey::Vocabulary, &vocab)?;
        Ok(now_saved)
    }

    pub fn favorite_lines(&self) -> Vec<FavoriteLine> {
        self.get_or_default(StoreKey::LyricFavorites)
    }

    /// Returns whether the line is a favorite afterwards.
    pub fn toggle_favorite_line(&self, line: FavoriteLine) -> anyhow::Result<bool> {
        let key = line.key();
        let mut favorites = self.favorite_lines();
        let before = favorites.len();
        favorites.retain(|f| f.key() != key);
        let now_saved = favorites.len() == before;
        if now_saved {
            favorites.push(line);
        }
        self.set(StoreKey::LyricFavorites, &favorites)?;
        Ok(now_saved)
    }
}
