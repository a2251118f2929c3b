use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

pub mod library;

/// Fixed logical keys of the key-value store. Every value is one whole JSON
/// record that is overwritten on each write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKey {
    History,
    LikedSongs,
    Vocabulary,
    LyricFavorites,
    Language,
    LastPlayed,
}

impl StoreKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKey::History => "playedSongs",
            StoreKey::LikedSongs => "likedSongs_db",
            StoreKey::Vocabulary => "vocabulary_db",
            StoreKey::LyricFavorites => "lyric_favorites_db",
            StoreKey::Language => "language",
            StoreKey::LastPlayed => "lastPlayed",
        }
    }
}

pub fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory db")?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#,
            )
            .context("init schema")?;
        Ok(())
    }

    /// Read and decode the record under `key`, `None` when absent.
    pub fn get<T: DeserializeOwned>(&self, key: StoreKey) -> anyhow::Result<Option<T>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key=?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("read {}", key.as_str()))?;

        raw.map(|json| {
            serde_json::from_str(&json).with_context(|| format!("decode {}", key.as_str()))
        })
        .transpose()
    }

    /// Like `get`, but an absent or undecodable record yields the default.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: StoreKey) -> T {
        match self.get(key) {
            Ok(v) => v.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("{e:#}");
                T::default()
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: StoreKey, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("encode {}", key.as_str()))?;
        self.conn
            .execute(
                r#"
INSERT INTO kv(key, value, updated_at)
VALUES(?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value=excluded.value,
  updated_at=excluded.updated_at
"#,
                params![key.as_str(), json, now_unix()],
            )
            .with_context(|| format!("write {}", key.as_str()))?;
        Ok(())
    }

    pub fn remove(&self, key: StoreKey) -> anyhow::Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key=?1", params![key.as_str()])
            .with_context(|| format!("remove {}", key.as_str()))?;
        Ok(())
    }
}
