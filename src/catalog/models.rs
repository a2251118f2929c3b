use serde::{Deserialize, Serialize};

/// Canonical, schema-stable track used everywhere outside the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub title: String,
    /// First credited artist, always a flat string.
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_id: Option<String>,
    #[serde(default)]
    pub album: String,
    /// Highest-quality cover art variant, or empty.
    pub image: String,
    /// Highest-quality playable media variant, or empty.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Song {
    pub fn display_line(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.artist)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Song,
    Album,
    Artist,
    Playlist,
}

impl SearchKind {
    /// Path segment of the catalog search endpoint.
    pub fn endpoint(self) -> &'static str {
        match self {
            SearchKind::Song => "songs",
            SearchKind::Album => "albums",
            SearchKind::Artist => "artists",
            SearchKind::Playlist => "playlists",
        }
    }
}

/// Summary row for album, artist and playlist results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub kind: SearchKind,
    pub title: String,
    pub subtitle: String,
    pub image: String,
}

/// A collection together with its playable songs (album tracks, playlist
/// entries, an artist's top songs).
#[derive(Debug, Clone)]
pub struct CollectionDetail {
    pub summary: Collection,
    pub songs: Vec<Song>,
}

#[derive(Debug, Clone)]
pub enum SearchResults {
    Songs(Vec<Song>),
    Collections(Vec<Collection>),
}
