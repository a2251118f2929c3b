//! Song catalog: canonical models, the normalizer and the HTTP client.

pub mod api;
pub mod models;
pub mod normalize;

pub use api::CatalogClient;
pub use models::Song;

use async_trait::async_trait;

/// The parts of the catalog the playback session and lyrics resolver need.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn song(&self, id: &str) -> anyhow::Result<Song>;

    async fn search_songs(&self, query: &str) -> anyhow::Result<Vec<Song>>;

    async fn recommendations(&self, song_id: &str) -> anyhow::Result<Vec<Song>>;

    /// Lyrics embedded in the catalog record itself (untimed, may contain
    /// `<br>` markup).
    async fn embedded_lyrics(&self, song_id: &str) -> anyhow::Result<Option<String>>;
}
