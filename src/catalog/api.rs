use super::Catalog;
use super::models::{CollectionDetail, SearchKind, SearchResults, Song};
use super::normalize::{normalize_collection, normalize_song, normalize_songs};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    base_url: String,
    search_limit: u32,
}

/// HTTP client for the song catalog (JioSaavn-compatible JSON API).
#[derive(Debug, Clone)]
pub struct CatalogClient {
    inner: Arc<Inner>,
}

impl CatalogClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://jiosavan-api2.vercel.app/api";

    pub fn new(base_url: &str, search_limit: u32) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("lingotune/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("build reqwest client")?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                search_limit,
            }),
        })
    }

    pub async fn search(&self, kind: SearchKind, query: &str) -> anyhow::Result<SearchResults> {
        let url = format!(
            "{}/search/{}?query={}&limit={}",
            self.inner.base_url,
            kind.endpoint(),
            urlencoding::encode(query),
            self.inner.search_limit
        );
        let v = self.get_json(&url, "search").await?;
        let results = v
            .pointer("/data/results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(match kind {
            SearchKind::Song => SearchResults::Songs(normalize_songs(&results)),
            _ => SearchResults::Collections(
                results
                    .iter()
                    .filter_map(|r| normalize_collection(r, kind).ok())
                    .collect(),
            ),
        })
    }

    pub async fn album(&self, id: &str) -> anyhow::Result<CollectionDetail> {
        let url = format!(
            "{}/albums?id={}&limit=30",
            self.inner.base_url,
            urlencoding::encode(id)
        );
        self.collection(&url, SearchKind::Album, "songs").await
    }

    pub async fn playlist(&self, id: &str) -> anyhow::Result<CollectionDetail> {
        let url = format!(
            "{}/playlists?id={}&limit=40",
            self.inner.base_url,
            urlencoding::encode(id)
        );
        self.collection(&url, SearchKind::Playlist, "songs").await
    }

    pub async fn artist(&self, id: &str) -> anyhow::Result<CollectionDetail> {
        let url = format!("{}/artists?id={}", self.inner.base_url, urlencoding::encode(id));
        self.collection(&url, SearchKind::Artist, "topSongs").await
    }

    async fn collection(
        &self,
        url: &str,
        kind: SearchKind,
        songs_field: &str,
    ) -> anyhow::Result<CollectionDetail> {
        let v = self.get_json(url, kind.endpoint()).await?;
        let data = v.get("data").context("catalog response has no data")?;
        let summary = normalize_collection(data, kind)?;
        let songs = data
            .get(songs_field)
            .and_then(Value::as_array)
            .map(|list| normalize_songs(list))
            .unwrap_or_default();
        Ok(CollectionDetail { summary, songs })
    }

    async fn get_json(&self, url: &str, what: &str) -> anyhow::Result<Value> {
        tracing::debug!(url, "catalog request");
        let resp = self
            .inner
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("send {what} request"))?;
        let status = resp.status();
        let v: Value = resp
            .json()
            .await
            .with_context(|| format!("parse {what} json"))?;
        if !status.is_success() {
            let message = v
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no message");
            anyhow::bail!("catalog {what} error: {status} ({message})");
        }
        Ok(v)
    }
}

/// Detail endpoints wrap the record either directly or in a one-element array.
fn unwrap_record(data: &Value) -> Option<&Value> {
    match data {
        Value::Array(list) => list.first(),
        Value::Null => None,
        other => Some(other),
    }
}

/// Embedded lyrics are either the `data` string itself or `data.lyrics`.
fn extract_embedded_lyrics(v: &Value) -> Option<String> {
    let data = v.get("data")?;
    let text = match data {
        Value::String(s) => s.as_str(),
        other => other.get("lyrics")?.as_str()?,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn song(&self, id: &str) -> anyhow::Result<Song> {
        let url = format!("{}/songs/{}", self.inner.base_url, urlencoding::encode(id));
        let v = self.get_json(&url, "song").await?;
        let record = v
            .get("data")
            .and_then(unwrap_record)
            .with_context(|| format!("song {id} not found"))?;
        normalize_song(record)
    }

    async fn search_songs(&self, query: &str) -> anyhow::Result<Vec<Song>> {
        match self.search(SearchKind::Song, query).await? {
            SearchResults::Songs(songs) => Ok(songs),
            SearchResults::Collections(_) => Ok(Vec::new()),
        }
    }

    async fn recommendations(&self, song_id: &str) -> anyhow::Result<Vec<Song>> {
        let url = format!(
            "{}/songs/{}/suggestions?limit=30",
            self.inner.base_url,
            urlencoding::encode(song_id)
        );
        let v = self.get_json(&url, "suggestions").await?;
        let list = v
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(normalize_songs(&list))
    }

    async fn embedded_lyrics(&self, song_id: &str) -> anyhow::Result<Option<String>> {
        let url = format!(
            "{}/songs/{}/lyrics",
            self.inner.base_url,
            urlencoding::encode(song_id)
        );
        let v = self.get_json(&url, "lyrics").await?;
        Ok(extract_embedded_lyrics(&v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_record_handles_array_and_object() {
        let arr = json!([{"id": "1"}, {"id": "2"}]);
        assert_eq!(unwrap_record(&arr).unwrap()["id"], "1");
        let obj = json!({"id": "3"});
        assert_eq!(unwrap_record(&obj).unwrap()["id"], "3");
        assert!(unwrap_record(&json!([])).is_none());
        assert!(unwrap_record(&Value::Null).is_none());
    }

    #[test]
    fn test_extract_embedded_lyrics() {
        let v = json!({"data": {"lyrics": "line one<br>line two", "copyright": "x"}});
        assert_eq!(
            extract_embedded_lyrics(&v).as_deref(),
            Some("line one<br>line two")
        );
        assert_eq!(
            extract_embedded_lyrics(&json!({"data": "plain"})).as_deref(),
            Some("plain")
        );
        assert!(extract_embedded_lyrics(&json!({"data": {"lyrics": "  "}})).is_none());
        assert!(extract_embedded_lyrics(&json!({"success": false})).is_none());
    }
}
