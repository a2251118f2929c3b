//! LRCLIB API client
//!
//! LRCLIB is a free lyrics API that provides synchronized (LRC format) lyrics.
//! API Documentation: https://lrclib.net/docs

use super::parser::ParsedLyrics;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

/// One LRCLIB record, as returned by both `/get` and `/search`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CorpusRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub track_name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub instrumental: bool,
    #[serde(default)]
    pub plain_lyrics: Option<String>,
    #[serde(default)]
    pub synced_lyrics: Option<String>,
}

impl CorpusRecord {
    /// Synced lyrics win over plain; a record with neither yields nothing.
    pub fn parse(&self) -> Option<ParsedLyrics> {
        if let Some(synced) = self.synced_lyrics.as_deref()
            && !synced.trim().is_empty()
        {
            let parsed = ParsedLyrics::parse(synced, true);
            if !parsed.lines.is_empty() {
                return Some(parsed);
            }
        }
        if let Some(plain) = self.plain_lyrics.as_deref()
            && !plain.trim().is_empty()
        {
            let parsed = ParsedLyrics::parse(plain, false);
            if !parsed.lines.is_empty() {
                return Some(parsed);
            }
        }
        None
    }
}

/// Lookup endpoints of a lyrics corpus.
#[async_trait]
pub trait LyricsCorpus: Send + Sync {
    /// Exact match on track and artist name. `Ok(None)` means not indexed.
    async fn get_exact(&self, track_name: &str, artist_name: &str)
    -> anyhow::Result<Option<CorpusRecord>>;

    /// Free-text search, ranked by the corpus.
    async fn search(&self, query: &str) -> anyhow::Result<Vec<CorpusRecord>>;
}

/// LRCLIB API client
#[derive(Debug, Clone)]
pub struct LrclibClient {
    client: reqwest::Client,
    base_url: String,
}

impl LrclibClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://lrclib.net/api";
    const USER_AGENT: &'static str =
        concat!("lingotune/", env!("CARGO_PKG_VERSION"), " (https://github.com/lingotune)");

    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent(Self::USER_AGENT)
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .context("build lrclib client")?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LyricsCorpus for LrclibClient {
    async fn get_exact(
        &self,
        track_name: &str,
        artist_name: &str,
    ) -> anyhow::Result<Option<CorpusRecord>> {
        let url = format!(
            "{}/get?track_name={}&artist_name={}",
            self.base_url,
            urlencoding::encode(track_name),
            urlencoding::encode(artist_name)
        );

        let response = self.client.get(&url).send().await.context("send lrclib get")?;

        if response.status().is_success() {
            let record: CorpusRecord = response.json().await.context("parse lrclib get json")?;
            Ok(Some(record))
        } else if response.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(None)
        } else {
            anyhow::bail!("LRCLIB API error: {}", response.status());
        }
    }

    async fn search(&self, query: &str) -> anyhow::Result<Vec<CorpusRecord>> {
        let url = format!("{}/search?q={}", self.base_url, urlencoding::encode(query));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("send lrclib search")?;

        if response.status().is_success() {
            let results: Vec<CorpusRecord> =
                response.json().await.context("parse lrclib search json")?;
            Ok(results)
        } else if response.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(Vec::new())
        } else {
            anyhow::bail!("LRCLIB search error: {}", response.status());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserializes_lrclib_shape() {
        let raw = r#"{
            "id": 3396226,
            "trackName": "I Want to Live",
            "artistName": "Borislav Slavov",
            "albumName": "Baldur's Gate 3",
            "duration": 233,
            "instrumental": false,
            "plainLyrics": "I feel your breath",
            "syncedLyrics": "[00:17.12] I feel your breath"
        }"#;
        let record: CorpusRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.track_name, "I Want to Live");
        assert_eq!(record.duration, Some(233.0));
        let parsed = record.parse().unwrap();
        assert!(parsed.synced);
        assert_eq!(parsed.lines[0].time, 17.12);
    }

    #[test]
    fn test_record_falls_back_to_plain_then_nothing() {
        let plain = CorpusRecord {
            plain_lyrics: Some("one\ntwo".into()),
            synced_lyrics: Some("   ".into()),
            ..Default::default()
        };
        let parsed = plain.parse().unwrap();
        assert!(!parsed.synced);
        assert_eq!(parsed.lines.len(), 2);

        let instrumental = CorpusRecord {
            instrumental: true,
            ..Default::default()
        };
        assert!(instrumental.parse().is_none());
    }
}
