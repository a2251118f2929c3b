//! Song normalizer
//!
//! Catalog records arrive in several shapes: search rows carry a flattened
//! `primaryArtists` string, detail rows a nested `artists.primary` list,
//! images and media come as quality-ascending variant lists or plain strings,
//! durations as numbers or numeric strings. Everything is decoded into
//! catch-all variants first and then flattened with explicit defaults, so
//! only a record without an id is ever rejected.

use super::models::{Collection, SearchKind, Song};
use serde::Deserialize;
use serde_json::Value;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Catalog language names to language codes.
const LANGUAGES: &[(&str, &str)] = &[
    ("hindi", "hi"),
    ("english", "en"),
    ("punjabi", "pa"),
    ("tamil", "ta"),
    ("telugu", "te"),
    ("kannada", "kn"),
    ("malayalam", "ml"),
    ("marathi", "mr"),
    ("gujarati", "gu"),
    ("bengali", "bn"),
    ("bhojpuri", "bho"),
    ("urdu", "ur"),
    ("odia", "or"),
    ("assamese", "as"),
    ("rajasthani", "raj"),
    ("haryanvi", "bgc"),
    ("sanskrit", "sa"),
    ("japanese", "ja"),
    ("korean", "ko"),
    ("chinese", "zh"),
    ("spanish", "es"),
    ("french", "fr"),
    ("german", "de"),
];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    #[allow(dead_code)]
    Other(Value),
}

impl Scalar {
    fn text(&self) -> Option<String> {
        match self {
            Scalar::Text(s) => Some(s.clone()),
            Scalar::Number(n) => Some(n.to_string()),
            Scalar::Other(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Variant {
    #[serde(default)]
    link: Option<Scalar>,
    #[serde(default)]
    url: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Variants {
    Urls(Vec<String>),
    List(Vec<Variant>),
    Single(String),
    #[allow(dead_code)]
    Other(Value),
}

impl Variants {
    /// Variant lists are ordered by ascending quality; the last one wins.
    fn best(&self) -> Option<String> {
        match self {
            Variants::Urls(urls) => urls.last().cloned(),
            Variants::List(list) => {
                let last = list.last()?;
                last.link
                    .as_ref()
                    .and_then(Scalar::text)
                    .or_else(|| last.url.as_ref().and_then(Scalar::text))
            }
            Variants::Single(s) => Some(s.clone()),
            Variants::Other(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    #[serde(default)]
    id: Option<Scalar>,
    #[serde(default)]
    name: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Artists {
    Nested { primary: Vec<ArtistRef> },
    List(Vec<ArtistRef>),
    #[allow(dead_code)]
    Other(Value),
}

impl Artists {
    fn primary(&self) -> Option<&ArtistRef> {
        match self {
            Artists::Nested { primary } => primary.first(),
            Artists::List(list) => list.first(),
            Artists::Other(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Album {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<Scalar>,
    },
    #[allow(dead_code)]
    Other(Value),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    id: Option<Scalar>,
    name: Option<Scalar>,
    title: Option<Scalar>,
    artists: Option<Artists>,
    primary_artists: Option<Scalar>,
    primary_artists_id: Option<Scalar>,
    artist: Option<Scalar>,
    artist_id: Option<Scalar>,
    subtitle: Option<Scalar>,
    description: Option<Scalar>,
    #[serde(rename = "header_desc")]
    header_desc: Option<Scalar>,
    album: Option<Album>,
    image: Option<Variants>,
    download_url: Option<Variants>,
    url: Option<Scalar>,
    duration: Option<Scalar>,
    language: Option<Scalar>,
}

fn decode(record: &Value) -> anyhow::Result<RawRecord> {
    if !record.is_object() {
        anyhow::bail!("catalog record is not an object");
    }
    Ok(serde_json::from_value(record.clone())?)
}

fn text_of(field: &Option<Scalar>) -> Option<String> {
    field
        .as_ref()
        .and_then(Scalar::text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First name of a comma/ampersand-joined credit string.
pub fn first_name(joined: &str) -> &str {
    joined.split([',', '&']).next().unwrap_or("").trim()
}

fn first_non_empty_name(candidates: impl IntoIterator<Item = Option<String>>) -> String {
    candidates
        .into_iter()
        .flatten()
        .map(|s| first_name(&s).to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn parse_duration(field: &Option<Scalar>) -> Option<u32> {
    match field.as_ref()? {
        Scalar::Number(n) => n
            .as_u64()
            .map(|v| v.min(u32::MAX as u64) as u32)
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u32)),
        Scalar::Text(s) => {
            let s = s.trim();
            s.parse::<u32>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u32)
            })
        }
        Scalar::Other(_) => None,
    }
}

/// Map a catalog language name (or an existing code) to a language code.
pub fn language_code(name: &str) -> &'static str {
    let lower = name.trim().to_lowercase();
    LANGUAGES
        .iter()
        .find(|(n, code)| *n == lower || *code == lower)
        .map(|(_, code)| *code)
        .unwrap_or(DEFAULT_LANGUAGE)
}

/// Normalize one catalog record into a canonical [`Song`].
pub fn normalize_song(record: &Value) -> anyhow::Result<Song> {
    let raw = decode(record)?;
    let id = text_of(&raw.id).ok_or_else(|| anyhow::anyhow!("catalog record has no id"))?;

    let title = text_of(&raw.name)
        .or_else(|| text_of(&raw.title))
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let nested = raw.artists.as_ref().and_then(Artists::primary);
    // A nested credit already names one artist; only joined strings are split.
    let artist = nested.and_then(|a| text_of(&a.name)).unwrap_or_else(|| {
        first_non_empty_name([
            text_of(&raw.primary_artists),
            text_of(&raw.artist),
            text_of(&raw.subtitle),
            text_of(&raw.description),
        ])
    });

    let artist_id = nested
        .and_then(|a| text_of(&a.id))
        .or_else(|| text_of(&raw.primary_artists_id).map(|ids| first_name(&ids).to_string()))
        .or_else(|| text_of(&raw.artist_id))
        .filter(|s| !s.is_empty());

    let album = match &raw.album {
        Some(Album::Name(s)) => s.trim().to_string(),
        Some(Album::Object { name }) => text_of(name).unwrap_or_default(),
        _ => String::new(),
    };

    let image = raw.image.as_ref().and_then(Variants::best).unwrap_or_default();

    let url = raw
        .download_url
        .as_ref()
        .and_then(Variants::best)
        .or_else(|| text_of(&raw.url))
        .unwrap_or_default();

    let language = text_of(&raw.language).map(|l| language_code(&l).to_string());

    Ok(Song {
        id,
        title,
        artist,
        artist_id,
        album,
        image,
        url,
        duration: parse_duration(&raw.duration),
        language,
    })
}

/// Normalize a list of records, dropping (and logging) the ones without an id.
pub fn normalize_songs(records: &[Value]) -> Vec<Song> {
    records
        .iter()
        .filter_map(|r| match normalize_song(r) {
            Ok(song) => Some(song),
            Err(e) => {
                tracing::debug!("skipping catalog record: {e:#}");
                None
            }
        })
        .collect()
}

/// Normalize an album/artist/playlist row into a display summary.
pub fn normalize_collection(record: &Value, kind: SearchKind) -> anyhow::Result<Collection> {
    let raw = decode(record)?;
    let id = text_of(&raw.id).ok_or_else(|| anyhow::anyhow!("catalog record has no id"))?;

    let title = text_of(&raw.name)
        .or_else(|| text_of(&raw.title))
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let subtitle = text_of(&raw.subtitle)
        .or_else(|| text_of(&raw.description))
        .or_else(|| text_of(&raw.header_desc))
        .or_else(|| text_of(&raw.artist))
        .or_else(|| text_of(&raw.primary_artists))
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let image = raw.image.as_ref().and_then(Variants::best).unwrap_or_default();

    Ok(Collection {
        id,
        kind,
        title,
        subtitle,
        image,
    })
}
