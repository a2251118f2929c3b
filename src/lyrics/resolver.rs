//! Lyrics resolution: an ordered fallback chain over the lyrics corpus, the
//! translator and the catalog's embedded lyrics.
//!
//! Every stage either yields a parsed document or falls through. Errors are
//! logged and never escape `resolve`; exhausting the chain yields `None`.

use super::clean::{clean_artist, clean_title};
use super::lrclib::{CorpusRecord, LyricsCorpus};
use super::parser::ParsedLyrics;
use super::{LyricDocument, LyricsQuery, LyricsSource};
use crate::catalog::Catalog;
use crate::translate::Translator;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// A search candidate qualifies when its duration is strictly within this
    /// many seconds of the known duration.
    pub duration_tolerance_secs: f64,
    /// Language the title is translated into for the assisted search.
    pub assist_language: String,
    /// Resolved documents remembered per song id.
    pub memo_capacity: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            duration_tolerance_secs: 5.0,
            assist_language: "en".to_string(),
            memo_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    RawExact,
    CleanedExact,
    CleanedSearch,
    RawSearch,
    TranslatedSearch,
    CatalogEmbedded,
}

impl Stage {
    fn label(self) -> &'static str {
        match self {
            Stage::RawExact => "raw exact",
            Stage::CleanedExact => "cleaned exact",
            Stage::CleanedSearch => "cleaned search",
            Stage::RawSearch => "raw search",
            Stage::TranslatedSearch => "translated search",
            Stage::CatalogEmbedded => "catalog embedded",
        }
    }
}

/// Pick the first candidate whose duration is within `tolerance` of `known`
/// (an unknown duration compares as zero), else the first candidate.
pub fn select_candidate(
    candidates: &[CorpusRecord],
    known: Option<u32>,
    tolerance: f64,
) -> Option<&CorpusRecord> {
    let known = f64::from(known.unwrap_or(0));
    candidates
        .iter()
        .find(|c| c.duration.is_some_and(|d| (d - known).abs() < tolerance))
        .or_else(|| candidates.first())
}

pub struct LyricsResolver {
    corpus: Arc<dyn LyricsCorpus>,
    catalog: Arc<dyn Catalog>,
    translator: Arc<dyn Translator>,
    settings: ResolverSettings,
    memo: Mutex<LruCache<String, Option<LyricDocument>>>,
}

impl LyricsResolver {
    pub fn new(
        corpus: Arc<dyn LyricsCorpus>,
        catalog: Arc<dyn Catalog>,
        translator: Arc<dyn Translator>,
        settings: ResolverSettings,
    ) -> Self {
        let capacity = NonZeroUsize::new(settings.memo_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            corpus,
            catalog,
            translator,
            settings,
            memo: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Best-effort lyrics for `query`. `None` means no lyrics are available.
    pub async fn resolve(&self, query: &LyricsQuery) -> Option<LyricDocument> {
        if let Some(id) = &query.song_id {
            let hit = self.memo_lock().get(id).cloned();
            if let Some(hit) = hit {
                tracing::debug!(song_id = %id, "lyrics served from memo");
                return hit;
            }
        }

        let doc = self.run_chain(query).await;
        match &doc {
            Some(d) => tracing::info!(
                title = %query.title,
                lines = d.lines.len(),
                synced = d.synced,
                "lyrics resolved"
            ),
            None => tracing::info!(title = %query.title, "no lyrics available"),
        }

        if let Some(id) = &query.song_id {
            self.memo_lock().put(id.clone(), doc.clone());
        }
        doc
    }

    fn memo_lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Option<LyricDocument>>> {
        self.memo.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run_chain(&self, query: &LyricsQuery) -> Option<LyricDocument> {
        let raw_title = query.title.trim();
        let raw_artist = query.artist.trim();

        if !raw_title.is_empty() && !raw_artist.is_empty() {
            if let Some(parsed) = self.corpus_stages(query, raw_title, raw_artist).await {
                return Some(Self::document(parsed, LyricsSource::Corpus, query));
            }
        } else {
            tracing::debug!("title or artist missing, skipping corpus lookups");
        }

        self.embedded(query)
            .await
            .map(|parsed| Self::document(parsed, LyricsSource::Catalog, query))
    }

    async fn corpus_stages(
        &self,
        query: &LyricsQuery,
        raw_title: &str,
        raw_artist: &str,
    ) -> Option<ParsedLyrics> {
        if let Some(parsed) = self.exact(Stage::RawExact, raw_title, raw_artist).await {
            return Some(parsed);
        }

        let title = clean_title(raw_title);
        let artist = clean_artist(raw_artist);
        if let Some(parsed) = self.exact(Stage::CleanedExact, &title, &artist).await {
            return Some(parsed);
        }

        let cleaned_query = format!("{title} {artist}");
        if let Some(parsed) = self
            .search(Stage::CleanedSearch, &cleaned_query, query.duration_secs)
            .await
        {
            return Some(parsed);
        }

        if raw_title != title || raw_artist != artist {
            let raw_query = format!("{raw_title} {raw_artist}");
            if let Some(parsed) = self
                .search(Stage::RawSearch, &raw_query, query.duration_secs)
                .await
            {
                return Some(parsed);
            }
        }

        let translated = match self
            .translator
            .translate(raw_title, None, &self.settings.assist_language)
            .await
        {
            Ok(t) => t.trim().to_string(),
            Err(e) => {
                tracing::warn!(stage = Stage::TranslatedSearch.label(), "title translation failed: {e:#}");
                return None;
            }
        };
        if translated.is_empty() || translated == raw_title {
            tracing::debug!(stage = Stage::TranslatedSearch.label(), "translated title unchanged, skipping");
            return None;
        }
        let assisted_query = format!("{translated} {raw_artist}");
        self.search(Stage::TranslatedSearch, &assisted_query, query.duration_secs)
            .await
    }

    async fn exact(&self, stage: Stage, title: &str, artist: &str) -> Option<ParsedLyrics> {
        tracing::debug!(stage = stage.label(), title, artist, "lyrics lookup");
        match self.corpus.get_exact(title, artist).await {
            Ok(Some(record)) => Self::accept(stage, &record),
            Ok(None) => {
                tracing::debug!(stage = stage.label(), "no exact match");
                None
            }
            Err(e) => {
                tracing::warn!(stage = stage.label(), "lyrics lookup failed: {e:#}");
                None
            }
        }
    }

    async fn search(&self, stage: Stage, q: &str, known: Option<u32>) -> Option<ParsedLyrics> {
        tracing::debug!(stage = stage.label(), query = q, "lyrics search");
        let candidates = match self.corpus.search(q).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(stage = stage.label(), "lyrics search failed: {e:#}");
                return None;
            }
        };
        let record = select_candidate(&candidates, known, self.settings.duration_tolerance_secs)?;
        Self::accept(stage, record)
    }

    fn accept(stage: Stage, record: &CorpusRecord) -> Option<ParsedLyrics> {
        let parsed = record.parse();
        match &parsed {
            Some(_) => tracing::debug!(
                stage = stage.label(),
                id = record.id,
                track = %record.track_name,
                artist = %record.artist_name,
                album = record.album_name.as_deref().unwrap_or(""),
                "corpus match"
            ),
            None => tracing::debug!(
                stage = stage.label(),
                id = record.id,
                instrumental = record.instrumental,
                "match carries no lyrics"
            ),
        }
        parsed
    }

    async fn embedded(&self, query: &LyricsQuery) -> Option<ParsedLyrics> {
        let stage = Stage::CatalogEmbedded;
        let song_id = query.song_id.as_deref()?;
        tracing::debug!(stage = stage.label(), song_id, "lyrics lookup");
        match self.catalog.embedded_lyrics(song_id).await {
            Ok(Some(markup)) => {
                let parsed = ParsedLyrics::parse_markup(&markup);
                (!parsed.lines.is_empty()).then_some(parsed)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(stage = stage.label(), "embedded lyrics failed: {e:#}");
                None
            }
        }
    }

    fn document(parsed: ParsedLyrics, source: LyricsSource, query: &LyricsQuery) -> LyricDocument {
        LyricDocument {
            lines: parsed.lines,
            synced: parsed.synced,
            source,
            query: query.clone(),
        }
    }
}
