//! Per-line translation cache.
//!
//! Entries are keyed by `(line index, target language)` and scoped to one
//! lyric document. Concurrent requests for the same key share a single
//! in-flight future. Every request captures the cache generation it was
//! issued under; loading a new document or switching language bumps the
//! generation, so late responses are handed back to their caller but never
//! written into the cache.

use super::Translator;
use crate::lyrics::{LyricDocument, LyricLine};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Lines requested up front for plain lyrics, which have no active line.
pub const PLAIN_PREFETCH_WINDOW: usize = 20;

type Key = (usize, String);
type Pending = Shared<BoxFuture<'static, Option<String>>>;

#[derive(Default)]
struct Inner {
    generation: u64,
    lines: Vec<String>,
    source_lang: Option<String>,
    target: String,
    entries: HashMap<Key, String>,
    in_flight: HashMap<Key, Pending>,
}

impl Inner {
    fn invalidate(&mut self) {
        self.generation += 1;
        self.entries.clear();
        self.in_flight.clear();
    }
}

#[derive(Clone)]
pub struct TranslationCache {
    inner: Arc<Mutex<Inner>>,
    translator: Arc<dyn Translator>,
}

impl TranslationCache {
    pub fn new(translator: Arc<dyn Translator>, target: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                target: target.to_string(),
                ..Default::default()
            })),
            translator,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Scope the cache to a new document (or to none).
    pub fn load_document(&self, doc: Option<&LyricDocument>, source_lang: Option<String>) {
        let mut inner = self.lock();
        inner.invalidate();
        inner.lines = doc.map(LyricDocument::texts).unwrap_or_default();
        inner.source_lang = source_lang;
    }

    /// Returns true when the language actually changed (and the cache was cleared).
    pub fn set_target_language(&self, lang: &str) -> bool {
        let mut inner = self.lock();
        if inner.target == lang {
            return false;
        }
        tracing::info!(from = %inner.target, to = lang, "translation language changed");
        inner.invalidate();
        inner.target = lang.to_string();
        true
    }

    pub fn target_language(&self) -> String {
        self.lock().target.clone()
    }

    pub fn cached(&self, line: usize, lang: &str) -> Option<String> {
        self.lock().entries.get(&(line, lang.to_string())).cloned()
    }

    pub fn is_in_flight(&self, line: usize, lang: &str) -> bool {
        self.lock().in_flight.contains_key(&(line, lang.to_string()))
    }

    /// Translation of `line`, fetched at most once per key. A failed request
    /// degrades to the original text and leaves the key retryable.
    pub async fn get(&self, line: usize, lang: &str) -> String {
        let key = (line, lang.to_string());
        let (pending, generation, original) = {
            let mut inner = self.lock();
            let Some(original) = inner.lines.get(line).cloned() else {
                tracing::debug!(line, "translation requested for a line outside the document");
                return String::new();
            };
            if let Some(hit) = inner.entries.get(&key) {
                return hit.clone();
            }
            let generation = inner.generation;
            let pending = match inner.in_flight.get(&key) {
                Some(p) => p.clone(),
                None => {
                    let p = self.request(original.clone(), inner.source_lang.clone(), lang);
                    inner.in_flight.insert(key.clone(), p.clone());
                    p
                }
            };
            (pending, generation, original)
        };

        let result = pending.clone().await;

        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!(line, lang, "discarding translation issued for a previous document or language");
            return result.unwrap_or(original);
        }
        // Another waiter may already have cleared this request and a retry
        // taken its place.
        if inner
            .in_flight
            .get(&key)
            .is_some_and(|p| p.ptr_eq(&pending))
        {
            inner.in_flight.remove(&key);
        }
        match result {
            Some(text) => {
                inner.entries.insert(key, text.clone());
                text
            }
            None => original,
        }
    }

    fn request(&self, text: String, source: Option<String>, target: &str) -> Pending {
        let translator = Arc::clone(&self.translator);
        let target = target.to_string();
        async move {
            match translator.translate(&text, source.as_deref(), &target).await {
                Ok(translated) => Some(translated),
                Err(e) => {
                    tracing::warn!("translation failed: {e:#}");
                    None
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Copy of `lines` with cached translations filled in.
    pub fn annotate(&self, lines: &[LyricLine], lang: &str) -> Vec<LyricLine> {
        let inner = self.lock();
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| LyricLine {
                translation: inner.entries.get(&(i, lang.to_string())).cloned(),
                ..line.clone()
            })
            .collect()
    }
}

/// Lines worth translating ahead of display: the active line and the one
/// after it for synced lyrics, a fixed leading window for plain lyrics.
pub fn prefetch_targets(doc: &LyricDocument, active: Option<usize>, window: usize) -> Vec<usize> {
    let len = doc.lines.len();
    if !doc.synced {
        return (0..window.min(len)).collect();
    }
    let first = active.unwrap_or(0);
    let last = match active {
        Some(i) => i + 1,
        None => 0,
    };
    (first..=last).filter(|&i| i < len).collect()
}
