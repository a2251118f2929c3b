//! Translation: the translator contract, the GTX HTTP translator and the
//! per-line translation cache.

pub mod cache;
pub mod gtx;

pub use cache::TranslationCache;
pub use gtx::GtxClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A word lookup: translated word plus a short gloss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordMeaning {
    pub translation: String,
    pub meaning: String,
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a sentence. `source == None` lets the service auto-detect.
    async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> anyhow::Result<String>;

    async fn word_meaning(&self, word: &str, target: &str) -> anyhow::Result<WordMeaning>;
}

/// Scripts in the order they are checked. Kanji falls inside the Japanese
/// ranges, so Han text only reads as Chinese for the rarer ideographs past
/// U+9FAF.
const SCRIPTS: &[(&[(u32, u32)], &str)] = &[
    (&[(0x0900, 0x097f)], "hi"),
    (&[(0x0a00, 0x0a7f)], "pa"),
    (&[(0x0a80, 0x0aff)], "gu"),
    (&[(0x0980, 0x09ff)], "bn"),
    (&[(0x0b80, 0x0bff)], "ta"),
    (&[(0x0c00, 0x0c7f)], "te"),
    (&[(0x0c80, 0x0cff)], "kn"),
    (&[(0x0d00, 0x0d7f)], "ml"),
    (&[(0x3040, 0x30ff), (0x4e00, 0x9faf)], "ja"),
    (&[(0xac00, 0xd7af)], "ko"),
    (&[(0x4e00, 0x9fff)], "zh"),
];

/// Guess a language code from the scripts present in the first 100
/// characters. The first script in [`SCRIPTS`] with any character in the
/// sample wins; text with none of them is treated as English.
pub fn detect_language(text: &str) -> &'static str {
    let sample: Vec<u32> = text.chars().take(100).map(u32::from).collect();
    SCRIPTS
        .iter()
        .find(|(ranges, _)| {
            sample
                .iter()
                .any(|c| ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(c)))
        })
        .map(|(_, code)| *code)
        .unwrap_or("en")
}
