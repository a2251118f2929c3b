//! Google "gtx" translate endpoint client.
//!
//! Response layout: `data[0]` holds translated segments (`[translated,
//! original, ...]`), `data[1]` holds dictionary entries (`[part_of_speech,
//! [terms...], ...]`) for single words.

use super::{Translator, WordMeaning};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

const GLOSS_TERMS: usize = 4;

#[derive(Debug, Clone)]
pub struct GtxClient {
    client: reqwest::Client,
    base_url: String,
}

impl GtxClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://translate.googleapis.com/translate_a/single";

    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .context("build translate client")?,
            base_url: base_url.to_string(),
        })
    }

    async fn request(&self, text: &str, source: Option<&str>, target: &str) -> anyhow::Result<Value> {
        let url = format!(
            "{}?client=gtx&sl={}&tl={}&dt=t&dt=bd&q={}",
            self.base_url,
            urlencoding::encode(source.unwrap_or("auto")),
            urlencoding::encode(target),
            urlencoding::encode(text)
        );
        self.client
            .get(&url)
            .send()
            .await
            .context("send translate request")?
            .error_for_status()
            .context("translate http status")?
            .json()
            .await
            .context("parse translate json")
    }
}

/// Join every translated segment of `data[0]`.
fn sentence_translation(data: &Value) -> Option<String> {
    let segments = data.get(0)?.as_array()?;
    let joined: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(Value::as_str))
        .collect();
    (!joined.is_empty()).then_some(joined)
}

/// "noun: a, b, c, d" lines from the dictionary block.
fn gloss(data: &Value) -> Option<String> {
    let entries = data.get(1)?.as_array()?;
    let lines: Vec<String> = entries
        .iter()
        .filter_map(|entry| {
            let pos = entry.get(0)?.as_str()?;
            let terms: Vec<&str> = entry
                .get(1)?
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .take(GLOSS_TERMS)
                .collect();
            Some(format!("{pos}: {}", terms.join(", ")))
        })
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn word_from_response(word: &str, data: &Value) -> WordMeaning {
    let translation = data
        .pointer("/0/0/0")
        .and_then(Value::as_str)
        .unwrap_or(word)
        .to_string();
    let meaning = gloss(data).unwrap_or_else(|| format!("Translation: {translation}"));
    WordMeaning {
        translation,
        meaning,
    }
}

#[async_trait]
impl Translator for GtxClient {
    async fn translate(
        &self,
        text: &str,
        source: Option<&str>,
        target: &str,
    ) -> anyhow::Result<String> {
        let data = self.request(text, source, target).await?;
        sentence_translation(&data).context("translate response has no segments")
    }

    async fn word_meaning(&self, word: &str, target: &str) -> anyhow::Result<WordMeaning> {
        let data = self.request(word, None, target).await?;
        Ok(word_from_response(word, &data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sentence_segments_are_joined() {
        let data = json!([[["Hello ", "Namaste ", null], ["world", "duniya", null]], null, "hi"]);
        assert_eq!(sentence_translation(&data).as_deref(), Some("Hello world"));
        assert!(sentence_translation(&json!([[]])).is_none());
    }

    #[test]
    fn test_word_gloss() {
        let data = json!([
            [["love", "pyaar", null]],
            [["noun", ["love", "affection", "fondness", "liking", "devotion"]], ["verb", ["love"]]]
        ]);
        let m = word_from_response("pyaar", &data);
        assert_eq!(m.translation, "love");
        assert_eq!(m.meaning, "noun: love, affection, fondness, liking\nverb: love");
    }

    #[test]
    fn test_word_without_dictionary() {
        let data = json!([[["dil", "dil", null]], null]);
        let m = word_from_response("dil", &data);
        assert_eq!(m.meaning, "Translation: dil");
    }
}
