//! Metadata cleanup applied before retrying corpus lookups.
//!
//! Catalog titles often carry decorations the corpus does not index:
//! accents, "(From ...)" suffixes, "- 2009 Remaster", "feat." credits.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*\)").unwrap());
static BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*\]").unwrap());
static DASH_REMASTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)-.*remaster.*").unwrap());
static REMASTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)remaster.*").unwrap());
static FEAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)feat\..*").unwrap());
static FT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ft\..*").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Combining diacritical marks block (U+0300..=U+036F).
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Strip accents while keeping composed scripts (Hangul etc.) intact.
pub fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

/// Normalize a title or artist string for lookup.
pub fn clean(s: &str) -> String {
    let s = strip_diacritics(s);
    let s = PARENS.replace_all(&s, "");
    let s = BRACKETS.replace_all(&s, "");
    let s = DASH_REMASTER.replace_all(&s, "");
    let s = REMASTER.replace_all(&s, "");
    let s = FEAT.replace_all(&s, "");
    let s = FT.replace_all(&s, "");
    SPACES.replace_all(&s, " ").trim().to_string()
}

/// Cleaned title with a trailing period removed.
pub fn clean_title(title: &str) -> String {
    let cleaned = clean(title);
    match cleaned.strip_suffix('.') {
        Some(stripped) => stripped.trim_end().to_string(),
        None => cleaned,
    }
}

/// First credited artist, cleaned.
pub fn clean_artist(artist: &str) -> String {
    let first = artist.split(',').next().unwrap_or("");
    let first = first.split('&').next().unwrap_or("");
    clean(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_accents_but_keeps_hangul() {
        assert_eq!(strip_diacritics("Beyoncé"), "Beyonce");
        assert_eq!(strip_diacritics("Señorita"), "Senorita");
        assert_eq!(strip_diacritics("사랑해"), "사랑해");
        assert_eq!(strip_diacritics("दिल"), "दिल");
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Kesariya (From \"Brahmastra\")"), "Kesariya");
        assert_eq!(clean_title("Here Comes the Sun - 2009 Remaster"), "Here Comes the Sun");
        assert_eq!(clean_title("Song [Live]  Version"), "Song Version");
        assert_eq!(clean_title("Closer feat. Halsey"), "Closer");
        assert_eq!(clean_title("Hello ft. World"), "Hello");
        assert_eq!(clean_title("Mr. Brightside."), "Mr. Brightside");
        assert_eq!(clean_title("   spaced    out  "), "spaced out");
    }

    #[test]
    fn test_clean_artist_takes_first() {
        assert_eq!(clean_artist("Pritam, Arijit Singh"), "Pritam");
        assert_eq!(clean_artist("Simon & Garfunkel"), "Simon");
        assert_eq!(clean_artist("Zoé"), "Zoe");
        assert_eq!(clean_artist(""), "");
    }
}
