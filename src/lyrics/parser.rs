//! LRC format parser
//!
//! Parses synchronized lyrics in LRC format:
//! [mm:ss.xx] Lyrics line here
//!
//! Example:
//! [00:12.34] Hello world
//! [00:15.00] Another line

use super::LyricLine;
use once_cell::sync::Lazy;
use regex::Regex;

static MARKUP_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

/// Parsed lyrics lines plus whether they carry timing.
#[derive(Debug, Clone)]
pub struct ParsedLyrics {
    pub lines: Vec<LyricLine>,
    pub synced: bool,
}

impl ParsedLyrics {
    /// Parse LRC formatted lyrics. With `synced == false` every non-tag line
    /// becomes an untimed line at offset zero.
    pub fn parse(content: &str, synced: bool) -> Self {
        let mut lines = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // Skip metadata tags like [ti:Title]
            if Self::parse_metadata(line).is_some() {
                continue;
            }

            if synced && let Some(parsed) = Self::parse_timed_line(line) {
                lines.extend(parsed);
                continue;
            }

            if !synced {
                let text = Self::strip_timestamps(line);
                if !text.is_empty() {
                    lines.push(LyricLine::new(0.0, text));
                }
            }
        }

        // Stable, so lines sharing a timestamp keep source order.
        lines.sort_by(|a, b| a.time.total_cmp(&b.time));

        Self { lines, synced }
    }

    /// Catalog-embedded lyrics: HTML line breaks, no timing.
    pub fn parse_markup(content: &str) -> Self {
        let text = MARKUP_BREAK.replace_all(content, "\n");
        Self::parse(&text, false)
    }

    /// Parse metadata tag like [ti:Title]
    fn parse_metadata(line: &str) -> Option<(String, String)> {
        if !line.starts_with('[') || !line.contains(':') {
            return None;
        }

        let end = line.find(']')?;
        let tag_content = &line[1..end];

        let colon_pos = tag_content.find(':')?;
        let tag = &tag_content[..colon_pos];

        // Metadata tags are 2-6 ascii letters (ti, ar, al, by, offset, length)
        if (2..=6).contains(&tag.len()) && tag.chars().all(|c| c.is_ascii_alphabetic()) {
            let value = tag_content[colon_pos + 1..].trim().to_string();
            return Some((tag.to_string(), value));
        }

        None
    }

    /// Parse a timed line like [00:12.34]Lyrics or [00:12.34][00:15.00]Lyrics
    fn parse_timed_line(line: &str) -> Option<Vec<LyricLine>> {
        let (timestamps, text) = Self::split_timestamps(line);
        if timestamps.is_empty() || text.is_empty() {
            return None;
        }

        let lines = timestamps
            .into_iter()
            .map(|ts| LyricLine::new(ts, text))
            .collect();

        Some(lines)
    }

    fn strip_timestamps(line: &str) -> &str {
        Self::split_timestamps(line).1
    }

    fn split_timestamps(line: &str) -> (Vec<f64>, &str) {
        let mut timestamps = Vec::new();
        let mut pos = 0;

        while line[pos..].starts_with('[') {
            let Some(end) = line[pos..].find(']') else {
                break;
            };
            match Self::parse_timestamp(&line[pos + 1..pos + end]) {
                Some(secs) => {
                    timestamps.push(secs);
                    pos += end + 1;
                }
                None => break,
            }
        }

        (timestamps, line[pos..].trim())
    }

    /// Parse timestamp string like "00:12.34" or "00:12:34" to seconds
    fn parse_timestamp(s: &str) -> Option<f64> {
        let parts: Vec<&str> = s.split([':', '.']).collect();

        let (min, sec, frac) = match parts.len() {
            2 => (parts[0], parts[1], None),
            3 => (parts[0], parts[1], Some(parts[2])),
            _ => return None,
        };
        let min: u64 = min.parse().ok()?;
        let sec: u64 = sec.parse().ok()?;
        // Handle both "34" (centiseconds) and "340" (milliseconds)
        let ms: u64 = match frac {
            None => 0,
            Some(f) => match f.len() {
                1 => f.parse::<u64>().ok()? * 100,
                2 => f.parse::<u64>().ok()? * 10,
                3 => f.parse().ok()?,
                _ => return None,
            },
        };

        let total = min
            .checked_mul(60_000)?
            .checked_add(sec.checked_mul(1000)?)?
            .checked_add(ms)?;
        Some(total as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(ParsedLyrics::parse_timestamp("00:12"), Some(12.0));
        assert_eq!(ParsedLyrics::parse_timestamp("01:30"), Some(90.0));
        assert_eq!(ParsedLyrics::parse_timestamp("00:12.34"), Some(12.34));
        assert_eq!(ParsedLyrics::parse_timestamp("00:12.340"), Some(12.34));
        assert_eq!(ParsedLyrics::parse_timestamp("00:12:34"), Some(12.34));
        assert_eq!(ParsedLyrics::parse_timestamp("ti:Song"), None);
        assert_eq!(ParsedLyrics::parse_timestamp("999999999999999999:00"), None);
        assert_eq!(ParsedLyrics::parse_timestamp("00:99999999999999999"), None);
    }

    #[test]
    fn test_parse_lrc() {
        let lrc = r#"
[ti:Test Song]
[ar:Test Artist]
[offset:0]
[00:12.34]First line
[00:13.00]
[00:15.00]Second line
"#;
        let parsed = ParsedLyrics::parse(lrc, true);
        assert!(parsed.synced);
        assert_eq!(parsed.lines.len(), 2);
        assert_eq!(parsed.lines[0].time, 12.34);
        assert_eq!(parsed.lines[0].text, "First line");
        assert_eq!(parsed.lines[1].text, "Second line");
    }

    #[test]
    fn test_repeated_timestamps_are_sorted() {
        let lrc = "[00:30.00][00:10.00]Chorus\n[00:20.00]Verse";
        let parsed = ParsedLyrics::parse(lrc, true);
        let times: Vec<f64> = parsed.lines.iter().map(|l| l.time).collect();
        assert_eq!(times, [10.0, 20.0, 30.0]);
        assert_eq!(parsed.lines[0].text, "Chorus");
        assert_eq!(parsed.lines[1].text, "Verse");
    }

    #[test]
    fn test_plain_lines_are_untimed() {
        let parsed = ParsedLyrics::parse("  hello \n\n\nworld\n[00:01.00]stamped", false);
        assert!(!parsed.synced);
        let texts: Vec<&str> = parsed.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["hello", "world", "stamped"]);
        assert!(parsed.lines.iter().all(|l| l.time == 0.0));
    }

    #[test]
    fn test_markup_breaks() {
        let parsed = ParsedLyrics::parse_markup("Line one<br>Line two<BR />  <br/>Line three");
        let texts: Vec<&str> = parsed.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["Line one", "Line two", "Line three"]);
    }
}
