//! Plain stdout front end: prints what changed after each event.

use super::state::{SessionState, TransportState};
use crate::catalog::Song;
use crate::lyrics::{LyricDocument, LyricLine, LyricsSource};
use crate::translate::WordMeaning;

#[derive(Debug, Clone, Copy)]
pub struct Console {
    enabled: bool,
}

impl Console {
    pub fn stdout() -> Self {
        Self { enabled: true }
    }

    /// Prints nothing.
    #[cfg(test)]
    pub fn silent() -> Self {
        Self { enabled: false }
    }

    fn line(&self, s: impl AsRef<str>) {
        if self.enabled {
            println!("{}", s.as_ref());
        }
    }

    pub fn notice(&self, msg: impl AsRef<str>) {
        self.line(format!("» {}", msg.as_ref()));
    }

    pub fn transport(&self, state: TransportState) {
        self.line(format!("[{}]", state.label()));
    }

    pub fn song_started(&self, song: &Song) {
        let duration = song
            .duration
            .map(|d| format!(" ({}:{:02})", d / 60, d % 60))
            .unwrap_or_default();
        self.line(format!("♪ {}{duration}", song.display_line()));
    }

    pub fn lyrics(&self, doc: Option<&LyricDocument>) {
        let Some(doc) = doc else {
            self.notice("no lyrics available");
            return;
        };
        let source = match doc.source {
            LyricsSource::Corpus => "lrclib",
            LyricsSource::Catalog => "catalog",
        };
        let kind = if doc.synced { "synced" } else { "plain" };
        self.notice(format!("{} {kind} lines from {source}", doc.lines.len()));
        if !doc.synced {
            for l in &doc.lines {
                self.line(format!("  {}", l.text));
            }
        }
    }

    pub fn active_line(&self, index: usize, line: &LyricLine) {
        self.line(format!("{:>4} │ {}", index + 1, line.text));
    }

    pub fn translation(&self, index: usize, text: &str) {
        self.line(format!("{:>4} │   ↳ {text}", index + 1));
    }

    pub fn word(&self, word: &str, meaning: &WordMeaning) {
        self.line(format!("{word} → {}", meaning.translation));
        for l in meaning.meaning.lines() {
            self.line(format!("    {l}"));
        }
    }

    pub fn status(&self, state: &SessionState, liked: bool) {
        let song = state
            .current
            .as_ref()
            .map(Song::display_line)
            .unwrap_or_else(|| "-".to_string());
        self.line(format!(
            "{}{} [{}] {:.0}/{:.0}s  shuffle:{}  {}",
            song,
            if liked { " ♥" } else { "" },
            if state.buffering { "buffering" } else { state.transport.label() },
            state.progress,
            state.duration,
            if state.queue.shuffle() { "on" } else { "off" },
            state.queue.repeat().label()
        ));
    }

    pub fn queue(&self, state: &SessionState) {
        for (i, song) in state.queue.songs().iter().enumerate() {
            let marker = if state.queue.cursor() == Some(i) { '▶' } else { ' ' };
            self.line(format!("{marker} {:02}. {}", i + 1, song.display_line()));
        }
    }

    pub fn document(&self, doc: &LyricDocument, active: Option<usize>) {
        for (i, l) in doc.lines.iter().enumerate() {
            let marker = if active == Some(i) { '▶' } else { ' ' };
            match &l.translation {
                Some(t) => self.line(format!("{marker} {}  ({t})", l.text)),
                None => self.line(format!("{marker} {}", l.text)),
            }
        }
    }
}
