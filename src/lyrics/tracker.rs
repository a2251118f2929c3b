//! Maps playback progress to the active lyric line.

use super::LyricLine;

/// Index of the last line whose offset is `<= progress`, or `None` when
/// progress precedes every line. `lines` must be time-ordered.
pub fn active_index(lines: &[LyricLine], progress: f64) -> Option<usize> {
    lines
        .partition_point(|line| line.time <= progress)
        .checked_sub(1)
}

/// Tracks the active line of one document across progress ticks.
#[derive(Debug, Default)]
pub struct ActiveLineTracker {
    synced: bool,
    current: Option<usize>,
}

impl ActiveLineTracker {
    pub fn new(synced: bool) -> Self {
        Self {
            synced,
            current: None,
        }
    }

    /// Start over for a new document.
    pub fn reset(&mut self, synced: bool) {
        self.synced = synced;
        self.current = None;
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Re-evaluate for `progress`. Returns true only when the active index
    /// changed. Plain documents never have an active line.
    pub fn update(&mut self, lines: &[LyricLine], progress: f64) -> bool {
        let next = if !self.synced {
            None
        } else {
            match self.current {
                // Playback moves forward: walk on from the previous line.
                Some(i) if i < lines.len() && lines[i].time <= progress => {
                    let mut j = i;
                    while j + 1 < lines.len() && lines[j + 1].time <= progress {
                        j += 1;
                    }
                    Some(j)
                }
                // Seeked backwards or first tick.
                _ => active_index(lines, progress),
            }
        };

        if next != self.current {
            self.current = next;
            true
        } else {
            false
        }
    }
}
