//! Staleness tokens for asynchronous results.
//!
//! Each kind of background request keeps only its latest ticket. A response
//! is applied only if it carries that ticket; anything older is dropped.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Catalog lookup of a song the user asked to play by id.
    SongFetch,
    Recommendations,
    Lyrics,
}

/// Identity a request was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: u64,
    pub song_id: String,
}

#[derive(Debug, Default)]
pub struct RequestTracker {
    next_id: u64,
    pending: HashMap<RequestKind, Ticket>,
}

impl RequestTracker {
    /// Start a request, superseding any pending one of the same kind.
    pub fn issue(&mut self, kind: RequestKind, song_id: &str) -> Ticket {
        self.next_id += 1;
        let ticket = Ticket {
            id: self.next_id,
            song_id: song_id.to_string(),
        };
        self.pending.insert(kind, ticket.clone());
        ticket
    }

    /// True (and no longer pending) only for the latest ticket of `kind`.
    pub fn accept(&mut self, kind: RequestKind, ticket: &Ticket) -> bool {
        match self.pending.get(&kind) {
            Some(pending) if pending == ticket => {
                self.pending.remove(&kind);
                true
            }
            _ => false,
        }
    }

    pub fn pending(&self, kind: RequestKind) -> Option<&Ticket> {
        self.pending.get(&kind)
    }

    pub fn clear(&mut self, kind: RequestKind) {
        self.pending.remove(&kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_ticket_wins() {
        let mut t = RequestTracker::default();
        let first = t.issue(RequestKind::Lyrics, "a");
        let second = t.issue(RequestKind::Lyrics, "b");
        assert_ne!(first.id, second.id);

        assert!(!t.accept(RequestKind::Lyrics, &first));
        assert_eq!(t.pending(RequestKind::Lyrics).map(|p| p.song_id.as_str()), Some("b"));
        assert!(t.accept(RequestKind::Lyrics, &second));
        assert!(t.pending(RequestKind::Lyrics).is_none());
        // Accepted once only.
        assert!(!t.accept(RequestKind::Lyrics, &second));
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut t = RequestTracker::default();
        let recs = t.issue(RequestKind::Recommendations, "a");
        let lyrics = t.issue(RequestKind::Lyrics, "a");
        t.clear(RequestKind::Lyrics);
        assert!(!t.accept(RequestKind::Lyrics, &lyrics));
        assert!(t.accept(RequestKind::Recommendations, &recs));
    }
}
