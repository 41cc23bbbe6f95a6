//! Time-bounded restart deduplication.
//!
//! A live entry means a restart for that worker is believed to be in
//! flight. Entries are advisory: they expire after the TTL whether or not
//! the restart finished, so a restart slower than the TTL can be started
//! a second time by a later health pass.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Per-worker restart markers with a fixed time-to-live.
#[derive(Debug)]
pub struct RestartGuard {
    entries: DashMap<usize, Instant>,
    ttl: Duration,
}

impl RestartGuard {
    /// Create an empty guard whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Entry lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert a fresh entry for `index` unless a live one exists.
    ///
    /// Concurrent callers racing for the same index see exactly one `true`.
    pub fn try_acquire(&self, index: usize) -> bool {
        let now = Instant::now();
        match self.entries.entry(index) {
            Entry::Occupied(mut occupied) => {
                if self.is_live(*occupied.get(), now) {
                    false
                } else {
                    occupied.insert(now);
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        }
    }

    /// Whether a live entry exists for `index`.
    #[must_use]
    pub fn is_held(&self, index: usize) -> bool {
        let now = Instant::now();
        self.entries
            .get(&index)
            .is_some_and(|inserted| self.is_live(*inserted, now))
    }

    /// Remove any entry for `index`. Returns whether a live entry was removed.
    pub fn release(&self, index: usize) -> bool {
        let now = Instant::now();
        self.entries
            .remove(&index)
            .is_some_and(|(_, inserted)| self.is_live(inserted, now))
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, inserted| self.is_live(*inserted, now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of live entries.
    #[must_use]
    pub fn held_count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| self.is_live(*entry.value(), now))
            .count()
    }

    fn is_live(&self, inserted: Instant, now: Instant) -> bool {
        now.saturating_duration_since(inserted) < self.ttl
    }
}
