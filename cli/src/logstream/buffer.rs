//! Viewer-side log buffer with a scroll cursor

use std::collections::{HashSet, VecDeque};

use crate::logstream::LogEntry;

pub const MAX_BUFFERED_LOGS: usize = 10_000;

/// Chronologically ordered, deduplicated log lines.
///
/// While `anchor_bottom` is set the visible window follows the newest entry.
/// Scrolling up releases the anchor, scrolling back to the end restores it.
///
/// Line-oriented output cannot reorder what it already printed, so entries
/// are handed out through [`LogBuffer::release`]: everything older than the
/// newest timestamp goes out in order, the newest lines wait for the next
/// batch or [`LogBuffer::flush`].
#[derive(Debug)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    seen: HashSet<String>,
    capacity: usize,
    scroll_offset: usize,
    anchor_bottom: bool,
    /// Leading entries already handed out
    released: usize,
    /// Arrived older than something already handed out
    late: Vec<LogEntry>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(MAX_BUFFERED_LOGS)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            seen: HashSet::new(),
            capacity: capacity.max(1),
            scroll_offset: 0,
            anchor_bottom: true,
            released: 0,
            late: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn anchored(&self) -> bool {
        self.anchor_bottom
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Add a batch, returning the entries that were new
    pub fn extend(&mut self, batch: Vec<LogEntry>) -> Vec<LogEntry> {
        let mut accepted = Vec::new();
        for entry in batch {
            if !self.seen.insert(entry.id.clone()) {
                continue;
            }
            // keep timestamps non-decreasing, equal timestamps keep arrival order
            let at = self
                .entries
                .partition_point(|existing| existing.timestamp <= entry.timestamp);
            self.entries.insert(at, entry.clone());
            if at < self.scroll_offset {
                self.scroll_offset += 1;
            }
            if at < self.released {
                self.released += 1;
                self.late.push(entry.clone());
            }
            accepted.push(entry);
        }

        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                self.seen.remove(&evicted.id);
                self.scroll_offset = self.scroll_offset.saturating_sub(1);
                self.released = self.released.saturating_sub(1);
            }
        }
        accepted.sort_by_key(|e| e.timestamp);
        accepted
    }

    /// Entries ready to print, oldest first.
    ///
    /// Entries sharing the newest timestamp are held back. Late arrivals that
    /// sort before already released entries come first, since their place
    /// has already been printed.
    pub fn release(&mut self) -> Vec<LogEntry> {
        let newest = match self.entries.back() {
            Some(entry) => entry.timestamp,
            None => return std::mem::take(&mut self.late),
        };
        let until = self.entries.partition_point(|e| e.timestamp < newest);
        self.release_until(until)
    }

    /// Everything not yet handed out, for when no more entries will arrive
    pub fn flush(&mut self) -> Vec<LogEntry> {
        self.release_until(self.entries.len())
    }

    fn release_until(&mut self, until: usize) -> Vec<LogEntry> {
        let mut out = std::mem::take(&mut self.late);
        if until > self.released {
            out.extend(self.entries.range(self.released..until).cloned());
            self.released = until;
        }
        out
    }

    fn max_offset(&self, height: usize) -> usize {
        self.entries.len().saturating_sub(height)
    }

    fn set_offset(&mut self, offset: usize, height: usize) {
        self.scroll_offset = offset.min(self.max_offset(height));
        self.anchor_bottom = self.scroll_offset + height >= self.entries.len();
    }

    pub fn scroll_up(&mut self, lines: usize, height: usize) {
        let current = self.effective_offset(height);
        self.set_offset(current.saturating_sub(lines), height);
    }

    pub fn scroll_down(&mut self, lines: usize, height: usize) {
        let current = self.effective_offset(height);
        self.set_offset(current.saturating_add(lines), height);
    }

    pub fn scroll_to_top(&mut self, height: usize) {
        self.set_offset(0, height);
    }

    pub fn scroll_to_bottom(&mut self, height: usize) {
        self.set_offset(self.max_offset(height), height);
    }

    fn effective_offset(&self, height: usize) -> usize {
        if self.anchor_bottom {
            self.max_offset(height)
        } else {
            self.scroll_offset.min(self.max_offset(height))
        }
    }

    /// The window of at most `height` entries currently on screen
    pub fn visible(&self, height: usize) -> Vec<&LogEntry> {
        let start = self.effective_offset(height);
        self.entries.iter().skip(start).take(height).collect()
    }
}
