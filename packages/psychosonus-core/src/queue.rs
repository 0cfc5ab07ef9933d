//! Thread-safe track queue with a distinguished "current" slot.
//!
//! The queue is shared between the request-handling domain (many concurrent
//! HTTP handlers) and the coordinator loop. Every method takes the single
//! internal lock for the duration of one structural change and never
//! performs I/O while holding it.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

use crate::track::Track;

/// One row of a queue snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry {
    /// The track.
    pub song: Track,
    /// `true` for the current (playing or most recently dequeued) track.
    pub current: bool,
}

#[derive(Debug, Default)]
struct QueueInner {
    pending: VecDeque<Track>,
    current: Option<Track>,
}

/// FIFO track queue bounded by a fixed capacity.
///
/// `capacity` bounds the pending items only; the current slot is not
/// counted, matching what `size()` reports.
#[derive(Debug)]
pub struct TrackQueue {
    inner: Mutex<QueueInner>,
    capacity: usize,
}

impl TrackQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            capacity,
        }
    }

    /// Appends a track. Returns `false` and leaves the queue unchanged when full.
    pub fn enqueue(&self, track: Track) -> bool {
        let mut inner = self.inner.lock();
        if inner.pending.len() >= self.capacity {
            return false;
        }
        inner.pending.push_back(track);
        true
    }

    /// Pops the head into the current slot and returns it.
    ///
    /// Returns `None` on an empty queue; the current slot is left as is.
    pub fn dequeue_next(&self) -> Option<Track> {
        let mut inner = self.inner.lock();
        let next = inner.pending.pop_front()?;
        inner.current = Some(next.clone());
        Some(next)
    }

    /// Removes the pending track at `index` (zero-based, current excluded).
    pub fn remove_at(&self, index: usize) -> bool {
        self.inner.lock().pending.remove(index).is_some()
    }

    /// Drops every pending track. The current slot is kept.
    pub fn clear(&self) {
        self.inner.lock().pending.clear();
    }

    /// Clears the current slot. Only stop and disconnect call this.
    pub fn clear_current(&self) {
        self.inner.lock().current = None;
    }

    /// Caches the resolved URL on the current track if its id matches.
    ///
    /// Returns `false` when the current track has changed in the meantime.
    pub fn cache_resolved_url(&self, track_id: &str, url: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.current.as_mut() {
            Some(track) if track.id() == track_id => {
                track.cache_resolved_url(url.to_string());
                true
            }
            _ => false,
        }
    }

    /// Returns a copy of the current track.
    #[must_use]
    pub fn current(&self) -> Option<Track> {
        self.inner.lock().current.clone()
    }

    /// Returns the current track (flagged) followed by pending tracks in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        let inner = self.inner.lock();
        let mut entries = Vec::with_capacity(inner.pending.len() + 1);
        if let Some(current) = &inner.current {
            entries.push(QueueEntry {
                song: current.clone(),
                current: true,
            });
        }
        entries.extend(inner.pending.iter().map(|track| QueueEntry {
            song: track.clone(),
            current: false,
        }));
        entries
    }

    /// Number of pending tracks (current excluded).
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock().pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
