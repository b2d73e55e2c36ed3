//! Short-window suppression of repeated capture events.
//!
//! The host often fires the same notification several times for a single
//! logical edit. Events with an identical `(path, action, detail)` key that
//! arrive within the window are collapsed into the first one.

use scenesync_types::{EntityPath, Timestamp};
use std::collections::HashMap;
use std::time::Duration;

/// Multiple of the window after which a key is eligible for sweeping.
const SWEEP_FACTOR: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    path: String,
    action: String,
    detail: String,
}

impl DedupKey {
    fn new(path: &EntityPath, action: &str, detail: &str) -> Self {
        Self {
            path: path.to_string(),
            action: action.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Last-seen timestamps per capture key.
#[derive(Debug, Clone)]
pub struct DedupWindow {
    window: Duration,
    last_seen: HashMap<DedupKey, Timestamp>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Changes the window length. Existing timestamps are kept.
    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Returns true if an identical event was seen less than one window ago.
    /// A suppressed event does not refresh the stored timestamp; an allowed
    /// one records `now`.
    pub fn should_suppress(
        &mut self,
        path: &EntityPath,
        action: &str,
        detail: &str,
        now: Timestamp,
    ) -> bool {
        let key = DedupKey::new(path, action, detail);
        if let Some(prior) = self.last_seen.get(&key)
            && now.since(*prior) < self.window
        {
            return true;
        }
        self.last_seen.insert(key, now);
        false
    }

    /// Records an event without checking it, so an identical event arriving
    /// within the window is suppressed.
    pub fn record(&mut self, path: &EntityPath, action: &str, detail: &str, now: Timestamp) {
        self.last_seen.insert(DedupKey::new(path, action, detail), now);
    }

    /// Drops keys older than ten windows. Returns how many were removed.
    pub fn sweep(&mut self, now: Timestamp) -> usize {
        let horizon = self.window * SWEEP_FACTOR;
        let before = self.last_seen.len();
        self.last_seen.retain(|_, seen| now.since(*seen) < horizon);
        before - self.last_seen.len()
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}
