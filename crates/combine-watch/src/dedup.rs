//! Suppression of repeated change events.
//!
//! Editors and platform watchers often report one save as several identical
//! events. The first event for a `(kind, path)` pair is processed; repeats
//! within the window are dropped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::event::{ChangeEvent, ChangeKind};

/// Default suppression window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(100);

/// Remembers recently seen events.
#[derive(Debug)]
pub struct DedupCache {
    window: Duration,
    seen: HashMap<(ChangeKind, PathBuf), Instant>,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl DedupCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    /// Record `event` and report whether it repeats one seen within the window.
    pub fn is_duplicate(&mut self, event: &ChangeEvent) -> bool {
        self.is_duplicate_at(event, Instant::now())
    }

    fn is_duplicate_at(&mut self, event: &ChangeEvent, now: Instant) -> bool {
        let window = self.window;
        self.seen
            .retain(|_, seen_at| now.saturating_duration_since(*seen_at) < window);

        let key = (event.kind, event.path.clone());
        if self.seen.contains_key(&key) {
            return true;
        }
        self.seen.insert(key, now);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_within_window_suppressed() {
        let mut cache = DedupCache::default();
        let event = ChangeEvent::new(ChangeKind::Modified, "/p/content/a.html");
        let start = Instant::now();

        assert!(!cache.is_duplicate_at(&event, start));
        assert!(cache.is_duplicate_at(&event, start + Duration::from_millis(50)));
    }

    #[test]
    fn test_repeat_after_window_processed() {
        let mut cache = DedupCache::default();
        let event = ChangeEvent::new(ChangeKind::Modified, "/p/content/a.html");
        let start = Instant::now();

        assert!(!cache.is_duplicate_at(&event, start));
        assert!(!cache.is_duplicate_at(&event, start + Duration::from_millis(150)));
    }

    #[test]
    fn test_kind_and_path_distinguish_events() {
        let mut cache = DedupCache::default();
        let now = Instant::now();

        assert!(!cache.is_duplicate_at(&ChangeEvent::new(ChangeKind::Modified, "/p/a"), now));
        assert!(!cache.is_duplicate_at(&ChangeEvent::new(ChangeKind::Deleted, "/p/a"), now));
        assert!(!cache.is_duplicate_at(&ChangeEvent::new(ChangeKind::Modified, "/p/b"), now));
    }

    #[test]
    fn test_expired_entries_evicted() {
        let mut cache = DedupCache::default();
        let start = Instant::now();
        for i in 0..10 {
            cache.is_duplicate_at(&ChangeEvent::new(ChangeKind::Created, format!("/p/{i}")), start);
        }
        cache.is_duplicate_at(
            &ChangeEvent::new(ChangeKind::Created, "/p/last"),
            start + Duration::from_secs(1),
        );
        assert_eq!(cache.seen.len(), 1);
    }
}
