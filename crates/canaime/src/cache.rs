use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::NaiveDateTime;

use crate::types::Snapshot;

/// Last good roster, swapped atomically for lock-free reads.
///
/// Readers get an owned `Arc`, so a snapshot stays consistent for as long as
/// they hold it even if a newer one is published meanwhile.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    inner: ArcSwapOption<Snapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the held snapshot and returns what is now held. If the wall
    /// clock went backwards since the last publish, the new snapshot takes
    /// the held `captured_at` so that it never decreases.
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let candidate = Arc::new(snapshot);
        let mut stored = Arc::clone(&candidate);
        self.inner.rcu(|current| {
            stored = match current {
                Some(held) if held.captured_at > candidate.captured_at => Arc::new(
                    Snapshot::captured(candidate.entries.clone(), held.captured_at),
                ),
                _ => Arc::clone(&candidate),
            };
            Some(Arc::clone(&stored))
        });

        if stored.captured_at != candidate.captured_at {
            log::warn!(
                "Clock went backwards: snapshot captured at {} published as {}",
                candidate.captured_at_display(),
                stored.captured_at_display()
            );
        }
        log::info!(
            "Published roster snapshot with {} entries captured at {}",
            stored.len(),
            stored.captured_at_display()
        );
        stored
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.inner.load_full()
    }

    pub fn last_updated(&self) -> Option<NaiveDateTime> {
        self.current().map(|s| s.captured_at)
    }

    /// Entry count of the held snapshot, zero before the first publish.
    pub fn len(&self) -> usize {
        self.current().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Entry;
    use chrono::{Duration, NaiveDate};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap()
    }

    fn entries(count: usize, tag: &str) -> Vec<Entry> {
        (0..count)
            .map(|i| Entry {
                code: tag.to_string(),
                wing: "ALA1".into(),
                cell: i.to_string(),
                photo_url: String::new(),
                name: format!("PRESO {}", i),
            })
            .collect()
    }

    #[test]
    fn test_empty_before_first_publish() {
        let cache = SnapshotCache::new();
        assert!(cache.current().is_none());
        assert_eq!(cache.last_updated(), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let cache = SnapshotCache::new();

        cache.publish(Snapshot::captured(entries(2, "a"), at(0)));
        let stored = cache.publish(Snapshot::captured(entries(5, "b"), at(1)));

        let current = cache.current().expect("Snapshot should be published");
        assert!(Arc::ptr_eq(&stored, &current));
        assert_eq!(current.len(), 5);
        assert_eq!(cache.last_updated(), Some(at(1)));
    }

    #[test]
    fn test_publish_after_clock_regression_keeps_timestamp() {
        let cache = SnapshotCache::new();

        cache.publish(Snapshot::captured(entries(3, "before"), at(30)));
        let stored = cache.publish(Snapshot::captured(entries(1, "after"), at(10)));

        assert_eq!(stored.captured_at, at(30));
        assert_eq!(cache.len(), 1);
        assert!(cache.current().unwrap().entries.iter().all(|e| e.code == "after"));
        assert_eq!(cache.last_updated(), Some(at(30)));
    }

    #[test]
    fn test_same_timestamp_is_accepted() {
        let cache = SnapshotCache::new();

        cache.publish(Snapshot::captured(entries(1, "a"), at(5)));
        cache.publish(Snapshot::captured(entries(4, "b"), at(5)));
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_held_snapshot_survives_republish() {
        let cache = SnapshotCache::new();
        cache.publish(Snapshot::captured(entries(2, "first"), at(0)));

        let held = cache.current().expect("Snapshot should be published");
        cache.publish(Snapshot::captured(entries(7, "second"), at(1)));

        assert_eq!(held.len(), 2);
        assert!(held.entries.iter().all(|e| e.code == "first"));
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let cache = SnapshotCache::new();
        let done = AtomicBool::new(false);
        let base = at(0);

        thread::scope(|scope| {
            scope.spawn(|| {
                for cycle in 1..=200usize {
                    let captured = base + Duration::seconds(cycle as i64);
                    cache.publish(Snapshot::captured(
                        entries(cycle, &cycle.to_string()),
                        captured,
                    ));
                }
                done.store(true, Ordering::SeqCst);
            });

            for _ in 0..4 {
                scope.spawn(|| {
                    while !done.load(Ordering::SeqCst) {
                        if let Some(snapshot) = cache.current() {
                            let cycle = snapshot.len().to_string();
                            assert!(
                                snapshot.entries.iter().all(|e| e.code == cycle),
                                "Snapshot mixes entries from different cycles"
                            );
                        }
                    }
                });
            }
        });

        assert_eq!(cache.len(), 200);
    }
}
