//! Pending-change queue and its background reconciliation worker.
//!
//! An acquisition tool announces a change (a grab) long before the library
//! reflects it. Each announcement becomes a [`PendingChangeEntry`] that the
//! tracker's [`ReconcileWorker`] checks on every tick until the library shows
//! a quality that differs from the first one it observed.

pub mod worker;

pub use worker::{ReconcileSettings, ReconcileWorker, TickSummary};

use crate::quality::QualitySnapshot;
use crate::state::{Document, StateStore};
use chrono::{DateTime, Utc};
use reelwatch_common::{EntryScope, ExternalKeySet, TrackerKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The episode a series baseline was taken from. Later checks compare that
/// same episode and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub season_number: u32,
    pub episode_number: u32,
}

impl EpisodeRef {
    pub fn new(season_number: u32, episode_number: u32) -> Self {
        Self {
            season_number,
            episode_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingChangeEntry {
    pub external_keys: ExternalKeySet,
    pub item_title: String,
    pub release_year: Option<i32>,
    pub scope: EntryScope,
    /// First quality observed in the library. Never replaced once set.
    pub baseline_snapshot: Option<QualitySnapshot>,
    /// Episode the baseline came from, for series entries.
    #[serde(default)]
    pub baseline_episode: Option<EpisodeRef>,
    pub next_check_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PendingChangeEntry {
    pub fn new(
        external_keys: ExternalKeySet,
        item_title: impl Into<String>,
        release_year: Option<i32>,
        scope: EntryScope,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            external_keys,
            item_title: item_title.into(),
            release_year,
            scope,
            baseline_snapshot: None,
            baseline_episode: None,
            next_check_at: now,
            created_at: now,
        }
    }

    pub fn key(&self) -> String {
        self.external_keys.composite_key(&self.scope)
    }

    /// Whether `other` describes the same item and scope: same season (or
    /// both whole items) and at least one shared catalog id.
    fn same_target(&self, other: &PendingChangeEntry) -> bool {
        self.scope.key_suffix() == other.scope.key_suffix()
            && self.external_keys.overlaps(&other.external_keys)
    }

    /// Fold a newer entry for the same target into this one. Keys and
    /// episode sets are unioned; the baseline and schedule stay.
    fn absorb(&mut self, other: &PendingChangeEntry) {
        self.external_keys = self.external_keys.union(&other.external_keys);
        self.scope.merge(&other.scope);
        if self.baseline_snapshot.is_none() && other.baseline_snapshot.is_some() {
            self.baseline_snapshot = other.baseline_snapshot.clone();
            self.baseline_episode = other.baseline_episode;
            self.next_check_at = other.next_check_at;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Created,
    /// An entry sharing a catalog id and scope existed; key and episode sets
    /// were merged and its baseline and schedule kept.
    Merged,
}

/// One tracker's queue, persisted as its own document.
pub struct PendingQueue {
    tracker: TrackerKind,
    doc: Document<BTreeMap<String, PendingChangeEntry>>,
}

impl PendingQueue {
    pub fn new(store: Arc<StateStore>, tracker: TrackerKind) -> Self {
        Self {
            tracker,
            doc: Document::open(store, tracker.document_name()),
        }
    }

    pub fn tracker(&self) -> TrackerKind {
        self.tracker
    }

    /// Add a grab to the queue. Entries for the same scope that share any
    /// catalog id with it are merged into one, re-keyed by the merged key set.
    pub fn enqueue(&self, entry: PendingChangeEntry) -> EnqueueOutcome {
        self.doc.update(|entries| {
            let mut matching: Vec<PendingChangeEntry> = Vec::new();
            entries.retain(|_, existing| {
                if existing.same_target(&entry) {
                    matching.push(existing.clone());
                    false
                } else {
                    true
                }
            });

            if matching.is_empty() {
                entries.insert(entry.key(), entry);
                return EnqueueOutcome::Created;
            }

            // Oldest entry is the base so the first baseline wins.
            matching.sort_by_key(|e| e.created_at);
            let mut merged = matching.remove(0);
            for other in &matching {
                merged.absorb(other);
            }
            merged.absorb(&entry);
            entries.insert(merged.key(), merged);
            EnqueueOutcome::Merged
        })
    }

    /// Keys and copies of entries whose check time has come.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<(String, PendingChangeEntry)> {
        self.doc.read(|entries| {
            entries
                .iter()
                .filter(|(_, e)| e.next_check_at <= now)
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect()
        })
    }

    pub fn reschedule(&self, key: &str, next_check_at: DateTime<Utc>) {
        self.doc.update_if_changed(|entries| match entries.get_mut(key) {
            Some(entry) => {
                entry.next_check_at = next_check_at;
                ((), true)
            }
            None => ((), false),
        });
    }

    /// Store the first observed snapshot. Returns `false` if the entry is gone
    /// or already has a baseline, so the first observation always wins.
    pub fn set_baseline(
        &self,
        key: &str,
        snapshot: QualitySnapshot,
        episode: Option<EpisodeRef>,
        next_check_at: DateTime<Utc>,
    ) -> bool {
        self.doc.update_if_changed(|entries| match entries.get_mut(key) {
            Some(entry) if entry.baseline_snapshot.is_none() => {
                entry.baseline_snapshot = Some(snapshot);
                entry.baseline_episode = episode;
                entry.next_check_at = next_check_at;
                (true, true)
            }
            _ => (false, false),
        })
    }

    pub fn remove(&self, key: &str) -> Option<PendingChangeEntry> {
        self.doc.update_if_changed(|entries| {
            let removed = entries.remove(key);
            let changed = removed.is_some();
            (removed, changed)
        })
    }

    pub fn get(&self, key: &str) -> Option<PendingChangeEntry> {
        self.doc.read(|entries| entries.get(key).cloned())
    }

    pub fn len(&self) -> usize {
        self.doc.read(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn snapshot(resolution: &str) -> QualitySnapshot {
        QualitySnapshot {
            resolution_label: resolution.into(),
            video_codec_class: "H264".into(),
            dynamic_range_profiles: vec!["SDR".into()],
            audio_tracks: BTreeSet::from(["AC3 5.1".to_string()]),
            best_audio: None,
        }
    }

    fn queue() -> PendingQueue {
        PendingQueue::new(Arc::new(StateStore::in_memory()), TrackerKind::Series)
    }

    #[test]
    fn same_season_grabs_merge() {
        let queue = queue();
        let now = Utc::now();
        let keys = ExternalKeySet::from_provider_pairs([("tvdb", "81189")]);

        let first = PendingChangeEntry::new(keys.clone(), "Breaking Bad", Some(2008), EntryScope::season(1, [1, 2]), now);
        let key = first.key();
        assert_eq!(queue.enqueue(first), EnqueueOutcome::Created);
        queue.set_baseline(&key, snapshot("720p"), Some(EpisodeRef::new(1, 1)), now + Duration::seconds(60));

        let second = PendingChangeEntry::new(keys, "Breaking Bad", Some(2008), EntryScope::season(1, [3]), now);
        assert_eq!(queue.enqueue(second), EnqueueOutcome::Merged);

        assert_eq!(queue.len(), 1);
        let merged = queue.get(&key).unwrap();
        assert_eq!(merged.scope.episode_count(), Some(3));
        assert!(merged.baseline_snapshot.is_some());
        assert_eq!(merged.baseline_episode, Some(EpisodeRef::new(1, 1)));
        assert_eq!(merged.next_check_at, now + Duration::seconds(60));
    }

    #[test]
    fn grabs_sharing_one_id_merge_and_rekey() {
        let queue = queue();
        let now = Utc::now();

        let tvdb_only = PendingChangeEntry::new(
            ExternalKeySet::from_provider_pairs([("tvdb", "81189")]),
            "Breaking Bad",
            Some(2008),
            EntryScope::season(1, [1]),
            now,
        );
        assert_eq!(queue.enqueue(tvdb_only), EnqueueOutcome::Created);
        queue.set_baseline("tvdb:81189:S01", snapshot("720p"), Some(EpisodeRef::new(1, 1)), now);

        let both = PendingChangeEntry::new(
            ExternalKeySet::from_provider_pairs([("tmdb", "1396"), ("tvdb", "81189")]),
            "Breaking Bad",
            Some(2008),
            EntryScope::season(1, [2]),
            now + Duration::seconds(5),
        );
        assert_eq!(queue.enqueue(both), EnqueueOutcome::Merged);

        assert_eq!(queue.len(), 1);
        assert!(queue.get("tvdb:81189:S01").is_none());
        let merged = queue.get("tmdb:1396:S01").unwrap();
        assert_eq!(merged.external_keys.len(), 2);
        assert_eq!(merged.scope, EntryScope::season(1, [1, 2]));
        assert_eq!(merged.baseline_snapshot.unwrap().resolution_label, "720p");

        // A later grab carrying only the secondary id still lands on it.
        let again = PendingChangeEntry::new(
            ExternalKeySet::from_provider_pairs([("tvdb", "81189")]),
            "Breaking Bad",
            Some(2008),
            EntryScope::season(1, [3]),
            now + Duration::seconds(10),
        );
        assert_eq!(queue.enqueue(again), EnqueueOutcome::Merged);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get("tmdb:1396:S01").unwrap().scope.episode_count(), Some(3));
    }

    #[test]
    fn different_seasons_stay_apart() {
        let queue = queue();
        let now = Utc::now();
        let keys = ExternalKeySet::from_provider_pairs([("tvdb", "81189")]);
        queue.enqueue(PendingChangeEntry::new(keys.clone(), "Breaking Bad", None, EntryScope::season(1, [1]), now));
        queue.enqueue(PendingChangeEntry::new(keys.clone(), "Breaking Bad", None, EntryScope::season(2, [1]), now));
        queue.enqueue(PendingChangeEntry::new(keys, "Breaking Bad", None, EntryScope::WholeItem, now));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn baseline_is_captured_once() {
        let queue = queue();
        let now = Utc::now();
        let entry = PendingChangeEntry::new(
            ExternalKeySet::from_provider_pairs([("tvdb", "1")]),
            "Show",
            None,
            EntryScope::WholeItem,
            now,
        );
        let key = entry.key();
        queue.enqueue(entry);

        assert!(queue.set_baseline(&key, snapshot("1080p"), None, now));
        assert!(!queue.set_baseline(&key, snapshot("2160p"), None, now));
        assert_eq!(
            queue.get(&key).unwrap().baseline_snapshot.unwrap().resolution_label,
            "1080p"
        );
        assert!(!queue.set_baseline("missing", snapshot("2160p"), None, now));
    }

    #[test]
    fn due_respects_schedule() {
        let queue = queue();
        let now = Utc::now();
        let entry = PendingChangeEntry::new(
            ExternalKeySet::from_provider_pairs([("tvdb", "1")]),
            "Show",
            None,
            EntryScope::WholeItem,
            now,
        );
        let key = entry.key();
        queue.enqueue(entry);
        assert_eq!(queue.due(now).len(), 1);

        queue.reschedule(&key, now + Duration::seconds(60));
        assert!(queue.due(now + Duration::seconds(59)).is_empty());
        assert_eq!(queue.due(now + Duration::seconds(60)).len(), 1);

        assert!(queue.remove(&key).is_some());
        assert!(queue.remove(&key).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn queue_persists_per_tracker() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::new(dir.path()));
        let movies = PendingQueue::new(store.clone(), TrackerKind::Movies);
        movies.enqueue(PendingChangeEntry::new(
            ExternalKeySet::from_provider_pairs([("tmdb", "27205")]),
            "Inception",
            Some(2010),
            EntryScope::WholeItem,
            Utc::now(),
        ));

        assert!(dir.path().join("pending-movies.json").exists());
        let reopened = PendingQueue::new(store.clone(), TrackerKind::Movies);
        assert!(reopened.get("tmdb:27205").is_some());
        assert!(PendingQueue::new(store, TrackerKind::Series).is_empty());
    }
}
