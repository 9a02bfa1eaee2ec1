//! Background reconciliation worker, one per acquisition tracker.
//!
//! Each tick drains the due entries of one [`PendingQueue`]. An entry is only
//! ever rescheduled, baselined, discarded or announced; a failure while
//! handling one entry is logged and the entry is rescheduled, so siblings
//! always get their turn.

use super::{EpisodeRef, PendingChangeEntry, PendingQueue};
use crate::config::Config;
use crate::identity::IdentityResolver;
use crate::library::{LibraryClient, LibraryItem};
use crate::messages;
use crate::notifications::{Dispatcher, NotificationRequest};
use crate::quality::{self, QualitySnapshot};
use crate::season::SeasonProgressGate;
use crate::suppression::SuppressionMarks;
use anyhow::Result;
use chrono::{DateTime, Utc};
use reelwatch_common::{EntryScope, ItemKind, TrackerKind};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Timing knobs for one worker.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub poll_interval: std::time::Duration,
    pub recheck_interval: chrono::Duration,
    pub suppression_ttl: chrono::Duration,
}

impl ReconcileSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.reconcile.poll_interval(),
            recheck_interval: config.reconcile.recheck_interval(),
            suppression_ttl: config.suppression.ttl(),
        }
    }
}

/// Counts of what happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub checked: usize,
    pub not_ready: usize,
    pub baselined: usize,
    pub unchanged: usize,
    pub notified: usize,
    pub discarded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    NotReady,
    Baselined,
    Unchanged,
    Notified,
    Discarded,
}

/// What the library currently shows for an entry.
struct Observation {
    snapshot: QualitySnapshot,
    /// Item whose image illustrates the notification.
    representative_item_id: String,
    /// Used when the representative item has no image.
    fallback_item_id: Option<String>,
    /// Library id of the season, for season-scoped entries.
    season_id: Option<String>,
    /// Episode the snapshot was taken from, for series entries.
    episode: Option<EpisodeRef>,
}

pub struct ReconcileWorker {
    queue: Arc<PendingQueue>,
    resolver: Arc<IdentityResolver>,
    library: Arc<dyn LibraryClient>,
    seasons: Arc<SeasonProgressGate>,
    suppression: Arc<SuppressionMarks>,
    dispatcher: Arc<dyn Dispatcher>,
    settings: ReconcileSettings,
}

impl ReconcileWorker {
    pub fn new(
        queue: Arc<PendingQueue>,
        resolver: Arc<IdentityResolver>,
        library: Arc<dyn LibraryClient>,
        seasons: Arc<SeasonProgressGate>,
        suppression: Arc<SuppressionMarks>,
        dispatcher: Arc<dyn Dispatcher>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            queue,
            resolver,
            library,
            seasons,
            suppression,
            dispatcher,
            settings,
        }
    }

    pub fn tracker(&self) -> TrackerKind {
        self.queue.tracker()
    }

    /// Tick until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let tracker = self.tracker();
        info!(tracker = %tracker, pending = self.queue.len(), "Reconcile worker started");

        loop {
            let summary = self.tick(Utc::now()).await;
            if summary.checked > 0 {
                debug!(tracker = %tracker, ?summary, "Reconcile tick finished");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(tracker = %tracker, "Reconcile worker stopped");
    }

    /// Check every entry that is due at `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickSummary {
        let mut summary = TickSummary::default();

        for (key, entry) in self.queue.due(now) {
            summary.checked += 1;
            match self.reconcile_entry(&key, &entry, now).await {
                Ok(EntryOutcome::NotReady) => summary.not_ready += 1,
                Ok(EntryOutcome::Baselined) => summary.baselined += 1,
                Ok(EntryOutcome::Unchanged) => summary.unchanged += 1,
                Ok(EntryOutcome::Notified) => summary.notified += 1,
                Ok(EntryOutcome::Discarded) => summary.discarded += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to reconcile pending change; will retry");
                    self.queue.reschedule(&key, now + self.settings.recheck_interval);
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    async fn reconcile_entry(
        &self,
        key: &str,
        entry: &PendingChangeEntry,
        now: DateTime<Utc>,
    ) -> Result<EntryOutcome> {
        let next_check = now + self.settings.recheck_interval;

        let Some(observation) = self.observe(entry).await? else {
            debug!(key = %key, title = %entry.item_title, "Not in library yet; rescheduling");
            self.queue.reschedule(key, next_check);
            return Ok(EntryOutcome::NotReady);
        };

        let Some(baseline) = &entry.baseline_snapshot else {
            if self
                .queue
                .set_baseline(key, observation.snapshot, observation.episode, next_check)
            {
                debug!(
                    key = %key,
                    title = %entry.item_title,
                    episode = ?observation.episode,
                    "Baseline captured"
                );
            }
            return Ok(EntryOutcome::Baselined);
        };

        if let (
            EntryScope::Season {
                episode_numbers, ..
            },
            Some(season_id),
        ) = (&entry.scope, &observation.season_id)
        {
            if !episode_numbers.is_empty() {
                let recorded = self.seasons.recorded_count(season_id);
                if episode_numbers.len() > recorded as usize {
                    info!(
                        key = %key,
                        incoming = episode_numbers.len(),
                        recorded,
                        "Grab covers more episodes than the season had; treating as new content"
                    );
                    self.queue.remove(key);
                    return Ok(EntryOutcome::Discarded);
                }
            }
        }

        if baseline.signature() == observation.snapshot.signature() {
            self.queue.reschedule(key, next_check);
            return Ok(EntryOutcome::Unchanged);
        }

        let diff = quality::describe_change(baseline, &observation.snapshot);
        let mut request = NotificationRequest::new(
            observation.representative_item_id,
            messages::quality_updated(&entry.item_title, entry.release_year, &entry.scope, &diff),
        );
        if let Some(fallback) = observation.fallback_item_id {
            request = request.with_fallback(fallback);
        }

        match self.dispatcher.dispatch(&request).await {
            Ok(()) => {
                info!(key = %key, title = %entry.item_title, "Quality update announced");
                self.suppression
                    .mark(&entry.external_keys, self.settings.suppression_ttl, now);
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to send quality update notification"),
        }

        self.queue.remove(key);

        Ok(EntryOutcome::Notified)
    }

    /// Resolve the entry afresh and snapshot its current quality.
    ///
    /// Series entries are observed through one episode. Once a baseline
    /// exists only that episode is looked at; while it has no file the entry
    /// is not ready.
    async fn observe(&self, entry: &PendingChangeEntry) -> Result<Option<Observation>> {
        let kind = self.tracker().item_kind();
        let Some(target) = self
            .resolver
            .resolve(kind, &entry.external_keys, &entry.item_title, entry.release_year)
            .await
        else {
            return Ok(None);
        };

        if kind != ItemKind::Series {
            return self.snapshot_of(&target.item_id, None).await;
        }

        let (parent_id, season_id) = match &entry.scope {
            EntryScope::Season { season_number, .. } => {
                let Some(season) = self.resolver.resolve_season(&target, *season_number).await
                else {
                    return Ok(None);
                };
                (season.item_id.clone(), Some(season.item_id))
            }
            EntryScope::WholeItem => (target.item_id.clone(), None),
        };

        let episodes = self.library.children(&parent_id, ItemKind::Episode).await;
        let Some(episodes) = ready(episodes)? else {
            return Ok(None);
        };

        let chosen = match (entry.baseline_episode, &entry.scope) {
            (Some(pinned), _) => pinned_episode(&episodes, pinned),
            (None, EntryScope::Season { episode_numbers, .. }) => {
                representative_episode(&episodes, episode_numbers)
            }
            (None, EntryScope::WholeItem) => representative_episode(&episodes, &BTreeSet::new()),
        };
        let Some(episode) = chosen else {
            return Ok(None);
        };
        let episode_ref = episode_ref(episode, &entry.scope);

        let representative = season_id.clone().unwrap_or_else(|| target.item_id.clone());
        let observation = self.snapshot_of(&episode.id, Some(&representative)).await?;
        Ok(observation.map(|obs| Observation {
            fallback_item_id: season_id.as_ref().map(|_| target.item_id.clone()),
            season_id,
            episode: episode_ref,
            ..obs
        }))
    }

    /// Snapshot `item_id`; the notification shows `representative` (or the
    /// item itself).
    async fn snapshot_of(
        &self,
        item_id: &str,
        representative: Option<&str>,
    ) -> Result<Option<Observation>> {
        let Some(details) = ready(self.library.item(item_id).await)?.flatten() else {
            return Ok(None);
        };
        Ok(quality::build_snapshot(&details).map(|snapshot| Observation {
            snapshot,
            representative_item_id: representative.unwrap_or(item_id).to_string(),
            fallback_item_id: None,
            season_id: None,
            episode: None,
        }))
    }
}

/// Map a library result to "ready or not". Transient failures (not found,
/// timeouts, HTTP errors) mean "not yet"; anything else is a real error.
fn ready<T>(result: reelwatch_common::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_transient() => {
            debug!(error = %e, "Library not ready");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn with_files(episodes: &[LibraryItem]) -> Vec<&LibraryItem> {
    let mut with_file: Vec<&LibraryItem> = episodes.iter().filter(|e| e.has_file()).collect();
    with_file.sort_by_key(|e| {
        (
            e.parent_index_number.unwrap_or(0),
            e.index_number.unwrap_or(u32::MAX),
        )
    });
    with_file
}

/// Episode to take the first snapshot from: the lowest-numbered wanted
/// episode with a file. With no wanted set, the first episode with a file.
/// Never an episode outside a non-empty wanted set.
fn representative_episode<'a>(
    episodes: &'a [LibraryItem],
    wanted: &BTreeSet<u32>,
) -> Option<&'a LibraryItem> {
    let with_file = with_files(episodes);
    if wanted.is_empty() {
        return with_file.first().copied();
    }
    with_file
        .into_iter()
        .find(|e| e.index_number.is_some_and(|n| wanted.contains(&n)))
}

/// The baseline episode, if it currently has a file.
fn pinned_episode(episodes: &[LibraryItem], pinned: EpisodeRef) -> Option<&LibraryItem> {
    with_files(episodes).into_iter().find(|e| {
        e.index_number == Some(pinned.episode_number)
            && e.parent_index_number.unwrap_or(pinned.season_number) == pinned.season_number
    })
}

fn episode_ref(episode: &LibraryItem, scope: &EntryScope) -> Option<EpisodeRef> {
    let season_number = match scope {
        EntryScope::Season { season_number, .. } => Some(*season_number),
        EntryScope::WholeItem => episode.parent_index_number,
    }?;
    episode
        .index_number
        .map(|episode_number| EpisodeRef::new(season_number, episode_number))
}
