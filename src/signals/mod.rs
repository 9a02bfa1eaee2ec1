//! Inbound signal handling.
//!
//! Acquisition grabs only ever enqueue pending changes. Library "item added"
//! signals are announced right away, filtered by suppression marks, the
//! notified ledger and, for episodes, the season-progress gate.

use crate::arr::SeasonTotals;
use crate::config::Config;
use crate::engine::EngineStores;
use crate::ledger::NotifiedLedger;
use crate::library::{LibraryClient, LibraryItem};
use crate::messages::{self, EpisodeDetails};
use crate::notifications::{Dispatcher, NotificationRequest};
use crate::reconcile::{EnqueueOutcome, PendingChangeEntry};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reelwatch_common::{EntryScope, ExternalKeySet, ItemKind, KeyScheme, TrackerKind};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// "An item was added to the library."
#[derive(Debug, Clone, Default)]
pub struct LibraryChangeSignal {
    pub item_type: String,
    pub item_id: String,
    pub provider_ids: ExternalKeySet,
    pub name: String,
    pub year: Option<i32>,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    pub series_name: Option<String>,
    pub overview: Option<String>,
    pub runtime: Option<String>,
    pub artist: Option<String>,
}

impl LibraryChangeSignal {
    pub fn kind(&self) -> ItemKind {
        ItemKind::from_library_type(&self.item_type)
    }
}

/// "A tracker grabbed a release for this item."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionGrabSignal {
    pub external_ids: ExternalKeySet,
    pub title: String,
    pub year: Option<i32>,
    pub season_number: Option<u32>,
    pub episode_numbers: Vec<u32>,
}

impl AcquisitionGrabSignal {
    pub fn scope(&self) -> EntryScope {
        match self.season_number {
            Some(season) => EntryScope::season(season, self.episode_numbers.iter().copied()),
            None => EntryScope::WholeItem,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabOutcome {
    Queued(EnqueueOutcome),
    /// No usable catalog id; nothing to track.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryOutcome {
    Notified,
    Suppressed,
    AlreadyNotified,
    Gated,
    OutsideWindow,
    SeasonRecentlyAdded,
    NotReady,
    DispatchFailed,
    Unsupported,
}

impl LibraryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notified => "notified",
            Self::Suppressed => "suppressed",
            Self::AlreadyNotified => "already_notified",
            Self::Gated => "gated",
            Self::OutsideWindow => "outside_window",
            Self::SeasonRecentlyAdded => "season_recently_added",
            Self::NotReady => "not_ready",
            Self::DispatchFailed => "dispatch_failed",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Day windows that hold back episode announcements; 0 disables a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnounceWindows {
    /// Episodes premiered longer ago than this are not announced.
    pub episode_premiered_within_days: u32,
    /// Episodes of a season created more recently than this are not announced.
    pub season_added_within_days: u32,
}

impl AnnounceWindows {
    pub fn from_config(config: &Config) -> Self {
        Self {
            episode_premiered_within_days: config.seasons.episode_premiered_within_days,
            season_added_within_days: config.seasons.season_added_within_days,
        }
    }
}

pub struct SignalHandler {
    stores: EngineStores,
    library: Arc<dyn LibraryClient>,
    dispatcher: Arc<dyn Dispatcher>,
    season_totals: Option<Arc<dyn SeasonTotals>>,
    windows: AnnounceWindows,
}

impl SignalHandler {
    pub fn new(
        stores: EngineStores,
        library: Arc<dyn LibraryClient>,
        dispatcher: Arc<dyn Dispatcher>,
        season_totals: Option<Arc<dyn SeasonTotals>>,
        windows: AnnounceWindows,
    ) -> Self {
        Self {
            stores,
            library,
            dispatcher,
            season_totals,
            windows,
        }
    }

    pub fn on_acquisition_grab(
        &self,
        tracker: TrackerKind,
        signal: AcquisitionGrabSignal,
        now: DateTime<Utc>,
    ) -> GrabOutcome {
        if signal.external_ids.is_empty() {
            warn!(tracker = %tracker, title = %signal.title, "Grab without catalog ids; ignoring");
            return GrabOutcome::Ignored;
        }

        let scope = signal.scope();
        let entry = PendingChangeEntry::new(
            signal.external_ids,
            signal.title,
            signal.year,
            scope,
            now,
        );
        let key = entry.key();
        let title = entry.item_title.clone();
        let outcome = self.stores.queue(tracker).enqueue(entry);

        info!(
            tracker = %tracker,
            key = %key,
            title = %title,
            outcome = ?outcome,
            "Pending change recorded"
        );
        GrabOutcome::Queued(outcome)
    }

    pub async fn on_library_change(&self, signal: LibraryChangeSignal) -> LibraryOutcome {
        self.on_library_change_at(signal, Utc::now()).await
    }

    pub async fn on_library_change_at(
        &self,
        signal: LibraryChangeSignal,
        now: DateTime<Utc>,
    ) -> LibraryOutcome {
        let outcome = match signal.kind() {
            ItemKind::Movie => self.announce_movie(&signal, now).await,
            ItemKind::Season => self.announce_season(&signal, now).await,
            ItemKind::Episode => self.announce_episode(&signal, now).await,
            ItemKind::MusicAlbum => self.announce_album(&signal, now).await,
            _ => {
                debug!(item_type = %signal.item_type, "Item type not supported");
                LibraryOutcome::Unsupported
            }
        };

        info!(
            item_type = %signal.item_type,
            item_id = %signal.item_id,
            name = %signal.name,
            outcome = outcome.as_str(),
            "Library change handled"
        );
        outcome
    }

    async fn announce_movie(&self, signal: &LibraryChangeSignal, now: DateTime<Utc>) -> LibraryOutcome {
        if self.stores.suppression.is_any_active(&signal.provider_ids, now) {
            return LibraryOutcome::Suppressed;
        }

        let ledger_key = NotifiedLedger::key("Movie", &signal.name, signal.year);
        let text = messages::new_movie(
            &signal.name,
            signal.year,
            signal.overview.as_deref(),
            signal.runtime.as_deref(),
        );
        let request = NotificationRequest::new(signal.item_id.as_str(), text);
        self.announce_once(&ledger_key, request, now).await
    }

    async fn announce_season(&self, signal: &LibraryChangeSignal, now: DateTime<Utc>) -> LibraryOutcome {
        let season = self.fetch(&signal.item_id).await;
        let series = match season.as_ref().and_then(|s| s.series_id.as_deref()) {
            Some(series_id) => self.fetch(series_id).await,
            None => None,
        };

        let keys = merged_keys(&signal.provider_ids, series.as_ref());
        if self.stores.suppression.is_any_active(&keys, now) {
            return LibraryOutcome::Suppressed;
        }

        let series_name = signal
            .series_name
            .clone()
            .or_else(|| series.as_ref().map(|s| s.name.clone()))
            .unwrap_or_default();
        let overview = non_empty(signal.overview.as_deref())
            .or_else(|| series.as_ref().and_then(|s| non_empty(s.overview.as_deref())));

        let ledger_key =
            NotifiedLedger::key("Season", &format!("{series_name} - {}", signal.name), signal.year);
        let text = messages::new_season(&series_name, signal.year, &signal.name, overview);
        let mut request = NotificationRequest::new(signal.item_id.as_str(), text);
        if let Some(series) = &series {
            request = request.with_fallback(series.id.as_str());
        }
        self.announce_once(&ledger_key, request, now).await
    }

    async fn announce_album(&self, signal: &LibraryChangeSignal, now: DateTime<Utc>) -> LibraryOutcome {
        if self.stores.suppression.is_any_active(&signal.provider_ids, now) {
            return LibraryOutcome::Suppressed;
        }

        let ledger_key = NotifiedLedger::key("MusicAlbum", &signal.name, signal.year);
        let text = messages::new_album(
            signal.artist.as_deref(),
            &signal.name,
            signal.year,
            signal.overview.as_deref(),
            signal.runtime.as_deref(),
        );
        let request = NotificationRequest::new(signal.item_id.as_str(), text);
        self.announce_once(&ledger_key, request, now).await
    }

    async fn announce_episode(&self, signal: &LibraryChangeSignal, now: DateTime<Utc>) -> LibraryOutcome {
        let Some(episode) = self.fetch(&signal.item_id).await else {
            return LibraryOutcome::NotReady;
        };

        let Some(season_id) = episode.season_id.clone() else {
            debug!(item_id = %signal.item_id, "Episode has no season yet");
            return LibraryOutcome::NotReady;
        };

        let season = self.fetch(&season_id).await;
        if self.season_added_recently(season.as_ref(), now) {
            debug!(
                season_id = %season_id,
                days = self.windows.season_added_within_days,
                "Season was added recently; the season announcement covers this episode"
            );
            return LibraryOutcome::SeasonRecentlyAdded;
        }

        if !self.premiered_recently(&episode, now) {
            return LibraryOutcome::OutsideWindow;
        }

        let series_id = episode
            .series_id
            .clone()
            .or_else(|| season.as_ref().and_then(|s| s.series_id.clone()));
        let series = match series_id.as_deref() {
            Some(series_id) => self.fetch(series_id).await,
            None => None,
        };
        let series_keys = merged_keys(&signal.provider_ids, series.as_ref());
        if self.stores.suppression.is_any_active(&series_keys, now) {
            return LibraryOutcome::Suppressed;
        }

        let episodes = match self.library.children(&season_id, ItemKind::Episode).await {
            Ok(episodes) => episodes,
            Err(e) => {
                debug!(season_id = %season_id, error = %e, "Season episodes unavailable");
                return LibraryOutcome::NotReady;
            }
        };
        let current_count = episodes.iter().filter(|e| e.has_file()).count() as u32;

        let season_number = episode.parent_index_number.or(signal.season_number);
        let planned_total = match (&self.season_totals, series_keys.get(KeyScheme::Secondary), season_number) {
            (Some(totals), Some(tvdb_id), Some(season)) => {
                totals.planned_episode_total(tvdb_id, season).await
            }
            _ => None,
        };

        if !self
            .stores
            .seasons
            .should_notify_at(&season_id, current_count, planned_total, now)
        {
            debug!(
                season_id = %season_id,
                current_count,
                planned_total = ?planned_total,
                "Season gate closed"
            );
            return LibraryOutcome::Gated;
        }

        let series_name = signal
            .series_name
            .clone()
            .or_else(|| series.as_ref().map(|s| s.name.clone()))
            .or_else(|| episode.series_name.clone())
            .unwrap_or_default();
        let premiere_date = episode.premiere_date.as_deref().map(date_part);
        let text = messages::new_episodes(&EpisodeDetails {
            series_name: &series_name,
            season_number,
            episode_number: episode.index_number.or(signal.episode_number),
            episode_title: &signal.name,
            premiere_date,
            overview: non_empty(signal.overview.as_deref())
                .or_else(|| non_empty(episode.overview.as_deref())),
            season_episode_count: current_count,
        });

        let mut request = NotificationRequest::new(season_id.clone(), text);
        if let Some(series_id) = series_id {
            request = request.with_fallback(series_id);
        }

        match self.dispatcher.dispatch(&request).await {
            Ok(()) => {
                self.stores.seasons.record_notified(&season_id, now);
                LibraryOutcome::Notified
            }
            Err(e) => {
                warn!(season_id = %season_id, error = %e, "Failed to send episode notification");
                LibraryOutcome::DispatchFailed
            }
        }
    }

    /// Dispatch once per ledger key; the key is recorded only on success.
    async fn announce_once(
        &self,
        ledger_key: &str,
        request: NotificationRequest,
        now: DateTime<Utc>,
    ) -> LibraryOutcome {
        if self.stores.ledger.contains(ledger_key) {
            debug!(key = %ledger_key, "Notification was already sent");
            return LibraryOutcome::AlreadyNotified;
        }

        match self.dispatcher.dispatch(&request).await {
            Ok(()) => {
                self.stores.ledger.mark(ledger_key, now);
                LibraryOutcome::Notified
            }
            Err(e) => {
                warn!(key = %ledger_key, error = %e, "Failed to send notification");
                LibraryOutcome::DispatchFailed
            }
        }
    }

    async fn fetch(&self, item_id: &str) -> Option<LibraryItem> {
        match self.library.item(item_id).await {
            Ok(item) => item,
            Err(e) => {
                debug!(item_id = %item_id, error = %e, "Library item unavailable");
                None
            }
        }
    }

    fn premiered_recently(&self, episode: &LibraryItem, now: DateTime<Utc>) -> bool {
        let days = self.windows.episode_premiered_within_days;
        if days == 0 {
            return true;
        }
        // Unknown premiere dates are not held against the episode.
        match episode.premiere_date.as_deref().and_then(parse_date) {
            Some(premiered) => within_days(premiered, days, now),
            None => true,
        }
    }

    fn season_added_recently(&self, season: Option<&LibraryItem>, now: DateTime<Utc>) -> bool {
        let days = self.windows.season_added_within_days;
        if days == 0 {
            return false;
        }
        season
            .and_then(|s| s.date_created.as_deref())
            .and_then(parse_date)
            .is_some_and(|created| within_days(created, days, now))
    }
}

/// True if `date` is no more than `days` days before `now`.
fn within_days(date: NaiveDate, days: u32, now: DateTime<Utc>) -> bool {
    date >= (now - Duration::days(i64::from(days))).date_naive()
}

fn merged_keys(signal_keys: &ExternalKeySet, series: Option<&LibraryItem>) -> ExternalKeySet {
    let series_keys = series.map(LibraryItem::external_keys).unwrap_or_default();
    ExternalKeySet::from_keys(series_keys.iter().chain(signal_keys.iter()).cloned())
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn date_part(s: &str) -> &str {
    s.split('T').next().unwrap_or(s)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_part(s), "%Y-%m-%d").ok()
}
