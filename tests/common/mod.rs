//! Shared test harness for integration tests.
//!
//! Provides an in-memory [`FakeLibrary`], a [`RecordingDispatcher`] and a
//! [`Harness`] that wires them into a full [`Engine`].

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reelwatch::arr::SeasonTotals;
use reelwatch::config::Config;
use reelwatch::engine::Engine;
use reelwatch::library::{LibraryClient, LibraryItem, MediaStream};
use reelwatch::notifications::{Dispatcher, NotificationRequest};
use reelwatch::state::StateStore;
use reelwatch_common::{Error, ExternalKey, ItemKind, Result};

/// Library contents held in memory; tests mutate it between ticks.
#[derive(Default)]
pub struct FakeLibrary {
    items: Mutex<Vec<LibraryItem>>,
    broken_items: Mutex<HashSet<String>>,
    offline: AtomicBool,
}

impl FakeLibrary {
    pub fn insert(&self, item: LibraryItem) {
        let mut items = self.items.lock();
        items.retain(|i| i.id != item.id);
        items.push(item);
    }

    pub fn remove(&self, id: &str) {
        self.items.lock().retain(|i| i.id != id);
    }

    pub fn set_streams(&self, id: &str, streams: Vec<MediaStream>) {
        if let Some(item) = self.items.lock().iter_mut().find(|i| i.id == id) {
            item.media_streams = streams;
        }
    }

    /// `item(id)` fails with a non-transient error from now on.
    pub fn break_item(&self, id: &str) {
        self.broken_items.lock().insert(id.to_string());
    }

    /// Every call fails with a transient HTTP error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Error::http("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LibraryClient for FakeLibrary {
    async fn find_by_key(&self, kind: ItemKind, key: &ExternalKey) -> Result<Vec<LibraryItem>> {
        self.check_online()?;
        Ok(self
            .items
            .lock()
            .iter()
            .filter(|i| i.kind() == kind && i.carries_key(key))
            .cloned()
            .collect())
    }

    async fn item(&self, item_id: &str) -> Result<Option<LibraryItem>> {
        self.check_online()?;
        if self.broken_items.lock().contains(item_id) {
            return Err(Error::internal(format!("corrupt item {item_id}")));
        }
        Ok(self.items.lock().iter().find(|i| i.id == item_id).cloned())
    }

    async fn children(&self, parent_id: &str, kind: ItemKind) -> Result<Vec<LibraryItem>> {
        self.check_online()?;
        Ok(self
            .items
            .lock()
            .iter()
            .filter(|i| i.kind() == kind)
            .filter(|i| {
                i.season_id.as_deref() == Some(parent_id) || i.series_id.as_deref() == Some(parent_id)
            })
            .cloned()
            .collect())
    }

    async fn primary_image(&self, _item_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn test_connection(&self) -> Result<bool> {
        Ok(!self.offline.load(Ordering::SeqCst))
    }
}

/// Records every request; can be told to fail.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<NotificationRequest>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, request: &NotificationRequest) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("channel unavailable");
        }
        self.sent.lock().push(request.clone());
        Ok(())
    }
}

/// Planned totals keyed by (tvdb id, season).
#[derive(Default)]
pub struct FixedTotals(pub HashMap<(String, u32), u32>);

#[async_trait]
impl SeasonTotals for FixedTotals {
    async fn planned_episode_total(&self, tvdb_id: &str, season_number: u32) -> Option<u32> {
        self.0.get(&(tvdb_id.to_string(), season_number)).copied()
    }
}

pub struct Harness {
    pub engine: Engine,
    pub library: Arc<FakeLibrary>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub config: Config,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Config::default(), Arc::new(StateStore::in_memory()), None)
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, Arc::new(StateStore::in_memory()), None)
    }

    pub fn build(
        config: Config,
        store: Arc<StateStore>,
        totals: Option<Arc<dyn SeasonTotals>>,
    ) -> Self {
        let library = Arc::new(FakeLibrary::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let engine = Engine::new(
            &config,
            store,
            library.clone(),
            dispatcher.clone(),
            totals,
        );
        Self {
            engine,
            library,
            dispatcher,
            config,
        }
    }
}

// ---------------------------------------------------------------------------
// Library fixtures
// ---------------------------------------------------------------------------

fn providers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn movie(id: &str, name: &str, year: i32, tmdb: &str, streams: Vec<MediaStream>) -> LibraryItem {
    LibraryItem {
        id: id.into(),
        name: name.into(),
        item_type: "Movie".into(),
        production_year: Some(year),
        provider_ids: providers(&[("Tmdb", tmdb)]),
        location_type: Some("FileSystem".into()),
        media_streams: streams,
        ..Default::default()
    }
}

pub fn series(id: &str, name: &str, year: i32, tvdb: &str) -> LibraryItem {
    LibraryItem {
        id: id.into(),
        name: name.into(),
        item_type: "Series".into(),
        production_year: Some(year),
        provider_ids: providers(&[("Tvdb", tvdb)]),
        ..Default::default()
    }
}

pub fn season(id: &str, series_id: &str, number: u32) -> LibraryItem {
    LibraryItem {
        id: id.into(),
        name: format!("Season {number}"),
        item_type: "Season".into(),
        index_number: Some(number),
        series_id: Some(series_id.into()),
        ..Default::default()
    }
}

pub fn episode(
    id: &str,
    series_id: &str,
    season_id: &str,
    season_number: u32,
    number: u32,
    streams: Vec<MediaStream>,
) -> LibraryItem {
    LibraryItem {
        id: id.into(),
        name: format!("Episode {number}"),
        item_type: "Episode".into(),
        index_number: Some(number),
        parent_index_number: Some(season_number),
        series_id: Some(series_id.into()),
        season_id: Some(season_id.into()),
        location_type: Some("FileSystem".into()),
        premiere_date: Some("2024-03-01T00:00:00.0000000Z".into()),
        media_streams: streams,
        ..Default::default()
    }
}

/// 1080p / H264 / SDR / AC3 5.1
pub fn hd_streams() -> Vec<MediaStream> {
    vec![
        MediaStream {
            stream_type: Some("Video".into()),
            codec: Some("h264".into()),
            width: Some(1920),
            height: Some(1080),
            video_range: Some("SDR".into()),
            video_range_type: Some("SDR".into()),
            ..Default::default()
        },
        MediaStream {
            stream_type: Some("Audio".into()),
            codec: Some("ac3".into()),
            channels: Some(6),
            language: Some("eng".into()),
            display_title: Some("English - Dolby Digital - 5.1".into()),
            ..Default::default()
        },
    ]
}

/// 2160p / HEVC / Dolby Vision + HDR10 / TrueHD 7.1 Atmos
pub fn uhd_streams() -> Vec<MediaStream> {
    vec![
        MediaStream {
            stream_type: Some("Video".into()),
            codec: Some("hevc".into()),
            width: Some(3840),
            height: Some(2160),
            video_range: Some("HDR".into()),
            video_range_type: Some("DOVIWithHDR10".into()),
            video_do_vi_title: Some("Dolby Vision Profile 8.1 (HDR10)".into()),
            dv_profile: Some(8),
            ..Default::default()
        },
        MediaStream {
            stream_type: Some("Audio".into()),
            codec: Some("truehd".into()),
            channels: Some(8),
            language: Some("eng".into()),
            profile: Some("Dolby TrueHD + Dolby Atmos".into()),
            display_title: Some("[eng] TrueHD 7.1".into()),
            ..Default::default()
        },
    ]
}
